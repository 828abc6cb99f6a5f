//! # Model Catalog
//!
//! - **entry**: value types for (language, model) pairs
//! - **store**: the [`ModelStore`] seam and its Hugging Face implementation
//! - **models**: the [`ModelCatalog`] tying configuration and storage together

pub mod entry;
pub mod models;
pub mod store;

pub use entry::{CatalogEntry, CatalogStatus, ModelHandle, ModelKey, ModelSize};
pub use models::ModelCatalog;
pub use store::{HubModelStore, ModelStore};
