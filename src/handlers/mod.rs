pub mod jobs;
pub mod models;

use crate::health;
use actix_web::web;

pub use jobs::*;
pub use models::*;

/// Register every route of the service.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .route("/start_transcription/", web::post().to(start_transcription))
            .route("/download_model/", web::post().to(download_model))
            .route("/list/", web::get().to(list_jobs))
            .route("/{id}/", web::get().to(get_job)),
    )
    .service(
        web::scope("/models")
            .route("/available", web::get().to(available_models))
            .route("/downloaded", web::get().to(downloaded_models))
            .route("/{lang}/{model}", web::get().to(model_entry)),
    )
    .route("/health", web::get().to(health::health_check));
}
