use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::{json, Map, Value};

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let (available, downloaded) = state.catalog.counts();

    let counts = state.jobs.count_by_state();
    let running: usize = counts
        .iter()
        .filter(|(job_state, _)| !job_state.is_terminal())
        .map(|(_, count)| count)
        .sum();
    let by_state: Map<String, Value> = counts
        .iter()
        .map(|(job_state, count)| (job_state.as_str().to_string(), json!(count)))
        .collect();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime().as_secs(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": state.config.server.host,
            "port": state.config.server.port
        },
        "jobs": {
            "total": state.jobs.len(),
            "running": running,
            "by_state": Value::Object(by_state)
        },
        "models": {
            "available": available,
            "downloaded": downloaded,
            "data_dir": state.config.models.data_dir
        }
    }))
}
