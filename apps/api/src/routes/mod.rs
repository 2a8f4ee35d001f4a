pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::careers::handlers;
use crate::careers::upload::MAX_RESUME_BYTES;
use crate::state::AppState;

/// Room for the text fields sent alongside a maximum-size résumé.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .nest("/api/careers", careers_router())
        .with_state(state)
}

fn careers_router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::handle_list))
        .route(
            "/apply",
            post(handlers::handle_apply).layer(DefaultBodyLimit::max(
                MAX_RESUME_BYTES as usize + FORM_OVERHEAD_BYTES,
            )),
        )
        .route(
            "/:id",
            get(handlers::handle_get).delete(handlers::handle_delete),
        )
        .route("/:id/resume", get(handlers::handle_download_resume))
}
