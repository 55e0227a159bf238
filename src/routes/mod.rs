//! Request routing and the handlers behind it.

use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, get_service, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::file::UploadFile;
use crate::otp::OtpStore;
use crate::relay::Relay;

pub mod admin_routes;
pub mod auth_routes;
pub mod notification_routes;
pub mod organiser_routes;
pub mod otp_routes;
pub mod socket_routes;
pub mod staff_routes;

pub fn app_router(pool: PgPool, relay: Arc<Relay>, otp_store: Arc<OtpStore>) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/organiser", organiser_routes::router())
        .nest("/api/staff", staff_routes::router())
        .nest("/api/admin", admin_routes::router())
        .nest("/api/otp", otp_routes::router())
        .route("/api/notifications", get(notification_routes::list))
        .route(
            "/api/notifications/:notification_id/read",
            post(notification_routes::mark_read),
        )
        .route("/api/socket", get(socket_routes::socket))
        .nest(
            "/uploads",
            get_service(ServeDir::new(UploadFile::base_path())).handle_error(serve_dir_error),
        )
        .layer(cors_layer())
        .layer(Extension(pool))
        .layer(Extension(relay))
        .layer(Extension(otp_store))
}

pub fn basic_success() -> Json<Value> {
    Json(json!({ "success": true }))
}

async fn serve_dir_error(error: std::io::Error) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("failed to serve file: {}", error),
    )
}

/// Origins come from `ALLOWED_ORIGINS` (comma separated); an empty list
/// leaves the API open, which is what the local and demo deployments want.
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| {
            let origin = origin.trim();
            (!origin.is_empty()).then(|| origin.parse().ok()).flatten()
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
