//! Admin-only moderation. Admin accounts are seeded out-of-band; no
//! registration path issues the role.

use axum::extract::Path;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Admin;
use crate::error::ApiResult;
use crate::models::event::{Event, EventResponse};
use crate::util;

pub fn router() -> Router {
    Router::new().route("/events/:event_id/approve", post(approve_event))
}

/// Clears an event for discovery by staff.
async fn approve_event(
    Admin(_claims): Admin,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let event = Event::set_approved(event_id, &pool).await?;

    Ok(Json(json!({
        "success": true,
        "event": EventResponse::new(event, util::current_time()),
    })))
}
