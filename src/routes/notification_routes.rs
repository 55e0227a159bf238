//! Reading and acknowledging persisted notifications. The websocket relay
//! only hints that something new landed here.

use axum::extract::Path;
use axum::{Extension, Json};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::User;
use crate::error::ApiResult;
use crate::models::notification::Notification;

pub async fn list(
    User(claims): User,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let notifications = Notification::for_account(claims.sub, &pool).await?;

    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

pub async fn mark_read(
    User(claims): User,
    Path(notification_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let notification = Notification::mark_read(notification_id, claims.sub, &pool).await?;

    Ok(Json(json!({ "success": true, "notification": notification })))
}
