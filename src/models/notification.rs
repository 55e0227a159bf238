//! Persisted notifications.
//!
//! These rows are the source of truth for what an account has been told; the
//! websocket relay only pushes hints that something new is here.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::util;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub account_id: Uuid,
    /// What happened, e.g. `new-application`
    pub kind: String,
    pub message: String,
    /// The event the notification is about, if any
    pub event_id: Option<Uuid>,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Notification {
    pub async fn for_account(account_id: Uuid, pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM notifications WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(
        account_id: Uuid,
        kind: &str,
        message: &str,
        event_id: Option<Uuid>,
        pool: &PgPool,
    ) -> ApiResult<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO notifications (id, account_id, kind, message, event_id, read, created_at)
             VALUES ($1, $2, $3, $4, $5, FALSE, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(kind)
        .bind(message)
        .bind(event_id)
        .bind(util::current_time())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Marks one of the account's own notifications as read.
    pub async fn mark_read(id: Uuid, account_id: Uuid, pool: &PgPool) -> ApiResult<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE notifications SET read = TRUE
             WHERE id = $1 AND account_id = $2
             RETURNING *",
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("notification"))
    }
}
