use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::util;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub event_id: Uuid,
    /// The file name the uploader gave the file
    pub file_name: String,
    /// Where the stored file is served from
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

impl Attachment {
    pub async fn for_event(event_id: Uuid, pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM attachments WHERE event_id = $1 ORDER BY uploaded_at",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(
        event_id: Uuid,
        file_name: &str,
        url: &str,
        pool: &PgPool,
    ) -> ApiResult<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO attachments (id, event_id, file_name, url, uploaded_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(file_name)
        .bind(url)
        .bind(util::current_time())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
