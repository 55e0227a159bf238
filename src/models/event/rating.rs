use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::util;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub event_id: Uuid,
    pub staff_id: Uuid,
    /// 1 through 5, inclusive
    pub rating: i32,
    pub review: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub rating: i32,
    #[serde(default)]
    pub review: String,
}

impl Rating {
    pub async fn for_event(event_id: Uuid, pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM ratings WHERE event_id = $1 ORDER BY created_at")
            .bind(event_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Records the staff member's rating for an event, replacing any rating
    /// they previously left on it.
    pub async fn submit(
        event_id: Uuid,
        staff_id: Uuid,
        new_rating: NewRating,
        pool: &PgPool,
    ) -> ApiResult<Self> {
        validate_rating(new_rating.rating)?;

        sqlx::query_as::<_, Self>(
            "INSERT INTO ratings (event_id, staff_id, rating, review, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT ratings_event_staff_key DO UPDATE
                 SET rating = $3, review = $4, created_at = $5
             RETURNING *",
        )
        .bind(event_id)
        .bind(staff_id)
        .bind(new_rating.rating)
        .bind(new_rating.review)
        .bind(util::current_time())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}

fn validate_rating(rating: i32) -> ApiResult<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "rating must be between 1 and 5".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_are_one_through_five_inclusive() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(3).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-2).is_err());
    }
}
