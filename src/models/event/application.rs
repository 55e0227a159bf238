use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::util;

/// The lifecycle of a (staff, event) pair.
///
/// A cancelled application is kept as a terminal-status row instead of being
/// deleted, so the history of who applied and backed out survives. Reapplying
/// revives the same row back to `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    /// Whether an organiser decision on this entry is still open.
    pub fn reviewable(self) -> bool {
        self == ApplicationStatus::Pending
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Accepted,
    Rejected,
}

impl From<ReviewDecision> for ApplicationStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Accepted => ApplicationStatus::Accepted,
            ReviewDecision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub event_id: Uuid,
    pub staff_id: Uuid,
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub decided_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
}

impl Application {
    pub async fn for_staff_at_event_opt(
        event_id: Uuid,
        staff_id: Uuid,
        pool: &PgPool,
    ) -> ApiResult<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM applications WHERE event_id = $1 AND staff_id = $2",
        )
        .bind(event_id)
        .bind(staff_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_event(event_id: Uuid, pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM applications WHERE event_id = $1 ORDER BY applied_at",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The staff member's live applications, oldest first. Cancelled rows are
    /// audit history and never listed.
    pub async fn for_staff(staff_id: Uuid, pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM applications
             WHERE staff_id = $1 AND status <> 'cancelled'
             ORDER BY applied_at",
        )
        .bind(staff_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The IDs of events the staff member has a live application on.
    pub async fn live_event_ids_for_staff(
        staff_id: Uuid,
        pool: &PgPool,
    ) -> ApiResult<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT event_id FROM applications
             WHERE staff_id = $1 AND status <> 'cancelled'",
        )
        .bind(staff_id)
        .fetch_all(pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// Files an application, or revives a cancelled one, in one statement.
    ///
    /// The unique (event, staff) constraint plus the conditional upsert make
    /// this atomic: two concurrent submissions cannot both insert, and the
    /// loser surfaces as a conflict instead of a second row.
    pub async fn submit(event_id: Uuid, staff_id: Uuid, pool: &PgPool) -> ApiResult<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO applications (id, event_id, staff_id, status, applied_at)
             VALUES ($1, $2, $3, 'pending', $4)
             ON CONFLICT ON CONSTRAINT applications_event_staff_key DO UPDATE
                 SET status = 'pending', applied_at = $4,
                     decided_at = NULL, cancelled_at = NULL
                 WHERE applications.status = 'cancelled'
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(staff_id)
        .bind(util::current_time())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::Conflict("you have already applied to this event".to_owned()))
    }

    /// Cancels a pending application. Returns whether anything changed; a
    /// missing or already-settled application is a no-op, so the operation is
    /// idempotent.
    pub async fn cancel(event_id: Uuid, staff_id: Uuid, pool: &PgPool) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE applications
             SET status = 'cancelled', cancelled_at = $3
             WHERE event_id = $1 AND staff_id = $2 AND status = 'pending'",
        )
        .bind(event_id)
        .bind(staff_id)
        .bind(util::current_time())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies an organiser's decision to a pending application.
    ///
    /// Decisions are final: a second review of the same entry conflicts
    /// rather than silently overriding the first.
    pub async fn review(
        event_id: Uuid,
        staff_id: Uuid,
        decision: ReviewDecision,
        pool: &PgPool,
    ) -> ApiResult<Self> {
        let reviewed = sqlx::query_as::<_, Self>(
            "UPDATE applications
             SET status = $3, decided_at = $4
             WHERE event_id = $1 AND staff_id = $2 AND status = 'pending'
             RETURNING *",
        )
        .bind(event_id)
        .bind(staff_id)
        .bind(ApplicationStatus::from(decision))
        .bind(util::current_time())
        .fetch_optional(pool)
        .await?;

        if let Some(application) = reviewed {
            return Ok(application);
        }

        match Self::for_staff_at_event_opt(event_id, staff_id, pool).await? {
            Some(_) => Err(ApiError::Conflict(
                "this application has already been reviewed".to_owned(),
            )),
            None => Err(ApiError::NotFound("application")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_entries_are_reviewable() {
        assert!(ApplicationStatus::Pending.reviewable());
        assert!(!ApplicationStatus::Accepted.reviewable());
        assert!(!ApplicationStatus::Rejected.reviewable());
        assert!(!ApplicationStatus::Cancelled.reviewable());
    }

    #[test]
    fn decisions_map_onto_terminal_statuses() {
        assert_eq!(
            ApplicationStatus::from(ReviewDecision::Accepted),
            ApplicationStatus::Accepted
        );
        assert_eq!(
            ApplicationStatus::from(ReviewDecision::Rejected),
            ApplicationStatus::Rejected
        );
    }

    #[test]
    fn decisions_deserialize_from_lowercase() {
        let decision: ReviewDecision = serde_json::from_str("\"accepted\"").unwrap();
        assert_eq!(decision, ReviewDecision::Accepted);

        assert!(serde_json::from_str::<ReviewDecision>("\"pending\"").is_err());
        assert!(serde_json::from_str::<ReviewDecision>("\"cancelled\"").is_err());
    }
}
