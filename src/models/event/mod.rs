use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::geo::Coordinates;
use crate::models::account::Role;
use crate::util;

pub mod application;
pub mod attachment;
pub mod rating;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Where an event sits relative to the clock. Derived from the stored
/// start/end timestamps, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    /// The name of the event
    pub name: String,
    /// General information or details about the event
    pub description: String,
    /// Where the event will be held
    pub venue_address: String,
    pub venue_lat: Option<f64>,
    pub venue_lng: Option<f64>,
    /// When staff are expected to arrive
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    /// When staff are expected to be released
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub priority: Priority,
    /// How many staff the organiser wants to hire
    pub required_staff: i32,
    /// The organiser that posted the event; immutable after creation
    pub created_by: Uuid,
    /// Whether an admin has cleared the event for discovery
    pub approved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An event as clients see it, with the clock-derived status attached.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: Event,
    pub status: EventStatus,
}

impl EventResponse {
    pub fn new(event: Event, now: OffsetDateTime) -> Self {
        let status = event.status_at(now);

        Self { event, status }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub venue_address: String,
    #[serde(default)]
    pub venue_lat: Option<f64>,
    #[serde(default)]
    pub venue_lng: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub required_staff: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub venue_address: Option<String>,
    pub venue_lat: Option<f64>,
    pub venue_lng: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub starts_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    pub priority: Option<Priority>,
    pub required_staff: Option<i32>,
}

impl Event {
    pub async fn with_id(id: Uuid, pool: &PgPool) -> ApiResult<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or(ApiError::NotFound("event"))
    }

    pub async fn with_id_opt(id: Uuid, pool: &PgPool) -> ApiResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_ids(ids: &[Uuid], pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM events WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn for_organiser(organiser_id: Uuid, pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM events WHERE created_by = $1 ORDER BY starts_at",
        )
        .bind(organiser_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// All events cleared for discovery, soonest first.
    pub async fn all_approved(pool: &PgPool) -> ApiResult<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM events WHERE approved ORDER BY starts_at")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn create(new_event: NewEvent, organiser_id: Uuid, pool: &PgPool) -> ApiResult<Self> {
        if new_event.ends_at <= new_event.starts_at {
            return Err(ApiError::BadRequest(
                "an event must end after it starts".to_owned(),
            ));
        }
        if new_event.name.trim().is_empty() {
            return Err(ApiError::BadRequest("event name is required".to_owned()));
        }

        sqlx::query_as::<_, Self>(
            "INSERT INTO events
                 (id, name, description, venue_address, venue_lat, venue_lng,
                  starts_at, ends_at, priority, required_staff, created_by, approved, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, $12)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_event.name.trim())
        .bind(new_event.description)
        .bind(new_event.venue_address)
        .bind(new_event.venue_lat)
        .bind(new_event.venue_lng)
        .bind(new_event.starts_at)
        .bind(new_event.ends_at)
        .bind(new_event.priority.unwrap_or(Priority::Normal))
        .bind(new_event.required_staff.unwrap_or(1))
        .bind(organiser_id)
        .bind(util::current_time())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(id: Uuid, update: EventUpdate, pool: &PgPool) -> ApiResult<Self> {
        let current = Self::with_id(id, pool).await?;
        let starts_at = update.starts_at.unwrap_or(current.starts_at);
        let ends_at = update.ends_at.unwrap_or(current.ends_at);
        if ends_at <= starts_at {
            return Err(ApiError::BadRequest(
                "an event must end after it starts".to_owned(),
            ));
        }

        sqlx::query_as::<_, Self>(
            "UPDATE events
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 venue_address = COALESCE($4, venue_address),
                 venue_lat = COALESCE($5, venue_lat),
                 venue_lng = COALESCE($6, venue_lng),
                 starts_at = COALESCE($7, starts_at),
                 ends_at = COALESCE($8, ends_at),
                 priority = COALESCE($9, priority),
                 required_staff = COALESCE($10, required_staff)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.venue_address)
        .bind(update.venue_lat)
        .bind(update.venue_lng)
        .bind(update.starts_at)
        .bind(update.ends_at)
        .bind(update.priority)
        .bind(update.required_staff)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("event"))
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(ApiError::NotFound("event"))
        } else {
            Ok(())
        }
    }

    pub async fn set_approved(id: Uuid, pool: &PgPool) -> ApiResult<Self> {
        sqlx::query_as::<_, Self>("UPDATE events SET approved = TRUE WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::NotFound("event"))
    }

    pub fn status_at(&self, now: OffsetDateTime) -> EventStatus {
        if now < self.starts_at {
            EventStatus::Upcoming
        } else if now <= self.ends_at {
            EventStatus::Ongoing
        } else {
            EventStatus::Completed
        }
    }

    pub fn venue_coordinates(&self) -> Option<Coordinates> {
        match (self.venue_lat, self.venue_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    /// Only the owning organiser (or an admin) may touch the event.
    pub fn ensure_owned_by(&self, claims: &Claims, action: &str) -> ApiResult<()> {
        if self.created_by == claims.sub || claims.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "You can only {} your own events",
                action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::tests::mock::{mock_claims, mock_event};

    #[test]
    fn status_follows_the_clock() {
        let event = mock_event();

        let before = event.starts_at - Duration::hours(1);
        assert_eq!(event.status_at(before), EventStatus::Upcoming);

        assert_eq!(event.status_at(event.starts_at), EventStatus::Ongoing);
        let during = event.starts_at + Duration::minutes(30);
        assert_eq!(event.status_at(during), EventStatus::Ongoing);
        assert_eq!(event.status_at(event.ends_at), EventStatus::Ongoing);

        let after = event.ends_at + Duration::seconds(1);
        assert_eq!(event.status_at(after), EventStatus::Completed);
    }

    #[test]
    fn ownership_allows_the_owner_and_admins_only() {
        let event = mock_event();

        let owner = mock_claims(event.created_by, Role::Organiser);
        assert!(event.ensure_owned_by(&owner, "update").is_ok());

        let admin = mock_claims(Uuid::new_v4(), Role::Admin);
        assert!(event.ensure_owned_by(&admin, "update").is_ok());

        let other = mock_claims(Uuid::new_v4(), Role::Organiser);
        match event.ensure_owned_by(&other, "update") {
            Err(ApiError::Forbidden(message)) => {
                assert_eq!(message, "You can only update your own events");
            }
            other => panic!("expected Forbidden, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn venue_coordinates_require_both_components() {
        let mut event = mock_event();
        assert!(event.venue_coordinates().is_some());

        event.venue_lng = None;
        assert!(event.venue_coordinates().is_none());
    }
}
