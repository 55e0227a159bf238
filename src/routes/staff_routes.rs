//! The staff-facing surface: profile, event discovery, the application
//! lifecycle, and ratings.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Staff;
use crate::error::{ApiError, ApiResult};
use crate::geo;
use crate::models::account::{Account, AccountSummary, NewAccount, ProfileUpdate, Role};
use crate::models::event::application::{Application, ApplicationStatus};
use crate::models::event::rating::{NewRating, Rating};
use crate::models::event::{Event, EventResponse};
use crate::models::notification::Notification;
use crate::relay::{Relay, RelayEvent};
use crate::routes::{auth_routes, basic_success};
use crate::util;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/events/nearby", get(nearby_events))
        .route("/events/:event_id/apply", post(apply))
        .route("/events/:event_id/cancel", post(cancel))
        .route("/events/:event_id/rate", post(rate))
        .route("/applications", get(list_applications))
}

async fn register(
    Extension(pool): Extension<PgPool>,
    Json(new_account): Json<NewAccount>,
) -> ApiResult<Json<Value>> {
    auth_routes::register_with_role(new_account, Role::Staff, &pool).await
}

async fn login(
    Extension(pool): Extension<PgPool>,
    Json(form): Json<auth_routes::LoginRequest>,
) -> ApiResult<Json<Value>> {
    auth_routes::login_as(form, &[Role::Staff], &pool).await
}

async fn get_profile(
    Staff(claims): Staff,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let account = Account::with_id(claims.sub, &pool).await?;

    Ok(Json(json!({ "success": true, "account": account })))
}

async fn update_profile(
    Staff(claims): Staff,
    Extension(pool): Extension<PgPool>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let account = Account::update_profile(claims.sub, update, &pool).await?;

    Ok(Json(json!({ "success": true, "account": account })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NearbyEvent {
    #[serde(flatten)]
    event: EventResponse,
    distance_km: f64,
    organiser: Option<AccountSummary>,
}

/// Approved events within the discovery radius that the staff member has no
/// live application on. Staff without stored coordinates see nothing.
async fn nearby_events(
    Staff(claims): Staff,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let staff = Account::with_id(claims.sub, &pool).await?;
    let applied = Application::live_event_ids_for_staff(claims.sub, &pool).await?;

    let mut candidates = Vec::new();
    if let Some(staff_coords) = staff.coordinates() {
        for event in Event::all_approved(&pool).await? {
            if applied.contains(&event.id) {
                continue;
            }
            let venue = match event.venue_coordinates() {
                Some(venue) => venue,
                None => continue,
            };

            let distance_km = geo::haversine_km(staff_coords, venue);
            if distance_km <= geo::DISCOVERY_RADIUS_KM {
                candidates.push((event, distance_km));
            }
        }
    }

    let organiser_ids: Vec<Uuid> = candidates
        .iter()
        .map(|(event, _)| event.created_by)
        .collect();
    let organisers: HashMap<Uuid, AccountSummary> =
        Account::summaries_for_ids(&organiser_ids, &pool)
            .await?
            .into_iter()
            .map(|summary| (summary.id, summary))
            .collect();

    let now = util::current_time();
    let events: Vec<NearbyEvent> = candidates
        .into_iter()
        .map(|(event, distance_km)| NearbyEvent {
            organiser: organisers.get(&event.created_by).cloned(),
            event: EventResponse::new(event, now),
            distance_km,
        })
        .collect();

    Ok(Json(json!({ "success": true, "events": events })))
}

async fn apply(
    Staff(claims): Staff,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(relay): Extension<Arc<Relay>>,
) -> ApiResult<Json<Value>> {
    let staff = Account::with_id(claims.sub, &pool).await?;
    let event = Event::with_id_opt(event_id, &pool)
        .await?
        .filter(|event| event.approved)
        .ok_or(ApiError::NotFound("event"))?;

    if !geo::within_discovery_radius(staff.coordinates(), event.venue_coordinates()) {
        return Err(ApiError::Forbidden(format!(
            "you can only apply to events within {} km",
            geo::DISCOVERY_RADIUS_KM
        )));
    }

    let application = Application::submit(event_id, claims.sub, &pool).await?;

    let relay_event = RelayEvent::NewApplication {
        event_id,
        event_name: event.name.clone(),
        staff_id: staff.id,
        staff_name: staff.name.clone(),
    };
    let message = format!("{} applied to work {}", staff.name, event.name);
    Notification::create(
        event.created_by,
        relay_event.kind(),
        &message,
        Some(event_id),
        &pool,
    )
    .await?;
    relay.emit(event.created_by, &relay_event).await;

    Ok(Json(json!({ "success": true, "application": application })))
}

/// Cancelling is idempotent: a missing or already-settled application still
/// reports success, and only a real state change notifies the organiser.
async fn cancel(
    Staff(claims): Staff,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(relay): Extension<Arc<Relay>>,
) -> ApiResult<Json<Value>> {
    let cancelled = Application::cancel(event_id, claims.sub, &pool).await?;

    if cancelled {
        if let Some(event) = Event::with_id_opt(event_id, &pool).await? {
            let staff = Account::with_id(claims.sub, &pool).await?;

            let relay_event = RelayEvent::ApplicationCancelled {
                event_id,
                event_name: event.name.clone(),
                staff_id: staff.id,
                staff_name: staff.name.clone(),
            };
            let message = format!("{} cancelled their application for {}", staff.name, event.name);
            Notification::create(
                event.created_by,
                relay_event.kind(),
                &message,
                Some(event_id),
                &pool,
            )
            .await?;
            relay.emit(event.created_by, &relay_event).await;
        }
    }

    Ok(basic_success())
}

#[derive(Debug, Serialize)]
struct ApplicationWithEvent {
    #[serde(flatten)]
    application: Application,
    event: Option<EventResponse>,
}

async fn list_applications(
    Staff(claims): Staff,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let applications = Application::for_staff(claims.sub, &pool).await?;
    let event_ids: Vec<Uuid> = applications
        .iter()
        .map(|application| application.event_id)
        .collect();
    let events = Event::with_ids(&event_ids, &pool).await?;

    let now = util::current_time();
    let applications: Vec<ApplicationWithEvent> = applications
        .into_iter()
        .map(|application| {
            let event = events
                .iter()
                .find(|event| event.id == application.event_id)
                .cloned()
                .map(|event| EventResponse::new(event, now));

            ApplicationWithEvent { application, event }
        })
        .collect();

    Ok(Json(json!({ "success": true, "applications": applications })))
}

async fn rate(
    Staff(claims): Staff,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Json(new_rating): Json<NewRating>,
) -> ApiResult<Json<Value>> {
    Event::with_id(event_id, &pool).await?;

    let application = Application::for_staff_at_event_opt(event_id, claims.sub, &pool).await?;
    if application.map(|application| application.status) != Some(ApplicationStatus::Accepted) {
        return Err(ApiError::Forbidden(
            "you can only rate events you were accepted to work".to_owned(),
        ));
    }

    let rating = Rating::submit(event_id, claims.sub, new_rating, &pool).await?;

    Ok(Json(json!({ "success": true, "rating": rating })))
}
