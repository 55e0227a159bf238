//! The organiser-facing surface: profile, event CRUD, application review,
//! and attachment uploads.

use std::sync::Arc;

use axum::extract::{ContentLengthLimit, Multipart, Path};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Organiser;
use crate::error::{ApiError, ApiResult};
use crate::file::{UploadFile, MAX_UPLOAD_BYTES};
use crate::models::account::{Account, AccountSummary, NewAccount, ProfileUpdate, Role};
use crate::models::event::application::{Application, ReviewDecision};
use crate::models::event::attachment::Attachment;
use crate::models::event::rating::Rating;
use crate::models::event::{Event, EventResponse, EventUpdate, NewEvent};
use crate::models::notification::Notification;
use crate::relay::{Relay, RelayEvent};
use crate::routes::{auth_routes, basic_success};
use crate::util;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:event_id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:event_id/applications", get(list_applications))
        .route(
            "/events/:event_id/applications/:staff_id/review",
            post(review_application),
        )
        .route("/events/:event_id/attachments", post(upload_attachments))
}

async fn register(
    Extension(pool): Extension<PgPool>,
    Json(new_account): Json<NewAccount>,
) -> ApiResult<Json<Value>> {
    auth_routes::register_with_role(new_account, Role::Organiser, &pool).await
}

async fn login(
    Extension(pool): Extension<PgPool>,
    Json(form): Json<auth_routes::LoginRequest>,
) -> ApiResult<Json<Value>> {
    auth_routes::login_as(form, &[Role::Organiser], &pool).await
}

async fn get_profile(
    Organiser(claims): Organiser,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let account = Account::with_id(claims.sub, &pool).await?;

    Ok(Json(json!({ "success": true, "account": account })))
}

async fn update_profile(
    Organiser(claims): Organiser,
    Extension(pool): Extension<PgPool>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let account = Account::update_profile(claims.sub, update, &pool).await?;

    Ok(Json(json!({ "success": true, "account": account })))
}

async fn list_events(
    Organiser(claims): Organiser,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let now = util::current_time();
    let events: Vec<EventResponse> = Event::for_organiser(claims.sub, &pool)
        .await?
        .into_iter()
        .map(|event| EventResponse::new(event, now))
        .collect();

    Ok(Json(json!({ "success": true, "events": events })))
}

async fn create_event(
    Organiser(claims): Organiser,
    Extension(pool): Extension<PgPool>,
    Json(new_event): Json<NewEvent>,
) -> ApiResult<Json<Value>> {
    let event = Event::create(new_event, claims.sub, &pool).await?;

    Ok(Json(json!({
        "success": true,
        "event": EventResponse::new(event, util::current_time()),
    })))
}

async fn get_event(
    Organiser(claims): Organiser,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let event = Event::with_id(event_id, &pool).await?;
    event.ensure_owned_by(&claims, "view")?;

    let applications = applications_with_staff(event_id, &pool).await?;
    let attachments = Attachment::for_event(event_id, &pool).await?;
    let ratings = Rating::for_event(event_id, &pool).await?;

    Ok(Json(json!({
        "success": true,
        "event": EventResponse::new(event, util::current_time()),
        "applications": applications,
        "attachments": attachments,
        "ratings": ratings,
    })))
}

async fn update_event(
    Organiser(claims): Organiser,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Json(update): Json<EventUpdate>,
) -> ApiResult<Json<Value>> {
    let event = Event::with_id(event_id, &pool).await?;
    event.ensure_owned_by(&claims, "update")?;

    let updated = Event::update(event_id, update, &pool).await?;

    Ok(Json(json!({
        "success": true,
        "event": EventResponse::new(updated, util::current_time()),
    })))
}

async fn delete_event(
    Organiser(claims): Organiser,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let event = Event::with_id(event_id, &pool).await?;
    event.ensure_owned_by(&claims, "delete")?;

    Event::delete(event_id, &pool).await?;

    Ok(basic_success())
}

#[derive(Debug, Serialize)]
struct ApplicationWithStaff {
    #[serde(flatten)]
    application: Application,
    staff: Option<AccountSummary>,
}

async fn applications_with_staff(
    event_id: Uuid,
    pool: &PgPool,
) -> ApiResult<Vec<ApplicationWithStaff>> {
    let applications = Application::for_event(event_id, pool).await?;
    let staff_ids: Vec<Uuid> = applications
        .iter()
        .map(|application| application.staff_id)
        .collect();
    let summaries = Account::summaries_for_ids(&staff_ids, pool).await?;

    Ok(applications
        .into_iter()
        .map(|application| {
            let staff = summaries
                .iter()
                .find(|summary| summary.id == application.staff_id)
                .cloned();

            ApplicationWithStaff { application, staff }
        })
        .collect())
}

async fn list_applications(
    Organiser(claims): Organiser,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
) -> ApiResult<Json<Value>> {
    let event = Event::with_id(event_id, &pool).await?;
    event.ensure_owned_by(&claims, "view applications for")?;

    let applications = applications_with_staff(event_id, &pool).await?;

    Ok(Json(json!({ "success": true, "applications": applications })))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    decision: ReviewDecision,
}

async fn review_application(
    Organiser(claims): Organiser,
    Path((event_id, staff_id)): Path<(Uuid, Uuid)>,
    Extension(pool): Extension<PgPool>,
    Extension(relay): Extension<Arc<Relay>>,
    Json(form): Json<ReviewRequest>,
) -> ApiResult<Json<Value>> {
    let event = Event::with_id(event_id, &pool).await?;
    event.ensure_owned_by(&claims, "review applications for")?;

    let application = Application::review(event_id, staff_id, form.decision, &pool).await?;

    let relay_event = RelayEvent::ApplicationReviewed {
        event_id,
        event_name: event.name.clone(),
        status: application.status,
    };
    let message = match form.decision {
        ReviewDecision::Accepted => {
            format!("Your application for {} was accepted", event.name)
        }
        ReviewDecision::Rejected => {
            format!("Your application for {} was rejected", event.name)
        }
    };
    Notification::create(staff_id, relay_event.kind(), &message, Some(event_id), &pool).await?;
    relay.emit(staff_id, &relay_event).await;

    Ok(Json(json!({ "success": true, "application": application })))
}

async fn upload_attachments(
    Organiser(claims): Organiser,
    Path(event_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    ContentLengthLimit(mut multipart): ContentLengthLimit<Multipart, { MAX_UPLOAD_BYTES }>,
) -> ApiResult<Json<Value>> {
    let event = Event::with_id(event_id, &pool).await?;
    event.ensure_owned_by(&claims, "add attachments to")?;

    let mut attachments = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid multipart body: {}", err)))?
    {
        let file_name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadRequest("every part must be a file".to_owned()))?;
        let content = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(format!("failed to read upload: {}", err)))?
            .to_vec();

        let upload = UploadFile {
            file_name: file_name.clone(),
            content,
        };
        let url = upload.save()?;
        attachments.push(Attachment::create(event_id, &file_name, &url, &pool).await?);
    }

    if attachments.is_empty() {
        return Err(ApiError::BadRequest("no files were uploaded".to_owned()));
    }

    Ok(Json(json!({ "success": true, "attachments": attachments })))
}
