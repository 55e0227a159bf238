//! One-time code issuance and verification.
//!
//! Codes live in the process-local store and are not bound to any account
//! record; the endpoints only need an email to deliver to.

use std::sync::Arc;

use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::email::otp::OtpEmail;
use crate::email::send_email;
use crate::error::{ApiError, ApiResult};
use crate::models::account::validate_email;
use crate::otp::OtpStore;
use crate::routes::basic_success;
use crate::util;

pub fn router() -> Router {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/verify-otp", post(verify_otp))
}

#[derive(Debug, Deserialize)]
struct OtpRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct OtpVerifyRequest {
    email: String,
    code: String,
}

async fn send_otp(
    Extension(store): Extension<Arc<OtpStore>>,
    Json(form): Json<OtpRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    validate_email(&form.email)?;

    let code = store.issue(&form.email, util::current_time()).await;
    deliver(&form.email, &code).await?;

    Ok(basic_success())
}

async fn resend_otp(
    Extension(store): Extension<Arc<OtpStore>>,
    Json(form): Json<OtpRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    validate_email(&form.email)?;

    let code = store.reissue(&form.email, util::current_time()).await?;
    deliver(&form.email, &code).await?;

    Ok(basic_success())
}

async fn verify_otp(
    Extension(store): Extension<Arc<OtpStore>>,
    Json(form): Json<OtpVerifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    store
        .verify(&form.email, &form.code, util::current_time())
        .await?;

    Ok(basic_success())
}

async fn deliver(recipient: &str, code: &str) -> ApiResult<()> {
    send_email(OtpEmail { recipient, code })
        .await
        .map_err(ApiError::Internal)
}
