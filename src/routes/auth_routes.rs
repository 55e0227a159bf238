//! Registration and login for all three principal types.
//!
//! The role is fixed by the portal the request came through; nothing here
//! lets a client pick its own role, and no registration path issues `admin`.

use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::auth::{issue_token, Claims};
use crate::error::{ApiError, ApiResult};
use crate::models::account::{Account, NewAccount, Role};
use crate::util;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn register(
    Extension(pool): Extension<PgPool>,
    Json(new_account): Json<NewAccount>,
) -> ApiResult<Json<Value>> {
    register_with_role(new_account, Role::User, &pool).await
}

async fn login(
    Extension(pool): Extension<PgPool>,
    Json(form): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    // the generic portal takes any account type
    login_as(form, &[Role::User, Role::Organiser, Role::Staff, Role::Admin], &pool).await
}

/// Creates the account and logs it straight in.
pub async fn register_with_role(
    new_account: NewAccount,
    role: Role,
    pool: &PgPool,
) -> ApiResult<Json<Value>> {
    let account = Account::register(new_account, role, pool).await?;

    login_response(account)
}

/// Checks credentials and requires the account to belong to the portal's
/// role set. A wrong-portal login reads the same as a bad password.
pub async fn login_as(
    form: LoginRequest,
    allowed: &[Role],
    pool: &PgPool,
) -> ApiResult<Json<Value>> {
    let account = Account::check_login(&form.email, &form.password, pool)
        .await?
        .filter(|account| allowed.contains(&account.role))
        .ok_or_else(|| ApiError::BadRequest("login info was incorrect".to_owned()))?;

    login_response(account)
}

fn login_response(account: Account) -> ApiResult<Json<Value>> {
    let claims = Claims::new(account.id, account.role);
    let token = issue_token(&claims, &util::jwt_secret()?)?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "account": account,
    })))
}
