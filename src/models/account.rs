use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::geo::Coordinates;
use crate::util;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid"));

const BCRYPT_COST: u32 = 10;
const MIN_PASSWORD_LENGTH: usize = 6;

/// The closed set of principal types. Every authorization decision consults
/// this tag through `auth::authorize` rather than comparing strings inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Organiser,
    Staff,
    Admin,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    /// The account's email, which must be unique
    pub email: String,
    /// The account's display name
    pub name: String,
    /// A contact phone number
    pub phone: String,
    pub role: Role,
    /// Where the account holder is based, if they shared it
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(skip_serializing)]
    pub pass_hash: String,
}

/// The subset of account data shared with the other side of the marketplace.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub password: Option<String>,
}

impl Account {
    pub async fn with_id(id: Uuid, pool: &PgPool) -> ApiResult<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or(ApiError::NotFound("account"))
    }

    pub async fn with_id_opt(id: Uuid, pool: &PgPool) -> ApiResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_email_opt(email: &str, pool: &PgPool) -> ApiResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn summaries_for_ids(ids: &[Uuid], pool: &PgPool) -> ApiResult<Vec<AccountSummary>> {
        sqlx::query_as::<_, AccountSummary>(
            "SELECT id, name, phone FROM accounts WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Creates an account with the given role.
    ///
    /// Email uniqueness is enforced by the database; a duplicate registration
    /// surfaces as a conflict rather than racing a pre-check.
    pub async fn register(new_account: NewAccount, role: Role, pool: &PgPool) -> ApiResult<Self> {
        validate_email(&new_account.email)?;
        if new_account.password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::BadRequest(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if new_account.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name is required".to_owned()));
        }

        let pass_hash = bcrypt::hash(&new_account.password, BCRYPT_COST)?;

        sqlx::query_as::<_, Self>(
            "INSERT INTO accounts (id, email, pass_hash, name, phone, role, address, lat, lng, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_account.email.to_lowercase())
        .bind(pass_hash)
        .bind(new_account.name.trim())
        .bind(new_account.phone.unwrap_or_default())
        .bind(role)
        .bind(new_account.address)
        .bind(new_account.lat)
        .bind(new_account.lng)
        .bind(util::current_time())
        .fetch_one(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::Conflict("an account with that email already exists".to_owned())
            } else {
                err.into()
            }
        })
    }

    /// Looks the account up by email and checks the password against the
    /// stored hash. Returns `None` when either is wrong so callers can't
    /// distinguish the two.
    pub async fn check_login(
        email: &str,
        password: &str,
        pool: &PgPool,
    ) -> ApiResult<Option<Self>> {
        let account = match Self::with_email_opt(&email.to_lowercase(), pool).await? {
            Some(account) => account,
            None => return Ok(None),
        };

        if bcrypt::verify(password, &account.pass_hash)? {
            Ok(Some(account))
        } else {
            Ok(None)
        }
    }

    pub async fn update_profile(
        id: Uuid,
        update: ProfileUpdate,
        pool: &PgPool,
    ) -> ApiResult<Self> {
        let pass_hash = match update.password {
            Some(new_password) => {
                if new_password.len() < MIN_PASSWORD_LENGTH {
                    return Err(ApiError::BadRequest(format!(
                        "password must be at least {} characters",
                        MIN_PASSWORD_LENGTH
                    )));
                }
                Some(bcrypt::hash(&new_password, BCRYPT_COST)?)
            }
            None => None,
        };

        sqlx::query_as::<_, Self>(
            "UPDATE accounts
             SET name = COALESCE($2, name),
                 phone = COALESCE($3, phone),
                 address = COALESCE($4, address),
                 lat = COALESCE($5, lat),
                 lng = COALESCE($6, lng),
                 pass_hash = COALESCE($7, pass_hash)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.phone)
        .bind(update.address)
        .bind(update.lat)
        .bind(update.lng)
        .bind(pass_hash)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("account"))
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }
}

pub fn validate_email(email: &str) -> ApiResult<()> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{} is not a valid email address",
            email
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mock::mock_staff;

    #[test]
    fn email_shapes_are_validated() {
        assert!(validate_email("staff@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.domain.org").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }

    #[test]
    fn coordinates_require_both_components() {
        let mut staff = mock_staff();
        assert!(staff.coordinates().is_some());

        staff.lng = None;
        assert!(staff.coordinates().is_none());

        staff.lat = None;
        assert!(staff.coordinates().is_none());
    }

    #[test]
    fn serialized_accounts_never_leak_the_hash() {
        let staff = mock_staff();
        let json = serde_json::to_value(&staff).unwrap();

        assert!(json.get("passHash").is_none());
        assert!(json.get("pass_hash").is_none());
        assert_eq!(json["email"], "staff@example.com");
        assert_eq!(json["role"], "staff");
    }
}
