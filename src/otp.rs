//! One-time codes for contact verification.
//!
//! The store is process-local and deliberately unpersisted: codes are short
//! lived, not bound to any account record, and acceptable to lose on restart.
//! A background sweeper evicts expired entries on an interval so the map
//! cannot grow without bound.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::error::{ApiError, ApiResult};
use crate::util;

pub const OTP_TTL: Duration = Duration::minutes(2);
pub const RESEND_COOLDOWN: Duration = Duration::seconds(30);

const SWEEP_INTERVAL_SECONDS: u64 = 60;

struct OtpEntry {
    code: String,
    issued_at: OffsetDateTime,
}

impl OtpEntry {
    fn expired_at(&self, now: OffsetDateTime) -> bool {
        now - self.issued_at > OTP_TTL
    }
}

#[derive(Default)]
pub struct OtpStore {
    codes: Mutex<HashMap<String, OtpEntry>>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh code for the email, replacing any outstanding one.
    pub async fn issue(&self, email: &str, now: OffsetDateTime) -> String {
        let code = generate_code();

        let mut codes = self.codes.lock().await;
        codes.insert(
            email.to_owned(),
            OtpEntry {
                code: code.clone(),
                issued_at: now,
            },
        );

        code
    }

    /// Issues a replacement code, subject to the resend cooldown.
    pub async fn reissue(&self, email: &str, now: OffsetDateTime) -> ApiResult<String> {
        let mut codes = self.codes.lock().await;

        match codes.get(email) {
            Some(entry) if now - entry.issued_at < RESEND_COOLDOWN => {
                return Err(ApiError::BadRequest(format!(
                    "please wait {} seconds before requesting another code",
                    RESEND_COOLDOWN.whole_seconds()
                )));
            }
            Some(_) => {}
            None => {
                return Err(ApiError::BadRequest(
                    "no code has been requested for this email".to_owned(),
                ));
            }
        }

        let code = generate_code();
        codes.insert(
            email.to_owned(),
            OtpEntry {
                code: code.clone(),
                issued_at: now,
            },
        );

        Ok(code)
    }

    /// Checks a submitted code. A successful verification consumes the code.
    pub async fn verify(&self, email: &str, code: &str, now: OffsetDateTime) -> ApiResult<()> {
        let mut codes = self.codes.lock().await;

        let entry = codes
            .get(email)
            .ok_or_else(|| ApiError::BadRequest("invalid code".to_owned()))?;

        if entry.expired_at(now) {
            codes.remove(email);
            return Err(ApiError::BadRequest(
                "the code has expired, please request a new one".to_owned(),
            ));
        }

        if entry.code != code {
            return Err(ApiError::BadRequest("invalid code".to_owned()));
        }

        codes.remove(email);
        Ok(())
    }

    pub async fn evict_expired(&self, now: OffsetDateTime) -> usize {
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|_, entry| !entry.expired_at(now));

        before - codes.len()
    }

    /// Runs the TTL sweep on an interval for the life of the process.
    pub fn spawn_sweeper(store: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECONDS));

            loop {
                interval.tick().await;
                let evicted = store.evict_expired(util::current_time()).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted expired one-time codes");
                }
            }
        });
    }
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "someone@example.com";

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[tokio::test]
    async fn issued_codes_verify_once() {
        let store = OtpStore::new();
        let code = store.issue(EMAIL, now()).await;

        assert_eq!(code.len(), 6);
        assert!(store.verify(EMAIL, &code, now()).await.is_ok());
        // consumed by the first verification
        assert!(store.verify(EMAIL, &code, now()).await.is_err());
    }

    #[tokio::test]
    async fn wrong_codes_are_rejected() {
        let store = OtpStore::new();
        let code = store.issue(EMAIL, now()).await;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert!(store.verify(EMAIL, wrong, now()).await.is_err());
        // the right code still works afterwards
        assert!(store.verify(EMAIL, &code, now()).await.is_ok());
    }

    #[tokio::test]
    async fn codes_expire_after_two_minutes() {
        let store = OtpStore::new();
        let code = store.issue(EMAIL, now()).await;

        let late = now() + OTP_TTL + Duration::seconds(1);
        match store.verify(EMAIL, &code, late).await {
            Err(ApiError::BadRequest(message)) => assert!(message.contains("expired")),
            other => panic!("expected expiry error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn resends_respect_the_cooldown() {
        let store = OtpStore::new();
        store.issue(EMAIL, now()).await;

        assert!(store.reissue(EMAIL, now()).await.is_err());
        assert!(store
            .reissue(EMAIL, now() + Duration::seconds(29))
            .await
            .is_err());

        let reissued = store.reissue(EMAIL, now() + RESEND_COOLDOWN).await;
        assert!(reissued.is_ok());
    }

    #[tokio::test]
    async fn resending_without_a_prior_code_fails() {
        let store = OtpStore::new();
        assert!(store.reissue(EMAIL, now()).await.is_err());
    }

    #[tokio::test]
    async fn the_sweep_only_evicts_expired_entries() {
        let store = OtpStore::new();
        store.issue("old@example.com", now()).await;
        store
            .issue("fresh@example.com", now() + OTP_TTL)
            .await;

        let evicted = store.evict_expired(now() + OTP_TTL + Duration::seconds(1)).await;
        assert_eq!(evicted, 1);

        // the fresh code survived the sweep
        let codes = store.codes.lock().await;
        assert!(codes.contains_key("fresh@example.com"));
        assert!(!codes.contains_key("old@example.com"));
    }
}
