//! Outbound email.
//!
//! Delivery goes through Mailgun when a token is configured; without one the
//! send is skipped and logged, matching the rest of the codebase's degraded
//! startup posture for demo deployments.

use anyhow::Context;
use askama::Template;
use mailgun_v3::email::{self, Message, MessageBody};
use mailgun_v3::{Credentials, EmailAddress};

pub mod otp;

pub const MAILGUN_NAME: &str = "Crewcall";
pub const MAILGUN_EMAIL: &str = "mail@crewcall.app";
pub const MAILGUN_DOMAIN: &str = "mail.crewcall.app";

pub trait Email: Template {
    fn subject(&self) -> String;
    fn address(&self) -> EmailAddress;
}

pub async fn send_email(email: impl Email) -> anyhow::Result<()> {
    let token = match std::env::var("MAILGUN_TOKEN") {
        Ok(token) => token,
        Err(_) => {
            tracing::info!("`MAILGUN_TOKEN` not set, skipping email send");
            return Ok(());
        }
    };
    let creds = Credentials::new(token, MAILGUN_DOMAIN);

    let sender =
        EmailAddress::name_address(MAILGUN_NAME.to_owned(), MAILGUN_EMAIL.parse().unwrap());
    let message = Message {
        to: vec![email.address()],
        subject: email.subject(),
        body: MessageBody::Html(email.render().context("Failed to render email")?),
        ..Default::default()
    };

    email::async_impl::send_email(&creds, &sender, message)
        .await
        .map(|_| ())
        .map_err(|err| anyhow::anyhow!("Failed to send email: {err}"))
}
