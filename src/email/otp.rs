use askama::Template;
use mailgun_v3::email::EmailAddress;

use crate::email::Email;

#[derive(Template)]
#[template(path = "otp.html")]
pub struct OtpEmail<'a> {
    pub recipient: &'a str,
    pub code: &'a str,
}

impl<'a> Email for OtpEmail<'a> {
    fn subject(&self) -> String {
        "Your Crewcall Verification Code".to_owned()
    }

    fn address(&self) -> EmailAddress {
        EmailAddress::address(self.recipient.to_owned().parse::<String>().unwrap())
    }
}
