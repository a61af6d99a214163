mod sendgrid;

pub use sendgrid::SendGridMailer;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Template for the post-registration activation mail.
pub const USER_WELCOME_TEMPLATE: &str = "user-welcome";

/// How many delivery attempts before a send is a terminal failure.
pub const MAX_SEND_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ActivationVars {
    pub username: String,
    pub activation_url: String,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("unknown mail template {0:?}")]
    UnknownTemplate(String),
    #[error("mail transport fault: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("giving up after {attempts} send attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Outbound mail gateway. At-least-once-attempted, not
/// guaranteed-delivered: implementations retry internally with a bounded
/// attempt budget and report a definitive terminal failure once it is
/// spent, so the caller can decide to compensate.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Returns the upstream status code on success.
    async fn send(
        &self,
        template: &str,
        username: &str,
        email: &str,
        vars: &ActivationVars,
        sandbox: bool,
    ) -> Result<u16, MailerError>;
}
