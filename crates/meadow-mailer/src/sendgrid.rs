use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::{ActivationVars, MAX_SEND_RETRIES, Mailer, MailerError, USER_WELCOME_TEMPLATE};

const SEND_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const FROM_NAME: &str = "Meadow";

pub struct SendGridMailer {
    from_email: String,
    api_key: String,
    client: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String) -> Self {
        Self {
            from_email,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(
        &self,
        template: &str,
        username: &str,
        email: &str,
        vars: &ActivationVars,
        sandbox: bool,
    ) -> Result<u16, MailerError> {
        let (subject, body) = render(template, vars)?;

        let message = json!({
            "personalizations": [{
                "to": [{ "email": email, "name": username }],
            }],
            "from": { "email": self.from_email, "name": FROM_NAME },
            "subject": subject,
            "content": [{ "type": "text/html", "value": body }],
            "mail_settings": {
                "sandbox_mode": { "enable": sandbox },
            },
        });

        for attempt in 1..=MAX_SEND_RETRIES {
            match self
                .client
                .post(SEND_ENDPOINT)
                .bearer_auth(&self.api_key)
                .json(&message)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    let status = resp.status().as_u16();
                    info!(status, email, "Email accepted by gateway");
                    return Ok(status);
                }
                Ok(resp) => {
                    warn!(
                        status = resp.status().as_u16(),
                        attempt,
                        max = MAX_SEND_RETRIES,
                        email,
                        "Mail gateway rejected message"
                    );
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        attempt,
                        max = MAX_SEND_RETRIES,
                        email,
                        "Failed to reach mail gateway"
                    );
                }
            }

            tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
        }

        Err(MailerError::RetriesExhausted {
            attempts: MAX_SEND_RETRIES,
        })
    }
}

fn render(template: &str, vars: &ActivationVars) -> Result<(String, String), MailerError> {
    match template {
        USER_WELCOME_TEMPLATE => Ok((
            "Finish setting up your Meadow account".to_string(),
            format!(
                "<p>Hi {username},</p>\
                 <p>Thanks for signing up. Confirm your email to activate your \
                 account:</p>\
                 <p><a href=\"{url}\">{url}</a></p>\
                 <p>The link expires in 72 hours. If you didn't sign up, you can \
                 ignore this message.</p>",
                username = vars.username,
                url = vars.activation_url,
            ),
        )),
        other => Err(MailerError::UnknownTemplate(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_template_embeds_activation_url() {
        let vars = ActivationVars {
            username: "ann".to_string(),
            activation_url: "http://localhost:3000/confirm/abc123".to_string(),
        };
        let (subject, body) = render(USER_WELCOME_TEMPLATE, &vars).unwrap();
        assert!(!subject.is_empty());
        assert!(body.contains("ann"));
        assert!(body.contains("http://localhost:3000/confirm/abc123"));
    }

    #[test]
    fn unknown_template_is_rejected() {
        let vars = ActivationVars {
            username: "ann".to_string(),
            activation_url: "x".to_string(),
        };
        let res = render("password-reset", &vars);
        assert!(matches!(res, Err(MailerError::UnknownTemplate(_))));
    }
}
