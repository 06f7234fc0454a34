use std::time::Duration;

use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::EmailAddress;

/// The "from" line on outgoing campaign mail.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    pub email: EmailAddress,
    pub name: String,
}

#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: Url,
    sender: SenderIdentity,
    auth_token: SecretString,
}

#[derive(Serialize)]
struct EmailParty<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: EmailParty<'a>,
    to: Vec<EmailParty<'a>>,
    subject: &'a str,
    html: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SenderIdentity,
        auth_token: SecretString,
        timeout: Duration,
    ) -> Self {
        Self {
            // The client timeout doubles as the per-send timeout: one hung
            // provider call cannot stall a whole batch.
            http_client: Client::builder().timeout(timeout).build().unwrap(),
            base_url: Url::parse(&base_url).expect("Failed parsing base email api url."),
            sender,
            auth_token,
        }
    }

    pub fn sender(&self) -> &SenderIdentity {
        &self.sender
    }

    /// Fails fast when provider credentials are missing, before any send is
    /// attempted.
    pub fn ensure_configured(&self) -> Result<(), String> {
        if self.auth_token.expose_secret().trim().is_empty() {
            return Err("Email provider auth token is not configured.".into());
        }
        Ok(())
    }

    pub async fn send_email(
        &self,
        recipient: &EmailAddress,
        subject: &str,
        html_content: &str,
    ) -> Result<(), reqwest::Error> {
        let url = self
            .base_url
            .join("v1/email")
            .expect("Failed joining route to email api url.");

        let body = SendEmailRequest {
            from: EmailParty {
                email: self.sender.email.as_ref(),
                name: Some(&self.sender.name),
            },
            to: vec![EmailParty {
                email: recipient.as_ref(),
                name: None,
            }],
            subject,
            html: html_content,
        };

        self.http_client
            .post(url)
            .header(
                "Authorization",
                "Bearer ".to_owned() + self.auth_token.expose_secret(),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
