use serde::Serialize;

use super::{MailTransport, OutboundMail};
use crate::config::Config;

/// Mailjet Send API v3.1.
pub struct MailjetTransport {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    api_secret: String,
}

impl MailjetTransport {
    pub fn new(api_base: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.mailjet_api_base,
            &config.mailjet_api_key,
            &config.mailjet_api_secret,
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendRequest<'a> {
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Message<'a> {
    from: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    text_part: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Contact<'a> {
    email: &'a str,
    name: &'a str,
}

impl<'a> From<&'a OutboundMail> for SendRequest<'a> {
    fn from(mail: &'a OutboundMail) -> Self {
        SendRequest {
            messages: vec![Message {
                from: Contact {
                    email: &mail.from.email,
                    name: &mail.from.name,
                },
                to: vec![Contact {
                    email: &mail.to,
                    name: &mail.to_name,
                }],
                subject: &mail.subject,
                text_part: &mail.text,
            }],
        }
    }
}

#[async_trait::async_trait]
impl MailTransport for MailjetTransport {
    async fn submit(&self, mail: &OutboundMail) -> anyhow::Result<u16> {
        let response = self
            .client
            .post(format!("{}/v3.1/send", self.api_base))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&SendRequest::from(mail))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Mailjet rejected message");
        }

        Ok(status.as_u16())
    }

    fn name(&self) -> &str {
        "mailjet"
    }
}
