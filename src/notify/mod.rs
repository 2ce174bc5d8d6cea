//! Report delivery through a transactional mail service.

pub mod mailjet;

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::Serialize;

use crate::error::AppError;
use crate::telemetry::metrics::MAIL_DELIVERIES;

pub use mailjet::MailjetTransport;

pub const SUBJECT: &str = "Regarding to a civic issue";
pub const RECIPIENT_NAME: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub from: Sender,
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text: String,
}

/// Result of one delivery attempt, shown to the user and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub message: String,
}

impl DeliveryOutcome {
    fn sent(recipient: &str) -> Self {
        Self {
            delivered: true,
            message: format!("✅ Email sent successfully to {recipient}"),
        }
    }

    fn failed() -> Self {
        Self {
            delivered: false,
            message: "❌ Failed to send email. Please try again.".to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    /// Hands the message to the mail service and returns the HTTP status it
    /// answered with.
    async fn submit(&self, mail: &OutboundMail) -> anyhow::Result<u16>;
    fn name(&self) -> &str;
}

/// Status codes the mail API uses for "accepted".
fn is_accepted(status: u16) -> bool {
    matches!(status, 200 | 201)
}

#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    sender: Sender,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, sender: Sender) -> Self {
        Self { transport, sender }
    }

    #[tracing::instrument(
        name = "pipeline_stage deliver",
        skip(self, report),
        fields(pipeline.stage = "deliver", mail.status, mail.delivered)
    )]
    pub async fn send(&self, recipient: &str, report: &str) -> Result<DeliveryOutcome, AppError> {
        let recipient = recipient.trim();
        if recipient.is_empty() || report.trim().is_empty() {
            return Err(AppError::InputMissing(
                "Email address or report content missing".into(),
            ));
        }

        let mail = OutboundMail {
            from: self.sender.clone(),
            to: recipient.to_string(),
            to_name: RECIPIENT_NAME.to_string(),
            subject: SUBJECT.to_string(),
            text: report.to_string(),
        };

        let span = tracing::Span::current();
        let outcome = match self.transport.submit(&mail).await {
            Ok(status) => {
                span.record("mail.status", status);
                if is_accepted(status) {
                    tracing::info!(status, "Mail accepted");
                    DeliveryOutcome::sent(recipient)
                } else {
                    tracing::warn!(status, "Mail service rejected message");
                    DeliveryOutcome::failed()
                }
            }
            Err(err) => {
                tracing::error!(error = %err, transport = self.transport.name(), "Mail submission failed");
                DeliveryOutcome::failed()
            }
        };

        span.record("mail.delivered", outcome.delivered);
        MAIL_DELIVERIES.add(
            1,
            &[KeyValue::new(
                "mail.outcome",
                if outcome.delivered { "sent" } else { "failed" },
            )],
        );

        Ok(outcome)
    }
}
