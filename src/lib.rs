pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod middleware;
pub mod notify;
pub mod pipeline;
pub mod routes;
pub mod telemetry;
pub mod views;
pub mod vision;

use std::sync::Arc;

pub use config::Config;

use llm::LlmClient;
use notify::{MailjetTransport, Notifier, Sender};
use vision::{GoogleVision, LabelSource};

/// Immutable, built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub labels: Arc<dyn LabelSource>,
    pub llm_client: Arc<LlmClient>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        let provider = Arc::new(llm::openai::OpenAIProvider::from_config(&config));
        let llm_client = Arc::new(LlmClient::new(provider, &config));
        let labels = Arc::new(GoogleVision::from_config(&config));
        let notifier = Notifier::new(
            Arc::new(MailjetTransport::from_config(&config)),
            Sender {
                email: config.mail_sender_email.clone(),
                name: config.mail_sender_name.clone(),
            },
        );

        Self {
            config: Arc::new(config),
            labels,
            llm_client,
            notifier,
        }
    }
}
