use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} must be a number, got {value:?}")]
    NotANumber { var: &'static str, value: String },

    #[error("LLM_PROVIDER must be one of google, openai, ollama, got {0:?}")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Google,
    OpenAI,
    Ollama,
}

impl LlmProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProviderKind::Google => "google",
            LlmProviderKind::OpenAI => "openai",
            LlmProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub llm_provider: LlmProviderKind,
    pub llm_model: String,
    pub llm_api_key: String,
    pub ollama_base_url: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub vision_api_key: String,
    pub vision_api_base: String,
    pub vision_max_labels: u32,
    pub maps_api_key: String,
    pub mailjet_api_key: String,
    pub mailjet_api_secret: String,
    pub mailjet_api_base: String,
    pub mail_sender_email: String,
    pub mail_sender_name: String,
    pub max_upload_bytes: usize,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let llm_provider = match get("LLM_PROVIDER", "google").as_str() {
            "google" => LlmProviderKind::Google,
            "openai" => LlmProviderKind::OpenAI,
            "ollama" => LlmProviderKind::Ollama,
            other => return Err(ConfigError::UnknownProvider(other.to_string())),
        };

        let llm_api_key = match llm_provider {
            LlmProviderKind::Google => required("GEMINI_API_KEY")?,
            LlmProviderKind::OpenAI => required("OPENAI_API_KEY")?,
            LlmProviderKind::Ollama => String::new(),
        };

        Ok(Self {
            port: number(&lookup, "APP_PORT", "8080")?,
            environment: get("APP_ENVIRONMENT", "development"),
            llm_provider,
            llm_model: get("LLM_MODEL", "gemini-1.5-pro-latest"),
            llm_api_key,
            ollama_base_url: get("OLLAMA_BASE_URL", "http://localhost:11434"),
            default_temperature: number(&lookup, "DEFAULT_TEMPERATURE", "0.3")?,
            default_max_tokens: number(&lookup, "DEFAULT_MAX_TOKENS", "2048")?,
            vision_api_key: required("GOOGLE_VISION_API_KEY")?,
            vision_api_base: get("VISION_API_BASE", "https://vision.googleapis.com"),
            vision_max_labels: number(&lookup, "VISION_MAX_LABELS", "10")?,
            maps_api_key: required("GOOGLE_MAPS_API_KEY")?,
            mailjet_api_key: required("MAILJET_API_KEY")?,
            mailjet_api_secret: required("MAILJET_API_SECRET")?,
            mailjet_api_base: get("MAILJET_API_BASE", "https://api.mailjet.com"),
            mail_sender_email: get("MAIL_SENDER_EMAIL", "info@el-faro.tech"),
            mail_sender_name: get("MAIL_SENDER_NAME", "El faro Admin"),
            max_upload_bytes: number(&lookup, "MAX_UPLOAD_BYTES", "10485760")?,
            otel_service_name: get("OTEL_SERVICE_NAME", "civic-report-desk"),
            otel_exporter_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn number<T, F>(lookup: &F, var: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(var).unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::NotANumber { var, value })
}
