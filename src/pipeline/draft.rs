use opentelemetry::KeyValue;
use serde::Deserialize;

use crate::error::AppError;
use crate::llm::LlmClient;
use crate::telemetry::metrics::REPORT_DRAFTS;

use super::text::normalize_generated_text;

pub const SIGNATURE: &str = "Sincerely,\nA Concerned Citizen";

/// Fixed reply the model is told to give when the labels show no civic issue.
pub const REFUSAL_MESSAGE: &str = "The Uploaded Image is not clearly understandable.\n\
If you are trying to upload any image relevant to any civic issue, try again with any different image from different angle!\n\
Dont try to Upload any image irrelevant to the scope of this webApp";

const REFUSAL_PHRASES: [&str; 3] = [
    "not clearly understandable",
    "relevant to any civic issue",
    "irrelevant to the scope of this webapp",
];

const SYSTEM_PROMPT: &str = "You are a civic issue reporting assistant tasked with drafting formal \
complaint reports addressed to the appropriate Indian civic authority based on visual evidence.";

/// Caller-supplied location, passed through to the prompt unvalidated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    pub address: Option<String>,
    pub latlng: Option<String>,
}

impl Location {
    pub fn new(address: Option<String>, latlng: Option<String>) -> Self {
        let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            address: keep(address),
            latlng: keep(latlng),
        }
    }

    fn prompt_line(&self) -> String {
        match &self.address {
            Some(address) => format!(
                "The reported issue is located at: {} (Coordinates: {}).\n",
                address,
                self.latlng.as_deref().unwrap_or("")
            ),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub text: String,
    pub refused: bool,
}

/// True when `text` carries every required phrase of [`REFUSAL_MESSAGE`],
/// ignoring case, spacing and anything around them.
pub fn is_refusal(text: &str) -> bool {
    let folded = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    REFUSAL_PHRASES.iter().all(|p| folded.contains(p))
}

pub fn build_prompt(labels: &[String], location: &Location) -> String {
    let label_list = labels.join(", ");
    format!(
        "Use the information below to write a concise, professional, and respectful civic complaint. \
If the labels [{label_list}] do not show any relevance to any civic issue then simply respond with exactly:\n\
\"{REFUSAL_MESSAGE}\"\n\n\
- Use a formal tone and structure suitable for government correspondence in India.\n\
- Clearly identify and name the appropriate civic authority responsible for the issue, based on the location provided. \
Do not generically refer to \"the concerned authority.\"\n\
- Do not speculate about causes of the issue (e.g., construction, natural disasters) unless such causes are explicitly suggested by the labels.\n\
- Do not use overly emotional or exaggerated language.\n\
- End the report with the signature: \"{SIGNATURE}\"\n\n\
---\n\n\
Location Details:\n\
{location}\n\
Visual Evidence (Detected Labels):\n\
{label_list}\n\n\
---\n\n\
Based on the above, draft a formal civic complaint email/report.\n",
        location = location.prompt_line(),
    )
}

#[tracing::instrument(
    name = "pipeline_stage draft",
    skip(llm_client, labels, location),
    fields(
        pipeline.stage = "draft",
        labels.count = labels.len(),
        location.present = location.address.is_some(),
        draft.refused,
        draft.chars,
    )
)]
pub async fn draft_report(
    llm_client: &LlmClient,
    labels: &[String],
    location: &Location,
) -> Result<Draft, AppError> {
    let prompt = build_prompt(labels, location);
    let req = llm_client.request("draft", SYSTEM_PROMPT, prompt);

    let resp = llm_client
        .generate(&req)
        .await
        .map_err(|e| AppError::upstream("text generation", e))?;

    let text = normalize_generated_text(resp.content.trim());
    let refused = is_refusal(&text);

    let span = tracing::Span::current();
    span.record("draft.refused", refused);
    span.record("draft.chars", text.chars().count());
    REPORT_DRAFTS.add(1, &[KeyValue::new("draft.refused", refused)]);

    Ok(Draft { text, refused })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::tests::{ScriptedProvider, client_with};
    use std::sync::Arc;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prompt_carries_labels_location_and_rules() {
        let location = Location::new(
            Some("MG Road, Bengaluru".into()),
            Some("12.9756,77.6050".into()),
        );
        let prompt = build_prompt(&labels(&["Pothole", "Road"]), &location);

        assert!(prompt.contains("Pothole, Road"));
        assert!(prompt.contains(
            "The reported issue is located at: MG Road, Bengaluru (Coordinates: 12.9756,77.6050)."
        ));
        assert!(prompt.contains(SIGNATURE));
        assert!(prompt.contains(REFUSAL_MESSAGE));
        assert!(prompt.contains("Do not speculate about causes"));
        assert!(prompt.contains("Do not generically refer to"));
    }

    #[test]
    fn test_prompt_without_address_has_no_location_line() {
        let location = Location::new(Some("  ".into()), Some("12.9,77.6".into()));
        let prompt = build_prompt(&labels(&["Garbage"]), &location);
        assert!(!prompt.contains("The reported issue is located at"));
    }

    #[test]
    fn test_refusal_detection_is_wildcard_on_phrases() {
        assert!(is_refusal(REFUSAL_MESSAGE));
        assert!(is_refusal(&format!("  {}\n", REFUSAL_MESSAGE.to_uppercase())));
        assert!(is_refusal(
            "Sorry. The uploaded image is NOT clearly   understandable. \
             Please upload something relevant to any civic issue; \
             nothing irrelevant to the scope of this webApp."
        ));
        assert!(!is_refusal("The image is not clearly understandable."));
        assert!(!is_refusal("To the Commissioner, BBMP ..."));
    }

    #[tokio::test]
    async fn test_civic_draft_is_normalized_and_signed() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            "To,<br>The Commissioner,<br/>Bruhat Bengaluru Mahanagara Palike<br />\
             Subject: Pothole on MG Road &amp; water logging<br><br>\
             Sincerely,<br>A Concerned Citizen",
        ]));
        let client = client_with(provider.clone());

        let draft = draft_report(
            &client,
            &labels(&["Pothole", "Road", "Asphalt"]),
            &Location::default(),
        )
        .await
        .unwrap();

        assert!(!draft.refused);
        assert!(draft.text.contains(SIGNATURE));
        assert!(draft.text.contains("Pothole on MG Road & water logging"));
        for marker in ["<br>", "<br/>", "<br />"] {
            assert!(!draft.text.contains(marker), "{marker} left in draft");
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_civic_labels_yield_refusal() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            "The Uploaded Image is not clearly understandable.<br>If you are trying to upload any \
             image relevant to any civic issue, try again with any different image from different \
             angle!<br>Dont try to Upload any image irrelevant to the scope of this webApp",
        ]));
        let client = client_with(provider);

        let draft = draft_report(&client, &labels(&["Cat", "Whiskers"]), &Location::default())
            .await
            .unwrap();

        assert!(draft.refused);
        assert_eq!(draft.text, REFUSAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_generation_failure_is_upstream() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(anyhow::anyhow!(
            "401 invalid api key"
        ))]));
        let client = client_with(provider);

        let err = draft_report(&client, &labels(&["Pothole"]), &Location::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }
}
