use std::sync::LazyLock;

use opentelemetry::KeyValue;
use regex::Regex;

use crate::error::AppError;
use crate::llm::LlmClient;
use crate::telemetry::metrics::AUTHORITY_RESOLUTIONS;

static AUTHORITY_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Authority Email:\s*([\w.-]+@[\w.-]+\.\w+)").expect("valid authority regex")
});

/// Pulls the address out of an `Authority Email: <address>` line. `None` means
/// the user has to supply the recipient by hand.
pub fn extract_authority_email(text: &str) -> Option<String> {
    AUTHORITY_EMAIL
        .captures(text)
        .map(|caps| caps[1].to_string())
}

pub fn build_prompt(report: &str) -> String {
    format!(
        "You are an AI assistant that helps identify the most appropriate civic authority and \
their email address to send a formal complaint to.\n\n\
Please do the following:\n\
- Based on the report below, determine which civic body or department should handle the issue \
(like municipal corporation, public works department, etc.).\n\
- Predict the official email address of that authority, based on the location mentioned in the report.\n\
- If unsure, provide the most likely official-sounding email \
(like commissioner.palakkad@kerala.gov.in or info@bbmp.gov.in).\n\n\
Return exactly one line in the format:\n\
Authority Email: <email_here>\n\n\
---\n\n\
Civic Complaint Report:\n\
{report}\n"
    )
}

#[tracing::instrument(
    name = "pipeline_stage authority",
    skip(llm_client, report),
    fields(pipeline.stage = "authority", authority.resolved)
)]
pub async fn resolve_authority(
    llm_client: &LlmClient,
    report: &str,
) -> Result<Option<String>, AppError> {
    let req = llm_client.request("authority", "", build_prompt(report));

    let resp = llm_client
        .generate(&req)
        .await
        .map_err(|e| AppError::upstream("text generation", e))?;

    let email = extract_authority_email(&resp.content);

    tracing::Span::current().record("authority.resolved", email.is_some());
    AUTHORITY_RESOLUTIONS.add(
        1,
        &[KeyValue::new(
            "authority.outcome",
            if email.is_some() { "hit" } else { "miss" },
        )],
    );
    if email.is_none() {
        tracing::info!("No authority email in model output, recipient left for the user");
    }

    Ok(email)
}
