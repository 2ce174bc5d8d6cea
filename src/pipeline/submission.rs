use crate::error::AppError;
use crate::export::{self, RenderedPdf};
use crate::llm::LlmClient;
use crate::notify::{DeliveryOutcome, Notifier};
use crate::vision::{self, LabelSource};

use super::authority::resolve_authority;
use super::draft::{Location, draft_report};

#[derive(Debug, Clone, PartialEq)]
pub struct Drafted {
    pub labels: Vec<String>,
    pub report: String,
    pub refused: bool,
    /// `None` when no address could be resolved; the user fills it in.
    pub authority_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edited {
    pub report: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub report: String,
    pub recipient: String,
    pub outcome: DeliveryOutcome,
}

/// Where one submission stands. The server keeps none of this between
/// requests; each request rebuilds the state from what the browser resubmits
/// and applies a single transition.
#[derive(Debug, Clone)]
pub enum Submission {
    Start,
    Drafted(Drafted),
    Edited(Edited),
    Delivered(Delivered),
    Exported(RenderedPdf),
}

impl Submission {
    /// State held by the browser after a draft: the report text and the
    /// recipient it currently shows.
    pub fn resume(report: impl Into<String>, recipient: impl Into<String>) -> Self {
        let recipient = recipient.into().trim().to_string();
        Submission::Drafted(Drafted {
            labels: Vec::new(),
            report: report.into(),
            refused: false,
            authority_email: (!recipient.is_empty()).then_some(recipient),
        })
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Submission::Start => "start",
            Submission::Drafted(_) => "drafted",
            Submission::Edited(_) => "edited",
            Submission::Delivered(_) => "delivered",
            Submission::Exported(_) => "exported",
        }
    }

    fn reject(&self, action: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "cannot {action} a submission that is {}",
            self.stage()
        ))
    }

    /// Current report text and recipient, for the states that can still be
    /// edited or sent.
    fn working_copy(&self) -> Option<(&str, &str)> {
        match self {
            Submission::Drafted(d) => Some((
                d.report.as_str(),
                d.authority_email.as_deref().unwrap_or(""),
            )),
            Submission::Edited(e) => Some((e.report.as_str(), e.recipient.as_str())),
            _ => None,
        }
    }

    pub fn draft(self, drafted: Drafted) -> Result<Self, AppError> {
        match self {
            Submission::Start => Ok(Submission::Drafted(drafted)),
            other => Err(other.reject("draft")),
        }
    }

    /// Replaces the report and recipient with whatever the user typed.
    pub fn edit(self, report: impl Into<String>, recipient: impl Into<String>) -> Result<Self, AppError> {
        match self {
            Submission::Drafted(_) | Submission::Edited(_) => Ok(Submission::Edited(Edited {
                report: report.into(),
                recipient: recipient.into().trim().to_string(),
            })),
            other => Err(other.reject("edit")),
        }
    }

    /// Sends the current report. A failed send still moves to `Delivered`
    /// with a failed outcome; the browser keeps its copy and can send again.
    pub async fn deliver(self, notifier: &Notifier) -> Result<Self, AppError> {
        let Some((report, recipient)) = self.working_copy() else {
            return Err(self.reject("deliver"));
        };
        let outcome = notifier.send(recipient, report).await?;
        Ok(Submission::Delivered(Delivered {
            report: report.to_string(),
            recipient: recipient.to_string(),
            outcome,
        }))
    }

    pub fn export(self) -> Result<Self, AppError> {
        let Some((report, _)) = self.working_copy() else {
            return Err(self.reject("export"));
        };
        Ok(Submission::Exported(export::export_report(report)?))
    }
}

/// `Start → Drafted`: labels, then the draft, then the authority lookup. Any
/// upstream failure fails the whole step. A refusal skips the lookup.
#[tracing::instrument(
    name = "pipeline submission",
    skip(labels_source, llm_client, image, location),
    fields(submission.labels, submission.refused, submission.authority_resolved)
)]
pub async fn analyze_submission(
    labels_source: &dyn LabelSource,
    llm_client: &LlmClient,
    image: &[u8],
    location: &Location,
) -> Result<Submission, AppError> {
    let labels = vision::extract_labels(labels_source, image).await?;
    let draft = draft_report(llm_client, &labels, location).await?;

    let authority_email = if draft.refused {
        // A refusal names no authority, so there is nothing to look up.
        None
    } else {
        resolve_authority(llm_client, &draft.text).await?
    };

    let span = tracing::Span::current();
    span.record("submission.labels", labels.len());
    span.record("submission.refused", draft.refused);
    span.record("submission.authority_resolved", authority_email.is_some());

    Submission::Start.draft(Drafted {
        labels,
        report: draft.text,
        refused: draft.refused,
        authority_email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::tests::{ScriptedProvider, client_with};
    use crate::notify::tests::{StubTransport, sender};
    use crate::pipeline::draft::REFUSAL_MESSAGE;
    use crate::vision::tests::FixedLabels;
    use std::sync::Arc;

    const CIVIC_DRAFT: &str = "To,<br>The Commissioner, BBMP<br>Sincerely,<br>A Concerned Citizen";

    fn notifier(status: u16) -> Notifier {
        Notifier::new(Arc::new(StubTransport::answering(status)), sender())
    }

    #[tokio::test]
    async fn test_analyze_runs_all_three_stages() {
        let labels = FixedLabels::new(&["Pothole", "Road"]);
        let provider = Arc::new(ScriptedProvider::replying(&[
            CIVIC_DRAFT,
            "Authority Email: info@bbmp.gov.in",
        ]));
        let client = client_with(provider.clone());

        let submission = analyze_submission(&labels, &client, b"jpeg", &Location::default())
            .await
            .unwrap();

        let Submission::Drafted(drafted) = submission else {
            panic!("expected drafted state");
        };
        assert_eq!(drafted.labels, vec!["Pothole", "Road"]);
        assert!(drafted.report.ends_with("Sincerely,\nA Concerned Citizen"));
        assert_eq!(drafted.authority_email.as_deref(), Some("info@bbmp.gov.in"));
        assert_eq!(provider.calls(), 2);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[1].contains("The Commissioner, BBMP"));
    }

    #[tokio::test]
    async fn test_unresolved_authority_is_not_an_error() {
        let labels = FixedLabels::new(&["Garbage"]);
        let provider = Arc::new(ScriptedProvider::replying(&[CIVIC_DRAFT, "No idea."]));
        let client = client_with(provider);

        let submission = analyze_submission(&labels, &client, b"jpeg", &Location::default())
            .await
            .unwrap();
        let Submission::Drafted(drafted) = submission else {
            panic!("expected drafted state");
        };
        assert_eq!(drafted.authority_email, None);
    }

    #[tokio::test]
    async fn test_refusal_skips_authority_lookup() {
        let labels = FixedLabels::new(&["Cat"]);
        let provider = Arc::new(ScriptedProvider::replying(&[REFUSAL_MESSAGE]));
        let client = client_with(provider.clone());

        let submission = analyze_submission(&labels, &client, b"jpeg", &Location::default())
            .await
            .unwrap();
        let Submission::Drafted(drafted) = submission else {
            panic!("expected drafted state");
        };
        assert!(drafted.refused);
        assert_eq!(drafted.authority_email, None);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_no_partial_draft() {
        let labels = FixedLabels::new(&["Pothole"]);
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(CIVIC_DRAFT.to_string()),
            Err(anyhow::anyhow!("503 service unavailable")),
        ]));
        let client = client_with(provider);

        let err = analyze_submission(&labels, &client, b"jpeg", &Location::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_vision_failure_stops_before_generation() {
        let labels = FixedLabels::failing();
        let provider = Arc::new(ScriptedProvider::replying(&[CIVIC_DRAFT]));
        let client = client_with(provider.clone());

        let err = analyze_submission(&labels, &client, b"jpeg", &Location::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_edit_replaces_report_and_recipient() {
        let edited = Submission::resume("old text", "info@bbmp.gov.in")
            .edit("new text", " ward5@bbmp.gov.in ")
            .unwrap();
        let Submission::Edited(e) = edited else {
            panic!("expected edited state");
        };
        assert_eq!(e.report, "new text");
        assert_eq!(e.recipient, "ward5@bbmp.gov.in");
    }

    #[test]
    fn test_edit_can_repeat() {
        let twice = Submission::resume("a", "")
            .edit("b", "x@y.org")
            .and_then(|s| s.edit("c", "z@y.org"))
            .unwrap();
        assert!(matches!(twice, Submission::Edited(ref e) if e.report == "c"));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        assert!(matches!(
            Submission::Start.edit("r", "x@y.org"),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            Submission::Start.export(),
            Err(AppError::InvalidTransition(_))
        ));
        let drafted = Submission::resume("r", "");
        assert!(matches!(
            drafted.draft(Drafted {
                labels: vec![],
                report: String::new(),
                refused: false,
                authority_email: None,
            }),
            Err(AppError::InvalidTransition(_))
        ));
        let exported = Submission::resume("r", "").export().unwrap();
        assert!(matches!(
            exported.edit("r", "x@y.org"),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_deliver_from_drafted_uses_resolved_recipient() {
        let delivered = Submission::resume("Report body", "info@bbmp.gov.in")
            .deliver(&notifier(201))
            .await
            .unwrap();
        let Submission::Delivered(d) = delivered else {
            panic!("expected delivered state");
        };
        assert_eq!(d.recipient, "info@bbmp.gov.in");
        assert!(d.outcome.delivered);
    }

    #[tokio::test]
    async fn test_failed_delivery_can_be_retried() {
        let failed = Submission::resume("Report body", "info@bbmp.gov.in")
            .deliver(&notifier(500))
            .await
            .unwrap();
        let Submission::Delivered(d) = failed else {
            panic!("expected delivered state");
        };
        assert!(!d.outcome.delivered);

        let retried = Submission::resume(d.report, d.recipient)
            .deliver(&notifier(200))
            .await
            .unwrap();
        assert!(matches!(retried, Submission::Delivered(ref d) if d.outcome.delivered));
    }

    #[tokio::test]
    async fn test_deliver_without_recipient_is_input_missing() {
        let err = Submission::resume("Report body", "   ")
            .deliver(&notifier(200))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InputMissing(_)));
    }

    #[test]
    fn test_export_is_repeatable() {
        let first = Submission::resume("Line one\nLine two", "").export().unwrap();
        let second = Submission::resume("Line one\nLine two", "").export().unwrap();
        let (Submission::Exported(a), Submission::Exported(b)) = (first, second) else {
            panic!("expected exported state");
        };
        assert_eq!(a.pages, b.pages);
        assert!(a.bytes.starts_with(b"%PDF-"));
    }
}
