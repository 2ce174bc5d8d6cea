use axum::{
    Form,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::FormRejection},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::export::FILENAME;
use crate::pipeline::{Location, Submission, analyze_submission};
use crate::views::render_page;

const NO_IMAGE: &str = "No image uploaded";
const MAIL_FIELDS_MISSING: &str = "Email address or report content missing";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitReportForm {
    pub edited_report: String,
    pub recipient_email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DownloadForm {
    pub report_to_download: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendEmailForm {
    pub recipient_email: String,
    pub report_to_send: String,
}

#[derive(Debug, Default)]
struct Upload {
    image: Option<Vec<u8>>,
    address: Option<String>,
    latlng: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    let mut upload = Upload::default();
    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        AppError::InputMissing(format!("Could not read upload: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => upload.image = Some(field.bytes().await.map_err(bad_upload)?.to_vec()),
            "location_address" => upload.address = Some(field.text().await.map_err(bad_upload)?),
            "location_latlng" => upload.latlng = Some(field.text().await.map_err(bad_upload)?),
            _ => {}
        }
    }

    Ok(upload)
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
    render_page(&state.config.maps_api_key, &Submission::Start)
}

pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Html<String>> {
    let multipart = multipart.map_err(|_| AppError::InputMissing(NO_IMAGE.into()))?;
    let upload = read_upload(multipart).await?;

    let image = upload
        .image
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::InputMissing(NO_IMAGE.into()))?;
    let location = Location::new(upload.address, upload.latlng);

    let submission =
        analyze_submission(state.labels.as_ref(), &state.llm_client, &image, &location).await?;

    Ok(render_page(&state.config.maps_api_key, &submission))
}

pub async fn submit_report(
    State(state): State<AppState>,
    Form(form): Form<SubmitReportForm>,
) -> AppResult<Html<String>> {
    // The browser only posts the overwrite; the earlier draft is not resent.
    let submission =
        Submission::resume("", "").edit(form.edited_report, form.recipient_email)?;

    Ok(render_page(&state.config.maps_api_key, &submission))
}

pub async fn download_pdf(Form(form): Form<DownloadForm>) -> AppResult<Response> {
    // Layout is CPU-bound; keep it off the async workers.
    let exported = tokio::task::spawn_blocking(move || {
        Submission::resume(form.report_to_download, "").export()
    })
    .await
    .map_err(|e| AppError::Internal(format!("export task failed: {e}")))??;

    let Submission::Exported(pdf) = exported else {
        return Err(AppError::Internal("export produced no document".into()));
    };

    let disposition = format!("attachment; filename=\"{FILENAME}\"");
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        pdf.bytes,
    )
        .into_response())
}

pub async fn send_email(
    State(state): State<AppState>,
    form: Result<Form<SendEmailForm>, FormRejection>,
) -> AppResult<Html<String>> {
    let Form(form) = form.map_err(|_| AppError::InputMissing(MAIL_FIELDS_MISSING.into()))?;

    let submission = Submission::resume(form.report_to_send, form.recipient_email)
        .deliver(&state.notifier)
        .await?;

    Ok(render_page(&state.config.maps_api_key, &submission))
}
