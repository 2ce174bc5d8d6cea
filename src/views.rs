//! Server-rendered HTML for every step of a submission. All user and model
//! text is escaped; the browser carries the report between steps in form
//! fields.

use axum::response::Html;

use crate::pipeline::Submission;
use crate::pipeline::submission::{Delivered, Drafted, Edited};
use crate::pipeline::text::html_escape;

pub fn render_page(maps_api_key: &str, submission: &Submission) -> Html<String> {
    let body = match submission {
        Submission::Drafted(drafted) => drafted_section(drafted),
        Submission::Edited(edited) => edited_section(edited),
        Submission::Delivered(delivered) => delivered_section(delivered),
        Submission::Start | Submission::Exported(_) => String::new(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Civic Issue Reporter</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 820px; margin: 2rem auto; padding: 0 1rem; color: #1f2937; }}
section {{ margin-bottom: 2rem; padding: 1rem 1.25rem; border: 1px solid #e5e7eb; border-radius: 8px; }}
label {{ display: block; font-weight: 600; margin: 0.75rem 0 0.25rem; }}
input[type=text], input[type=email], textarea {{ width: 100%; box-sizing: border-box; padding: 0.5rem; }}
textarea {{ min-height: 18rem; font-family: inherit; line-height: 1.5; }}
.report {{ white-space: pre-wrap; line-height: 1.6; background: #f9fafb; padding: 1rem; border-radius: 6px; }}
.labels li {{ display: inline-block; margin: 0 0.4rem 0.4rem 0; padding: 0.15rem 0.6rem; background: #e0f2fe; border-radius: 999px; }}
.banner {{ padding: 0.75rem 1rem; border-radius: 6px; font-weight: 600; }}
.banner.ok {{ background: #dcfce7; }}
.banner.fail {{ background: #fee2e2; }}
.notice {{ color: #92400e; }}
.actions form {{ display: inline-block; margin-right: 0.5rem; }}
</style>
</head>
<body>
<h1>Civic Issue Reporter</h1>
{upload}
{body}
<script>
function initPlaces() {{
  const input = document.getElementById('location_address');
  if (!input || !window.google) return;
  const autocomplete = new google.maps.places.Autocomplete(input);
  autocomplete.addListener('place_changed', () => {{
    const place = autocomplete.getPlace();
    if (place.geometry && place.geometry.location) {{
      const loc = place.geometry.location;
      document.getElementById('location_latlng').value = loc.lat() + ',' + loc.lng();
    }}
  }});
}}
</script>
<script src="https://maps.googleapis.com/maps/api/js?key={maps_key}&libraries=places&callback=initPlaces" async defer></script>
</body>
</html>"#,
        upload = upload_section(),
        body = body,
        maps_key = html_escape(maps_api_key),
    ))
}

fn upload_section() -> String {
    r#"<section>
<h2>Report an issue</h2>
<form action="/analyze_image" method="post" enctype="multipart/form-data">
<label for="image">Photo of the issue</label>
<input type="file" id="image" name="image" accept="image/*" required>
<label for="location_address">Location</label>
<input type="text" id="location_address" name="location_address" placeholder="Street, area, city">
<input type="hidden" id="location_latlng" name="location_latlng">
<p><button type="submit">Analyze photo</button></p>
</form>
</section>"#
        .to_string()
}

fn download_form(report: &str) -> String {
    format!(
        r#"<form action="/download_pdf" method="post">
<input type="hidden" name="report_to_download" value="{report}">
<button type="submit">Download PDF</button>
</form>"#,
        report = html_escape(report),
    )
}

fn send_form(report: &str, recipient: &str) -> String {
    format!(
        r#"<form action="/send_email" method="post">
<input type="hidden" name="report_to_send" value="{report}">
<label for="send_recipient">Send to</label>
<input type="email" id="send_recipient" name="recipient_email" value="{recipient}" required>
<p><button type="submit">Send email</button></p>
</form>"#,
        report = html_escape(report),
        recipient = html_escape(recipient),
    )
}

fn drafted_section(drafted: &Drafted) -> String {
    let labels = drafted
        .labels
        .iter()
        .map(|l| format!("<li>{}</li>", html_escape(l)))
        .collect::<String>();

    let notice = if drafted.refused {
        r#"<p class="notice">The photo does not look like a civic issue. Try another photo or angle.</p>"#
    } else {
        ""
    };

    let recipient_hint = match &drafted.authority_email {
        Some(_) => "Suggested authority email. Check it before sending.",
        None => "We could not find the authority's email address. Please enter it manually.",
    };

    format!(
        r#"<section>
<h2>Detected labels</h2>
<ul class="labels">{labels}</ul>
{notice}
<h2>Draft report</h2>
<form action="/submit_report" method="post">
<label for="edited_report">Report</label>
<textarea id="edited_report" name="edited_report">{report}</textarea>
<label for="recipient_email">Recipient email</label>
<input type="email" id="recipient_email" name="recipient_email" value="{recipient}">
<p class="hint">{recipient_hint}</p>
<p><button type="submit">Finalize report</button></p>
</form>
<div class="actions">{download}</div>
</section>"#,
        report = html_escape(&drafted.report),
        recipient = html_escape(drafted.authority_email.as_deref().unwrap_or("")),
        download = download_form(&drafted.report),
    )
}

fn final_report(report: &str, recipient: &str) -> String {
    format!(
        r#"<h2>Submitted report</h2>
<div class="report">{report_html}</div>
<div class="actions">{send}{download}</div>"#,
        report_html = html_escape(report),
        send = send_form(report, recipient),
        download = download_form(report),
    )
}

fn edited_section(edited: &Edited) -> String {
    format!(
        "<section>\n{}\n</section>",
        final_report(&edited.report, &edited.recipient)
    )
}

fn delivered_section(delivered: &Delivered) -> String {
    let class = if delivered.outcome.delivered { "ok" } else { "fail" };
    format!(
        r#"<section>
<p class="banner {class}">{message}</p>
{report}
</section>"#,
        message = html_escape(&delivered.outcome.message),
        report = final_report(&delivered.report, &delivered.recipient),
    )
}
