//! Report export as a paginated PDF: a title block followed by one paragraph
//! block per line of the report.

pub mod pdf;
mod winansi;

use opentelemetry::KeyValue;

use crate::error::AppError;
use crate::telemetry::metrics::{PDF_EXPORTS, PDF_PAGES};

pub use pdf::RenderedPdf;

pub const TITLE: &str = "Civic Report";
pub const FILENAME: &str = "civic_report.pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    Paragraph(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    pub blocks: Vec<Block>,
}

impl DocumentLayout {
    /// `\n` and `\r\n` both end a line; blank lines stay as empty paragraphs.
    pub fn from_text(text: &str) -> Self {
        let mut blocks = vec![Block::Title(TITLE.to_string())];
        blocks.extend(text.lines().map(|line| Block::Paragraph(line.to_string())));
        Self { blocks }
    }

    pub fn title_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Title(_)))
            .count()
    }

    pub fn paragraph_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Paragraph(_)))
            .count()
    }
}

#[tracing::instrument(
    name = "pipeline_stage export",
    skip(text),
    fields(pipeline.stage = "export", export.paragraphs, export.pages, export.bytes)
)]
pub fn export_report(text: &str) -> Result<RenderedPdf, AppError> {
    let layout = DocumentLayout::from_text(text);
    let span = tracing::Span::current();
    span.record("export.paragraphs", layout.paragraph_count());

    let rendered = pdf::render_pdf(&layout).inspect_err(|_| {
        PDF_EXPORTS.add(1, &[KeyValue::new("export.outcome", "error")]);
    })?;

    span.record("export.pages", rendered.pages);
    span.record("export.bytes", rendered.bytes.len());
    PDF_EXPORTS.add(1, &[KeyValue::new("export.outcome", "ok")]);
    PDF_PAGES.record(rendered.pages as f64, &[]);

    Ok(rendered)
}
