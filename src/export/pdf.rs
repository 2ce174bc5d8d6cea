use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::winansi::{encode, glyph_units, text_width, units_to_points};
use super::{Block, DocumentLayout, TITLE};
use crate::error::AppError;

// US Letter, in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN_LEFT: f32 = 72.0;
const MARGIN_RIGHT: f32 = 72.0;
const MARGIN_TOP: f32 = 72.0;
const MARGIN_BOTTOM: f32 = 18.0;

const TITLE_SIZE: f32 = 18.0;
const TITLE_LEADING: f32 = 22.0;
const TITLE_SPACER: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING: f32 = 12.0;
const PARAGRAPH_SPACER: f32 = 6.0;

const BODY_FONT: &[u8] = b"F1";
const TITLE_FONT: &[u8] = b"F2";

#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

struct Line {
    text: Vec<u8>,
    bold: bool,
    x: f32,
    y: f32,
}

/// Places lines top to bottom, starting a new page whenever the next line
/// would cross the bottom margin.
struct Typesetter {
    pages: Vec<Vec<Line>>,
    y: f32,
}

impl Typesetter {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN_TOP,
        }
    }

    fn place(&mut self, text: Vec<u8>, leading: f32, bold: bool, centered: bool) {
        if self.y - leading < MARGIN_BOTTOM {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN_TOP;
        }
        self.y -= leading;

        let size = if bold { TITLE_SIZE } else { BODY_SIZE };
        let x = if centered {
            let width = text_width(&text, size, bold);
            MARGIN_LEFT + ((content_width() - width) / 2.0).max(0.0)
        } else {
            MARGIN_LEFT
        };

        let y = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.push(Line { text, bold, x, y });
        }
    }

    fn space(&mut self, amount: f32) {
        self.y -= amount;
    }
}

fn content_width() -> f32 {
    PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

/// Greedy word wrap on encoded bytes, linear in the input. Words are split
/// on single spaces, so runs of spaces and leading indentation collapse to
/// one space, the same way a flowed paragraph treats whitespace. A word wider
/// than the line is split at the last byte that still fits.
fn wrap(text: &[u8], size: f32, max_width: f32) -> Vec<Vec<u8>> {
    let fits = |units: u64| units_to_points(units, size) <= max_width;
    let space = u64::from(glyph_units(b' '));

    let mut lines = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut current_units = 0u64;

    for word in text.split(|&b| b == b' ').filter(|w| !w.is_empty()) {
        let word_units: u64 = word.iter().map(|&b| u64::from(glyph_units(b))).sum();

        let joined = if current.is_empty() {
            word_units
        } else {
            current_units + space + word_units
        };
        if fits(joined) {
            if !current.is_empty() {
                current.push(b' ');
            }
            current.extend_from_slice(word);
            current_units = joined;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_units = 0;
        }

        if fits(word_units) {
            current.extend_from_slice(word);
            current_units = word_units;
            continue;
        }

        for &b in word {
            let units = u64::from(glyph_units(b));
            if !current.is_empty() && !fits(current_units + units) {
                lines.push(std::mem::take(&mut current));
                current_units = 0;
            }
            current.push(b);
            current_units += units;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn typeset(layout: &DocumentLayout) -> Result<Vec<Vec<Line>>, AppError> {
    let mut setter = Typesetter::new();

    for block in &layout.blocks {
        match block {
            Block::Title(title) => {
                setter.place(encode(title)?, TITLE_LEADING, true, true);
                setter.space(TITLE_SPACER);
            }
            Block::Paragraph(text) => {
                for line in wrap(&encode(text)?, BODY_SIZE, content_width()) {
                    setter.place(line, BODY_LEADING, false, false);
                }
                setter.space(PARAGRAPH_SPACER);
            }
        }
    }

    Ok(setter.pages)
}

fn page_content(lines: Vec<Line>) -> Result<Vec<u8>, AppError> {
    let mut operations = Vec::with_capacity(lines.len() * 5);
    for line in lines {
        let (font, size) = if line.bold {
            (TITLE_FONT, TITLE_SIZE)
        } else {
            (BODY_FONT, BODY_SIZE)
        };
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(font.to_vec()), Object::Real(size)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Real(line.x), Object::Real(line.y)],
        ));
        // Hex strings carry any byte without delimiter escaping.
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(line.text, StringFormat::Hexadecimal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    Content { operations }
        .encode()
        .map_err(|e| AppError::Render(format!("failed to encode page content: {e}")))
}

fn font(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Renders the layout as a PDF using the standard Helvetica fonts.
pub fn render_pdf(layout: &DocumentLayout) -> Result<RenderedPdf, AppError> {
    let pages = typeset(layout)?;
    let page_count = pages.len();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let body_font_id = doc.add_object(font("Helvetica"));
    let title_font_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => body_font_id,
            "F2" => title_font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for lines in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), page_content(lines)?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_count as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(PAGE_WIDTH),
            Object::Real(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let created = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(TITLE),
        "Producer" => Object::string_literal(concat!("civic-report-desk ", env!("CARGO_PKG_VERSION"))),
        "CreationDate" => Object::string_literal(created),
    });
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::Render(format!("failed to write document: {e}")))?;

    Ok(RenderedPdf {
        bytes,
        pages: page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every string shown with `Tj`, page by page, read back from the file.
    fn shown_text(bytes: &[u8]) -> Vec<Vec<Vec<u8>>> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
                content
                    .operations
                    .iter()
                    .filter(|op| op.operator == "Tj")
                    .map(|op| match &op.operands[0] {
                        Object::String(s, _) => s.clone(),
                        other => panic!("unexpected operand {other:?}"),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_title_only_document() {
        let rendered = render_pdf(&DocumentLayout::from_text("")).unwrap();
        assert_eq!(rendered.pages, 1);
        assert_eq!(shown_text(&rendered.bytes), vec![vec![b"Civic Report".to_vec()]]);
    }

    #[test]
    fn test_paragraph_lines_in_order() {
        let layout = DocumentLayout::from_text("To,\nThe Commissioner\n\nSincerely,\nA Concerned Citizen");
        let rendered = render_pdf(&layout).unwrap();
        let text = shown_text(&rendered.bytes);
        assert_eq!(
            text[0],
            vec![
                b"Civic Report".to_vec(),
                b"To,".to_vec(),
                b"The Commissioner".to_vec(),
                b"Sincerely,".to_vec(),
                b"A Concerned Citizen".to_vec(),
            ]
        );
    }

    #[test]
    fn test_pdf_delimiters_survive_round_trip() {
        let line = r"Ward (5) :) unbalanced ( and back\slash";
        let rendered = render_pdf(&DocumentLayout::from_text(line)).unwrap();
        let text = shown_text(&rendered.bytes);
        assert_eq!(text[0][1], line.as_bytes().to_vec());
    }

    #[test]
    fn test_markup_characters_are_kept_verbatim() {
        let line = "<b>Road & Drain</b> #5 100% done";
        let rendered = render_pdf(&DocumentLayout::from_text(line)).unwrap();
        assert_eq!(shown_text(&rendered.bytes)[0][1], line.as_bytes().to_vec());
    }

    #[test]
    fn test_long_text_paginates_without_loss() {
        let text = (0..150)
            .map(|i| format!("Paragraph number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let rendered = render_pdf(&DocumentLayout::from_text(&text)).unwrap();
        assert!(rendered.pages > 1);

        let all: Vec<Vec<u8>> = shown_text(&rendered.bytes).into_iter().flatten().collect();
        assert_eq!(all.len(), 151);
        assert_eq!(all.last().unwrap(), b"Paragraph number 149");
    }

    #[test]
    fn test_wrap_keeps_every_word() {
        let text = "The drainage near the bus stop overflows after every rain and the water \
                    stays on the road for days, which makes walking to the market dangerous.";
        let lines = wrap(text.as_bytes(), BODY_SIZE, 120.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, BODY_SIZE, false) <= 120.0);
        }
        assert_eq!(lines.join(&b' '), text.as_bytes());
    }

    #[test]
    fn test_wrap_breaks_overlong_word() {
        let word = "x".repeat(200);
        let lines = wrap(word.as_bytes(), BODY_SIZE, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word.as_bytes());
    }

    #[test]
    fn test_wrap_huge_unbroken_word_is_fast() {
        let word = "x".repeat(100_000);
        let start = std::time::Instant::now();
        let lines = wrap(word.as_bytes(), BODY_SIZE, content_width());
        let elapsed = start.elapsed();

        assert!(elapsed < std::time::Duration::from_secs(2), "took {elapsed:?}");
        assert!(lines.len() > 100);
        for line in &lines {
            assert!(text_width(line, BODY_SIZE, false) <= content_width());
        }
        assert_eq!(lines.concat(), word.as_bytes());
    }

    #[test]
    fn test_wrap_collapses_space_runs() {
        let lines = wrap(b"    Ward   5  ", BODY_SIZE, content_width());
        assert_eq!(lines, vec![b"Ward 5".to_vec()]);
    }

    #[test]
    fn test_blank_paragraph_shows_nothing() {
        assert!(wrap(b"", BODY_SIZE, content_width()).is_empty());
        assert!(wrap(b"   ", BODY_SIZE, content_width()).is_empty());
    }
}
