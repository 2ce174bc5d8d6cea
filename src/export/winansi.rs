//! WinAnsi (cp1252) encoding and Helvetica metrics for the standard PDF fonts.

use crate::error::AppError;

/// cp1252 code points 0x80..=0x9F that differ from Latin-1.
const CP1252_HIGH: [(char, u8); 27] = [
    ('€', 0x80),
    ('‚', 0x82),
    ('ƒ', 0x83),
    ('„', 0x84),
    ('…', 0x85),
    ('†', 0x86),
    ('‡', 0x87),
    ('ˆ', 0x88),
    ('‰', 0x89),
    ('Š', 0x8A),
    ('‹', 0x8B),
    ('Œ', 0x8C),
    ('Ž', 0x8E),
    ('‘', 0x91),
    ('’', 0x92),
    ('“', 0x93),
    ('”', 0x94),
    ('•', 0x95),
    ('–', 0x96),
    ('—', 0x97),
    ('˜', 0x98),
    ('™', 0x99),
    ('š', 0x9A),
    ('›', 0x9B),
    ('œ', 0x9C),
    ('ž', 0x9E),
    ('Ÿ', 0x9F),
];

fn encode_char(c: char) -> Option<u8> {
    match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => Some(c as u8),
        _ => CP1252_HIGH
            .iter()
            .find(|(ch, _)| *ch == c)
            .map(|(_, b)| *b),
    }
}

/// Encodes one line for a WinAnsi font. Tabs become a space, a few common
/// symbols outside the code page get a textual stand-in, and anything else
/// that cannot be represented is an error.
pub fn encode(line: &str) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '\t' => out.push(b' '),
            '\u{200b}' | '\u{feff}' => {}
            '₹' => out.extend_from_slice(b"Rs."),
            '\u{2010}' | '\u{2011}' | '\u{2212}' => out.push(b'-'),
            _ => match encode_char(c) {
                Some(b) => out.push(b),
                None => {
                    return Err(AppError::Render(format!(
                        "character {c:?} (U+{:04X}) cannot be encoded in the document font",
                        c as u32
                    )));
                }
            },
        }
    }
    Ok(out)
}

/// Helvetica advance widths (1/1000 em) for bytes 0x20..=0x7E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold is wider on average; close enough for centering a heading.
const BOLD_FACTOR: f32 = 1.06;

/// Advance width of one encoded byte in Helvetica, in 1/1000 em.
pub fn glyph_units(b: u8) -> u32 {
    match b {
        0x20..=0x7E => u32::from(HELVETICA_ASCII[usize::from(b - 0x20)]),
        0xA0 => 278,
        _ => 556,
    }
}

/// Converts a sum of [`glyph_units`] to points at `size`.
pub fn units_to_points(units: u64, size: f32) -> f32 {
    units as f32 * size / 1000.0
}

pub fn text_width(bytes: &[u8], size: f32, bold: bool) -> f32 {
    let units: u64 = bytes.iter().map(|&b| u64::from(glyph_units(b))).sum();
    let width = units_to_points(units, size);
    if bold { width * BOLD_FACTOR } else { width }
}
