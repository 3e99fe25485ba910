//! Shape text rendering.
//!
//! Turns the paragraphs of one text body into plain text: one paragraph per
//! line, blank paragraphs dropped, bullet paragraphs prefixed with `"• "`.

use crate::error::Result;
use crate::types::{Paragraph, TextBody};

/// Prefix added to bullet paragraphs.
pub const BULLET_PREFIX: &str = "• ";

/// Glyphs that already mark a line as a bullet item.
const BULLET_GLYPHS: &[char] = &[
    '•', '◦', '▪', '▫', '‣', '⁃', '●', '○', '■', '□', '◆', '◇', '►', '▶', '➢', '➤', '✓', '✔',
];

/// Whether `text` starts with a bullet glyph.
pub fn starts_with_bullet_glyph(text: &str) -> bool {
    text.chars().next().is_some_and(|c| BULLET_GLYPHS.contains(&c))
}

/// Append `segment` to `acc`, with a newline only between non-empty pieces.
pub fn push_segment(acc: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if !acc.is_empty() {
        acc.push('\n');
    }
    acc.push_str(segment);
}

impl Paragraph {
    /// The paragraph as a single display line, or `None` if it is blank.
    pub fn normalized(&self) -> Option<String> {
        let raw: String = self
            .runs
            .iter()
            .flat_map(|run| run.chars())
            .filter(|&c| c != '\r')
            .collect();

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if self.is_bullet() && !starts_with_bullet_glyph(trimmed) {
            Some(format!("{}{}", BULLET_PREFIX, trimmed))
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Render paragraphs, one non-blank paragraph per line.
pub fn render_paragraphs<'a, I>(paragraphs: I) -> String
where
    I: IntoIterator<Item = &'a Paragraph>,
{
    let mut text = String::new();
    for paragraph in paragraphs {
        if let Some(line) = paragraph.normalized() {
            push_segment(&mut text, &line);
        }
    }
    text
}

/// Decode and render a text body.
pub fn render_text_body<B: TextBody + ?Sized>(body: &B) -> Result<String> {
    let paragraphs = body.paragraphs()?;
    Ok(render_paragraphs(&paragraphs))
}
