//! Domain types for representing presentation content.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type of the modern packaged (Office Open XML) presentation format.
pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// MIME type of the legacy binary presentation format.
pub const PPT_MIME: &str = "application/vnd.ms-powerpoint";

/// The format of the source presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary).
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" | "pptm" | "ppsx" | "potx" => Some(Self::Pptx),
            "ppt" | "pps" | "pot" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Map a declared MIME type to a format.
    ///
    /// Declared types are unreliable, so callers only use this for
    /// diagnostics.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        if essence.eq_ignore_ascii_case(PPTX_MIME)
            || essence.eq_ignore_ascii_case("application/vnd.ms-powerpoint.presentation.macroenabled.12")
        {
            Some(Self::Pptx)
        } else if essence.eq_ignore_ascii_case(PPT_MIME) || essence.eq_ignore_ascii_case("application/mspowerpoint") {
            Some(Self::Ppt)
        } else {
            None
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }

    /// The well-known MIME type of this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pptx => PPTX_MIME,
            Self::Ppt => PPT_MIME,
        }
    }
}

impl fmt::Display for PresentationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pptx => f.write_str("PPTX"),
            Self::Ppt => f.write_str("PPT"),
        }
    }
}

/// A paragraph of a text-bearing shape.
#[derive(Debug)]
pub struct Paragraph {
    /// Raw text of each run, in order. May contain carriage returns.
    pub runs: Vec<String>,

    /// Whether the paragraph is a bullet item, if the format could tell.
    pub bullet: Result<bool>,
}

impl Paragraph {
    /// Create a paragraph from its runs and bullet lookup result.
    pub fn new(runs: Vec<String>, bullet: Result<bool>) -> Self {
        Self { runs, bullet }
    }

    /// A paragraph made of a single run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()], Ok(false))
    }

    /// A single-run bullet paragraph.
    pub fn bulleted(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()], Ok(true))
    }

    /// Bullet status, treating a failed lookup as "not a bullet".
    pub fn is_bullet(&self) -> bool {
        match &self.bullet {
            Ok(bullet) => *bullet,
            Err(e) => {
                log::debug!("Bullet status unavailable, treating as plain paragraph: {}", e);
                false
            }
        }
    }
}

/// A text container owned by a shape or table cell.
///
/// Decoding is deferred until the walker reaches the shape, so a fault in one
/// body only affects that shape.
pub trait TextBody {
    /// Decode the paragraphs of this body, in document order.
    fn paragraphs(&self) -> Result<Vec<Paragraph>>;
}

impl TextBody for Vec<Paragraph> {
    fn paragraphs(&self) -> Result<Vec<Paragraph>> {
        Ok(self
            .iter()
            .map(|p| {
                let bullet = match &p.bullet {
                    Ok(b) => Ok(*b),
                    Err(e) => Err(Error::ShapeTextError(e.to_string())),
                };
                Paragraph::new(p.runs.clone(), bullet)
            })
            .collect())
    }
}

/// A table: a row-major grid of text cells.
#[derive(Debug)]
pub struct Table<B> {
    pub rows: Vec<Vec<B>>,
}

impl<B> Table<B> {
    pub fn new(rows: Vec<Vec<B>>) -> Self {
        Self { rows }
    }
}

/// An object placed on a slide.
#[derive(Debug)]
pub enum Shape<B> {
    /// Text box, placeholder or any other shape with a text body.
    Text(B),
    /// Grouped shapes, in document order.
    Group(Vec<Shape<B>>),
    /// A table.
    Table(Table<B>),
    /// Pictures, connectors, charts and anything else without text.
    Other,
}

/// The top-level shapes of one slide, in document order.
#[derive(Debug)]
pub struct Slide<B> {
    pub shapes: Vec<Shape<B>>,
}

impl<B> Slide<B> {
    pub fn new(shapes: Vec<Shape<B>>) -> Self {
        Self { shapes }
    }
}

/// A parsed presentation.
pub trait Document {
    /// The text body type used by this format.
    type Body: TextBody;

    /// The format this document was parsed from.
    fn format(&self) -> PresentationFormat;

    /// Slides in presentation order.
    fn slides(&self) -> &[Slide<Self::Body>];
}

/// Text extracted from one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlideText {
    /// The slide's text, trimmed and non-empty.
    Text {
        /// 1-based slide number.
        number: usize,
        text: String,
    },
    /// The slide has no extractable text.
    Placeholder {
        /// 1-based slide number.
        number: usize,
    },
}

impl SlideText {
    /// 1-based slide number.
    pub fn number(&self) -> usize {
        match self {
            Self::Text { number, .. } | Self::Placeholder { number } => *number,
        }
    }

    /// The extracted text, or `None` for a placeholder.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

/// Default wording shown for a slide without text.
pub fn placeholder_text(number: usize) -> String {
    format!("Slide {} contains no extractable text", number)
}

impl fmt::Display for SlideText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text, .. } => f.write_str(text),
            Self::Placeholder { number } => f.write_str(&placeholder_text(*number)),
        }
    }
}
