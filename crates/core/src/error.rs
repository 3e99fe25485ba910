//! Error types for presentation text extraction.

use crate::types::PresentationFormat;
use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the format loaders and by shape text decoding.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read from the underlying byte source.
    #[error("Failed to read input: {0}")]
    IoError(#[from] std::io::Error),

    /// The input is not a presentation this loader understands.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the PPTX package structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// Failed to parse the legacy PPT record structure.
    #[error("PPT parsing error: {0}")]
    PptParseError(String),

    /// Failed to decode the text of a single shape.
    #[error("Shape text error: {0}")]
    ShapeTextError(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// OLE/CFB container error (for PPT).
    #[error("OLE/CFB error: {0}")]
    CfbError(String),
}

/// Terminal failures of a whole extraction call.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Neither the PPTX nor the PPT loader could interpret the bytes.
    #[error("Unsupported or corrupt presentation (as PPTX: {pptx}; as PPT: {ppt})")]
    UnsupportedFormat {
        /// Why the modern packaged format was rejected.
        pptx: Box<Error>,
        /// Why the legacy binary format was rejected.
        ppt: Box<Error>,
    },

    /// The bytes parsed, but the presentation has no slides.
    #[error("No slides found in {format} presentation")]
    EmptyDocument { format: PresentationFormat },
}

/// Position of a shape inside a slide, for diagnostics.
///
/// `slide` is 1-based. `indices` holds the 0-based index of the shape among
/// its siblings, followed by child indices for groups and `row, column` for
/// table cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapePath {
    pub slide: usize,
    pub indices: Vec<usize>,
}

impl ShapePath {
    pub fn new(slide: usize) -> Self {
        Self {
            slide,
            indices: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, index: usize) {
        self.indices.push(index);
    }

    pub(crate) fn pop(&mut self) {
        self.indices.pop();
    }
}

impl fmt::Display for ShapePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide {}, shape ", self.slide)?;
        if self.indices.is_empty() {
            return f.write_str("-");
        }
        for (i, index) in self.indices.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// A shape whose text could not be extracted.
///
/// Never returned as a call failure: the shape contributes nothing and
/// extraction continues with its siblings.
#[derive(Error, Debug)]
#[error("{path}: {error}")]
pub struct ShapeWarning {
    pub path: ShapePath,
    pub error: Error,
}
