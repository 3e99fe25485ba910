//! Presentation text extraction.
//!
//! Takes the raw bytes of a PPTX or PPT file and returns one text block per
//! slide. The declared content type is only a hint: the bytes are always
//! tried as PPTX first and as PPT second.
//!
//! ```no_run
//! let bytes = std::fs::read("deck.pptx").unwrap();
//! for slide in deck_extract::extract(&bytes, None).unwrap() {
//!     println!("{}", slide);
//! }
//! ```

pub mod detect;
pub mod session;

pub use deck_core::{ExtractOptions, ExtractionError, PresentationFormat, ShapeWarning, SlideText};
pub use detect::{detect, DocumentModel};
pub use session::{Extraction, Extractor};

/// Extract the text of every slide with default options.
pub fn extract(bytes: &[u8], hint: Option<&str>) -> Result<Vec<SlideText>, ExtractionError> {
    Extractor::new().extract(bytes, hint)
}

/// Extract every slide as a string, with placeholders in their default wording.
pub fn extract_text_list(bytes: &[u8], hint: Option<&str>) -> Result<Vec<String>, ExtractionError> {
    Ok(extract(bytes, hint)?.iter().map(ToString::to_string).collect())
}
