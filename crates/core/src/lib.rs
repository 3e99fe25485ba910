//! Format-agnostic slide model, shape traversal and text rendering
//! for presentation text extraction.

pub mod assemble;
pub mod error;
pub mod options;
pub mod render;
pub mod types;
pub mod walker;

pub use assemble::SlideAssembler;
pub use error::{Error, ExtractionError, Result, ShapePath, ShapeWarning};
pub use options::ExtractOptions;
pub use render::{render_paragraphs, render_text_body};
pub use types::{
    placeholder_text, Document, Paragraph, PresentationFormat, Shape, Slide, SlideText, Table,
    TextBody, PPTX_MIME, PPT_MIME,
};
pub use walker::ShapeWalker;
