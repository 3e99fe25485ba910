//! PPTX (Office Open XML) parser backend for presentation text extraction.
//!
//! Parses .pptx files, which are ZIP archives containing XML parts, into the
//! shared slide model. Text bodies are decoded on demand.

mod package;
pub mod parser;
mod shapes;
mod styles;
pub mod text;
mod xml;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use parser::{PptxDocument, PptxParser};
pub use text::{ListStyle, PlaceholderRef, PptxTextBody};
