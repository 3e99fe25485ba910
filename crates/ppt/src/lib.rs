//! Legacy PPT (OLE/CFB) loader for presentation text extraction.
//!
//! Reads the `PowerPoint Document` stream of PowerPoint 97-2003 files and
//! turns its slide drawings into the shape model of `deck-core`. Text bodies
//! keep a handle to the stream and decode on demand, so one broken text atom
//! only affects its own shape.

mod drawing;
pub mod parser;
mod persist;
mod records;
pub mod text;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use parser::{PptDocument, PptParser};
pub use text::{MasterBullets, PptTextBody, TextType};
