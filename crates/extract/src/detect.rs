//! Format detection by parsing.
//!
//! Neither the declared MIME type nor the file signature decides the format.
//! Both are logged, then the bytes go through the PPTX loader and, if that
//! fails, the PPT loader.

use deck_core::{Document, Error, ExtractOptions, ExtractionError, PresentationFormat, Slide};
use deck_ppt::{PptDocument, PptParser, PptTextBody};
use deck_pptx::{PptxDocument, PptxParser, PptxTextBody};
use std::io::Cursor;

/// A parsed presentation in either format.
#[derive(Debug)]
pub enum DocumentModel {
    Modern(PptxDocument),
    Legacy(PptDocument),
}

impl DocumentModel {
    pub fn format(&self) -> PresentationFormat {
        match self {
            DocumentModel::Modern(doc) => doc.format(),
            DocumentModel::Legacy(doc) => doc.format(),
        }
    }

    pub fn slide_count(&self) -> usize {
        match self {
            DocumentModel::Modern(doc) => doc.slides().len(),
            DocumentModel::Legacy(doc) => doc.slides().len(),
        }
    }

    /// Slides of a PPTX document, `None` for PPT.
    pub fn modern_slides(&self) -> Option<&[Slide<PptxTextBody>]> {
        match self {
            DocumentModel::Modern(doc) => Some(doc.slides()),
            DocumentModel::Legacy(_) => None,
        }
    }

    /// Slides of a PPT document, `None` for PPTX.
    pub fn legacy_slides(&self) -> Option<&[Slide<PptTextBody>]> {
        match self {
            DocumentModel::Modern(_) => None,
            DocumentModel::Legacy(doc) => Some(doc.slides()),
        }
    }
}

/// Parse `bytes` as PPTX, then as PPT.
///
/// Fails with [`ExtractionError::UnsupportedFormat`] carrying both loader
/// errors when neither format applies, and with
/// [`ExtractionError::EmptyDocument`] when the presentation has no slides.
pub fn detect(
    bytes: &[u8],
    hint: Option<&str>,
    options: &ExtractOptions,
) -> Result<DocumentModel, ExtractionError> {
    let declared = hint.and_then(PresentationFormat::from_mime);
    log::debug!(
        "Detecting format of {} bytes (declared {:?} -> {:?}, signature {:?})",
        bytes.len(),
        hint,
        declared,
        PresentationFormat::from_magic(bytes)
    );

    let model = match parse_pptx(bytes, options) {
        Ok(doc) => DocumentModel::Modern(doc),
        Err(pptx) => {
            log::debug!("Not a PPTX presentation: {}", pptx);
            match parse_ppt(bytes, options) {
                Ok(doc) => DocumentModel::Legacy(doc),
                Err(ppt) => {
                    log::debug!("Not a PPT presentation: {}", ppt);
                    return Err(ExtractionError::UnsupportedFormat {
                        pptx: Box::new(pptx),
                        ppt: Box::new(ppt),
                    });
                }
            }
        }
    };

    let format = model.format();
    if let Some(declared) = declared.filter(|d| *d != format) {
        log::info!("Declared type {} but content is {}", declared, format);
    }

    if model.slide_count() == 0 {
        return Err(ExtractionError::EmptyDocument { format });
    }

    log::debug!("Parsed {} presentation with {} slide(s)", format, model.slide_count());
    Ok(model)
}

fn parse_pptx(bytes: &[u8], options: &ExtractOptions) -> Result<PptxDocument, Error> {
    PptxParser::new()
        .with_max_depth(options.max_group_depth())
        .parse(Cursor::new(bytes))
}

fn parse_ppt(bytes: &[u8], options: &ExtractOptions) -> Result<PptDocument, Error> {
    PptParser::new()
        .with_max_depth(options.max_group_depth())
        .parse(Cursor::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::{PPTX_MIME, PPT_MIME};
    use deck_ppt::testing::{self as ppt, PptBuilder};
    use deck_pptx::testing::{self as pptx, PptxBuilder};

    #[test]
    fn test_detects_pptx() {
        let bytes = PptxBuilder::new().slide(&[pptx::text_box(&["Hi"])]).build().unwrap();
        let model = detect(&bytes, Some(PPTX_MIME), &ExtractOptions::default()).unwrap();
        assert_eq!(model.format(), PresentationFormat::Pptx);
        assert_eq!(model.slide_count(), 1);
        assert!(model.modern_slides().is_some());
        assert!(model.legacy_slides().is_none());
    }

    #[test]
    fn test_detects_ppt_despite_pptx_hint() {
        let bytes = PptBuilder::new().slide(vec![ppt::text_shape(0, "Hi")]).build().unwrap();
        let model = detect(&bytes, Some(PPTX_MIME), &ExtractOptions::default()).unwrap();
        assert_eq!(model.format(), PresentationFormat::Ppt);
        assert!(model.legacy_slides().is_some());
    }

    #[test]
    fn test_pptx_despite_ppt_hint() {
        let bytes = PptxBuilder::new().slide(&[pptx::text_box(&["Hi"])]).build().unwrap();
        let model = detect(&bytes, Some(PPT_MIME), &ExtractOptions::default()).unwrap();
        assert_eq!(model.format(), PresentationFormat::Pptx);
    }

    #[test]
    fn test_unsupported_keeps_both_causes() {
        let err = detect(b"plain text, not a deck", None, &ExtractOptions::default()).unwrap_err();
        match err {
            ExtractionError::UnsupportedFormat { pptx, ppt } => {
                assert!(matches!(*pptx, Error::ZipError(_)));
                assert!(matches!(*ppt, Error::CfbError(_)));
            }
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_document() {
        let bytes = PptBuilder::new().build().unwrap();
        let err = detect(&bytes, None, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::EmptyDocument {
                format: PresentationFormat::Ppt
            }
        ));
    }
}
