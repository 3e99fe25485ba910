//! Extraction entry point.

use crate::detect::{detect, DocumentModel};
use deck_core::{
    Document, ExtractOptions, ExtractionError, PresentationFormat, ShapeWarning, Slide, SlideAssembler,
    SlideText, TextBody,
};

/// Result of one extraction with diagnostics.
#[derive(Debug)]
pub struct Extraction {
    /// Format the bytes were parsed as.
    pub format: PresentationFormat,
    /// One entry per slide, in presentation order.
    pub slides: Vec<SlideText>,
    /// Shapes whose text was skipped.
    pub warnings: Vec<ShapeWarning>,
}

/// Turns presentation bytes into per-slide text.
///
/// Holds only configuration, so a single extractor can serve concurrent
/// callers.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
    assembler: SlideAssembler,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExtractOptions) -> Self {
        Self {
            assembler: SlideAssembler::new(&options),
            options,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract the text of every slide.
    ///
    /// Shape-level failures are logged and leave the rest of the slide
    /// intact. A slide without text yields [`SlideText::Placeholder`].
    pub fn extract(&self, bytes: &[u8], hint: Option<&str>) -> Result<Vec<SlideText>, ExtractionError> {
        Ok(self.extract_report(bytes, hint)?.slides)
    }

    /// Like [`Extractor::extract`], also returning the detected format and
    /// the absorbed shape failures.
    pub fn extract_report(&self, bytes: &[u8], hint: Option<&str>) -> Result<Extraction, ExtractionError> {
        let model = detect(bytes, hint, &self.options)?;
        let format = model.format();

        let mut warnings = Vec::new();
        let slides = match &model {
            DocumentModel::Modern(doc) => self.assemble_all(doc.slides(), &mut warnings),
            DocumentModel::Legacy(doc) => self.assemble_all(doc.slides(), &mut warnings),
        };

        if !warnings.is_empty() {
            log::warn!("{} shape(s) skipped while extracting {} presentation", warnings.len(), format);
        }

        Ok(Extraction {
            format,
            slides,
            warnings,
        })
    }

    fn assemble_all<B: TextBody>(&self, slides: &[Slide<B>], warnings: &mut Vec<ShapeWarning>) -> Vec<SlideText> {
        slides
            .iter()
            .enumerate()
            .map(|(idx, slide)| self.assembler.assemble(slide, idx + 1, warnings))
            .collect()
    }
}
