//! Slide assembly: one text block per slide.

use crate::error::{ShapePath, ShapeWarning};
use crate::options::ExtractOptions;
use crate::types::{Slide, SlideText, TextBody};
use crate::walker::ShapeWalker;

/// Builds the [`SlideText`] of each slide.
#[derive(Debug, Clone, Default)]
pub struct SlideAssembler {
    walker: ShapeWalker,
}

impl SlideAssembler {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            walker: ShapeWalker::new(options),
        }
    }

    /// Collect the text of every shape on `slide`.
    ///
    /// `number` is the slide's 1-based position. Shape failures are appended
    /// to `warnings`; a slide without text yields a placeholder.
    pub fn assemble<B: TextBody>(
        &self,
        slide: &Slide<B>,
        number: usize,
        warnings: &mut Vec<ShapeWarning>,
    ) -> SlideText {
        let mut text = String::new();
        let mut path = ShapePath::new(number);

        for (index, shape) in slide.shapes.iter().enumerate() {
            path.push(index);
            self.walker.walk(shape, &mut path, &mut text, warnings);
            path.pop();
        }

        let text = text.trim();
        if text.is_empty() {
            SlideText::Placeholder { number }
        } else {
            SlideText::Text {
                number,
                text: text.to_string(),
            }
        }
    }
}
