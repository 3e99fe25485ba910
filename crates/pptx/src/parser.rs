//! PPTX file parser implementation.

use crate::package::{rel_types, Package};
use crate::shapes::parse_shape_tree;
use crate::styles::StyleCache;
use crate::text::PptxTextBody;
use crate::xml::{local_name, prefixed_attr};
use deck_core::options::DEFAULT_MAX_GROUP_DEPTH;
use deck_core::{Document, Error, PresentationFormat, Result, Slide};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;

const DEFAULT_MAIN_PART: &str = "ppt/presentation.xml";

/// A parsed PPTX presentation.
#[derive(Debug)]
pub struct PptxDocument {
    slides: Vec<Slide<PptxTextBody>>,
}

impl Document for PptxDocument {
    type Body = PptxTextBody;

    fn format(&self) -> PresentationFormat {
        PresentationFormat::Pptx
    }

    fn slides(&self) -> &[Slide<PptxTextBody>] {
        &self.slides
    }
}

/// Parser for PPTX (Office Open XML) files.
#[derive(Debug, Clone)]
pub struct PptxParser {
    max_depth: usize,
}

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }

    /// Limit how deeply nested groups are parsed.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<PptxDocument> {
        let mut package = Package::open(reader)?;

        let main_part = self.main_part(&mut package)?;
        let slide_parts = self.slide_order(&mut package, &main_part)?;
        log::debug!("PPTX main part '{}' lists {} slide(s)", main_part, slide_parts.len());

        let mut cache = StyleCache::default();
        let mut slides = Vec::with_capacity(slide_parts.len());
        for (idx, part) in slide_parts.iter().enumerate() {
            slides.push(self.parse_slide(&mut package, &mut cache, part, idx + 1)?);
        }

        Ok(PptxDocument { slides })
    }

    /// Locate the presentation part through the package relationships.
    fn main_part<R: Read + Seek>(&self, package: &mut Package<R>) -> Result<String> {
        match package.related_part("", rel_types::OFFICE_DOCUMENT)? {
            Some(part) => Ok(part),
            None => {
                log::debug!("No officeDocument relationship, assuming '{}'", DEFAULT_MAIN_PART);
                Ok(DEFAULT_MAIN_PART.to_string())
            }
        }
    }

    /// Slide parts in `p:sldIdLst` order.
    fn slide_order<R: Read + Seek>(&self, package: &mut Package<R>, main_part: &str) -> Result<Vec<String>> {
        let content = package.read_part(main_part)?;
        let ids = read_slide_ids(&content)?;

        let targets: HashMap<String, String> = package
            .relationships(main_part)?
            .into_iter()
            .filter(|rel| !rel.external && rel.is_type(rel_types::SLIDE))
            .map(|rel| (rel.id, rel.target))
            .collect();

        ids.iter()
            .map(|id| {
                targets.get(id).cloned().ok_or_else(|| {
                    Error::PptxParseError(format!("Slide reference '{}' has no slide relationship", id))
                })
            })
            .collect()
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        package: &mut Package<R>,
        cache: &mut StyleCache,
        part: &str,
        slide_number: usize,
    ) -> Result<Slide<PptxTextBody>> {
        let xml: Arc<str> = Arc::from(package.read_part(part)?);
        let styles = cache.slide_styles(package, part, self.max_depth);

        let shapes = parse_shape_tree(&xml, &styles, self.max_depth)
            .map_err(|e| Error::PptxParseError(format!("Slide {} ('{}'): {}", slide_number, part, e)))?;
        log::debug!("Slide {}: {} top-level shape(s)", slide_number, shapes.len());

        Ok(Slide::new(shapes))
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Relationship ids of `p:sldIdLst`, checking the root is a presentation.
fn read_slide_ids(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut seen_root = false;
    let mut in_list = false;
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if !seen_root {
                    if name != b"presentation" {
                        return Err(Error::UnsupportedFormat(format!(
                            "Main part root is '{}', not a presentation",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    seen_root = true;
                } else if name == b"sldIdLst" {
                    in_list = true;
                } else if in_list && name == b"sldId" {
                    let id = prefixed_attr(e, b"id")?
                        .ok_or_else(|| Error::PptxParseError("Slide id without relationship".to_string()))?;
                    ids.push(id);
                }
            }
            Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == b"sldIdLst" => in_list = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlError(format!("Error parsing presentation part: {}", e))),
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::PptxParseError("Presentation part is empty".to_string()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, PptxBuilder};
    use deck_core::{render_text_body, Shape};
    use std::io::Cursor;

    fn parse(bytes: Vec<u8>) -> Result<PptxDocument> {
        PptxParser::new().parse(Cursor::new(bytes))
    }

    fn texts(slide: &Slide<PptxTextBody>) -> Vec<String> {
        slide
            .shapes
            .iter()
            .filter_map(|shape| match shape {
                Shape::Text(body) => Some(render_text_body(body).unwrap()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_slides_follow_slide_id_list() {
        let bytes = PptxBuilder::new()
            .slide(&[testing::text_box(&["One"])])
            .slide(&[testing::text_box(&["Two"])])
            .slide(&[testing::text_box(&["Three"])])
            .build()
            .unwrap();
        let doc = parse(bytes).unwrap();

        assert_eq!(doc.format(), PresentationFormat::Pptx);
        let all: Vec<Vec<String>> = doc.slides().iter().map(texts).collect();
        assert_eq!(all, vec![vec!["One"], vec!["Two"], vec!["Three"]]);
    }

    #[test]
    fn test_placeholder_inherits_master_body_bullets() {
        let shapes = [
            testing::placeholder("title", None, &["Agenda"]),
            testing::placeholder("body", Some(1), &["Alpha", "Beta"]),
        ];
        let doc = parse(PptxBuilder::new().slide(&shapes).build().unwrap()).unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["Agenda", "• Alpha\n• Beta"]);

        let doc = parse(
            PptxBuilder::new()
                .master_body_bullets(false)
                .slide(&shapes)
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["Agenda", "Alpha\nBeta"]);
    }

    #[test]
    fn test_text_box_does_not_inherit_body_bullets() {
        let doc = parse(
            PptxBuilder::new()
                .slide(&[testing::text_box(&["Note"]), testing::bullet_box(&["Explicit"])])
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["Note", "• Explicit"]);
    }

    #[test]
    fn test_missing_layout_degrades_to_no_inheritance() {
        let slide = r#"<p:sld xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>Item</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;
        let bytes = testing::package(&[
            ("_rels/.rels", &*testing::relationships(&[("rId1", "officeDocument", "ppt/presentation.xml")])),
            (
                "ppt/presentation.xml",
                r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId7"/></p:sldIdLst></p:presentation>"#,
            ),
            ("ppt/_rels/presentation.xml.rels", &*testing::relationships(&[("rId7", "slide", "slides/slide1.xml")])),
            ("ppt/slides/slide1.xml", slide),
            (
                "ppt/slides/_rels/slide1.xml.rels",
                &*testing::relationships(&[("rId1", "slideLayout", "../slideLayouts/missing.xml")]),
            ),
        ])
        .unwrap();

        let doc = parse(bytes).unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["Item"]);
    }

    #[test]
    fn test_main_part_defaults_without_package_rels() {
        let bytes = testing::package(&[
            (
                "ppt/presentation.xml",
                r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst/></p:presentation>"#,
            ),
        ])
        .unwrap();
        assert!(parse(bytes).unwrap().slides().is_empty());
    }

    #[test]
    fn test_word_document_is_rejected() {
        let bytes = testing::package(&[
            ("_rels/.rels", &*testing::relationships(&[("rId1", "officeDocument", "word/document.xml")])),
            ("word/document.xml", r#"<w:document xmlns:w="w"><w:body/></w:document>"#),
        ])
        .unwrap();
        assert!(matches!(parse(bytes), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_dangling_slide_reference_fails() {
        let bytes = testing::package(&[
            (
                "ppt/presentation.xml",
                r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId9"/></p:sldIdLst></p:presentation>"#,
            ),
            ("ppt/_rels/presentation.xml.rels", &*testing::relationships(&[])),
        ])
        .unwrap();
        assert!(matches!(parse(bytes), Err(Error::PptxParseError(_))));
    }

    #[test]
    fn test_corrupt_slide_fails() {
        let bytes = testing::package(&[
            (
                "ppt/presentation.xml",
                r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
            ),
            ("ppt/_rels/presentation.xml.rels", &*testing::relationships(&[("rId2", "slide", "slides/slide1.xml")])),
            ("ppt/slides/slide1.xml", "<p:sld><p:cSld><p:spTree><p:sp></p:spTree>"),
        ])
        .unwrap();
        assert!(parse(bytes).is_err());
    }

    #[test]
    fn test_not_a_zip() {
        let result = parse(b"definitely not a zip archive".to_vec());
        assert!(matches!(result, Err(Error::ZipError(_))));
    }
}
