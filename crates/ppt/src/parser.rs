//! PPT file parser implementation.
//!
//! Parses legacy PowerPoint files using the OLE/CFB container format.
//! Slides are located through the Current User stream and the persist object
//! directory of the newest user edit, with a record scan as fallback when
//! that chain is missing or unusable.
//!
//! ## Compatibility
//!
//! This parser is designed for PowerPoint 97-2003 (.ppt) files. Encrypted
//! documents are rejected as unsupported.

use crate::drawing::DrawingContext;
use crate::persist::{CurrentUser, PersistDirectory};
use crate::records::{read_record_at, read_u32_le, record_types, Record, Records};
use crate::text::{MasterBullets, PptTextBody};
use cfb::CompoundFile;
use deck_core::options::DEFAULT_MAX_GROUP_DEPTH;
use deck_core::{Document, Error, PresentationFormat, Result, Slide};
use std::io::{Read, Seek};
use std::ops::Range;
use std::sync::Arc;

const POWERPOINT_DOCUMENT: &str = "/PowerPoint Document";
const CURRENT_USER: &str = "/Current User";

/// `SlideListWithText` instance holding the presentation slides.
const SLIDE_LIST_SLIDES: u16 = 0;
/// `SlideListWithText` instance holding the main masters.
const SLIDE_LIST_MASTERS: u16 = 1;

/// A parsed PPT presentation.
#[derive(Debug)]
pub struct PptDocument {
    slides: Vec<Slide<PptTextBody>>,
}

impl Document for PptDocument {
    type Body = PptTextBody;

    fn format(&self) -> PresentationFormat {
        PresentationFormat::Ppt
    }

    fn slides(&self) -> &[Slide<PptTextBody>] {
        &self.slides
    }
}

/// One `SlidePersistAtom` of a slide list and the text blocks following it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlideListEntry {
    persist_ref: u32,
    text_blocks: Vec<Range<usize>>,
}

/// Stream offsets of the records a document is built from.
#[derive(Debug)]
struct DocumentLayout {
    document: usize,
    /// Slide container offsets in presentation order, with their slide list index.
    slides: Vec<(usize, Option<usize>)>,
    master: Option<usize>,
}

/// Parser for legacy PPT (OLE/CFB) files.
#[derive(Debug, Clone)]
pub struct PptParser {
    max_depth: usize,
}

impl PptParser {
    /// Create a new PPT parser.
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

    /// Parse a PPT file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<PptDocument> {
        let mut cfb = CompoundFile::open(reader)
            .map_err(|e| Error::CfbError(format!("Failed to open CFB container: {}", e)))?;

        // Validate CFB structure has required streams
        let has_current_user = self.validate_cfb_structure(&cfb)?;

        let stream: Arc<[u8]> = Arc::from(self.read_stream(&mut cfb, POWERPOINT_DOCUMENT)?);
        let current_user = if has_current_user {
            Some(self.read_stream(&mut cfb, CURRENT_USER)?)
        } else {
            None
        };

        let layout = self.locate(&stream, current_user.as_deref())?;
        let document = read_record_at(&stream, layout.document)?;
        let slide_list = slide_list(&document, SLIDE_LIST_SLIDES)?;
        let masters = Arc::new(self.master_bullets(&stream, &document, layout.master));

        log::debug!(
            "PPT document at offset {}: {} slide(s), {} slide list entries, master styles {}",
            layout.document,
            layout.slides.len(),
            slide_list.len(),
            if masters.is_empty() { "absent" } else { "present" }
        );

        let mut slides = Vec::with_capacity(layout.slides.len());
        for (idx, (offset, list_index)) in layout.slides.iter().enumerate() {
            let text_blocks = list_index
                .and_then(|i| slide_list.get(i))
                .map(|entry| entry.text_blocks.as_slice())
                .unwrap_or_default();
            let ctx = DrawingContext {
                stream: &stream,
                masters: &masters,
                text_blocks,
                max_depth: self.max_depth,
            };
            let slide = self
                .parse_slide(&ctx, *offset)
                .map_err(|e| Error::PptParseError(format!("Slide {}: {}", idx + 1, e)))?;
            slides.push(slide);
        }

        Ok(PptDocument { slides })
    }

    /// Validate the CFB container has required PowerPoint streams.
    ///
    /// Returns whether the `Current User` stream is present.
    fn validate_cfb_structure<R: Read + Seek>(&self, cfb: &CompoundFile<R>) -> Result<bool> {
        // Check for PowerPoint Document stream (required)
        let has_ppt_doc = cfb
            .walk()
            .any(|entry| entry.path().to_string_lossy() == POWERPOINT_DOCUMENT);

        if !has_ppt_doc {
            return Err(Error::UnsupportedFormat(
                "Missing 'PowerPoint Document' stream. This may not be a valid PPT file \
                 or may be a different Office format."
                    .to_string(),
            ));
        }

        let has_current_user = cfb
            .walk()
            .any(|entry| entry.path().to_string_lossy() == CURRENT_USER);

        if !has_current_user {
            log::warn!("Missing 'Current User' stream. Locating slides by record scan.");
        }

        Ok(has_current_user)
    }

    /// Read a whole stream from the CFB container.
    fn read_stream<R: Read + Seek>(&self, cfb: &mut CompoundFile<R>, path: &str) -> Result<Vec<u8>> {
        let mut stream = cfb
            .open_stream(path)
            .map_err(|e| Error::CfbError(format!("Failed to open stream '{}': {}", path, e)))?;

        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;

        Ok(data)
    }

    /// Find the document and slide containers.
    fn locate(&self, stream: &[u8], current_user: Option<&[u8]>) -> Result<DocumentLayout> {
        let edit_offset = match current_user.map(CurrentUser::parse) {
            Some(Ok(user)) => Some(user.offset_to_current_edit),
            Some(Err(e @ Error::UnsupportedFormat(_))) => return Err(e),
            Some(Err(e)) => {
                log::warn!("Unusable Current User stream ({}), locating slides by record scan", e);
                None
            }
            None => None,
        };

        let persisted = edit_offset.map(|offset| self.load_persist(stream, offset));
        match persisted {
            Some(Ok((directory, document))) => self.locate_by_persist(stream, &directory, document),
            Some(Err(e)) => {
                log::warn!("Unusable user edit chain ({}), locating slides by record scan", e);
                self.locate_by_scan(stream)
            }
            None => self.locate_by_scan(stream),
        }
    }

    /// Persist directory of the newest edit and the document container offset.
    fn load_persist(&self, stream: &[u8], edit_offset: u32) -> Result<(PersistDirectory, usize)> {
        let (directory, document_ref) = PersistDirectory::load(stream, edit_offset)?;
        log::debug!("Persist directory holds {} object(s)", directory.len());

        let document = directory
            .offset_of(document_ref)
            .ok_or_else(|| Error::PptParseError(format!("Document persist id {} not in directory", document_ref)))?
            as usize;
        expect_record(stream, document, record_types::RT_DOCUMENT)?;

        Ok((directory, document))
    }

    fn locate_by_persist(
        &self,
        stream: &[u8],
        directory: &PersistDirectory,
        document_offset: usize,
    ) -> Result<DocumentLayout> {
        let document = read_record_at(stream, document_offset)?;

        let mut slides = Vec::new();
        for (idx, entry) in slide_list(&document, SLIDE_LIST_SLIDES)?.iter().enumerate() {
            let offset = directory.offset_of(entry.persist_ref).ok_or_else(|| {
                Error::PptParseError(format!("Slide persist id {} not in directory", entry.persist_ref))
            })? as usize;
            expect_record(stream, offset, record_types::RT_SLIDE)?;
            slides.push((offset, Some(idx)));
        }

        let master = slide_list(&document, SLIDE_LIST_MASTERS)?
            .first()
            .and_then(|entry| directory.offset_of(entry.persist_ref))
            .map(|offset| offset as usize)
            .filter(|&offset| expect_record(stream, offset, record_types::RT_MAIN_MASTER).is_ok());

        Ok(DocumentLayout {
            document: document_offset,
            slides,
            master,
        })
    }

    /// Locate the document by scanning top-level records.
    ///
    /// Slides come from the last document's slide list, resolved through the
    /// persist directory atoms found in the stream. When those do not resolve
    /// every slide, the newest slide containers are taken, at most one per
    /// slide list entry.
    fn locate_by_scan(&self, stream: &[u8]) -> Result<DocumentLayout> {
        let mut document = None;
        let mut slide_offsets = Vec::new();
        let mut directories = Vec::new();
        let mut master = None;

        for record in Records::new(stream, 0) {
            let record = record?;
            match record.rec_type {
                record_types::RT_DOCUMENT => document = Some(record.offset),
                record_types::RT_SLIDE => slide_offsets.push(record.offset),
                record_types::RT_PERSIST_DIRECTORY_ATOM => directories.push(record.offset as u32),
                record_types::RT_MAIN_MASTER if master.is_none() => master = Some(record.offset),
                _ => {}
            }
        }

        let document = document.ok_or_else(|| {
            Error::UnsupportedFormat(
                "No document container found. This file may use an unsupported \
                 PowerPoint format version (pre-97) or be corrupted."
                    .to_string(),
            )
        })?;
        let entries = slide_list(&read_record_at(stream, document)?, SLIDE_LIST_SLIDES)?;

        let directory = PersistDirectory::from_atoms(stream, directories.into_iter().rev());
        let resolved: Option<Vec<(usize, Option<usize>)>> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let offset = directory.offset_of(entry.persist_ref)? as usize;
                expect_record(stream, offset, record_types::RT_SLIDE).ok()?;
                Some((offset, Some(idx)))
            })
            .collect();

        let slides = match resolved {
            Some(slides) => slides,
            None => {
                let skipped = slide_offsets.len().saturating_sub(entries.len());
                log::warn!(
                    "Slide list not resolvable, using the last {} of {} slide container(s)",
                    slide_offsets.len() - skipped,
                    slide_offsets.len()
                );
                slide_offsets
                    .into_iter()
                    .skip(skipped)
                    .enumerate()
                    .map(|(idx, offset)| (offset, (skipped == 0).then_some(idx)))
                    .collect()
            }
        };

        Ok(DocumentLayout {
            document,
            slides,
            master,
        })
    }

    /// Bullet defaults from the main master, then the document environment.
    fn master_bullets(&self, stream: &[u8], document: &Record, master: Option<usize>) -> MasterBullets {
        let mut bullets = MasterBullets::default();

        match master.map(|offset| read_record_at(stream, offset)) {
            Some(Ok(master)) => bullets.add_styles(master.children()),
            Some(Err(e)) => log::warn!("Ignoring unreadable main master: {}", e),
            None => log::debug!("No main master found"),
        }

        match document.child(record_types::RT_ENVIRONMENT) {
            Ok(Some(environment)) => bullets.add_styles(environment.children()),
            Ok(None) => {}
            Err(e) => log::warn!("Ignoring unreadable document environment: {}", e),
        }

        bullets
    }

    /// Parse a single slide container.
    fn parse_slide(&self, ctx: &DrawingContext, offset: usize) -> Result<Slide<PptTextBody>> {
        let record = read_record_at(ctx.stream, offset)?;
        let shapes = ctx.slide_shapes(&record)?;
        log::debug!("Slide at offset {}: {} top-level shape(s)", offset, shapes.len());
        Ok(Slide::new(shapes))
    }
}

impl Default for PptParser {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_record(stream: &[u8], offset: usize, rec_type: u16) -> Result<()> {
    let record = read_record_at(stream, offset)?;
    if record.rec_type != rec_type {
        return Err(Error::PptParseError(format!(
            "Expected record 0x{:04X} at offset {}, found 0x{:04X}",
            rec_type, offset, record.rec_type
        )));
    }
    Ok(())
}

/// Entries of the document's `SlideListWithText` records with `instance`.
fn slide_list(document: &Record, instance: u16) -> Result<Vec<SlideListEntry>> {
    let mut entries: Vec<SlideListEntry> = Vec::new();

    for list in document.children() {
        let list = list?;
        if list.rec_type != record_types::RT_SLIDE_LIST_WITH_TEXT || list.instance != instance {
            continue;
        }

        for child in list.children() {
            let child = child?;
            match child.rec_type {
                record_types::RT_SLIDE_PERSIST_ATOM => {
                    let persist_ref = read_u32_le(child.data, 0)
                        .ok_or_else(|| Error::PptParseError("SlidePersistAtom too short".to_string()))?;
                    entries.push(SlideListEntry {
                        persist_ref,
                        text_blocks: Vec::new(),
                    });
                }
                record_types::RT_TEXT_HEADER_ATOM => {
                    if let Some(entry) = entries.last_mut() {
                        entry.text_blocks.push(child.offset..child.end());
                    }
                }
                _ => {
                    if let Some(block) = entries.last_mut().and_then(|e| e.text_blocks.last_mut()) {
                        block.end = child.end();
                    }
                }
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, PptBuilder};
    use deck_core::{render_text_body, Shape};
    use std::io::Cursor;

    fn parse(bytes: Vec<u8>) -> Result<PptDocument> {
        PptParser::new().parse(Cursor::new(bytes))
    }

    fn texts(slide: &Slide<PptTextBody>) -> Vec<String> {
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
    fn test_slides_in_persist_order() {
        let bytes = PptBuilder::new()
            .slide(vec![testing::text_shape(0, "One")])
            .slide(vec![testing::text_shape(0, "Two")])
            .slide(vec![testing::text_shape(0, "Three")])
            .build()
            .unwrap();
        let doc = parse(bytes).unwrap();

        assert_eq!(doc.format(), PresentationFormat::Ppt);
        let all: Vec<Vec<String>> = doc.slides().iter().map(texts).collect();
        assert_eq!(all, vec![vec!["One"], vec!["Two"], vec!["Three"]]);
    }

    #[test]
    fn test_scan_fallback_without_current_user() {
        let bytes = PptBuilder::new()
            .slide(vec![testing::text_shape(0, "First")])
            .slide(vec![testing::text_shape(0, "Second")])
            .without_current_user()
            .build()
            .unwrap();
        let doc = parse(bytes).unwrap();
        let all: Vec<Vec<String>> = doc.slides().iter().map(texts).collect();
        assert_eq!(all, vec![vec!["First"], vec!["Second"]]);
    }

    #[test]
    fn test_outline_text_and_master_bullets() {
        let bytes = PptBuilder::new()
            .slide_with_outline(
                vec![testing::outline_shape(0), testing::outline_shape(1)],
                &[(0, "Agenda"), (1, "Alpha\rBeta")],
            )
            .build()
            .unwrap();
        let doc = parse(bytes).unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["Agenda", "• Alpha\n• Beta"]);

        let bytes = PptBuilder::new()
            .master_body_bullets(false)
            .slide_with_outline(vec![testing::outline_shape(0)], &[(1, "Alpha\rBeta")])
            .build()
            .unwrap();
        let doc = parse(bytes).unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["Alpha\nBeta"]);
    }

    #[test]
    fn test_outline_text_via_scan_fallback() {
        let bytes = PptBuilder::new()
            .slide_with_outline(vec![testing::outline_shape(0)], &[(1, "Point")])
            .without_current_user()
            .build()
            .unwrap();
        let doc = parse(bytes).unwrap();
        assert_eq!(texts(&doc.slides()[0]), vec!["• Point"]);
    }

    #[test]
    fn test_scan_ignores_unreferenced_slide_containers() {
        let (mut stream, _) = PptBuilder::new()
            .slide(vec![testing::text_shape(testing::OTHER, "Current")])
            .streams();
        stream.extend(testing::slide_container(&[testing::text_shape(testing::OTHER, "Stale")]));
        let bytes = testing::compound_file(&[(POWERPOINT_DOCUMENT, stream.as_slice())]).unwrap();

        let doc = parse(bytes).unwrap();
        let all: Vec<Vec<String>> = doc.slides().iter().map(texts).collect();
        assert_eq!(all, vec![vec!["Current"]]);
    }

    #[test]
    fn test_scan_without_persist_directory_keeps_newest_slides() {
        let mut persist = 3u32.to_le_bytes().to_vec();
        persist.extend_from_slice(&[0; 16]);
        let list = testing::container(
            record_types::RT_SLIDE_LIST_WITH_TEXT,
            SLIDE_LIST_SLIDES,
            &[testing::atom(record_types::RT_SLIDE_PERSIST_ATOM, 0, &persist)],
        );
        let mut stream = testing::slide_container(&[testing::text_shape(testing::OTHER, "Old")]);
        stream.extend(testing::container(record_types::RT_DOCUMENT, 0, &[list]));
        stream.extend(testing::slide_container(&[testing::text_shape(testing::OTHER, "New")]));
        let bytes = testing::compound_file(&[(POWERPOINT_DOCUMENT, stream.as_slice())]).unwrap();

        let doc = parse(bytes).unwrap();
        let all: Vec<Vec<String>> = doc.slides().iter().map(texts).collect();
        assert_eq!(all, vec![vec!["New"]]);
    }

    #[test]
    fn test_encrypted_is_unsupported() {
        let bytes = PptBuilder::new()
            .slide(vec![testing::text_shape(0, "Secret")])
            .encrypted()
            .build()
            .unwrap();
        assert!(matches!(parse(bytes), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_powerpoint_stream() {
        let bytes = testing::compound_file(&[("/WordDocument", &b"not a presentation"[..])]).unwrap();
        assert!(matches!(parse(bytes), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_not_a_compound_file() {
        assert!(matches!(parse(b"PK\x03\x04 zip bytes".to_vec()), Err(Error::CfbError(_))));
    }

    #[test]
    fn test_stream_without_document() {
        let stream = testing::container(record_types::RT_SLIDE, 0, &[]);
        let bytes = testing::compound_file(&[(POWERPOINT_DOCUMENT, stream.as_slice())]).unwrap();
        assert!(matches!(parse(bytes), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_zero_slides() {
        let doc = parse(PptBuilder::new().build().unwrap()).unwrap();
        assert!(doc.slides().is_empty());
    }

    #[test]
    fn test_slide_list_blocks() {
        let mut persist = 7u32.to_le_bytes().to_vec();
        persist.extend_from_slice(&[0; 16]);
        let list = testing::container(
            record_types::RT_SLIDE_LIST_WITH_TEXT,
            SLIDE_LIST_SLIDES,
            &[
                testing::atom(record_types::RT_SLIDE_PERSIST_ATOM, 0, &persist),
                testing::atom(record_types::RT_TEXT_HEADER_ATOM, 0, &1u32.to_le_bytes()),
                testing::atom(record_types::RT_TEXT_BYTES_ATOM, 0, b"abc"),
                testing::atom(record_types::RT_TEXT_HEADER_ATOM, 0, &4u32.to_le_bytes()),
            ],
        );
        let stream = testing::container(record_types::RT_DOCUMENT, 0, &[list]);
        let document = read_record_at(&stream, 0).unwrap();

        let entries = slide_list(&document, SLIDE_LIST_SLIDES).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].persist_ref, 7);
        // Document header (8) + list header (8) + persist atom (28)
        assert_eq!(entries[0].text_blocks, vec![44..67, 67..79]);
        assert!(slide_list(&document, SLIDE_LIST_MASTERS).unwrap().is_empty());
    }
}
