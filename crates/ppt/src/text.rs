//! Text bodies of legacy shapes: text atoms, paragraph styles and master
//! bullet defaults.

use crate::records::{read_u16_le, read_u32_le, record_types, Record, Records};
use deck_core::{Error, Paragraph, Result, TextBody};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Text types from RT_TextHeaderAtom.
/// These indicate what kind of text follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextType {
    Title = 0,
    Body = 1,
    Notes = 2,
    NotUsed = 3,
    Other = 4,
    CenterBody = 5,
    CenterTitle = 6,
    HalfBody = 7,
    QuarterBody = 8,
}

impl TextType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => TextType::Title,
            1 => TextType::Body,
            2 => TextType::Notes,
            3 => TextType::NotUsed,
            4 => TextType::Other,
            5 => TextType::CenterBody,
            6 => TextType::CenterTitle,
            7 => TextType::HalfBody,
            8 => TextType::QuarterBody,
            _ => TextType::Other,
        }
    }

    /// The master style this type inherits from when it has none of its own.
    fn parent(self) -> Option<TextType> {
        match self {
            TextType::CenterBody | TextType::HalfBody | TextType::QuarterBody => Some(TextType::Body),
            TextType::CenterTitle => Some(TextType::Title),
            _ => None,
        }
    }
}

/// First-level bullet settings of the master text styles.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MasterBullets {
    by_type: HashMap<TextType, bool>,
}

impl MasterBullets {
    /// Collect `TxMasterStyleAtom`s among `records`; earlier atoms win.
    pub(crate) fn add_styles<'a>(&mut self, records: impl Iterator<Item = Result<Record<'a>>>) {
        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Stopping master style scan: {}", e);
                    break;
                }
            };
            if record.rec_type != record_types::RT_TX_MASTER_STYLE_ATOM {
                continue;
            }
            let text_type = TextType::from_u32(u32::from(record.instance));
            match master_level0_bullet(&record) {
                Ok(Some(bullet)) => {
                    self.by_type.entry(text_type).or_insert(bullet);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Ignoring master style for {:?}: {}", text_type, e),
            }
        }
    }

    /// Bullet setting for a text type, following the master style fallbacks.
    pub fn bullet_for(&self, text_type: TextType) -> Option<bool> {
        self.by_type
            .get(&text_type)
            .copied()
            .or_else(|| text_type.parent().and_then(|parent| self.by_type.get(&parent).copied()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// Level-0 bullet of a `TxMasterStyleAtom`, when the level specifies one.
fn master_level0_bullet(atom: &Record) -> Result<Option<bool>> {
    let mut reader = ByteReader::new(atom.data);
    let levels = reader.u16()?;
    if levels == 0 {
        return Ok(None);
    }
    if atom.instance >= 5 {
        reader.skip(2)?;
    }
    let exception = read_paragraph_exception(&mut reader)?;
    Ok(exception.bullet)
}

/// Where a shape's text lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TextSource {
    /// Text records (header, chars or bytes, style) in this stream range.
    Records(Range<usize>),
    /// An outline reference with no matching text block.
    MissingOutline(u32),
}

/// A text body of a legacy shape or table cell.
#[derive(Clone)]
pub struct PptTextBody {
    stream: Arc<[u8]>,
    source: TextSource,
    masters: Arc<MasterBullets>,
}

impl fmt::Debug for PptTextBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PptTextBody")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl PptTextBody {
    pub(crate) fn new(stream: Arc<[u8]>, source: TextSource, masters: Arc<MasterBullets>) -> Self {
        Self {
            stream,
            source,
            masters,
        }
    }

    fn atoms(&self) -> Result<TextAtoms<'_>> {
        let range = match &self.source {
            TextSource::Records(range) => range.clone(),
            TextSource::MissingOutline(index) => {
                return Err(Error::ShapeTextError(format!(
                    "Outline text reference {} has no text block",
                    index
                )));
            }
        };
        let data = self
            .stream
            .get(range.clone())
            .ok_or_else(|| Error::ShapeTextError("Text records out of bounds".to_string()))?;

        let mut atoms = TextAtoms::default();
        for record in Records::new(data, range.start) {
            let record = record.map_err(|e| Error::ShapeTextError(e.to_string()))?;
            match record.rec_type {
                record_types::RT_TEXT_HEADER_ATOM => {
                    if let Some(value) = read_u32_le(record.data, 0) {
                        atoms.text_type = TextType::from_u32(value);
                    }
                }
                record_types::RT_TEXT_CHARS_ATOM | record_types::RT_TEXT_BYTES_ATOM => {
                    if atoms.text.is_none() {
                        atoms.text = Some(record);
                    }
                }
                record_types::RT_STYLE_TEXT_PROP_ATOM => {
                    if atoms.style.is_none() {
                        atoms.style = Some(record.data);
                    }
                }
                _ => {}
            }
        }
        Ok(atoms)
    }
}

struct TextAtoms<'a> {
    text_type: TextType,
    text: Option<Record<'a>>,
    style: Option<&'a [u8]>,
}

impl Default for TextAtoms<'_> {
    fn default() -> Self {
        Self {
            text_type: TextType::Other,
            text: None,
            style: None,
        }
    }
}

impl TextBody for PptTextBody {
    fn paragraphs(&self) -> Result<Vec<Paragraph>> {
        let atoms = self.atoms()?;
        let Some(text_record) = atoms.text else {
            return Ok(Vec::new());
        };
        let text = decode_text(&text_record)?;
        let text_len = text.encode_utf16().count();

        let runs = match atoms.style {
            Some(style) => read_paragraph_runs(style, text_len).map_err(|e| e.to_string()),
            None => Ok(Vec::new()),
        };
        let inherited = self.masters.bullet_for(atoms.text_type);

        let mut paragraphs = Vec::new();
        let mut offset = 0usize;
        for line in text.split('\r') {
            let bullet = match &runs {
                Ok(runs) => Ok(run_bullet(runs, offset).or(inherited).unwrap_or(false)),
                Err(message) => Err(Error::ShapeTextError(format!("Paragraph style unreadable: {}", message))),
            };
            offset += line.encode_utf16().count() + 1;
            paragraphs.push(Paragraph::new(vec![line.replace('\u{000B}', "\n")], bullet));
        }

        Ok(paragraphs)
    }
}

/// Decode a `TextCharsAtom` (UTF-16LE) or `TextBytesAtom` (Windows-1252).
fn decode_text(record: &Record) -> Result<String> {
    if record.rec_type == record_types::RT_TEXT_CHARS_ATOM {
        if record.data.len() % 2 != 0 {
            return Err(Error::ShapeTextError(format!(
                "Text atom at offset {} has odd length {}",
                record.offset,
                record.data.len()
            )));
        }
        let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(record.data);
        Ok(text.into_owned())
    } else {
        let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(record.data);
        Ok(text.into_owned())
    }
}

/// A paragraph-properties run of a `StyleTextPropAtom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParagraphRun {
    /// Characters covered, in UTF-16 code units.
    count: u32,
    bullet: Option<bool>,
}

/// Bullet of the run covering the paragraph starting at `offset`.
fn run_bullet(runs: &[ParagraphRun], offset: usize) -> Option<bool> {
    let mut start = 0usize;
    for run in runs {
        let end = start + run.count as usize;
        if offset < end {
            return run.bullet;
        }
        start = end;
    }
    None
}

/// Parse the paragraph runs at the start of a `StyleTextPropAtom`.
///
/// Runs cover the text plus its final terminator. The atom may end early at
/// a run boundary; ending inside a run is an error.
fn read_paragraph_runs(data: &[u8], text_len: usize) -> Result<Vec<ParagraphRun>> {
    let mut reader = ByteReader::new(data);
    let mut runs = Vec::new();
    let mut covered = 0usize;

    while covered < text_len + 1 && !reader.is_empty() {
        let count = reader.u32()?;
        let _indent_level = reader.u16()?;
        let exception = read_paragraph_exception(&mut reader)?;
        covered += count as usize;
        runs.push(ParagraphRun {
            count,
            bullet: exception.bullet,
        });
    }

    Ok(runs)
}

struct ParagraphException {
    bullet: Option<bool>,
}

mod pf_masks {
    pub const HAS_BULLET: u32 = 0x0000_0001;
    pub const BULLET_FLAGS: u32 = 0x0000_000F;
    pub const BULLET_FONT: u32 = 0x0000_0010;
    pub const BULLET_COLOR: u32 = 0x0000_0020;
    pub const BULLET_SIZE: u32 = 0x0000_0040;
    pub const BULLET_CHAR: u32 = 0x0000_0080;
    pub const LEFT_MARGIN: u32 = 0x0000_0100;
    pub const INDENT: u32 = 0x0000_0400;
    pub const ALIGN: u32 = 0x0000_0800;
    pub const LINE_SPACING: u32 = 0x0000_1000;
    pub const SPACE_BEFORE: u32 = 0x0000_2000;
    pub const SPACE_AFTER: u32 = 0x0000_4000;
    pub const DEFAULT_TAB_SIZE: u32 = 0x0000_8000;
    pub const FONT_ALIGN: u32 = 0x0001_0000;
    pub const WRAP_FLAGS: u32 = 0x000E_0000;
    pub const TAB_STOPS: u32 = 0x0010_0000;
    pub const TEXT_DIRECTION: u32 = 0x0020_0000;
}

/// Read a `TextPFException`, keeping only the bullet setting.
fn read_paragraph_exception(reader: &mut ByteReader) -> Result<ParagraphException> {
    use self::pf_masks::*;

    let masks = reader.u32()?;
    let flags = if masks & BULLET_FLAGS != 0 { reader.u16()? } else { 0 };
    let bullet = (masks & HAS_BULLET != 0).then_some(flags & 0x0001 != 0);

    for (mask, size) in [
        (BULLET_CHAR, 2),
        (BULLET_FONT, 2),
        (BULLET_SIZE, 2),
        (BULLET_COLOR, 4),
        (ALIGN, 2),
        (LINE_SPACING, 2),
        (SPACE_BEFORE, 2),
        (SPACE_AFTER, 2),
        (LEFT_MARGIN, 2),
        (INDENT, 2),
        (DEFAULT_TAB_SIZE, 2),
    ] {
        if masks & mask != 0 {
            reader.skip(size)?;
        }
    }
    if masks & TAB_STOPS != 0 {
        let stops = reader.u16()? as usize;
        reader.skip(stops * 4)?;
    }
    for (mask, size) in [(FONT_ALIGN, 2), (WRAP_FLAGS, 2), (TEXT_DIRECTION, 2)] {
        if masks & mask != 0 {
            reader.skip(size)?;
        }
    }

    Ok(ParagraphException { bullet })
}

/// Cursor over little-endian fields; running past the end is an error.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn u16(&mut self) -> Result<u16> {
        let value = read_u16_le(self.data, self.pos).ok_or_else(|| self.truncated())?;
        self.pos += 2;
        Ok(value)
    }

    fn u32(&mut self) -> Result<u32> {
        let value = read_u32_le(self.data, self.pos).ok_or_else(|| self.truncated())?;
        self.pos += 4;
        Ok(value)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        if self.pos + len > self.data.len() {
            return Err(self.truncated());
        }
        self.pos += len;
        Ok(())
    }

    fn truncated(&self) -> Error {
        Error::PptParseError(format!("Style data truncated at byte {}", self.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(rec_type: u16, instance: u16, content: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(instance << 4).to_le_bytes());
        out.extend_from_slice(&rec_type.to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(content);
        out
    }

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    /// One paragraph run: count, indent level, masks, optional fields.
    fn pf_run(count: u32, masks: u32, fields: &[u8]) -> Vec<u8> {
        let mut out = count.to_le_bytes().to_vec();
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&masks.to_le_bytes());
        out.extend_from_slice(fields);
        out
    }

    fn body(records: Vec<u8>, masters: MasterBullets) -> PptTextBody {
        let len = records.len();
        PptTextBody::new(Arc::from(records), TextSource::Records(0..len), Arc::new(masters))
    }

    fn header(text_type: u32) -> Vec<u8> {
        atom(record_types::RT_TEXT_HEADER_ATOM, 0, &text_type.to_le_bytes())
    }

    fn summary(body: &PptTextBody) -> Vec<(String, bool)> {
        body.paragraphs()
            .unwrap()
            .iter()
            .map(|p| (p.runs.concat(), p.is_bullet()))
            .collect()
    }

    #[test]
    fn test_text_type_conversion() {
        assert_eq!(TextType::from_u32(0), TextType::Title);
        assert_eq!(TextType::from_u32(1), TextType::Body);
        assert_eq!(TextType::from_u32(2), TextType::Notes);
        assert_eq!(TextType::from_u32(99), TextType::Other);
        assert_eq!(TextType::HalfBody.parent(), Some(TextType::Body));
        assert_eq!(TextType::CenterTitle.parent(), Some(TextType::Title));
        assert_eq!(TextType::Other.parent(), None);
    }

    #[test]
    fn test_unicode_paragraphs() {
        let mut records = header(4);
        records.extend(atom(record_types::RT_TEXT_CHARS_ATOM, 0, &utf16("Hello\rWörld\u{000B}again")));
        let paragraphs = body(records, MasterBullets::default()).paragraphs().unwrap();

        let texts: Vec<String> = paragraphs.iter().map(|p| p.runs.concat()).collect();
        assert_eq!(texts, vec!["Hello", "Wörld\nagain"]);
    }

    #[test]
    fn test_ansi_text_is_windows_1252() {
        let mut records = header(4);
        records.extend(atom(record_types::RT_TEXT_BYTES_ATOM, 0, b"Caf\xE9 \x93quoted\x94 \x80"));
        assert_eq!(
            summary(&body(records, MasterBullets::default())),
            vec![("Café \u{201C}quoted\u{201D} €".to_string(), false)]
        );
    }

    #[test]
    fn test_odd_unicode_length_is_error() {
        let mut records = header(1);
        records.extend(atom(record_types::RT_TEXT_CHARS_ATOM, 0, b"abc"));
        assert!(matches!(
            body(records, MasterBullets::default()).paragraphs(),
            Err(Error::ShapeTextError(_))
        ));
    }

    #[test]
    fn test_missing_outline_is_error() {
        let b = PptTextBody::new(Arc::from(Vec::new()), TextSource::MissingOutline(3), Arc::default());
        assert!(matches!(b.paragraphs(), Err(Error::ShapeTextError(_))));
    }

    #[test]
    fn test_paragraph_runs_set_bullets() {
        // "Alpha\rBeta\rGamma": runs of 6 (bullet), 5 (bullet off), 6 (unspecified)
        let mut style = pf_run(6, 0x0001, &1u16.to_le_bytes());
        style.extend(pf_run(5, 0x0001 | 0x0080, &[0, 0, 0x22, 0x20]));
        style.extend(pf_run(6, 0x0800, &[1, 0]));

        let mut records = header(1);
        records.extend(atom(record_types::RT_TEXT_CHARS_ATOM, 0, &utf16("Alpha\rBeta\rGamma")));
        records.extend(atom(record_types::RT_STYLE_TEXT_PROP_ATOM, 0, &style));

        assert_eq!(
            summary(&body(records, MasterBullets::default())),
            vec![
                ("Alpha".to_string(), true),
                ("Beta".to_string(), false),
                ("Gamma".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_master_bullets_fill_unspecified_runs() {
        let mut masters = MasterBullets::default();
        masters.by_type.insert(TextType::Body, true);

        let mut records = header(7); // HalfBody falls back to Body
        records.extend(atom(record_types::RT_TEXT_CHARS_ATOM, 0, &utf16("One\rTwo")));
        let b = body(records.clone(), masters.clone());
        assert_eq!(summary(&b), vec![("One".to_string(), true), ("Two".to_string(), true)]);

        let mut title = header(0);
        title.extend(atom(record_types::RT_TEXT_CHARS_ATOM, 0, &utf16("Title")));
        assert_eq!(summary(&body(title, masters)), vec![("Title".to_string(), false)]);
    }

    #[test]
    fn test_truncated_style_fails_bullets_only() {
        let mut style = pf_run(4, 0x0001, &[]);
        style.truncate(style.len() - 1);

        let mut records = header(1);
        records.extend(atom(record_types::RT_TEXT_BYTES_ATOM, 0, b"Text"));
        records.extend(atom(record_types::RT_STYLE_TEXT_PROP_ATOM, 0, &style));

        let paragraphs = body(records, MasterBullets::default()).paragraphs().unwrap();
        assert_eq!(paragraphs[0].runs.concat(), "Text");
        assert!(paragraphs[0].bullet.is_err());
        assert!(!paragraphs[0].is_bullet());
    }

    #[test]
    fn test_exception_with_tab_stops_and_trailing_fields() {
        // tab stops (2 stops), font align, text direction, then a second run
        let mut fields = Vec::new();
        fields.extend_from_slice(&1u16.to_le_bytes()); // bullet flags
        fields.extend_from_slice(&2u16.to_le_bytes());
        fields.extend_from_slice(&[0; 8]);
        fields.extend_from_slice(&[0, 0]); // font align
        fields.extend_from_slice(&[0, 0]); // text direction
        let mut style = pf_run(3, 0x0001 | 0x0010_0000 | 0x0001_0000 | 0x0020_0000, &fields);
        style.extend(pf_run(3, 0x0001, &0u16.to_le_bytes()));

        let runs = read_paragraph_runs(&style, 5).unwrap();
        assert_eq!(
            runs,
            vec![
                ParagraphRun { count: 3, bullet: Some(true) },
                ParagraphRun { count: 3, bullet: Some(false) },
            ]
        );
        assert_eq!(run_bullet(&runs, 0), Some(true));
        assert_eq!(run_bullet(&runs, 3), Some(false));
        assert_eq!(run_bullet(&runs, 6), None);
    }

    #[test]
    fn test_master_styles() {
        // Body master (instance 1): one level, hasBullet + bullet on
        let mut content = 1u16.to_le_bytes().to_vec();
        content.extend_from_slice(&0x0001u32.to_le_bytes());
        content.extend_from_slice(&1u16.to_le_bytes());
        let mut records = atom(record_types::RT_TX_MASTER_STYLE_ATOM, 1, &content);

        // CenterBody master (instance 5) carries a level field: bullet off
        let mut content = 1u16.to_le_bytes().to_vec();
        content.extend_from_slice(&0u16.to_le_bytes());
        content.extend_from_slice(&0x0001u32.to_le_bytes());
        content.extend_from_slice(&0u16.to_le_bytes());
        records.extend(atom(record_types::RT_TX_MASTER_STYLE_ATOM, 5, &content));

        // A later Body atom does not override the first
        let mut content = 1u16.to_le_bytes().to_vec();
        content.extend_from_slice(&0x0001u32.to_le_bytes());
        content.extend_from_slice(&0u16.to_le_bytes());
        records.extend(atom(record_types::RT_TX_MASTER_STYLE_ATOM, 1, &content));

        let mut masters = MasterBullets::default();
        masters.add_styles(Records::new(&records, 0));
        assert_eq!(masters.bullet_for(TextType::Body), Some(true));
        assert_eq!(masters.bullet_for(TextType::CenterBody), Some(false));
        assert_eq!(masters.bullet_for(TextType::QuarterBody), Some(true));
        assert_eq!(masters.bullet_for(TextType::Title), None);
        assert!(!masters.is_empty());
    }
}
