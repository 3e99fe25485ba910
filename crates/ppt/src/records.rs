//! Record headers and bounded iteration over PowerPoint and OfficeArt records.
//!
//! Both record families share the 8-byte header: `recVer` (4 bits) and
//! `recInstance` (12 bits), `recType` (u16), `recLen` (u32).

use deck_core::{Error, Result};

/// Size of a record header in bytes.
pub(crate) const HEADER_LEN: usize = 8;

/// `recVer` value marking a container record.
const CONTAINER_VERSION: u8 = 0x0F;

/// Record type constants for PPT file format.
pub(crate) mod record_types {
    pub const RT_DOCUMENT: u16 = 0x03E8;
    pub const RT_SLIDE: u16 = 0x03EE;
    pub const RT_ENVIRONMENT: u16 = 0x03F2;
    pub const RT_SLIDE_PERSIST_ATOM: u16 = 0x03F3;
    pub const RT_MAIN_MASTER: u16 = 0x03F8;
    pub const RT_PPDRAWING: u16 = 0x040C;
    pub const RT_OUTLINE_TEXT_REF_ATOM: u16 = 0x0F9E;
    pub const RT_TEXT_HEADER_ATOM: u16 = 0x0F9F;
    pub const RT_TEXT_CHARS_ATOM: u16 = 0x0FA0;
    pub const RT_STYLE_TEXT_PROP_ATOM: u16 = 0x0FA1;
    pub const RT_TX_MASTER_STYLE_ATOM: u16 = 0x0FA3;
    pub const RT_TEXT_BYTES_ATOM: u16 = 0x0FA8;
    pub const RT_SLIDE_LIST_WITH_TEXT: u16 = 0x0FF0;
    pub const RT_USER_EDIT_ATOM: u16 = 0x0FF5;
    pub const RT_CURRENT_USER_ATOM: u16 = 0x0FF6;
    pub const RT_PERSIST_DIRECTORY_ATOM: u16 = 0x1772;
}

/// OfficeArt (Escher) record types used in slide drawings.
pub(crate) mod escher_types {
    pub const DG_CONTAINER: u16 = 0xF002;
    pub const SPGR_CONTAINER: u16 = 0xF003;
    pub const SP_CONTAINER: u16 = 0xF004;
    pub const FSP: u16 = 0xF00A;
    pub const FOPT: u16 = 0xF00B;
    pub const CLIENT_TEXTBOX: u16 = 0xF00D;
    pub const CHILD_ANCHOR: u16 = 0xF00F;
    pub const TERTIARY_FOPT: u16 = 0xF122;
}

/// A record borrowed from a stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Record<'a> {
    pub version: u8,
    pub instance: u16,
    pub rec_type: u16,
    /// Offset of the record header within the stream.
    pub offset: usize,
    /// Record content (without header).
    pub data: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn is_container(&self) -> bool {
        self.version == CONTAINER_VERSION
    }

    /// Offset just past the end of this record.
    pub fn end(&self) -> usize {
        self.offset + HEADER_LEN + self.data.len()
    }

    /// Offset of the record content within the stream.
    pub fn content_offset(&self) -> usize {
        self.offset + HEADER_LEN
    }

    /// Child records of a container; atoms have none.
    pub fn children(&self) -> Records<'a> {
        let data = if self.is_container() { self.data } else { &[] };
        Records::new(data, self.content_offset())
    }

    /// First direct child with the given type.
    pub fn child(&self, rec_type: u16) -> Result<Option<Record<'a>>> {
        for child in self.children() {
            let child = child?;
            if child.rec_type == rec_type {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

/// Read the record whose header starts at `offset` in `stream`.
pub(crate) fn read_record_at(stream: &[u8], offset: usize) -> Result<Record<'_>> {
    let header = stream
        .get(offset..)
        .ok_or_else(|| Error::CorruptedFile(format!("Record offset {} beyond stream end", offset)))?;
    let mut records = Records::new(header, offset);
    match records.next() {
        Some(record) => record,
        None => Err(Error::CorruptedFile(format!("No record at offset {}", offset))),
    }
}

/// Sequential records of a byte range; stops at the first malformed record.
pub(crate) struct Records<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Records<'a> {
    /// Iterate `data`, whose first byte sits at `base` in the stream.
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }

        let pos = self.pos;
        let (Some(ver_instance), Some(rec_type), Some(rec_len)) = (
            read_u16_le(self.data, pos),
            read_u16_le(self.data, pos + 2),
            read_u32_le(self.data, pos + 4),
        ) else {
            self.pos = self.data.len();
            return Some(Err(Error::CorruptedFile(format!(
                "Truncated record header at offset {}",
                self.base + pos
            ))));
        };

        let content_start = pos + HEADER_LEN;
        let content = content_start
            .checked_add(rec_len as usize)
            .and_then(|content_end| self.data.get(content_start..content_end));
        let Some(content) = content else {
            self.pos = self.data.len();
            return Some(Err(Error::CorruptedFile(format!(
                "Record 0x{:04X} at offset {} overruns its parent ({} bytes declared)",
                rec_type,
                self.base + pos,
                rec_len
            ))));
        };

        self.pos = content_start + content.len();
        Some(Ok(Record {
            version: (ver_instance & 0x0F) as u8,
            instance: ver_instance >> 4,
            rec_type,
            offset: self.base + pos,
            data: content,
        }))
    }
}

/// Read a little-endian u16 from a byte slice.
pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a little-endian u32 from a byte slice.
pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a little-endian i32 from a byte slice.
pub(crate) fn read_i32_le(data: &[u8], offset: usize) -> Option<i32> {
    read_u32_le(data, offset).map(|v| v as i32)
}
