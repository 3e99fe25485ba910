//! Current User stream, user edits and the persist object directory.

use crate::records::{read_record_at, read_u16_le, read_u32_le, record_types};
use deck_core::{Error, Result};
use std::collections::{HashMap, HashSet};

/// `headerToken` of an unencrypted document.
pub(crate) const HEADER_TOKEN: u32 = 0xE391_C05F;

/// `headerToken` of an encrypted document.
pub(crate) const ENCRYPTED_HEADER_TOKEN: u32 = 0xF3D1_C4DF;

/// The `CurrentUserAtom` of the `Current User` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CurrentUser {
    /// Stream offset of the most recent `UserEditAtom`.
    pub offset_to_current_edit: u32,
}

impl CurrentUser {
    /// Parse the stream content.
    ///
    /// Encrypted documents are reported as [`Error::UnsupportedFormat`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        let record = read_record_at(data, 0)?;
        if record.rec_type != record_types::RT_CURRENT_USER_ATOM {
            return Err(Error::PptParseError(format!(
                "Current User stream starts with record 0x{:04X}",
                record.rec_type
            )));
        }

        let token = read_u32_le(record.data, 4)
            .ok_or_else(|| Error::PptParseError("Current User atom too short".to_string()))?;
        match token {
            HEADER_TOKEN => {}
            ENCRYPTED_HEADER_TOKEN => {
                return Err(Error::UnsupportedFormat(
                    "Encrypted PowerPoint documents are not supported".to_string(),
                ));
            }
            other => {
                return Err(Error::PptParseError(format!("Unknown Current User token 0x{:08X}", other)));
            }
        }

        let offset_to_current_edit = read_u32_le(record.data, 8)
            .ok_or_else(|| Error::PptParseError("Current User atom too short".to_string()))?;

        Ok(Self { offset_to_current_edit })
    }
}

/// A `UserEditAtom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UserEdit {
    pub last_slide_id_ref: u32,
    pub version: u16,
    /// Offset of the previous edit, 0 for the first one.
    pub offset_last_edit: u32,
    pub offset_persist_directory: u32,
    pub doc_persist_id_ref: u32,
}

impl UserEdit {
    const MIN_LEN: usize = 20;

    /// Read the user edit whose record starts at `offset`.
    pub fn read(stream: &[u8], offset: u32) -> Result<Self> {
        let record = read_record_at(stream, offset as usize)?;
        if record.rec_type != record_types::RT_USER_EDIT_ATOM {
            return Err(Error::PptParseError(format!(
                "Expected UserEditAtom at offset {}, found record 0x{:04X}",
                offset, record.rec_type
            )));
        }
        if record.data.len() < Self::MIN_LEN {
            return Err(Error::PptParseError(format!("UserEditAtom at offset {} too short", offset)));
        }

        let d = record.data;
        let field = |at: usize| read_u32_le(d, at).unwrap_or_default();
        Ok(Self {
            last_slide_id_ref: field(0),
            version: read_u16_le(d, 4).unwrap_or_default(),
            offset_last_edit: field(8),
            offset_persist_directory: field(12),
            doc_persist_id_ref: field(16),
        })
    }
}

/// Stream offsets of persist objects, newest edit winning.
#[derive(Debug, Default, Clone)]
pub(crate) struct PersistDirectory {
    offsets: HashMap<u32, u32>,
}

impl PersistDirectory {
    /// Walk the user edit chain starting at `current_edit`.
    ///
    /// Returns the directory and the document persist id of the newest edit.
    pub fn load(stream: &[u8], current_edit: u32) -> Result<(Self, u32)> {
        let mut directory = Self::default();
        let mut visited = HashSet::new();
        let mut next = current_edit;
        let mut document_ref = None;

        loop {
            if !visited.insert(next) {
                log::warn!("User edit chain loops back to offset {}, stopping", next);
                break;
            }

            let edit = UserEdit::read(stream, next)?;
            log::debug!(
                "User edit at {}: version {}, last slide {}, directory at {}, document ref {}",
                next,
                edit.version,
                edit.last_slide_id_ref,
                edit.offset_persist_directory,
                edit.doc_persist_id_ref
            );
            document_ref.get_or_insert(edit.doc_persist_id_ref);
            directory.merge(stream, edit.offset_persist_directory)?;

            if edit.offset_last_edit == 0 {
                break;
            }
            next = edit.offset_last_edit;
        }

        let document_ref =
            document_ref.ok_or_else(|| Error::PptParseError("Empty user edit chain".to_string()))?;
        Ok((directory, document_ref))
    }

    /// Rebuild a directory from `PersistDirectoryAtom` offsets, newest first.
    ///
    /// Unreadable atoms are skipped.
    pub fn from_atoms(stream: &[u8], newest_first: impl IntoIterator<Item = u32>) -> Self {
        let mut directory = Self::default();
        for offset in newest_first {
            if let Err(e) = directory.merge(stream, offset) {
                log::warn!("Skipping persist directory at offset {}: {}", offset, e);
            }
        }
        directory
    }

    /// Add the entries of an older directory atom without overriding newer ones.
    fn merge(&mut self, stream: &[u8], offset: u32) -> Result<()> {
        let record = read_record_at(stream, offset as usize)?;
        if record.rec_type != record_types::RT_PERSIST_DIRECTORY_ATOM {
            return Err(Error::PptParseError(format!(
                "Expected PersistDirectoryAtom at offset {}, found record 0x{:04X}",
                offset, record.rec_type
            )));
        }

        let data = record.data;
        let mut pos = 0;
        while pos < data.len() {
            let info = read_u32_le(data, pos)
                .ok_or_else(|| Error::PptParseError("Truncated persist directory entry".to_string()))?;
            let first_id = info & 0x000F_FFFF;
            let count = info >> 20;
            pos += 4;

            for i in 0..count {
                let object_offset = read_u32_le(data, pos)
                    .ok_or_else(|| Error::PptParseError("Truncated persist directory entry".to_string()))?;
                self.offsets.entry(first_id + i).or_insert(object_offset);
                pos += 4;
            }
        }

        Ok(())
    }

    /// Stream offset of a persist object.
    pub fn offset_of(&self, persist_id: u32) -> Option<u32> {
        self.offsets.get(&persist_id).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(rec_type: u16, content: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&rec_type.to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(content);
        out
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn user_edit(last_edit: u32, directory: u32, document: u32) -> Vec<u8> {
        let mut content = words(&[0x100]);
        content.extend_from_slice(&[0x00, 0x00, 0x00, 0x03]);
        content.extend(words(&[last_edit, directory, document, 10, 1]));
        record(record_types::RT_USER_EDIT_ATOM, &content)
    }

    fn current_user(token: u32, offset: u32) -> Vec<u8> {
        let mut content = words(&[0x14, token, offset]);
        content.extend_from_slice(&[0, 0, 0xF4, 0x03, 3, 0, 0, 0]);
        record(record_types::RT_CURRENT_USER_ATOM, &content)
    }

    #[test]
    fn test_current_user() {
        let cu = CurrentUser::parse(&current_user(HEADER_TOKEN, 4242)).unwrap();
        assert_eq!(cu.offset_to_current_edit, 4242);
    }

    #[test]
    fn test_current_user_encrypted() {
        let result = CurrentUser::parse(&current_user(ENCRYPTED_HEADER_TOKEN, 0));
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_current_user_bad_token() {
        let result = CurrentUser::parse(&current_user(0x1234_5678, 0));
        assert!(matches!(result, Err(Error::PptParseError(_))));
    }

    #[test]
    fn test_edit_chain_newest_wins() {
        // Older edit: ids 1..=2 at offsets 1000/2000, document ref 1
        let mut stream = record(
            record_types::RT_PERSIST_DIRECTORY_ATOM,
            &words(&[1 | (2 << 20), 1000, 2000]),
        );
        let old_edit = stream.len() as u32;
        stream.extend(user_edit(0, 0, 1));

        // Newer edit: id 2 moved to 3000, id 5 added
        let new_directory = stream.len() as u32;
        stream.extend(record(
            record_types::RT_PERSIST_DIRECTORY_ATOM,
            &words(&[2 | (1 << 20), 3000, 5 | (1 << 20), 5000]),
        ));
        let new_edit = stream.len() as u32;
        stream.extend(user_edit(old_edit, new_directory, 1));

        let (directory, document) = PersistDirectory::load(&stream, new_edit).unwrap();
        assert_eq!(document, 1);
        assert_eq!(directory.offset_of(1), Some(1000));
        assert_eq!(directory.offset_of(2), Some(3000));
        assert_eq!(directory.offset_of(5), Some(5000));
        assert_eq!(directory.offset_of(3), None);
        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn test_cyclic_edit_chain_terminates() {
        let mut stream = record(record_types::RT_PERSIST_DIRECTORY_ATOM, &words(&[1 | (1 << 20), 77]));
        let edit = stream.len() as u32;
        // Edit pointing at itself as its predecessor
        stream.extend(user_edit(edit, 0, 1));

        let (directory, _) = PersistDirectory::load(&stream, edit).unwrap();
        assert_eq!(directory.offset_of(1), Some(77));
    }

    #[test]
    fn test_bad_edit_offset() {
        let stream = record(record_types::RT_PERSIST_DIRECTORY_ATOM, &words(&[1 | (1 << 20), 77]));
        assert!(PersistDirectory::load(&stream, 0).is_err());
        assert!(PersistDirectory::load(&stream, 9999).is_err());
    }

    #[test]
    fn test_from_atoms_newest_first() {
        let mut stream = record(record_types::RT_PERSIST_DIRECTORY_ATOM, &words(&[1 | (2 << 20), 100, 200]));
        let newer = stream.len() as u32;
        stream.extend(record(record_types::RT_PERSIST_DIRECTORY_ATOM, &words(&[2 | (1 << 20), 300])));

        // Offset 9999 is not a directory atom and is skipped
        let directory = PersistDirectory::from_atoms(&stream, [newer, 9999, 0]);
        assert_eq!(directory.offset_of(1), Some(100));
        assert_eq!(directory.offset_of(2), Some(300));
    }
}
