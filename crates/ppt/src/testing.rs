//! In-memory PPT files for tests.
//!
//! [`PptBuilder`] lays out the `PowerPoint Document` stream as slide
//! containers, one main master, the document container, a persist directory
//! and a single user edit. Persist ids are 1 for the document, 2 for the
//! master and 3.. for slides.

use crate::persist::{ENCRYPTED_HEADER_TOKEN, HEADER_TOKEN};
use crate::records::{escher_types, record_types};
use std::io::{self, Cursor, Write};

/// Text type of titles.
pub const TITLE: u32 = 0;
/// Text type of body placeholders.
pub const BODY: u32 = 1;
/// Text type of free text.
pub const OTHER: u32 = 4;

/// `SlideAtom` record type.
const SLIDE_ATOM: u16 = 0x03EF;

const FSP_GROUP: u32 = 0x0001;
const FSP_CHILD: u32 = 0x0002;
const FSP_PATRIARCH: u32 = 0x0004;
const FSP_DELETED: u32 = 0x0008;
const FSP_HAVE_ANCHOR: u32 = 0x0200;
const FSP_HAVE_SPT: u32 = 0x0800;

fn record(version: u16, instance: u16, rec_type: u16, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + content.len());
    out.extend_from_slice(&((instance << 4) | (version & 0x0F)).to_le_bytes());
    out.extend_from_slice(&rec_type.to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
    out
}

/// An atom record.
pub fn atom(rec_type: u16, instance: u16, content: &[u8]) -> Vec<u8> {
    record(0, instance, rec_type, content)
}

/// A container record holding `children`.
pub fn container(rec_type: u16, instance: u16, children: &[Vec<u8>]) -> Vec<u8> {
    record(0x0F, instance, rec_type, &children.concat())
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn fsp(flags: u32) -> Vec<u8> {
    let mut content = 1024u32.to_le_bytes().to_vec();
    content.extend_from_slice(&flags.to_le_bytes());
    record(2, 1, escher_types::FSP, &content)
}

fn client_anchor() -> Vec<u8> {
    record(0, 0, 0xF010, &[0; 8])
}

fn child_anchor(left: i32, top: i32) -> Vec<u8> {
    let content: Vec<u8> = [left, top, left + 1000, top + 500]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    record(0, 0, escher_types::CHILD_ANCHOR, &content)
}

fn text_header(text_type: u32) -> Vec<u8> {
    atom(record_types::RT_TEXT_HEADER_ATOM, 0, &text_type.to_le_bytes())
}

fn chars(text: &str) -> Vec<u8> {
    atom(record_types::RT_TEXT_CHARS_ATOM, 0, &utf16(text))
}

fn textbox(records: &[Vec<u8>]) -> Vec<u8> {
    container(escher_types::CLIENT_TEXTBOX, 0, records)
}

fn shape(flags: u32, extra: &[Vec<u8>]) -> Vec<u8> {
    let mut children = vec![fsp(flags), client_anchor()];
    children.extend_from_slice(extra);
    container(escher_types::SP_CONTAINER, 0, &children)
}

/// A text box with UTF-16 text.
pub fn text_shape(text_type: u32, text: &str) -> Vec<u8> {
    shape(
        FSP_HAVE_ANCHOR | FSP_HAVE_SPT,
        &[textbox(&[text_header(text_type), chars(text)])],
    )
}

/// A text box with Windows-1252 bytes.
pub fn ansi_text_shape(text_type: u32, text: &[u8]) -> Vec<u8> {
    shape(
        FSP_HAVE_ANCHOR | FSP_HAVE_SPT,
        &[textbox(&[
            text_header(text_type),
            atom(record_types::RT_TEXT_BYTES_ATOM, 0, text),
        ])],
    )
}

/// A free text box whose paragraph style turns bullets on for every item.
pub fn bullet_shape(items: &[&str]) -> Vec<u8> {
    let text = items.join("\r");
    let count = text.encode_utf16().count() as u32 + 1;

    let mut style = count.to_le_bytes().to_vec();
    style.extend_from_slice(&0u16.to_le_bytes());
    style.extend_from_slice(&0x0001u32.to_le_bytes());
    style.extend_from_slice(&0x0001u16.to_le_bytes());

    shape(
        FSP_HAVE_ANCHOR | FSP_HAVE_SPT,
        &[textbox(&[
            text_header(OTHER),
            chars(&text),
            atom(record_types::RT_STYLE_TEXT_PROP_ATOM, 0, &style),
        ])],
    )
}

/// A placeholder whose text is the slide's `index`-th outline text block.
pub fn outline_shape(index: u32) -> Vec<u8> {
    shape(
        FSP_HAVE_ANCHOR | FSP_HAVE_SPT,
        &[textbox(&[atom(
            record_types::RT_OUTLINE_TEXT_REF_ATOM,
            0,
            &index.to_le_bytes(),
        )])],
    )
}

/// A text box whose UTF-16 atom has an odd byte length.
pub fn broken_text_shape() -> Vec<u8> {
    shape(
        FSP_HAVE_ANCHOR | FSP_HAVE_SPT,
        &[textbox(&[
            text_header(OTHER),
            atom(record_types::RT_TEXT_CHARS_ATOM, 0, b"odd"),
        ])],
    )
}

/// A shape without text, such as a picture.
pub fn picture_shape() -> Vec<u8> {
    shape(FSP_HAVE_ANCHOR | FSP_HAVE_SPT, &[])
}

/// A deleted text box.
pub fn deleted_shape(text: &str) -> Vec<u8> {
    shape(
        FSP_DELETED | FSP_HAVE_ANCHOR,
        &[textbox(&[text_header(OTHER), chars(text)])],
    )
}

fn group_header(extra: &[Vec<u8>]) -> Vec<u8> {
    shape(FSP_GROUP | FSP_HAVE_ANCHOR, extra)
}

/// A group of shapes.
pub fn group(children: &[Vec<u8>]) -> Vec<u8> {
    let mut records = vec![group_header(&[])];
    records.extend_from_slice(children);
    container(escher_types::SPGR_CONTAINER, 0, &records)
}

/// A table group. Cells are written column by column, with border lines
/// between them, so only their anchors give the row-major order.
pub fn table(rows: &[&[&str]]) -> Vec<u8> {
    // tableProperties (0x039F) in the group header's property table
    let mut properties = 0x039Fu16.to_le_bytes().to_vec();
    properties.extend_from_slice(&1u32.to_le_bytes());
    let fopt = record(3, 1, escher_types::FOPT, &properties);

    let mut records = vec![group_header(&[fopt])];
    let columns = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    for col in 0..columns {
        for (r, row) in rows.iter().enumerate() {
            let Some(text) = row.get(col) else {
                continue;
            };
            let (left, top) = (col as i32 * 1000, r as i32 * 500);
            records.push(container(
                escher_types::SP_CONTAINER,
                0,
                &[
                    fsp(FSP_CHILD | FSP_HAVE_ANCHOR | FSP_HAVE_SPT),
                    child_anchor(left, top),
                    textbox(&[text_header(OTHER), chars(text)]),
                ],
            ));
        }
        records.push(container(
            escher_types::SP_CONTAINER,
            0,
            &[fsp(FSP_CHILD | FSP_HAVE_ANCHOR), child_anchor(col as i32 * 1000, 0)],
        ));
    }
    container(escher_types::SPGR_CONTAINER, 0, &records)
}

/// A `SlideContainer` whose drawing holds `shapes`.
pub fn slide_container(shapes: &[Vec<u8>]) -> Vec<u8> {
    let mut tree = vec![shape(FSP_GROUP | FSP_PATRIARCH, &[])];
    tree.extend_from_slice(shapes);

    let drawing = container(
        record_types::RT_PPDRAWING,
        0,
        &[container(
            escher_types::DG_CONTAINER,
            0,
            &[
                record(0, 1, 0xF008, &[0; 8]),
                container(escher_types::SPGR_CONTAINER, 0, &tree),
            ],
        )],
    );
    container(
        record_types::RT_SLIDE,
        0,
        &[atom(SLIDE_ATOM, 2, &[0; 24]), drawing],
    )
}

fn master_style(text_type: u16, bullet: bool) -> Vec<u8> {
    let mut content = 1u16.to_le_bytes().to_vec();
    if text_type >= 5 {
        content.extend_from_slice(&0u16.to_le_bytes());
    }
    content.extend_from_slice(&0x0001u32.to_le_bytes());
    content.extend_from_slice(&u16::from(bullet).to_le_bytes());
    // Character exception: no properties
    content.extend_from_slice(&0u32.to_le_bytes());
    atom(record_types::RT_TX_MASTER_STYLE_ATOM, text_type, &content)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentUserMode {
    Plain,
    Encrypted,
    Missing,
}

#[derive(Debug, Clone)]
struct SlideFixture {
    shapes: Vec<Vec<u8>>,
    outline: Vec<(u32, String)>,
}

/// Builder for a PPT compound file.
#[derive(Debug, Clone)]
pub struct PptBuilder {
    slides: Vec<SlideFixture>,
    body_bullets: bool,
    current_user: CurrentUserMode,
}

impl Default for PptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PptBuilder {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            body_bullets: true,
            current_user: CurrentUserMode::Plain,
        }
    }

    /// Append a slide with the given shape records.
    pub fn slide(self, shapes: Vec<Vec<u8>>) -> Self {
        self.slide_with_outline(shapes, &[])
    }

    /// Append a slide whose outline text blocks are `(text type, text)` pairs.
    pub fn slide_with_outline(mut self, shapes: Vec<Vec<u8>>, outline: &[(u32, &str)]) -> Self {
        self.slides.push(SlideFixture {
            shapes,
            outline: outline.iter().map(|(t, s)| (*t, s.to_string())).collect(),
        });
        self
    }

    /// Whether the master's body style bullets first-level paragraphs.
    pub fn master_body_bullets(mut self, enabled: bool) -> Self {
        self.body_bullets = enabled;
        self
    }

    /// Omit the `Current User` stream.
    pub fn without_current_user(mut self) -> Self {
        self.current_user = CurrentUserMode::Missing;
        self
    }

    /// Mark the document as encrypted in the `Current User` stream.
    pub fn encrypted(mut self) -> Self {
        self.current_user = CurrentUserMode::Encrypted;
        self
    }

    /// The `PowerPoint Document` stream and the `Current User` stream.
    pub fn streams(&self) -> (Vec<u8>, Vec<u8>) {
        let mut stream = Vec::new();

        let mut slide_offsets = Vec::new();
        for slide in &self.slides {
            slide_offsets.push(stream.len() as u32);
            stream.extend(slide_container(&slide.shapes));
        }

        let master_offset = stream.len() as u32;
        stream.extend(container(
            record_types::RT_MAIN_MASTER,
            0,
            &[
                atom(SLIDE_ATOM, 2, &[0; 24]),
                master_style(TITLE as u16, false),
                master_style(BODY as u16, self.body_bullets),
            ],
        ));

        let document_offset = stream.len() as u32;
        stream.extend(self.document());

        let directory_offset = stream.len() as u32;
        let mut entries = vec![1 | ((self.slides.len() as u32 + 2) << 20), document_offset, master_offset];
        entries.extend(&slide_offsets);
        let entries: Vec<u8> = entries.iter().flat_map(|v| v.to_le_bytes()).collect();
        stream.extend(atom(record_types::RT_PERSIST_DIRECTORY_ATOM, 0, &entries));

        let edit_offset = stream.len() as u32;
        let mut edit = 256u32.to_le_bytes().to_vec();
        edit.extend_from_slice(&[0, 0, 0, 3]);
        for value in [0, directory_offset, 1, self.slides.len() as u32 + 3] {
            edit.extend_from_slice(&value.to_le_bytes());
        }
        edit.extend_from_slice(&[1, 0, 0, 0]);
        stream.extend(atom(record_types::RT_USER_EDIT_ATOM, 0, &edit));

        let token = match self.current_user {
            CurrentUserMode::Encrypted => ENCRYPTED_HEADER_TOKEN,
            _ => HEADER_TOKEN,
        };
        let mut user = Vec::new();
        for value in [0x14, token, edit_offset] {
            user.extend_from_slice(&value.to_le_bytes());
        }
        user.extend_from_slice(&4u16.to_le_bytes());
        user.extend_from_slice(&0x03F4u16.to_le_bytes());
        user.extend_from_slice(&[3, 0, 0, 0]);
        user.extend_from_slice(b"Test");
        user.extend_from_slice(&8u32.to_le_bytes());
        let current_user = atom(record_types::RT_CURRENT_USER_ATOM, 0, &user);

        (stream, current_user)
    }

    fn document(&self) -> Vec<u8> {
        let persist_atom = |persist_ref: u32, slide_id: u32, texts: usize| {
            let mut content = Vec::new();
            for value in [persist_ref, 0, texts as u32, slide_id, 0] {
                content.extend_from_slice(&value.to_le_bytes());
            }
            atom(record_types::RT_SLIDE_PERSIST_ATOM, 0, &content)
        };

        let mut slide_list = Vec::new();
        for (i, slide) in self.slides.iter().enumerate() {
            slide_list.push(persist_atom(3 + i as u32, 256 + i as u32, slide.outline.len()));
            for (text_type, text) in &slide.outline {
                slide_list.push(text_header(*text_type));
                slide_list.push(chars(text));
            }
        }

        container(
            record_types::RT_DOCUMENT,
            0,
            &[
                atom(0x03E9, 1, &[0; 40]),
                container(record_types::RT_ENVIRONMENT, 0, &[master_style(OTHER as u16, false)]),
                container(
                    record_types::RT_SLIDE_LIST_WITH_TEXT,
                    1,
                    &[persist_atom(2, 0x8000_0000, 0)],
                ),
                container(record_types::RT_SLIDE_LIST_WITH_TEXT, 0, &slide_list),
                atom(0x03EA, 0, &[]),
            ],
        )
    }

    /// Serialize the compound file.
    pub fn build(&self) -> io::Result<Vec<u8>> {
        let (stream, current_user) = self.streams();
        match self.current_user {
            CurrentUserMode::Missing => compound_file(&[("/PowerPoint Document", stream.as_slice())]),
            _ => compound_file(&[
                ("/Current User", current_user.as_slice()),
                ("/PowerPoint Document", stream.as_slice()),
            ]),
        }
    }
}

/// Write a compound file from `(stream path, content)` pairs.
pub fn compound_file(streams: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let mut comp = cfb::CompoundFile::create(Cursor::new(Vec::new()))?;
    for (path, data) in streams {
        let mut stream = comp.create_stream(path)?;
        stream.write_all(data)?;
        stream.flush()?;
    }
    comp.flush()?;
    Ok(comp.into_inner().into_inner())
}
