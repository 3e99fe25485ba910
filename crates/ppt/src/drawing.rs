//! Shape trees of slide drawings (`PPDrawing` / OfficeArt records).

use crate::records::{escher_types, read_i32_le, read_u16_le, read_u32_le, record_types, Record};
use crate::text::{MasterBullets, PptTextBody, TextSource};
use deck_core::{Result, Shape, Table};
use std::ops::Range;
use std::sync::Arc;

type PptShape = Shape<PptTextBody>;

/// FSP flag: the shape is a group.
const FSP_GROUP: u32 = 0x0001;
/// FSP flag: the shape has been deleted.
const FSP_DELETED: u32 = 0x0008;

/// Property id of `tableProperties` in a shape property table.
const PID_TABLE_PROPERTIES: u16 = 0x039F;

/// Everything a slide's shapes need to build their text bodies.
pub(crate) struct DrawingContext<'a> {
    pub stream: &'a Arc<[u8]>,
    pub masters: &'a Arc<MasterBullets>,
    /// Text blocks of this slide in the slide list, for outline references.
    pub text_blocks: &'a [Range<usize>],
    pub max_depth: usize,
}

impl DrawingContext<'_> {
    /// Top-level shapes of a `SlideContainer`.
    pub fn slide_shapes(&self, slide: &Record) -> Result<Vec<PptShape>> {
        let Some(drawing) = slide.child(record_types::RT_PPDRAWING)? else {
            return Ok(Vec::new());
        };
        let Some(dg) = drawing.child(escher_types::DG_CONTAINER)? else {
            return Ok(Vec::new());
        };
        let Some(root) = dg.child(escher_types::SPGR_CONTAINER)? else {
            return Ok(Vec::new());
        };
        self.group_children(&root, 0)
    }

    /// Member shapes of a group, skipping the group's own header shape.
    fn group_children(&self, group: &Record, depth: usize) -> Result<Vec<PptShape>> {
        let mut shapes = Vec::new();
        let mut seen_header = false;

        for child in group.children() {
            let child = child?;
            match child.rec_type {
                escher_types::SP_CONTAINER if !seen_header => seen_header = true,
                escher_types::SP_CONTAINER => shapes.extend(self.shape(&child)?),
                escher_types::SPGR_CONTAINER => shapes.extend(self.group(&child, depth)?),
                _ => {}
            }
        }

        Ok(shapes)
    }

    /// A nested `SpgrContainer`: a table or a plain group.
    fn group(&self, group: &Record, depth: usize) -> Result<Option<PptShape>> {
        let header = group.child(escher_types::SP_CONTAINER)?;
        if let Some(header) = &header {
            if shape_flags(header)? & FSP_DELETED != 0 {
                return Ok(None);
            }
            if has_table_properties(header)? {
                return self.table(group).map(|table| Some(Shape::Table(table)));
            }
        }

        if depth >= self.max_depth {
            log::debug!("Group nesting deeper than {} levels not parsed", self.max_depth);
            return Ok(Some(Shape::Group(Vec::new())));
        }
        Ok(Some(Shape::Group(self.group_children(group, depth + 1)?)))
    }

    /// A leaf `SpContainer`; deleted shapes yield nothing.
    fn shape(&self, sp: &Record) -> Result<Option<PptShape>> {
        let flags = shape_flags(sp)?;
        if flags & FSP_DELETED != 0 {
            return Ok(None);
        }
        if flags & FSP_GROUP != 0 {
            log::debug!("Group header outside its group at offset {}", sp.offset);
            return Ok(Some(Shape::Other));
        }

        Ok(Some(match sp.child(escher_types::CLIENT_TEXTBOX)? {
            Some(textbox) => Shape::Text(self.body(&textbox)?),
            None => Shape::Other,
        }))
    }

    /// Table cells are the member text shapes, ordered by anchor top then left.
    fn table(&self, group: &Record) -> Result<Table<PptTextBody>> {
        let mut cells: Vec<(i32, i32, PptTextBody)> = Vec::new();
        let mut seen_header = false;

        for child in group.children() {
            let child = child?;
            if child.rec_type != escher_types::SP_CONTAINER {
                continue;
            }
            if !seen_header {
                seen_header = true;
                continue;
            }
            if shape_flags(&child)? & FSP_DELETED != 0 {
                continue;
            }
            let Some(textbox) = child.child(escher_types::CLIENT_TEXTBOX)? else {
                continue;
            };
            let (left, top) = match child.child(escher_types::CHILD_ANCHOR)? {
                Some(anchor) => (
                    read_i32_le(anchor.data, 0).unwrap_or_default(),
                    read_i32_le(anchor.data, 4).unwrap_or_default(),
                ),
                None => (0, 0),
            };
            cells.push((top, left, self.body(&textbox)?));
        }

        cells.sort_by_key(|(top, left, _)| (*top, *left));

        let mut rows: Vec<Vec<PptTextBody>> = Vec::new();
        let mut current_top = None;
        for (top, _, body) in cells {
            match rows.last_mut() {
                Some(row) if current_top == Some(top) => row.push(body),
                _ => {
                    rows.push(vec![body]);
                    current_top = Some(top);
                }
            }
        }

        Ok(Table::new(rows))
    }

    /// Text body of a `ClientTextbox`: inline atoms or an outline reference.
    fn body(&self, textbox: &Record) -> Result<PptTextBody> {
        let source = match textbox.child(record_types::RT_OUTLINE_TEXT_REF_ATOM)? {
            Some(outline) => {
                let index = read_u32_le(outline.data, 0).unwrap_or(u32::MAX);
                match self.text_blocks.get(index as usize) {
                    Some(block) => TextSource::Records(block.clone()),
                    None => TextSource::MissingOutline(index),
                }
            }
            None => TextSource::Records(textbox.content_offset()..textbox.end()),
        };
        Ok(PptTextBody::new(Arc::clone(self.stream), source, Arc::clone(self.masters)))
    }
}

/// `FSP` flags of a shape container, 0 when it has no FSP.
fn shape_flags(sp: &Record) -> Result<u32> {
    Ok(sp
        .child(escher_types::FSP)?
        .and_then(|fsp| read_u32_le(fsp.data, 4))
        .unwrap_or_default())
}

/// Whether a shape's property tables carry `tableProperties`.
fn has_table_properties(sp: &Record) -> Result<bool> {
    for child in sp.children() {
        let child = child?;
        if child.rec_type != escher_types::FOPT && child.rec_type != escher_types::TERTIARY_FOPT {
            continue;
        }
        for i in 0..child.instance as usize {
            let Some(opid) = read_u16_le(child.data, i * 6) else {
                break;
            };
            if opid & 0x3FFF == PID_TABLE_PROPERTIES {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
