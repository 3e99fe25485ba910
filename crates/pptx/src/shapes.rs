//! Structural parse of a `p:spTree` into the slide model.

use crate::styles::SlideStyles;
use crate::text::{PlaceholderRef, PptxTextBody};
use crate::xml::{local_name, read_inner_span, skip_element};
use deck_core::{Error, Result, Shape, Table};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::ops::Range;
use std::sync::Arc;

type PptxShape = Shape<PptxTextBody>;

/// Parse the shape tree of a slide, layout or master part.
///
/// Malformed structure is an error; text content is not decoded here.
pub(crate) fn parse_shape_tree(
    xml: &Arc<str>,
    styles: &SlideStyles,
    max_depth: usize,
) -> Result<Vec<PptxShape>> {
    let mut reader = Reader::from_str(xml);
    let tree = ShapeTree {
        xml,
        styles,
        max_depth,
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"spTree" => {
                return tree.children(&mut reader, 0);
            }
            Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"spTree" => {
                return Ok(Vec::new());
            }
            Ok(Event::Eof) => {
                return Err(Error::PptxParseError("Part has no shape tree".to_string()));
            }
            Err(e) => return Err(xml_error(&reader, e)),
            _ => {}
        }
    }
}

struct ShapeTree<'a> {
    xml: &'a Arc<str>,
    styles: &'a SlideStyles,
    max_depth: usize,
}

impl ShapeTree<'_> {
    /// Shapes of a container, up to the container's end tag.
    fn children(&self, reader: &mut Reader<&[u8]>, depth: usize) -> Result<Vec<PptxShape>> {
        let mut shapes = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"sp" => shapes.push(self.shape(reader)?),
                    b"grpSp" => shapes.push(self.group(reader, depth)?),
                    b"graphicFrame" => shapes.push(self.graphic_frame(reader)?),
                    b"AlternateContent" => shapes.extend(self.alternate_content(reader, depth)?),
                    b"pic" | b"cxnSp" | b"contentPart" => {
                        skip_element(reader)?;
                        shapes.push(Shape::Other);
                    }
                    _ => skip_element(reader)?,
                },
                Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                    b"grpSp" => shapes.push(Shape::Group(Vec::new())),
                    b"sp" | b"graphicFrame" | b"pic" | b"cxnSp" | b"contentPart" => shapes.push(Shape::Other),
                    _ => {}
                },
                Ok(Event::End(_)) => return Ok(shapes),
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of shape tree".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }
    }

    fn group(&self, reader: &mut Reader<&[u8]>, depth: usize) -> Result<PptxShape> {
        if depth >= self.max_depth {
            log::debug!("Group nesting deeper than {} levels not parsed", self.max_depth);
            skip_element(reader)?;
            return Ok(Shape::Group(Vec::new()));
        }
        Ok(Shape::Group(self.children(reader, depth + 1)?))
    }

    /// A `p:sp`: a text shape when it has a text body.
    fn shape(&self, reader: &mut Reader<&[u8]>) -> Result<PptxShape> {
        let mut placeholder = None;
        let mut span = None;
        let mut depth = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"txBody" => span = Some(read_inner_span(reader)?),
                    b"ph" => {
                        placeholder = Some(PlaceholderRef::from_element(e)?);
                        depth += 1;
                    }
                    _ => depth += 1,
                },
                Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                    b"txBody" => span = Some(empty_span(reader)),
                    b"ph" => placeholder = Some(PlaceholderRef::from_element(e)?),
                    _ => {}
                },
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of shape".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }

        Ok(match span {
            Some(span) => Shape::Text(self.body(span, placeholder)),
            None => Shape::Other,
        })
    }

    /// A `p:graphicFrame`: a table when it holds `a:tbl`, otherwise opaque.
    fn graphic_frame(&self, reader: &mut Reader<&[u8]>) -> Result<PptxShape> {
        let mut table = None;
        let mut depth = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    if local_name(e.name().as_ref()) == b"tbl" && table.is_none() {
                        table = Some(self.table(reader)?);
                    } else {
                        depth += 1;
                    }
                }
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of graphic frame".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }

        Ok(match table {
            Some(table) => Shape::Table(table),
            None => Shape::Other,
        })
    }

    fn table(&self, reader: &mut Reader<&[u8]>) -> Result<Table<PptxTextBody>> {
        let mut rows = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    if local_name(e.name().as_ref()) == b"tr" {
                        rows.push(self.row(reader)?);
                    } else {
                        skip_element(reader)?;
                    }
                }
                Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"tr" => rows.push(Vec::new()),
                Ok(Event::End(_)) => return Ok(Table::new(rows)),
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of table".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }
    }

    fn row(&self, reader: &mut Reader<&[u8]>) -> Result<Vec<PptxTextBody>> {
        let mut cells = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    if local_name(e.name().as_ref()) == b"tc" {
                        cells.push(self.cell(reader)?);
                    } else {
                        skip_element(reader)?;
                    }
                }
                Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"tc" => {
                    let span = empty_span(reader);
                    cells.push(self.body(span, None));
                }
                Ok(Event::End(_)) => return Ok(cells),
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of table row".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }
    }

    fn cell(&self, reader: &mut Reader<&[u8]>) -> Result<PptxTextBody> {
        let mut span = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    if local_name(e.name().as_ref()) == b"txBody" {
                        span = Some(read_inner_span(reader)?);
                    } else {
                        skip_element(reader)?;
                    }
                }
                Ok(Event::End(_)) => break,
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of table cell".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }

        let span = span.unwrap_or_else(|| empty_span(reader));
        Ok(self.body(span, None))
    }

    /// Shapes of the first `mc:Choice`, else of `mc:Fallback`.
    fn alternate_content(&self, reader: &mut Reader<&[u8]>, depth: usize) -> Result<Vec<PptxShape>> {
        let mut choice = None;
        let mut fallback = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"Choice" if choice.is_none() => choice = Some(self.children(reader, depth)?),
                    b"Fallback" if fallback.is_none() => fallback = Some(self.children(reader, depth)?),
                    _ => skip_element(reader)?,
                },
                Ok(Event::End(_)) => break,
                Ok(Event::Eof) => {
                    return Err(Error::PptxParseError("Unexpected end of alternate content".to_string()));
                }
                Err(e) => return Err(xml_error(reader, e)),
                _ => {}
            }
        }

        Ok(choice.or(fallback).unwrap_or_default())
    }

    fn body(&self, span: Range<usize>, placeholder: Option<PlaceholderRef>) -> PptxTextBody {
        let inherited = self.styles.chain_for(placeholder.as_ref());
        PptxTextBody::new(Arc::clone(self.xml), span, placeholder, inherited)
    }
}

fn empty_span(reader: &Reader<&[u8]>) -> Range<usize> {
    let pos = reader.buffer_position() as usize;
    pos..pos
}

fn xml_error(reader: &Reader<&[u8]>, e: quick_xml::Error) -> Error {
    Error::XmlError(format!("Error at position {}: {}", reader.buffer_position(), e))
}
