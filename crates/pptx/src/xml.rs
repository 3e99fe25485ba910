//! Small helpers over the quick-xml event reader.

use deck_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Value of an unprefixed attribute.
pub(crate) fn attr(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    find_attr(e, |k| k == key)
}

/// Value of a namespace-prefixed attribute with the given local name, such
/// as `r:id`.
pub(crate) fn prefixed_attr(e: &BytesStart, local: &[u8]) -> Result<Option<String>> {
    find_attr(e, |k| k.contains(&b':') && local_name(k) == local)
}

fn find_attr(e: &BytesStart, matches: impl Fn(&[u8]) -> bool) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::XmlError(format!("Malformed attribute: {}", e)))?;
        if matches(attr.key.as_ref()) {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::XmlError(format!("Bad attribute value: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Byte range of the content of the element whose start tag was just read.
///
/// Consumes events up to and including the matching end tag.
pub(crate) fn read_inner_span(reader: &mut Reader<&[u8]>) -> Result<Range<usize>> {
    let start = reader.buffer_position() as usize;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return Ok(start..before);
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(Error::XmlError("Unexpected end of document inside element".to_string()));
            }
            Err(e) => return Err(Error::XmlError(format!("Error at position {}: {}", before, e))),
            _ => {}
        }
    }
}

/// Skip the rest of the element whose start tag was just read.
pub(crate) fn skip_element(reader: &mut Reader<&[u8]>) -> Result<()> {
    read_inner_span(reader).map(|_| ())
}
