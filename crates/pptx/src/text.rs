//! Text bodies of PPTX shapes and table cells.
//!
//! A body keeps a byte range into its part's XML and is decoded only when the
//! shape is visited, so a bad run or entity only affects its own shape.

use crate::xml::{attr, local_name, read_inner_span};
use deck_core::{Error, Paragraph, Result, TextBody};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;
use std::sync::Arc;

/// Number of outline levels in DrawingML list styles.
pub const LIST_LEVELS: usize = 9;

/// Bullet setting per outline level (`lvl1pPr` to `lvl9pPr`).
///
/// `None` means the level does not decide and the next style in the
/// inheritance chain is consulted.
pub type ListStyle = [Option<bool>; LIST_LEVELS];

/// Placeholder reference of a shape (`p:nvPr/p:ph`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaceholderRef {
    /// Placeholder type; absent means `obj`.
    pub kind: Option<String>,
    /// Placeholder index used to match layout placeholders.
    pub idx: Option<u32>,
}

impl PlaceholderRef {
    pub(crate) fn from_element(e: &BytesStart) -> Result<Self> {
        let kind = attr(e, b"type")?;
        let idx = match attr(e, b"idx")? {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(idx) => Some(idx),
                Err(_) => {
                    log::debug!("Ignoring non-numeric placeholder idx '{}'", raw);
                    None
                }
            },
            None => None,
        };
        Ok(Self { kind, idx })
    }

    /// The placeholder type, with the schema default applied.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("obj")
    }

    /// Master placeholder class this placeholder inherits from.
    pub fn class(&self) -> &str {
        match self.kind() {
            "title" | "ctrTitle" => "title",
            "dt" => "dt",
            "ftr" => "ftr",
            "sldNum" => "sldNum",
            "hdr" => "hdr",
            _ => "body",
        }
    }
}

/// A `p:txBody` or `a:txBody` of a slide part.
#[derive(Debug, Clone)]
pub struct PptxTextBody {
    xml: Arc<str>,
    span: Range<usize>,
    placeholder: Option<PlaceholderRef>,
    inherited: Vec<ListStyle>,
}

impl PptxTextBody {
    pub(crate) fn new(
        xml: Arc<str>,
        span: Range<usize>,
        placeholder: Option<PlaceholderRef>,
        inherited: Vec<ListStyle>,
    ) -> Self {
        Self {
            xml,
            span,
            placeholder,
            inherited,
        }
    }

    /// Placeholder reference of the owning shape, if any.
    pub fn placeholder(&self) -> Option<&PlaceholderRef> {
        self.placeholder.as_ref()
    }

    fn fragment(&self) -> Result<&str> {
        self.xml
            .get(self.span.clone())
            .ok_or_else(|| Error::ShapeTextError("Text body range out of bounds".to_string()))
    }

    /// The body's own `a:lstStyle`, if present.
    pub fn list_style(&self) -> Result<Option<ListStyle>> {
        let fragment = self.fragment()?;
        let mut reader = Reader::from_str(fragment);
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"lstStyle" => {
                    let span = read_inner_span(&mut reader).map_err(shape_error)?;
                    return read_list_style(&fragment[span]).map(Some).map_err(shape_error);
                }
                Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"p" => return Ok(None),
                Ok(Event::Eof) => return Ok(None),
                Err(e) => return Err(Error::ShapeTextError(format!("Malformed text body: {}", e))),
                _ => {}
            }
        }
    }
}

impl TextBody for PptxTextBody {
    fn paragraphs(&self) -> Result<Vec<Paragraph>> {
        let fragment = self.fragment()?;
        let mut reader = Reader::from_str(fragment);

        let mut own_style: Option<ListStyle> = None;
        let mut paragraphs = Vec::new();
        let mut current: Option<ParagraphBuilder> = None;
        let mut in_ppr = false;
        let mut in_text = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"lstStyle" if current.is_none() => {
                        let span = read_inner_span(&mut reader).map_err(shape_error)?;
                        own_style = Some(read_list_style(&fragment[span]).map_err(shape_error)?);
                    }
                    b"p" => current = Some(ParagraphBuilder::default()),
                    b"pPr" => {
                        if let Some(p) = current.as_mut() {
                            p.read_level(e);
                            in_ppr = true;
                        }
                    }
                    b"t" => {
                        if let Some(p) = current.as_mut() {
                            p.runs.push(String::new());
                            in_text = true;
                        }
                    }
                    b"br" => push_break(&mut current),
                    name if in_ppr => set_explicit(&mut current, name),
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                    b"p" => paragraphs.push(Paragraph::new(Vec::new(), Ok(false))),
                    b"pPr" => {
                        if let Some(p) = current.as_mut() {
                            p.read_level(e);
                        }
                    }
                    b"t" => {
                        if let Some(p) = current.as_mut() {
                            p.runs.push(String::new());
                        }
                    }
                    b"br" => push_break(&mut current),
                    name if in_ppr => set_explicit(&mut current, name),
                    _ => {}
                },
                Ok(Event::Text(ref t)) if in_text => {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::ShapeTextError(format!("Bad text run: {}", e)))?;
                    append_text(&mut current, &text);
                }
                Ok(Event::CData(ref t)) if in_text => {
                    append_text(&mut current, &String::from_utf8_lossy(t));
                }
                Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                    b"t" => in_text = false,
                    b"pPr" => in_ppr = false,
                    b"p" => {
                        if let Some(p) = current.take() {
                            paragraphs.push(p.finish(own_style.as_ref(), &self.inherited));
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::ShapeTextError(format!("Malformed text body: {}", e))),
                _ => {}
            }
        }

        Ok(paragraphs)
    }
}

#[derive(Default)]
struct ParagraphBuilder {
    runs: Vec<String>,
    level: Option<std::result::Result<usize, String>>,
    explicit: Option<bool>,
}

impl ParagraphBuilder {
    fn read_level(&mut self, e: &BytesStart) {
        self.level = match attr(e, b"lvl") {
            Ok(Some(raw)) => Some(match raw.trim().parse::<usize>() {
                Ok(lvl) if lvl < LIST_LEVELS => Ok(lvl),
                _ => Err(raw),
            }),
            Ok(None) => None,
            Err(e) => Some(Err(e.to_string())),
        };
    }

    fn finish(self, own: Option<&ListStyle>, inherited: &[ListStyle]) -> Paragraph {
        let bullet = resolve_bullet(self.explicit, self.level.unwrap_or(Ok(0)), own, inherited);
        Paragraph::new(self.runs, bullet)
    }
}

fn push_break(current: &mut Option<ParagraphBuilder>) {
    if let Some(p) = current.as_mut() {
        p.runs.push("\n".to_string());
    }
}

fn append_text(current: &mut Option<ParagraphBuilder>, text: &str) {
    if let Some(run) = current.as_mut().and_then(|p| p.runs.last_mut()) {
        run.push_str(text);
    }
}

fn set_explicit(current: &mut Option<ParagraphBuilder>, name: &[u8]) {
    if let (Some(p), Some(bullet)) = (current.as_mut(), bullet_marker(name)) {
        p.explicit = Some(bullet);
    }
}

/// Bullet decision carried by a paragraph-properties child element.
fn bullet_marker(name: &[u8]) -> Option<bool> {
    match name {
        b"buChar" | b"buAutoNum" | b"buBlip" => Some(true),
        b"buNone" => Some(false),
        _ => None,
    }
}

fn resolve_bullet(
    explicit: Option<bool>,
    level: std::result::Result<usize, String>,
    own: Option<&ListStyle>,
    inherited: &[ListStyle],
) -> Result<bool> {
    if let Some(bullet) = explicit {
        return Ok(bullet);
    }
    let level = level.map_err(|raw| Error::ShapeTextError(format!("Invalid paragraph level '{}'", raw)))?;
    Ok(own
        .into_iter()
        .chain(inherited.iter())
        .find_map(|style| style[level])
        .unwrap_or(false))
}

/// Parse the `lvlNpPr` children of a list style element's content.
pub(crate) fn read_list_style(xml: &str) -> Result<ListStyle> {
    let mut style: ListStyle = [None; LIST_LEVELS];
    let mut reader = Reader::from_str(xml);
    let mut level: Option<usize> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if let Some(lvl) = level_of(name) {
                    level = Some(lvl);
                } else if let (Some(lvl), Some(bullet)) = (level, bullet_marker(name)) {
                    style[lvl] = Some(bullet);
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let (Some(lvl), Some(bullet)) = (level, bullet_marker(local_name(e.name().as_ref()))) {
                    style[lvl] = Some(bullet);
                }
            }
            Ok(Event::End(ref e)) => {
                if level_of(local_name(e.name().as_ref())).is_some() {
                    level = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlError(format!("Malformed list style: {}", e))),
            _ => {}
        }
    }

    Ok(style)
}

/// Zero-based level of a `lvl1pPr`..`lvl9pPr` element name.
fn level_of(name: &[u8]) -> Option<usize> {
    let digits = name.strip_prefix(b"lvl")?.strip_suffix(b"pPr")?;
    match digits {
        [d @ b'1'..=b'9'] => Some((d - b'1') as usize),
        _ => None,
    }
}

fn shape_error(e: Error) -> Error {
    match e {
        Error::ShapeTextError(_) => e,
        other => Error::ShapeTextError(other.to_string()),
    }
}
