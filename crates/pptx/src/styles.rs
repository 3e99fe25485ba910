//! List-style inheritance from slide layouts and masters.

use crate::package::{rel_types, Package};
use crate::shapes::parse_shape_tree;
use crate::text::{read_list_style, ListStyle, PlaceholderRef};
use crate::xml::{local_name, read_inner_span};
use deck_core::{Error, Result, Shape};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;

/// Placeholder list styles of a layout, matched by `idx` then by type.
#[derive(Debug, Default)]
pub(crate) struct LayoutStyles {
    by_idx: HashMap<u32, Option<ListStyle>>,
    by_type: HashMap<String, Option<ListStyle>>,
}

impl LayoutStyles {
    fn lookup(&self, ph: &PlaceholderRef) -> Option<ListStyle> {
        ph.idx
            .and_then(|idx| self.by_idx.get(&idx))
            .or_else(|| self.by_type.get(ph.kind()))
            .copied()
            .flatten()
    }
}

/// Placeholder list styles and `p:txStyles` of a slide master.
#[derive(Debug, Default)]
pub(crate) struct MasterStyles {
    by_class: HashMap<String, ListStyle>,
    title: Option<ListStyle>,
    body: Option<ListStyle>,
    other: Option<ListStyle>,
}

impl MasterStyles {
    fn text_style(&self, ph: Option<&PlaceholderRef>) -> Option<ListStyle> {
        match ph.map(PlaceholderRef::class) {
            Some("title") => self.title,
            Some("body") => self.body,
            _ => self.other,
        }
    }
}

/// Styles a slide's text bodies inherit from.
#[derive(Debug, Default)]
pub(crate) struct SlideStyles {
    layout: Option<Arc<LayoutStyles>>,
    master: Option<Arc<MasterStyles>>,
}

impl SlideStyles {
    /// Inherited list styles for a shape, nearest first.
    pub fn chain_for(&self, ph: Option<&PlaceholderRef>) -> Vec<ListStyle> {
        let mut chain = Vec::new();
        if let Some(ph) = ph {
            if let Some(style) = self.layout.as_ref().and_then(|l| l.lookup(ph)) {
                chain.push(style);
            }
            if let Some(style) = self.master.as_ref().and_then(|m| m.by_class.get(ph.class())) {
                chain.push(*style);
            }
        }
        if let Some(style) = self.master.as_ref().and_then(|m| m.text_style(ph)) {
            chain.push(style);
        }
        chain
    }
}

/// Layout and master styles loaded once per part.
#[derive(Default)]
pub(crate) struct StyleCache {
    layouts: HashMap<String, (Arc<LayoutStyles>, Option<String>)>,
    masters: HashMap<String, Arc<MasterStyles>>,
}

impl StyleCache {
    /// Styles for a slide; missing or unreadable parts yield no inherited styles.
    pub fn slide_styles<R: Read + Seek>(
        &mut self,
        package: &mut Package<R>,
        slide_part: &str,
        max_depth: usize,
    ) -> SlideStyles {
        let layout_part = match package.related_part(slide_part, rel_types::SLIDE_LAYOUT) {
            Ok(Some(part)) => part,
            Ok(None) => {
                log::debug!("Slide '{}' has no layout", slide_part);
                return SlideStyles::default();
            }
            Err(e) => {
                log::warn!("Cannot resolve layout of '{}': {}", slide_part, e);
                return SlideStyles::default();
            }
        };

        let (layout, master_part) = self
            .layouts
            .entry(layout_part.clone())
            .or_insert_with(|| load_layout(package, &layout_part, max_depth))
            .clone();

        let master = master_part.map(|master_part| {
            self.masters
                .entry(master_part.clone())
                .or_insert_with(|| load_master(package, &master_part, max_depth))
                .clone()
        });

        SlideStyles {
            layout: Some(layout),
            master,
        }
    }
}

fn load_layout<R: Read + Seek>(
    package: &mut Package<R>,
    part: &str,
    max_depth: usize,
) -> (Arc<LayoutStyles>, Option<String>) {
    let master_part = match package.related_part(part, rel_types::SLIDE_MASTER) {
        Ok(master) => master,
        Err(e) => {
            log::warn!("Cannot resolve master of layout '{}': {}", part, e);
            None
        }
    };

    let mut styles = LayoutStyles::default();
    match read_placeholder_styles(package, part, max_depth) {
        Ok(placeholders) => {
            for (ph, style) in placeholders {
                if let Some(idx) = ph.idx {
                    styles.by_idx.entry(idx).or_insert(style);
                }
                styles.by_type.entry(ph.kind().to_string()).or_insert(style);
            }
        }
        Err(e) => log::warn!("Ignoring styles of layout '{}': {}", part, e),
    }

    (Arc::new(styles), master_part)
}

fn load_master<R: Read + Seek>(package: &mut Package<R>, part: &str, max_depth: usize) -> Arc<MasterStyles> {
    let mut styles = MasterStyles::default();

    match read_placeholder_styles(package, part, max_depth) {
        Ok(placeholders) => {
            for (ph, style) in placeholders {
                if let Some(style) = style {
                    styles.by_class.entry(ph.class().to_string()).or_insert(style);
                }
            }
        }
        Err(e) => log::warn!("Ignoring placeholder styles of master '{}': {}", part, e),
    }

    match package.read_part(part).and_then(|xml| read_text_styles(&xml)) {
        Ok(text_styles) => {
            styles.title = text_styles.title;
            styles.body = text_styles.body;
            styles.other = text_styles.other;
        }
        Err(e) => log::warn!("Ignoring text styles of master '{}': {}", part, e),
    }

    Arc::new(styles)
}

/// Own list style of every placeholder in a layout or master part.
fn read_placeholder_styles<R: Read + Seek>(
    package: &mut Package<R>,
    part: &str,
    max_depth: usize,
) -> Result<Vec<(PlaceholderRef, Option<ListStyle>)>> {
    let xml: Arc<str> = Arc::from(package.read_part(part)?);
    let shapes = parse_shape_tree(&xml, &SlideStyles::default(), max_depth)?;

    let mut found = Vec::new();
    collect_placeholders(&shapes, &mut found);
    Ok(found)
}

fn collect_placeholders(
    shapes: &[Shape<crate::text::PptxTextBody>],
    found: &mut Vec<(PlaceholderRef, Option<ListStyle>)>,
) {
    for shape in shapes {
        match shape {
            Shape::Text(body) => {
                if let Some(ph) = body.placeholder() {
                    let style = body.list_style().unwrap_or_else(|e| {
                        log::warn!("Ignoring list style of placeholder '{}': {}", ph.kind(), e);
                        None
                    });
                    found.push((ph.clone(), style));
                }
            }
            Shape::Group(children) => collect_placeholders(children, found),
            Shape::Table(_) | Shape::Other => {}
        }
    }
}

#[derive(Debug, Default)]
struct TextStyles {
    title: Option<ListStyle>,
    body: Option<ListStyle>,
    other: Option<ListStyle>,
}

/// Parse `p:txStyles` of a master part.
fn read_text_styles(xml: &str) -> Result<TextStyles> {
    let mut styles = TextStyles::default();
    let mut reader = Reader::from_str(xml);
    let mut in_tx_styles = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if name == b"txStyles" {
                    in_tx_styles = true;
                    continue;
                }
                if !in_tx_styles {
                    continue;
                }
                let slot = match name {
                    b"titleStyle" => &mut styles.title,
                    b"bodyStyle" => &mut styles.body,
                    b"otherStyle" => &mut styles.other,
                    _ => continue,
                };
                let span = read_inner_span(&mut reader)?;
                *slot = Some(read_list_style(&xml[span])?);
            }
            Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == b"txStyles" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlError(format!("Malformed master: {}", e))),
            _ => {}
        }
    }

    Ok(styles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::LIST_LEVELS;

    fn level0(on: bool) -> ListStyle {
        let mut style = [None; LIST_LEVELS];
        style[0] = Some(on);
        style
    }

    fn ph(kind: Option<&str>, idx: Option<u32>) -> PlaceholderRef {
        PlaceholderRef {
            kind: kind.map(str::to_string),
            idx,
        }
    }

    fn sample_styles() -> SlideStyles {
        let mut layout = LayoutStyles::default();
        layout.by_idx.insert(1, Some(level0(false)));
        layout.by_type.insert("obj".to_string(), Some(level0(false)));
        layout.by_type.insert("title".to_string(), None);

        let mut master = MasterStyles::default();
        master.by_class.insert("body".to_string(), level0(true));
        master.title = Some(level0(false));
        master.body = Some(level0(true));
        master.other = Some(level0(false));

        SlideStyles {
            layout: Some(Arc::new(layout)),
            master: Some(Arc::new(master)),
        }
    }

    #[test]
    fn test_chain_for_placeholder_by_idx() {
        let chain = sample_styles().chain_for(Some(&ph(None, Some(1))));
        assert_eq!(chain, vec![level0(false), level0(true), level0(true)]);
    }

    #[test]
    fn test_chain_for_title_skips_unstyled_layout_placeholder() {
        let chain = sample_styles().chain_for(Some(&ph(Some("title"), None)));
        assert_eq!(chain, vec![level0(false)]);
    }

    #[test]
    fn test_chain_for_plain_shape_uses_other_style() {
        let chain = sample_styles().chain_for(None);
        assert_eq!(chain, vec![level0(false)]);
    }

    #[test]
    fn test_chain_without_styles_is_empty() {
        assert!(SlideStyles::default().chain_for(Some(&ph(None, Some(1)))).is_empty());
    }

    #[test]
    fn test_read_text_styles() {
        let xml = r#"<p:sldMaster><p:cSld><p:spTree/></p:cSld><p:txStyles>
<p:titleStyle><a:lvl1pPr><a:defRPr/></a:lvl1pPr></p:titleStyle>
<p:bodyStyle><a:lvl1pPr><a:buChar char="•"/></a:lvl1pPr><a:lvl2pPr><a:buChar char="-"/></a:lvl2pPr></p:bodyStyle>
<p:otherStyle><a:lvl1pPr><a:buNone/></a:lvl1pPr></p:otherStyle>
</p:txStyles></p:sldMaster>"#;
        let styles = read_text_styles(xml).unwrap();
        assert_eq!(styles.title, Some([None; LIST_LEVELS]));
        let body = styles.body.unwrap();
        assert_eq!(body[0], Some(true));
        assert_eq!(body[1], Some(true));
        assert_eq!(styles.other, Some(level0(false)));
    }
}
