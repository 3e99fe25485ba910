//! OPC package access: parts, relationships and target resolution.

use crate::xml::local_name;
use deck_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Relationship type suffixes used by the loader.
pub(crate) mod rel_types {
    pub const OFFICE_DOCUMENT: &str = "/officeDocument";
    pub const SLIDE: &str = "/slide";
    pub const SLIDE_LAYOUT: &str = "/slideLayout";
    pub const SLIDE_MASTER: &str = "/slideMaster";
}

/// A relationship of a package part.
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Absolute part name (no leading slash) for internal targets.
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn is_type(&self, suffix: &str) -> bool {
        self.rel_type.ends_with(suffix)
    }
}

/// A ZIP-backed OPC package.
pub(crate) struct Package<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> Package<R> {
    pub fn open(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;
        Ok(Self { archive })
    }

    pub fn has_part(&mut self, path: &str) -> bool {
        self.archive.by_name(path).is_ok()
    }

    /// Read a part as UTF-8 text.
    pub fn read_part(&mut self, path: &str) -> Result<String> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        Ok(content)
    }

    /// Relationships of `part` (use `""` for the package itself).
    ///
    /// A part without a relationships file has no relationships.
    pub fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>> {
        let rels_path = rels_path_for(part);
        if !self.has_part(&rels_path) {
            return Ok(Vec::new());
        }
        let content = self.read_part(&rels_path)?;
        parse_relationships(&content, part)
    }

    /// Target of the first relationship of `part` with the given type.
    pub fn related_part(&mut self, part: &str, suffix: &str) -> Result<Option<String>> {
        Ok(self
            .relationships(part)?
            .into_iter()
            .find(|rel| !rel.external && rel.is_type(suffix))
            .map(|rel| rel.target))
    }
}

/// Parse a relationships document, resolving targets against `source_part`.
pub(crate) fn parse_relationships(content: &str, source_part: &str) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| Error::XmlError(format!("Bad relationship attribute: {}", e)))?
                        .into_owned();
                    match attr.key.as_ref() {
                        b"Type" => rel_type = value,
                        b"Target" => target = value,
                        b"Id" => id = value,
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }

                let target = if external {
                    target
                } else {
                    resolve_target(source_part, &target)
                };
                relationships.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships of '{}': {}",
                    source_part, e
                )));
            }
            _ => {}
        }
    }

    Ok(relationships)
}

/// Path of the relationships part for `part`.
///
/// `"ppt/slides/slide1.xml"` maps to `"ppt/slides/_rels/slide1.xml.rels"`,
/// the package itself (`""`) to `"_rels/.rels"`.
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, name)) => format!("{}/_rels/{}.rels", dir, name),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target relative to the part that owns it.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_part_rejects_invalid_utf8() {
        use std::io::{Cursor, Write};
        use zip::write::FileOptions;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("ppt/presentation.xml", FileOptions::default()).unwrap();
        writer.write_all(&[0x3C, 0xFF, 0xFE, 0x3E]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut package = Package::open(Cursor::new(bytes)).unwrap();
        assert!(package.has_part("ppt/presentation.xml"));
        assert!(matches!(package.read_part("ppt/presentation.xml"), Err(Error::IoError(_))));
        assert!(matches!(package.read_part("ppt/missing.xml"), Err(Error::ZipError(_))));
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_path_for("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
        assert_eq!(rels_path_for(""), "_rels/.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("ppt/presentation.xml", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "/ppt/media/image1.png"), "ppt/media/image1.png");
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;

        let rels = parse_relationships(xml, "ppt/presentation.xml").unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[0].id, "rId2");
        assert!(rels[0].is_type(rel_types::SLIDE));
        assert!(!rels[1].is_type(rel_types::SLIDE));
        assert_eq!(rels[1].target, "ppt/slideMasters/slideMaster1.xml");
        assert!(rels[2].external);
        assert_eq!(rels[2].target, "https://example.com/?a=1&b=2");
    }
}
