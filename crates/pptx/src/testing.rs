//! In-memory PPTX packages for tests.
//!
//! Packages have one master and one layout. The master's body text style
//! puts bullets on the first level unless disabled with
//! [`PptxBuilder::master_body_bullets`].

use std::io::{Cursor, Write};
use zip::result::ZipResult;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Builder for a presentation package.
#[derive(Debug, Clone)]
pub struct PptxBuilder {
    slides: Vec<String>,
    body_bullets: bool,
}

impl Default for PptxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PptxBuilder {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            body_bullets: true,
        }
    }

    /// Append a slide whose shape tree holds `shapes` (see the shape helpers).
    pub fn slide(mut self, shapes: &[String]) -> Self {
        self.slides.push(shapes.concat());
        self
    }

    /// Whether the master's body style bullets level-one paragraphs.
    pub fn master_body_bullets(mut self, enabled: bool) -> Self {
        self.body_bullets = enabled;
        self
    }

    /// Serialize the package.
    ///
    /// Slide relationships are written in reverse order so that only
    /// `p:sldIdLst` determines slide order.
    pub fn build(&self) -> ZipResult<Vec<u8>> {
        let mut files: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_string(), self.content_types()),
            ("_rels/.rels".to_string(), package_rels()),
            ("ppt/presentation.xml".to_string(), self.presentation()),
            ("ppt/_rels/presentation.xml.rels".to_string(), self.presentation_rels()),
            ("ppt/slideMasters/slideMaster1.xml".to_string(), self.master()),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
                relationships(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
            ),
            ("ppt/slideLayouts/slideLayout1.xml".to_string(), layout()),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
                relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
            ),
        ];

        for (i, shapes) in self.slides.iter().enumerate() {
            let n = i + 1;
            files.push((format!("ppt/slides/slide{}.xml", n), slide(shapes)));
            files.push((
                format!("ppt/slides/_rels/slide{}.xml.rels", n),
                relationships(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
            ));
        }

        let borrowed: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
        package(&borrowed)
    }

    fn content_types(&self) -> String {
        let mut overrides = String::new();
        for n in 1..=self.slides.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                n
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{}</Types>"#,
            overrides
        )
    }

    fn presentation(&self) -> String {
        let ids: String = (0..self.slides.len())
            .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
            NS, ids
        )
    }

    fn presentation_rels(&self) -> String {
        let mut rels = vec![(
            "rId1".to_string(),
            "slideMaster",
            "slideMasters/slideMaster1.xml".to_string(),
        )];
        for i in (0..self.slides.len()).rev() {
            rels.push((format!("rId{}", i + 2), "slide", format!("slides/slide{}.xml", i + 1)));
        }
        let borrowed: Vec<(&str, &str, &str)> =
            rels.iter().map(|(id, t, target)| (id.as_str(), *t, target.as_str())).collect();
        relationships(&borrowed)
    }

    fn master(&self) -> String {
        let body_bullet = if self.body_bullets {
            r#"<a:buChar char="•"/>"#
        } else {
            "<a:buNone/>"
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}{}</p:spTree></p:cSld><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle><a:lvl1pPr algn="l"><a:buNone/><a:defRPr sz="4400"/></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr marL="228600" indent="-228600">{}<a:defRPr sz="2800"/></a:lvl1pPr><a:lvl2pPr marL="685800" indent="-228600"><a:buChar char="–"/></a:lvl2pPr></p:bodyStyle><p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle></p:txStyles></p:sldMaster>"#,
            NS,
            placeholder_shape("title", None, "Click to edit Master title style", ""),
            placeholder_shape("body", Some(1), "Click to edit Master text styles", ""),
            body_bullet
        )
    }
}

fn package_rels() -> String {
    relationships(&[("rId1", "officeDocument", "ppt/presentation.xml")])
}

fn layout() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout {} type="obj" preserve="1"><p:cSld name="Title and Content"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}{}</p:spTree></p:cSld></p:sldLayout>"#,
        NS,
        placeholder_shape("title", None, "Click to edit Master title style", ""),
        placeholder_shape("body", Some(1), "Click to edit Master text styles", ""),
    )
}

fn slide(shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        NS, shapes
    )
}

/// A relationships part from `(id, type suffix, target)` triples.
pub fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let entries: String = rels
        .iter()
        .map(|(id, kind, target)| {
            format!(
                r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                id, REL_NS, kind, target
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        entries
    )
}

/// Write a ZIP package from `(part name, content)` pairs.
pub fn package(files: &[(&str, &str)]) -> ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in files {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn paragraphs_xml(paragraphs: &[&str], ppr: &str) -> String {
    paragraphs
        .iter()
        .map(|text| format!(r#"<a:p>{}<a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r></a:p>"#, ppr, escape(text)))
        .collect()
}

fn placeholder_shape(kind: &str, idx: Option<u32>, text: &str, lst_style: &str) -> String {
    let idx = idx.map(|i| format!(r#" idx="{}""#, i)).unwrap_or_default();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="{kind}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="{kind}"{idx}/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle>{lst_style}</a:lstStyle>{body}</p:txBody></p:sp>"#,
        kind = kind,
        idx = idx,
        lst_style = lst_style,
        body = paragraphs_xml(&[text], "")
    )
}

/// A text box (not a placeholder) with one paragraph per entry.
pub fn text_box(paragraphs: &[&str]) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="10" name="TextBox"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr wrap="square"/><a:lstStyle/>{}</p:txBody></p:sp>"#,
        paragraphs_xml(paragraphs, "")
    )
}

/// A text box whose paragraphs carry explicit `a:buChar` bullets.
pub fn bullet_box(items: &[&str]) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="11" name="Bullets"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>"#,
        paragraphs_xml(items, r#"<a:pPr marL="285750" indent="-285750"><a:buFont typeface="Arial"/><a:buChar char="•"/></a:pPr>"#)
    )
}

/// A placeholder shape without local paragraph properties.
pub fn placeholder(kind: &str, idx: Option<u32>, paragraphs: &[&str]) -> String {
    let idx = idx.map(|i| format!(r#" idx="{}""#, i)).unwrap_or_default();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="{kind} placeholder"/><p:cNvSpPr/><p:nvPr><p:ph type="{kind}"{idx}/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{body}</p:txBody></p:sp>"#,
        kind = kind,
        idx = idx,
        body = paragraphs_xml(paragraphs, "")
    )
}

/// A picture.
pub fn picture() -> String {
    r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr/></p:pic>"#.to_string()
}

/// A group of shapes.
pub fn group(children: &[String]) -> String {
    format!(
        r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="5" name="Group"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:grpSp>"#,
        children.concat()
    )
}

/// A table frame; empty strings produce cells without paragraphs.
pub fn table(rows: &[&[&str]]) -> String {
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|text| {
                    let body = if text.is_empty() {
                        String::new()
                    } else {
                        paragraphs_xml(&[*text], "")
                    };
                    format!(r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody><a:tcPr/></a:tc>"#, body)
                })
                .collect();
            format!(r#"<a:tr h="370840">{}</a:tr>"#, cells)
        })
        .collect();
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="6" name="Table"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr firstRow="1"/><a:tblGrid/>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        rows
    )
}
