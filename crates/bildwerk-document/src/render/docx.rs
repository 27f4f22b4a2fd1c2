// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DOCX renderer: flow layout.
//
// The layout becomes a list of flow blocks (page break, image, caption)
// which are serialised as WordprocessingML and packed into an OOXML ZIP
// package. Word does the physical flow; the explicit page breaks carry the
// pagination decided by the layout engine.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{ImageKind, LayoutConstraints, LayoutItem, PageSize, PreparedImage};
use tracing::{debug, info, instrument};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{RenderedDocument, decode_image, plan};

/// English Metric Units per logical (96 dpi) pixel.
pub const EMU_PER_PIXEL: f64 = 9525.0;
/// One inch in twentieths of a point.
pub const TWIPS_PER_INCH: f64 = 1440.0;
/// Page margin on every side.
pub const PAGE_MARGIN_TWIPS: u32 = 1440;
/// Spacing after the image paragraph.
pub const IMAGE_SPACING_AFTER: u32 = 100;
/// Spacing after the caption paragraph.
pub const CAPTION_SPACING_AFTER: u32 = 200;
/// Watermark size in half-points (10 pt).
pub const WATERMARK_HALF_POINTS: u32 = 20;
pub const WATERMARK_COLOR: &str = "CCCCCC";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const REL_HEADER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const REL_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const HEADER_REL_ID: &str = "rIdHeader1";

/// One block in the document body.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowBlock {
    PageBreak,
    Image {
        /// 1-based number, used for the media part and drawing ids.
        number: usize,
        kind: ImageKind,
        width_emu: u64,
        height_emu: u64,
    },
    Caption(String),
}

/// Page geometry in twips: `floor(mm / 25.4 * 1440)`.
pub fn page_twips(page_size: PageSize) -> (u32, u32) {
    let (w_mm, h_mm) = page_size.dimensions_mm();
    let to_twips = |mm: f32| (f64::from(mm) / 25.4 * TWIPS_PER_INCH).floor() as u32;
    (to_twips(w_mm), to_twips(h_mm))
}

/// Logical pixels to EMU.
pub fn px_to_emu(px: f64) -> u64 {
    (px * EMU_PER_PIXEL).round().max(1.0) as u64
}

/// Render the layout as a DOCX package.
#[instrument(skip_all, fields(items = items.len()))]
pub fn render(
    items: &[LayoutItem],
    images: &[PreparedImage],
    constraints: &LayoutConstraints,
) -> Result<RenderedDocument> {
    let plan = plan(items, images, |image| decode_image(image).map(drop));
    let pages = plan.page_count();

    let mut blocks = Vec::with_capacity(plan.entries.len() * 3);
    let mut media: Vec<(String, &[u8])> = Vec::with_capacity(plan.entries.len());
    for (slot, entry) in plan.entries.iter().enumerate() {
        let number = slot + 1;
        let kind = entry.image.compressed.kind;
        if entry.page_break {
            blocks.push(FlowBlock::PageBreak);
        }
        blocks.push(FlowBlock::Image {
            number,
            kind,
            width_emu: px_to_emu(entry.item.display_width),
            height_emu: px_to_emu(entry.item.display_height),
        });
        blocks.push(FlowBlock::Caption(entry.item.caption_text.clone()));
        media.push((media_name(number, kind), entry.image.compressed.data.as_slice()));
    }

    let watermark = constraints.watermark();
    let bytes = write_package(&blocks, &media, constraints.page_size, watermark)?;

    info!(
        rendered = plan.entries.len(),
        failed = plan.failed,
        pages,
        bytes = bytes.len(),
        "DOCX rendered"
    );
    Ok(RenderedDocument {
        bytes,
        rendered: plan.entries.len(),
        failed: plan.failed,
        pages,
    })
}

fn media_name(number: usize, kind: ImageKind) -> String {
    format!("image{number}.{}", kind.extension())
}

fn write_package(
    blocks: &[FlowBlock],
    media: &[(String, &[u8])],
    page_size: PageSize,
    watermark: Option<&str>,
) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    // JPEG/PNG payloads are already compressed.
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    put_entry(&mut zip, "[Content_Types].xml", options, content_types(watermark.is_some()).as_bytes())?;
    put_entry(&mut zip, "_rels/.rels", options, package_rels().as_bytes())?;
    put_entry(&mut zip, "word/document.xml", options, document_xml(blocks, page_size, watermark.is_some()).as_bytes())?;
    put_entry(&mut zip, "word/_rels/document.xml.rels", options, document_rels(media, watermark.is_some()).as_bytes())?;
    if let Some(text) = watermark {
        put_entry(&mut zip, "word/header1.xml", options, header_xml(text).as_bytes())?;
    }
    for (name, data) in media {
        put_entry(&mut zip, &format!("word/media/{name}"), stored, data)?;
    }

    let cursor = zip
        .finish()
        .map_err(|err| BildwerkError::Render(format!("finishing DOCX package: {err}")))?;
    let bytes = cursor.into_inner();
    debug!(bytes = bytes.len(), media = media.len(), "DOCX package written");
    Ok(bytes)
}

fn put_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    options: SimpleFileOptions,
    data: &[u8],
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|err| BildwerkError::Render(format!("zip entry {name}: {err}")))?;
    zip.write_all(data)
        .map_err(|err| BildwerkError::Render(format!("zip write {name}: {err}")))?;
    Ok(())
}

fn content_types(with_header: bool) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for kind in [ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif, ImageKind::Bmp] {
        let _ = write!(
            xml,
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            kind.extension(),
            kind.mime_type()
        );
    }
    xml.push_str(r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
    if with_header {
        xml.push_str(r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#);
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_DOCUMENT}" Target="word/document.xml"/></Relationships>"#
    )
}

fn document_rels(media: &[(String, &[u8])], with_header: bool) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (slot, (name, _)) in media.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{REL_IMAGE}" Target="media/{name}"/>"#,
            image_rel_id(slot + 1)
        );
    }
    if with_header {
        let _ = write!(
            xml,
            r#"<Relationship Id="{HEADER_REL_ID}" Type="{REL_HEADER}" Target="header1.xml"/>"#
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn image_rel_id(number: usize) -> String {
    format!("rIdImage{number}")
}

fn document_xml(blocks: &[FlowBlock], page_size: PageSize, with_header: bool) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{NS_MAIN}" xmlns:r="{NS_REL}" xmlns:wp="{NS_WP}" xmlns:a="{NS_A}" xmlns:pic="{NS_PIC}"><w:body>"#
    );

    for block in blocks {
        match block {
            FlowBlock::PageBreak => xml.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#),
            FlowBlock::Image {
                number,
                kind,
                width_emu,
                height_emu,
            } => write_image_paragraph(&mut xml, *number, *kind, *width_emu, *height_emu),
            FlowBlock::Caption(text) => {
                let _ = write!(
                    xml,
                    r#"<w:p><w:pPr><w:jc w:val="center"/><w:spacing w:after="{CAPTION_SPACING_AFTER}"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    escape_xml(text)
                );
            }
        }
    }

    let (page_w, page_h) = page_twips(page_size);
    xml.push_str("<w:sectPr>");
    if with_header {
        let _ = write!(xml, r#"<w:headerReference w:type="default" r:id="{HEADER_REL_ID}"/>"#);
    }
    let _ = write!(
        xml,
        r#"<w:pgSz w:w="{page_w}" w:h="{page_h}"/><w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="720" w:footer="720" w:gutter="0"/>"#,
        m = PAGE_MARGIN_TWIPS
    );
    xml.push_str("</w:sectPr></w:body></w:document>");
    xml
}

fn write_image_paragraph(xml: &mut String, number: usize, kind: ImageKind, cx: u64, cy: u64) {
    let name = media_name(number, kind);
    let rel = image_rel_id(number);
    let _ = write!(
        xml,
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/><w:spacing w:after="{after}"/></w:pPr><w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{number}" name="Picture {number}"/>"#,
            r#"<a:graphic><a:graphicData uri="{pic}"><pic:pic>"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{number}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        ),
        after = IMAGE_SPACING_AFTER,
        cx = cx,
        cy = cy,
        number = number,
        pic = NS_PIC,
        name = name,
        rel = rel,
    );
}

fn header_xml(text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="{NS_MAIN}" xmlns:r="{NS_REL}"><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:color w:val="{WATERMARK_COLOR}"/><w:sz w:val="{WATERMARK_HALF_POINTS}"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:hdr>"#,
        escape_xml(text)
    )
}

/// Escape markup characters and drop anything XML 1.0 cannot carry.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
