// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF renderer: coordinate layout using `printpdf` 0.8.
//
// A running cursor measured from the top of the page places each image and
// its caption; the page breaks come from the layout, not from measuring here.
// A page whose items would run past the bottom margin is scaled down as a
// whole, so nothing is ever drawn off the page.
// printpdf's origin is bottom-left, so every y is flipped against the page
// height when the op is emitted.

use bildwerk_core::error::Result;
use bildwerk_core::types::{LayoutConstraints, LayoutItem, PreparedImage};
use printpdf::{
    BuiltinFont, Color, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt,
    RawImage, RawImageData, RawImageFormat, Rgb, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument};

use super::{PlannedItem, RenderPlan, RenderedDocument, decode_image, plan};
use crate::image::compress::flatten_onto_white;

/// Top and side margin.
pub const MARGIN_PT: f32 = 40.0;
/// Gap between an image and its caption baseline.
pub const CAPTION_GAP_PT: f32 = 8.0;
/// Height of the caption line.
pub const CAPTION_LINE_PT: f32 = 20.0;
/// Space after a caption.
pub const ITEM_SPACING_PT: f32 = 15.0;
pub const CAPTION_FONT_SIZE: f32 = 11.0;
/// Watermark baseline, measured from the top edge.
pub const WATERMARK_TOP_PT: f32 = 20.0;
pub const WATERMARK_FONT_SIZE: f32 = 10.0;
/// Logical pixels are 1/96 in.
pub const PT_PER_PX: f32 = 72.0 / 96.0;

const IMAGE_DPI: f32 = 72.0;
// Advance per item on top of the image itself.
const ITEM_OVERHEAD_PT: f32 = CAPTION_GAP_PT + CAPTION_LINE_PT + ITEM_SPACING_PT;
// Average glyph advance as a fraction of the font size.
const HELVETICA_EM: f32 = 0.5;
const HELVETICA_BOLD_EM: f32 = 0.55;

/// Render the layout as a PDF.
#[instrument(skip_all, fields(items = items.len(), page = ?constraints.page_size))]
pub fn render(
    items: &[LayoutItem],
    images: &[PreparedImage],
    constraints: &LayoutConstraints,
) -> Result<RenderedDocument> {
    let plan = plan(items, images, decode_rgb);
    let mut doc = PdfDocument::new("Bildwerk Export");
    let page_ops = build_pages(&mut doc, &plan, constraints);

    let (w_mm, h_mm) = constraints.page_size.dimensions_mm();
    let pages: Vec<PdfPage> = page_ops
        .into_iter()
        .map(|ops| PdfPage::new(Mm(w_mm), Mm(h_mm), ops))
        .collect();
    let page_total = pages.len();
    doc.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        debug!(warnings = warnings.len(), "printpdf reported warnings");
    }

    info!(
        rendered = plan.entries.len(),
        failed = plan.failed,
        pages = page_total,
        bytes = bytes.len(),
        "PDF rendered"
    );
    Ok(RenderedDocument {
        bytes,
        rendered: plan.entries.len(),
        failed: plan.failed,
        pages: page_total,
    })
}

/// Decode to RGB8 for embedding. Transparency is flattened onto white.
fn decode_rgb(image: &PreparedImage) -> Result<RawImage> {
    let rgb = flatten_onto_white(&decode_image(image)?);
    Ok(RawImage {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
        pixels: RawImageData::U8(rgb.into_raw()),
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    })
}

/// Emit the op lists, one per physical page. Always at least one page.
fn build_pages(
    doc: &mut PdfDocument,
    plan: &RenderPlan<'_, RawImage>,
    constraints: &LayoutConstraints,
) -> Vec<Vec<Op>> {
    let (w_mm, h_mm) = constraints.page_size.dimensions_mm();
    let page_w = Mm(w_mm).into_pt().0;
    let page_h = Mm(h_mm).into_pt().0;
    let usable_w = page_w - 2.0 * MARGIN_PT;
    let usable_h = page_h - 2.0 * MARGIN_PT;
    let watermark = constraints.watermark().map(winansi_text);

    let mut pages = Vec::new();
    for group in plan.entries.chunk_by(|_, next| !next.page_break) {
        let mut ops: Vec<Op> = Vec::new();
        if let Some(text) = &watermark {
            let x = centered_x(text, WATERMARK_FONT_SIZE, HELVETICA_EM, page_w);
            push_text(
                &mut ops,
                text,
                x,
                page_h - WATERMARK_TOP_PT,
                WATERMARK_FONT_SIZE,
                BuiltinFont::Helvetica,
                grey(200),
            );
        }
        place_group(doc, &mut ops, group, page_w, page_h, usable_w, usable_h);
        pages.push(ops);
    }

    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

/// Draw one physical page's items top to bottom. The layout's page capacity
/// is in logical px and says nothing about the physical page, so the whole
/// group is shrunk when it would run past the bottom margin.
fn place_group(
    doc: &mut PdfDocument,
    ops: &mut Vec<Op>,
    group: &[PlannedItem<'_, RawImage>],
    page_w: f32,
    page_h: f32,
    usable_w: f32,
    usable_h: f32,
) {
    let sizes: Vec<(f32, f32)> = group
        .iter()
        .map(|entry| placement(entry.item, usable_w, usable_h))
        .collect();
    let shrink = page_fit(&sizes, usable_h);
    if shrink < 1.0 {
        debug!(items = group.len(), shrink, "shrinking page to fit");
    }

    let mut cursor = MARGIN_PT;
    for (entry, (w, h)) in group.iter().zip(sizes) {
        let (draw_w, draw_h) = (w * shrink, h * shrink);
        let px_w = entry.payload.width.max(1) as f32;
        let px_h = entry.payload.height.max(1) as f32;
        let x = (page_w - draw_w) / 2.0;
        let xobject_id = doc.add_image(&entry.payload);
        ops.push(Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(page_h - cursor - draw_h)),
                scale_x: Some(draw_w / px_w),
                scale_y: Some(draw_h / px_h),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        });
        cursor += draw_h + CAPTION_GAP_PT * shrink;

        let caption = winansi_text(&entry.item.caption_text);
        let caption_x = centered_x(&caption, CAPTION_FONT_SIZE, HELVETICA_BOLD_EM, page_w);
        push_text(
            ops,
            &caption,
            caption_x,
            page_h - cursor,
            CAPTION_FONT_SIZE,
            BuiltinFont::HelveticaBold,
            grey(0),
        );
        cursor += (CAPTION_LINE_PT + ITEM_SPACING_PT) * shrink;

        debug!(index = entry.item.index, draw_w, draw_h, cursor, "Placed image");
    }
}

/// Drawn size in pt. Never wider than the usable width, never enlarged,
/// and small enough that one image plus caption fits the page height.
fn placement(item: &LayoutItem, usable_w: f32, usable_h: f32) -> (f32, f32) {
    let w = (item.display_width as f32 * PT_PER_PX).max(f32::EPSILON);
    let h = (item.display_height as f32 * PT_PER_PX).max(f32::EPSILON);

    let mut scale = (usable_w / w).min(1.0);
    let max_h = (usable_h - ITEM_OVERHEAD_PT).max(1.0);
    if h * scale > max_h {
        scale = max_h / h;
    }
    (w * scale, h * scale)
}

/// Factor in (0, 1] that brings a page's images and caption advances within
/// `usable_h`.
fn page_fit(sizes: &[(f32, f32)], usable_h: f32) -> f32 {
    let needed: f32 = sizes.iter().map(|&(_, h)| h + ITEM_OVERHEAD_PT).sum();
    if needed > usable_h { usable_h / needed } else { 1.0 }
}

fn push_text(
    ops: &mut Vec<Op>,
    text: &str,
    x: f32,
    y: f32,
    size: f32,
    font: BuiltinFont,
    color: Color,
) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetFillColor { col: color });
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_string())],
        font,
    });
    ops.push(Op::EndTextSection);
}

fn grey(level: u8) -> Color {
    let v = f32::from(level) / 255.0;
    Color::Rgb(Rgb {
        r: v,
        g: v,
        b: v,
        icc_profile: None,
    })
}

/// Left edge that centres `text` on the page, estimated from an average
/// glyph width. Never left of the margin.
fn centered_x(text: &str, size: f32, em: f32, page_w: f32) -> f32 {
    let width = text.chars().count() as f32 * size * em;
    ((page_w - width) / 2.0).max(MARGIN_PT)
}

/// Builtin fonts only cover Latin-1; everything else becomes `?`.
pub fn winansi_text(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c,
            _ => '?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::compress::tests::{encode_as, noisy_rgb};
    use crate::render::tests::{item, truncated_png};
    use bildwerk_core::types::{CompressedImage, ImageKind, PageSize};
    use image::{DynamicImage, ImageFormat};

    fn png_image(name: &str) -> PreparedImage {
        let source = DynamicImage::ImageRgb8(noisy_rgb(16, 12, 11));
        PreparedImage::new(
            name,
            CompressedImage {
                data: encode_as(&source, ImageFormat::Png),
                kind: ImageKind::Png,
                width: 16,
                height: 12,
            },
            0,
        )
    }

    fn constraints(watermark: Option<&str>) -> LayoutConstraints {
        LayoutConstraints {
            max_image_width: 600.0,
            max_image_height: 800.0,
            max_page_content_height: 1000.0,
            page_size: PageSize::A4,
            watermark_text: watermark.map(str::to_string),
        }
    }

    fn pdf_pages(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes).expect("valid pdf").get_pages().len()
    }

    fn helvetica_writes(ops: &[Op]) -> usize {
        ops.iter()
            .filter(|op| {
                matches!(
                    op,
                    Op::WriteTextBuiltinFont {
                        font: BuiltinFont::Helvetica,
                        ..
                    }
                )
            })
            .count()
    }

    #[test]
    fn pages_follow_layout_breaks() {
        let images = vec![png_image("a"), png_image("b"), png_image("c")];
        let items = [item(0, false, 0), item(1, true, 1), item(2, true, 2)];
        let doc = render(&items, &images, &constraints(None)).unwrap();
        assert_eq!((doc.rendered, doc.failed, doc.pages), (3, 0, 3));
        assert_eq!(pdf_pages(&doc.bytes), 3);
    }

    #[test]
    fn empty_export_is_one_blank_page() {
        let doc = render(&[], &[], &constraints(Some("DRAFT"))).unwrap();
        assert_eq!(doc.pages, 1);
        assert_eq!(pdf_pages(&doc.bytes), 1);
    }

    #[test]
    fn broken_image_is_skipped_and_counted() {
        let mut broken = png_image("b");
        broken.compressed = std::sync::Arc::new(CompressedImage {
            data: vec![0; 8],
            kind: ImageKind::Png,
            width: 16,
            height: 12,
        });
        let images = vec![png_image("a"), broken, png_image("c")];
        let items = [item(0, false, 0), item(1, true, 1), item(2, false, 1)];
        let doc = render(&items, &images, &constraints(None)).unwrap();
        assert_eq!((doc.rendered, doc.failed), (2, 1));
        assert_eq!(pdf_pages(&doc.bytes), 2);
    }

    /// Lowest image bottom edge or caption baseline across the ops.
    fn lowest_y(ops: &[Op]) -> f32 {
        ops.iter()
            .filter_map(|op| match op {
                Op::UseXobject { transform, .. } => transform.translate_y.map(|y| y.0),
                Op::SetTextCursor { pos } => Some(pos.y.0),
                _ => None,
            })
            .fold(f32::INFINITY, f32::min)
    }

    fn sized_item(index: usize, width: f64, height: f64) -> LayoutItem {
        let mut it = item(index, false, 0);
        it.display_width = width;
        it.display_height = height;
        it
    }

    #[test]
    fn crowded_page_is_shrunk_inside_margins() {
        let images = vec![png_image("a"), png_image("b"), png_image("c")];
        let items: Vec<_> = (0..3).map(|i| sized_item(i, 600.0, 800.0)).collect();
        let plan = plan(&items, &images, decode_rgb);
        let mut doc = PdfDocument::new("test");
        let mut roomy = constraints(None);
        roomy.max_page_content_height = 3000.0;
        let pages = build_pages(&mut doc, &plan, &roomy);

        assert_eq!(pages.len(), 1);
        assert!(lowest_y(&pages[0]) >= MARGIN_PT - 0.01);
    }

    #[test]
    fn many_short_items_stay_on_the_page() {
        let images: Vec<_> = (0..16).map(|i| png_image(&format!("s{i}"))).collect();
        let items: Vec<_> = (0..16).map(|i| sized_item(i, 600.0, 12.5)).collect();
        let plan = plan(&items, &images, decode_rgb);
        let mut doc = PdfDocument::new("test");
        let pages = build_pages(&mut doc, &plan, &constraints(None));

        assert_eq!(pages.len(), 1);
        assert!(lowest_y(&pages[0]) >= MARGIN_PT - 0.01);
    }

    #[test]
    fn page_that_fits_is_not_shrunk() {
        assert_eq!(page_fit(&[(100.0, 200.0), (100.0, 200.0)], 760.0), 1.0);
        let shrink = page_fit(&[(100.0, 400.0), (100.0, 400.0)], 760.0);
        assert!((shrink - 760.0 / 886.0).abs() < 1e-6);
    }

    #[test]
    fn truncated_image_is_skipped() {
        let images = vec![png_image("a"), truncated_png("b"), png_image("c")];
        let items = [item(0, false, 0), item(1, false, 0), item(2, false, 0)];
        let doc = render(&items, &images, &constraints(None)).unwrap();
        assert_eq!((doc.rendered, doc.failed, doc.pages), (2, 1, 1));
    }

    #[test]
    fn watermark_drawn_once_per_page() {
        let images = vec![png_image("a"), png_image("b"), png_image("c")];
        let items = [item(0, false, 0), item(1, false, 0), item(2, true, 1)];
        let plan = plan(&items, &images, decode_rgb);
        let mut doc = PdfDocument::new("test");
        let pages = build_pages(&mut doc, &plan, &constraints(Some("Confidential")));

        assert_eq!(pages.len(), 2);
        assert_eq!(helvetica_writes(&pages[0]), 1);
        assert_eq!(helvetica_writes(&pages[1]), 1);
    }

    #[test]
    fn wide_image_scales_to_usable_width() {
        let mut wide = item(0, false, 0);
        wide.display_width = 1200.0;
        wide.display_height = 300.0;
        let (w, h) = placement(&wide, 500.0, 760.0);
        assert!((w - 500.0).abs() < 1e-3);
        assert!((h - 125.0).abs() < 1e-3);

        let small = item(0, false, 0);
        assert_eq!(placement(&small, 500.0, 760.0), (75.0, 75.0));
    }

    #[test]
    fn tall_image_is_capped_to_page_height() {
        let mut tall = item(0, false, 0);
        tall.display_width = 100.0;
        tall.display_height = 4000.0;
        let (_, h) = placement(&tall, 500.0, 760.0);
        assert!(h + CAPTION_GAP_PT + CAPTION_LINE_PT + ITEM_SPACING_PT <= 760.0 + 1e-3);
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(winansi_text("Café"), "Café");
        assert_eq!(winansi_text("東京 🌅"), "?? ?");
        assert_eq!(winansi_text("tab\there"), "tab?here");
    }
}
