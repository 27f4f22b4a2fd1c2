// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end: ingest a batch, export it as DOCX and PDF, and check that both
// documents paginate the same way.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use bildwerk_core::notify::NotificationQueue;
use bildwerk_core::types::{
    CompressOptions, CompressedImage, ExportFormat, ExportOptions, ImageKind, PageSize,
};
use bildwerk_document::layout::{layout, page_count};
use bildwerk_document::{CancelFlag, IncomingFile, export, ingest, select_compressor};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn photo(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_add(17);
    let img = RgbImage::from_fn(width, height, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let n = (state >> 24) as u8 & 0x1f;
        Rgb([(x % 256) as u8 ^ n, (y % 256) as u8 ^ n, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

fn batch() -> Vec<IncomingFile> {
    vec![
        IncomingFile::new("wide.png", "image/png", photo(640, 320, 1)),
        IncomingFile::new("tall.png", "image/png", photo(240, 720, 2)),
        IncomingFile::new("square.png", "image/png", photo(400, 400, 3)),
        IncomingFile::new("small.png", "image/png", photo(120, 90, 4)),
    ]
}

fn options() -> ExportOptions {
    ExportOptions {
        quality: 0.9,
        max_image_width: 600.0,
        max_image_height: 800.0,
        max_page_content_height: 1000.0,
        page_size: PageSize::A4,
        watermark_text: Some("Proof copy".into()),
    }
}

fn pdf_page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .expect("valid pdf")
        .get_pages()
        .len()
}

fn docx_page_count(bytes: &[u8]) -> usize {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid docx");
    let mut body = String::new();
    archive
        .by_name("word/document.xml")
        .expect("document part")
        .read_to_string(&mut body)
        .expect("utf-8");
    1 + body.matches(r#"<w:br w:type="page"/>"#).count()
}

#[tokio::test]
async fn both_formats_agree_on_pages() {
    let compressor = select_compressor(true, Duration::from_secs(30));
    let queue = NotificationQueue::new(50);
    let cancel = CancelFlag::new();

    let report = ingest(batch(), &compressor, CompressOptions::default(), &queue, &cancel).await;
    assert_eq!(report.images.len(), 4);
    assert_eq!(report.failed, 0);

    let expected = page_count(&layout(&report.images, &options().layout_constraints()).unwrap());
    assert!(expected >= 2);

    let docx = export(&report.images, &options(), ExportFormat::Docx, &queue, &cancel)
        .await
        .unwrap();
    let pdf = export(&report.images, &options(), ExportFormat::Pdf, &queue, &cancel)
        .await
        .unwrap();

    assert_eq!(docx_page_count(&docx.document.bytes), expected);
    assert_eq!(pdf_page_count(&pdf.document.bytes), expected);
    assert_eq!(docx.rendered, 4);
    assert_eq!(pdf.rendered, 4);
}

async fn export_with_second_image_replaced(data: Vec<u8>, kind: ImageKind) {
    let queue = NotificationQueue::new(50);
    let cancel = CancelFlag::new();
    let mut images = ingest(batch(), &bildwerk_document::LocalCompressor, CompressOptions::default(), &queue, &cancel)
        .await
        .images;

    // Corrupt the second image after ingestion, keeping its declared size.
    let (width, height) = (images[1].compressed.width, images[1].compressed.height);
    images[1].compressed = Arc::new(CompressedImage {
        data,
        kind,
        width,
        height,
    });

    let docx = export(&images, &options(), ExportFormat::Docx, &queue, &cancel)
        .await
        .unwrap();
    let pdf = export(&images, &options(), ExportFormat::Pdf, &queue, &cancel)
        .await
        .unwrap();

    assert_eq!((docx.rendered, docx.failed), (3, 1));
    assert_eq!((pdf.rendered, pdf.failed), (3, 1));
    assert_eq!(
        docx_page_count(&docx.document.bytes),
        pdf_page_count(&pdf.document.bytes)
    );
}

#[tokio::test]
async fn corrupt_image_is_skipped_consistently() {
    export_with_second_image_replaced(vec![0xAB; 64], ImageKind::Jpeg).await;
}

#[tokio::test]
async fn truncated_image_is_skipped_consistently() {
    // The header (and so the dimensions) survives; the pixel data does not.
    let mut data = photo(64, 48, 9);
    data.truncate(60);
    export_with_second_image_replaced(data, ImageKind::Png).await;
}
