// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch operations: ingest files through the compressor, then lay out and
// render an export. Progress goes to the injected notification sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::human_errors::humanize_error;
use bildwerk_core::notify::NotificationSink;
use bildwerk_core::size::format_file_size;
use bildwerk_core::types::{
    CompressOptions, Document, ExportFormat, ExportOptions, PreparedImage, RawImage, total_sizes,
};
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::image::Compressor;
use crate::layout::{layout, page_count};
use crate::render;

/// Cooperative cancellation shared between a caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A file offered for ingestion.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    /// Declared MIME type.
    pub mime: String,
    pub data: Arc<[u8]>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    fn is_image(&self) -> bool {
        self.mime.trim().to_ascii_lowercase().starts_with("image/")
    }
}

/// What an ingest batch produced.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub images: Vec<PreparedImage>,
    /// Images that could not be compressed.
    pub failed: usize,
    /// Files whose MIME type was not `image/*`.
    pub skipped_non_images: usize,
    pub cancelled: bool,
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub document: Document,
    pub rendered: usize,
    pub failed: usize,
}

/// Compress `files` one at a time through `compressor`.
///
/// A file that fails is reported and skipped; the batch carries on. The
/// cancel flag is checked before each file.
#[instrument(skip_all, fields(files = files.len(), compressor = compressor.label()))]
pub async fn ingest<C: Compressor>(
    files: Vec<IncomingFile>,
    compressor: &C,
    options: CompressOptions,
    sink: &dyn NotificationSink,
    cancel: &CancelFlag,
) -> IngestReport {
    let total = files.len();
    let (candidates, others): (Vec<_>, Vec<_>) = files.into_iter().partition(IncomingFile::is_image);
    let mut report = IngestReport {
        skipped_non_images: others.len(),
        ..IngestReport::default()
    };

    if candidates.is_empty() {
        warn!(total, "no image files in selection");
        sink.warning("Please select image files.");
        return report;
    }

    for file in candidates {
        if cancel.is_cancelled() {
            info!(done = report.images.len(), "ingest cancelled");
            report.cancelled = true;
            break;
        }

        let original_size = file.data.len();
        let outcome = match RawImage::from_mime(file.name.as_str(), &file.mime, file.data) {
            Ok(raw) => compressor.compress(raw, options).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(compressed) => {
                let prepared = PreparedImage::new(file.name, compressed, original_size);
                info!(
                    name = %prepared.name,
                    original = original_size,
                    compressed = prepared.compressed_size(),
                    savings = %format!("{:.0}%", prepared.savings_ratio() * 100.0),
                    "image ingested"
                );
                report.images.push(prepared);
            }
            Err(err) => {
                warn!(name = %file.name, error = %err, "image skipped");
                report.failed += 1;
                notify_failure(sink, &err, Some(&file.name));
            }
        }
    }

    if !report.images.is_empty() {
        let (original, compressed) = total_sizes(&report.images);
        sink.success(&format!(
            "Added {} image(s) ({} → {})",
            report.images.len(),
            format_file_size(original as u64),
            format_file_size(compressed as u64)
        ));
    }
    report
}

/// Lay out `images` once and render them as `format`.
///
/// Rendering runs on the blocking pool. Images that fail to render are
/// skipped and counted in the outcome; only a failure of the document as a
/// whole is an error.
#[instrument(skip_all, fields(images = images.len(), format = ?format))]
pub async fn export(
    images: &[PreparedImage],
    options: &ExportOptions,
    format: ExportFormat,
    sink: &dyn NotificationSink,
    cancel: &CancelFlag,
) -> Result<ExportOutcome> {
    if images.is_empty() {
        let err = BildwerkError::NothingToExport;
        notify_failure(sink, &err, None);
        return Err(err);
    }
    options.validate()?;

    let constraints = options.layout_constraints();
    let items = layout(images, &constraints)?;
    info!(pages = page_count(&items), "layout decided");

    if cancel.is_cancelled() {
        info!("export cancelled before rendering");
        return Err(BildwerkError::Cancelled);
    }

    let filename = export_filename(Utc::now(), format);
    let owned_images = images.to_vec();
    let rendered = tokio::task::spawn_blocking(move || {
        render::render(format, &items, &owned_images, &constraints)
    })
    .await
    .map_err(|err| BildwerkError::Render(format!("render task failed: {err}")))
    .and_then(|result| result);

    let rendered = match rendered {
        Ok(rendered) => rendered,
        Err(err) => {
            error!(error = %err, "export failed");
            notify_failure(sink, &err, None);
            return Err(err);
        }
    };

    if rendered.failed > 0 {
        sink.warning(&format!(
            "Exported {} image(s); {} could not be included.",
            rendered.rendered, rendered.failed
        ));
    } else {
        sink.success(&format!("Exported {} image(s) to {filename}", rendered.rendered));
    }

    Ok(ExportOutcome {
        document: Document {
            bytes: rendered.bytes,
            filename,
            format,
        },
        rendered: rendered.rendered,
        failed: rendered.failed,
    })
}

/// Tell the user about `err` at the level its severity calls for.
fn notify_failure(sink: &dyn NotificationSink, err: &BildwerkError, subject: Option<&str>) {
    let human = humanize_error(err);
    let message = match subject {
        Some(subject) => format!("{subject}: {}", human.line()),
        None => human.line(),
    };
    sink.notify(human.severity.notification_level(), &message);
}

/// `images-export-YYYY-MM-DDTHH-MM-SS.<ext>` in UTC.
pub fn export_filename(at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "images-export-{}.{}",
        at.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::LocalCompressor;
    use crate::image::compress::tests::{encode_as, noisy_rgb};
    use bildwerk_core::notify::{NotificationLevel, NotificationQueue};
    use bildwerk_core::types::PageSize;
    use chrono::TimeZone;
    use image::{DynamicImage, ImageFormat};

    fn png_file(name: &str, seed: u32) -> IncomingFile {
        let source = DynamicImage::ImageRgb8(noisy_rgb(48, 32, seed));
        IncomingFile::new(name, "image/png", encode_as(&source, ImageFormat::Png))
    }

    fn export_options() -> ExportOptions {
        ExportOptions {
            quality: 0.9,
            max_image_width: 600.0,
            max_image_height: 800.0,
            max_page_content_height: 1000.0,
            page_size: PageSize::A4,
            watermark_text: None,
        }
    }

    fn levels(queue: &NotificationQueue) -> Vec<NotificationLevel> {
        queue.pending().into_iter().map(|n| n.level).collect()
    }

    #[test]
    fn filename_uses_dashed_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            export_filename(at, ExportFormat::Pdf),
            "images-export-2026-03-07T09-05-01.pdf"
        );
        assert_eq!(
            export_filename(at, ExportFormat::Docx),
            "images-export-2026-03-07T09-05-01.docx"
        );
    }

    #[tokio::test]
    async fn ingest_skips_failures_and_non_images() {
        let files = vec![
            png_file("a.png", 1),
            IncomingFile::new("notes.txt", "text/plain", b"hello".to_vec()),
            IncomingFile::new("broken.jpg", "image/jpeg", vec![0u8; 16]),
            IncomingFile::new("pic.webp", "image/webp", vec![0u8; 16]),
            png_file("b.png", 2),
        ];
        let queue = NotificationQueue::new(10);
        let report = ingest(
            files,
            &LocalCompressor,
            CompressOptions::default(),
            &queue,
            &CancelFlag::new(),
        )
        .await;

        assert_eq!(report.images.len(), 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.skipped_non_images, 1);
        assert!(!report.cancelled);
        assert_eq!(report.images[1].name, "b.png");
        assert_eq!(
            levels(&queue),
            vec![
                // Damaged image: only that item was skipped.
                NotificationLevel::Warning,
                // Unsupported format: retrying will not help.
                NotificationLevel::Error,
                NotificationLevel::Success
            ]
        );
    }

    #[tokio::test]
    async fn ingest_without_images_warns() {
        let queue = NotificationQueue::new(10);
        let files = vec![IncomingFile::new("a.pdf", "application/pdf", vec![1u8])];
        let report = ingest(
            files,
            &LocalCompressor,
            CompressOptions::default(),
            &queue,
            &CancelFlag::new(),
        )
        .await;
        assert!(report.images.is_empty());
        assert_eq!(levels(&queue), vec![NotificationLevel::Warning]);
    }

    #[tokio::test]
    async fn cancelled_ingest_stops_before_next_file() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = ingest(
            vec![png_file("a.png", 1)],
            &LocalCompressor,
            CompressOptions::default(),
            &NotificationQueue::new(4),
            &cancel,
        )
        .await;
        assert!(report.cancelled);
        assert!(report.images.is_empty());
    }

    #[tokio::test]
    async fn export_refuses_empty_batch() {
        let queue = NotificationQueue::new(4);
        let err = export(&[], &export_options(), ExportFormat::Pdf, &queue, &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BildwerkError::NothingToExport));
        assert_eq!(levels(&queue), vec![NotificationLevel::Warning]);
    }

    #[tokio::test]
    async fn export_produces_named_document() {
        let queue = NotificationQueue::new(10);
        let report = ingest(
            vec![png_file("a.png", 3), png_file("b.png", 4)],
            &LocalCompressor,
            CompressOptions::default(),
            &queue,
            &CancelFlag::new(),
        )
        .await;

        let outcome = export(
            &report.images,
            &export_options(),
            ExportFormat::Docx,
            &queue,
            &CancelFlag::new(),
        )
        .await
        .unwrap();
        assert_eq!((outcome.rendered, outcome.failed), (2, 0));
        assert!(outcome.document.filename.starts_with("images-export-"));
        assert!(outcome.document.filename.ends_with(".docx"));
        assert_eq!(&outcome.document.bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn export_observes_cancellation() {
        let report = ingest(
            vec![png_file("a.png", 5)],
            &LocalCompressor,
            CompressOptions::default(),
            &NotificationQueue::new(4),
            &CancelFlag::new(),
        )
        .await;
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = export(
            &report.images,
            &export_options(),
            ExportFormat::Pdf,
            &NotificationQueue::new(4),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BildwerkError::Cancelled));
    }

    #[tokio::test]
    async fn invalid_options_fail_fast() {
        let report = ingest(
            vec![png_file("a.png", 6)],
            &LocalCompressor,
            CompressOptions::default(),
            &NotificationQueue::new(4),
            &CancelFlag::new(),
        )
        .await;
        let mut options = export_options();
        options.max_page_content_height = 0.0;
        let err = export(
            &report.images,
            &options,
            ExportFormat::Pdf,
            &NotificationQueue::new(4),
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BildwerkError::InvalidOptions(_)));
    }
}
