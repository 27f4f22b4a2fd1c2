// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bildwerk: compress photos and export them as captioned DOCX or PDF.
//
// Entry point. Initialises logging, loads configuration, picks the
// compressor, and runs ingest followed by one export per requested format.

mod args;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bildwerk_core::config::ExportConfig;
use bildwerk_core::error::Result;
use bildwerk_core::human_errors::humanize_error;
use bildwerk_core::notify::{NotificationQueue, NotificationSink, TracingSink};
use bildwerk_core::types::{ImageKind, PreparedImage};
use bildwerk_core::format_file_size;
use bildwerk_document::{CancelFlag, IncomingFile, data_url, export, ingest, select_compressor};
use clap::Parser;
use tracing::{info, warn};

use args::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Bildwerk starting");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "bildwerk failed");
            eprintln!("{}", humanize_error(&err).line());
            ExitCode::FAILURE
        }
    }
}

/// Run one batch and return the paths of the documents written.
async fn run(cli: Cli) -> Result<Vec<PathBuf>> {
    let config = load_config(&cli)?;
    let compress_options = config.compress_options()?;
    let compressor = select_compressor(
        config.offload_compression && !cli.no_offload,
        config.worker_timeout(),
    );

    let files = cli
        .files
        .iter()
        .map(|path| read_file(path))
        .collect::<Result<Vec<_>>>()?;

    let queue = NotificationQueue::new(config.notification_capacity);
    let cancel = CancelFlag::new();
    let mut report = ingest(files, &compressor, compress_options, &queue, &cancel).await;
    flush_notifications(&queue);
    if report.skipped_non_images > 0 {
        warn!(skipped = report.skipped_non_images, "ignored files that are not images");
    }
    if cli.captions_from_names {
        for image in &mut report.images {
            image.set_caption(caption_from_name(&image.name));
        }
    }
    if let Some(path) = &cli.previews {
        write_previews(path, &report.images)?;
    }

    let export_options = config.export_options();
    std::fs::create_dir_all(&cli.out)?;
    let mut written = Vec::new();
    for format in cli.format.formats() {
        let outcome = export(&report.images, &export_options, format, &queue, &cancel).await;
        flush_notifications(&queue);
        let outcome = outcome?;
        let path = cli.out.join(&outcome.document.filename);
        std::fs::write(&path, &outcome.document.bytes)?;
        info!(
            path = %path.display(),
            size = %format_file_size(outcome.document.bytes.len() as u64),
            rendered = outcome.rendered,
            failed = outcome.failed,
            "document written"
        );
        written.push(path);
    }
    Ok(written)
}

/// Defaults, then the config file, then command-line overrides.
fn load_config(cli: &Cli) -> Result<ExportConfig> {
    let mut config = match &cli.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<IncomingFile> {
    let data = std::fs::read(path)?;
    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageKind::from_extension)
        .map_or("application/octet-stream", |kind| kind.mime_type());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(IncomingFile::new(name, mime, data))
}

/// Show what the batch reported. The queue holds at most
/// `notification_capacity` messages, so a long batch keeps only the latest.
fn flush_notifications(queue: &NotificationQueue) {
    for note in queue.drain() {
        TracingSink.notify(note.level, &note.message);
    }
}

fn write_previews(path: &Path, images: &[PreparedImage]) -> Result<()> {
    let mut lines = String::new();
    let mut payload = 0;
    for image in images {
        let url = data_url::encode(&image.compressed);
        payload += data_url::payload_size(&url);
        lines.push_str(&image.name);
        lines.push('\t');
        lines.push_str(&url);
        lines.push('\n');
    }
    std::fs::write(path, lines)?;
    info!(
        path = %path.display(),
        images = images.len(),
        payload = %format_file_size(payload as u64),
        "previews written"
    );
    Ok(())
}

/// `harbour_at-dusk.jpg` becomes `harbour at dusk`.
fn caption_from_name(name: &str) -> Option<String> {
    let stem = Path::new(name).file_stem()?.to_string_lossy();
    let caption = stem.replace(['_', '-'], " ");
    let caption = caption.trim();
    (!caption.is_empty()).then(|| caption.to_string())
}
