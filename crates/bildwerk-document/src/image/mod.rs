// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: aspect fitting, the compression pipeline, and the two ways
// of running it (inline or on the dedicated worker thread).

pub mod compress;
pub mod fit;
pub mod worker;

use std::future::Future;
use std::time::Duration;

use bildwerk_core::error::Result;
use bildwerk_core::types::{CompressOptions, CompressedImage, RawImage};
use tracing::{info, warn};

pub use compress::compress;
pub use fit::{fit, fit_pixels};
pub use worker::OffloadedCompressor;

/// Something that can run the compression pipeline.
pub trait Compressor: Send + Sync {
    /// Compress one image. Only decode/encode failures are returned.
    fn compress(
        &self,
        raw: RawImage,
        options: CompressOptions,
    ) -> impl Future<Output = Result<CompressedImage>> + Send;

    /// Short label for logs.
    fn label(&self) -> &'static str;
}

/// Runs the pipeline in the calling context.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCompressor;

impl Compressor for LocalCompressor {
    fn compress(
        &self,
        raw: RawImage,
        options: CompressOptions,
    ) -> impl Future<Output = Result<CompressedImage>> + Send {
        async move { compress::compress(&raw, &options) }
    }

    fn label(&self) -> &'static str {
        "local"
    }
}

/// The compressor picked at startup.
#[derive(Debug)]
pub enum ActiveCompressor {
    Local(LocalCompressor),
    Offloaded(OffloadedCompressor),
}

impl Compressor for ActiveCompressor {
    fn compress(
        &self,
        raw: RawImage,
        options: CompressOptions,
    ) -> impl Future<Output = Result<CompressedImage>> + Send {
        async move {
            match self {
                Self::Local(local) => local.compress(raw, options).await,
                Self::Offloaded(offloaded) => offloaded.compress(raw, options).await,
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Local(local) => local.label(),
            Self::Offloaded(offloaded) => offloaded.label(),
        }
    }
}

/// Pick the compressor once for the life of the process.
///
/// The worker thread is used only when requested, when the host has more
/// than one hardware thread, and when the thread actually starts.
pub fn select_compressor(prefer_offload: bool, reply_timeout: Duration) -> ActiveCompressor {
    if !prefer_offload {
        info!("compression offload disabled, compressing inline");
        return ActiveCompressor::Local(LocalCompressor);
    }

    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if threads < 2 {
        info!(threads, "single hardware thread, compressing inline");
        return ActiveCompressor::Local(LocalCompressor);
    }

    match OffloadedCompressor::spawn(reply_timeout) {
        Ok(worker) => {
            info!(threads, "compression worker started");
            ActiveCompressor::Offloaded(worker)
        }
        Err(err) => {
            warn!(error = %err, "compression worker unavailable, compressing inline");
            ActiveCompressor::Local(LocalCompressor)
        }
    }
}
