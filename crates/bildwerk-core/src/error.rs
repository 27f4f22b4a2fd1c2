// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Per-image errors (the batch skips the image and continues) --
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),

    // -- Input validation (fail fast) --
    #[error("invalid input format: {0}")]
    InvalidInputFormat(String),

    #[error("invalid image dimensions: {0}")]
    InvalidDimensions(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    // -- Compression worker (never surfaced; triggers inline fallback) --
    #[error("compression worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("compression worker transfer failed: {0}")]
    WorkerTransferFailed(String),

    // -- Export --
    #[error("document rendering failed: {0}")]
    Render(String),

    #[error("no images to export")]
    NothingToExport,

    #[error("operation cancelled")]
    Cancelled,

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BildwerkError {
    /// Errors confined to a single image. A batch records these and moves on.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Encode(_) | Self::InvalidInputFormat(_) | Self::InvalidDimensions(_)
        )
    }

    /// Errors raised by the offloaded compression path. Callers never see
    /// these; the pipeline falls back to inline compression instead.
    pub fn is_worker_failure(&self) -> bool {
        matches!(self, Self::WorkerUnavailable(_) | Self::WorkerTransferFailed(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;
