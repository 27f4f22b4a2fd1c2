// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-document: Turns photo batches into paginated documents.
//
// Provides the compression pipeline (inline or on a dedicated worker thread),
// the pagination engine that decides scaling and page breaks once, and the
// DOCX and PDF renderers that both follow that single layout.

pub mod data_url;
pub mod export;
pub mod image;
pub mod layout;
pub mod render;

// Re-export the entry points so callers can use `bildwerk_document::export` etc.
pub use export::{CancelFlag, ExportOutcome, IncomingFile, IngestReport, export, ingest};
pub use crate::image::{
    ActiveCompressor, Compressor, LocalCompressor, OffloadedCompressor, select_compressor,
};
pub use layout::layout;
