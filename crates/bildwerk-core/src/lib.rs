// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bildwerk: Core types, error definitions, configuration and the
// notification capability shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod notify;
pub mod size;
pub mod types;

pub use config::ExportConfig;
pub use error::BildwerkError;
pub use notify::{NotificationLevel, NotificationQueue, NotificationSink, TracingSink};
pub use size::format_file_size;
pub use types::*;
