// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BildwerkError, Result};
use crate::types::{CompressOptions, ExportOptions, PageSize};

/// Persistent export settings.
///
/// Missing keys in a config file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Lossy quality for non-PNG sources, in (0, 1].
    pub quality: f32,
    /// Bounding box applied when re-encoding (pixels).
    pub compress_max_width: u32,
    pub compress_max_height: u32,
    /// Bounding box for an image on the page (logical pixels).
    pub display_max_width: f64,
    pub display_max_height: f64,
    /// Logical pixels of content per page before a break is forced.
    pub page_content_height: f64,
    pub page_size: PageSize,
    pub watermark_text: Option<String>,
    /// Run compression on the dedicated worker thread when the host allows it.
    pub offload_compression: bool,
    /// How long to wait for a worker reply before compressing inline.
    pub worker_timeout_secs: u64,
    /// Maximum number of pending notifications kept in the queue.
    pub notification_capacity: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            quality: CompressOptions::DEFAULT_QUALITY,
            compress_max_width: CompressOptions::DEFAULT_MAX_SIDE,
            compress_max_height: CompressOptions::DEFAULT_MAX_SIDE,
            display_max_width: 600.0,
            display_max_height: 800.0,
            page_content_height: 1000.0,
            page_size: PageSize::A4,
            watermark_text: None,
            offload_compression: true,
            worker_timeout_secs: 30,
            notification_capacity: 50,
        }
    }
}

impl ExportConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded export config");
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.compress_options()?;
        self.export_options().validate()?;
        if self.worker_timeout_secs == 0 {
            return Err(BildwerkError::Config(
                "worker_timeout_secs must be at least 1".into(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(BildwerkError::Config(
                "notification_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn compress_options(&self) -> Result<CompressOptions> {
        CompressOptions::new(self.quality, self.compress_max_width, self.compress_max_height)
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            quality: self.quality,
            max_image_width: self.display_max_width,
            max_image_height: self.display_max_height,
            max_page_content_height: self.page_content_height,
            page_size: self.page_size,
            watermark_text: self.watermark_text.clone(),
        }
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }
}
