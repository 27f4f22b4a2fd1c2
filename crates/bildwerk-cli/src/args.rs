// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use bildwerk_core::config::ExportConfig;
use bildwerk_core::types::{ExportFormat, PageSize};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Docx,
    Pdf,
    Both,
}

impl FormatArg {
    pub fn formats(&self) -> Vec<ExportFormat> {
        match self {
            Self::Docx => vec![ExportFormat::Docx],
            Self::Pdf => vec![ExportFormat::Pdf],
            Self::Both => vec![ExportFormat::Docx, ExportFormat::Pdf],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PageArg {
    A4,
    Letter,
    Custom,
}

#[derive(Debug, Parser)]
#[command(name = "bildwerk")]
#[command(about = "Compress photos and export them as a captioned, paginated DOCX or PDF")]
#[command(version)]
pub struct Cli {
    /// Images to include, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "pdf")]
    pub format: FormatArg,

    /// Directory the documents are written to
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// JSON config file (defaults apply for missing keys)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JPEG quality for non-PNG sources, in (0, 1]
    #[arg(long)]
    pub quality: Option<f32>,

    /// Largest image width on the page, in logical pixels
    #[arg(long)]
    pub max_width: Option<f64>,

    /// Largest image height on the page, in logical pixels
    #[arg(long)]
    pub max_height: Option<f64>,

    /// Logical pixels of content per page
    #[arg(long)]
    pub page_height: Option<f64>,

    /// Paper size
    #[arg(long, value_enum)]
    pub page: Option<PageArg>,

    /// Custom page width (with --page custom); defaults to A4 width
    #[arg(long)]
    pub page_width_mm: Option<f32>,

    /// Custom page height (with --page custom); defaults to A4 height
    #[arg(long)]
    pub page_height_mm: Option<f32>,

    /// Text repeated at the top of every page
    #[arg(long)]
    pub watermark: Option<String>,

    /// Caption each image with its file name
    #[arg(long)]
    pub captions_from_names: bool,

    /// Compress on the calling thread instead of the worker
    #[arg(long)]
    pub no_offload: bool,

    /// Also write each compressed image as a `data:` URL, one
    /// `name<TAB>url` line per image
    #[arg(long)]
    pub previews: Option<PathBuf>,
}

impl Cli {
    /// Overwrite config values with whatever was given on the command line.
    pub fn apply_overrides(&self, config: &mut ExportConfig) {
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(width) = self.max_width {
            config.display_max_width = width;
        }
        if let Some(height) = self.max_height {
            config.display_max_height = height;
        }
        if let Some(height) = self.page_height {
            config.page_content_height = height;
        }
        match self.page {
            Some(PageArg::A4) => config.page_size = PageSize::A4,
            Some(PageArg::Letter) => config.page_size = PageSize::Letter,
            Some(PageArg::Custom) => {
                config.page_size = PageSize::custom(self.page_width_mm, self.page_height_mm)
            }
            None => {}
        }
        if let Some(text) = &self.watermark {
            config.watermark_text = Some(text.clone());
        }
        if self.no_offload {
            config.offload_compression = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "bildwerk",
            "--quality",
            "0.6",
            "--page",
            "custom",
            "--page-height-mm",
            "150",
            "--watermark",
            "DRAFT",
            "a.jpg",
        ]);
        let mut config = ExportConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.quality, 0.6);
        assert_eq!(config.page_size.dimensions_mm(), (210.0, 150.0));
        assert_eq!(config.watermark_text.as_deref(), Some("DRAFT"));
        assert!(config.offload_compression);
    }

    #[test]
    fn both_expands_to_two_formats() {
        assert_eq!(
            FormatArg::Both.formats(),
            vec![ExportFormat::Docx, ExportFormat::Pdf]
        );
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["bildwerk"]).is_err());
    }
}
