// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Bildwerk: images as they move through the
// compression pipeline, layout constraints and items, and export output.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BildwerkError, Result};

/// Encoded image formats Bildwerk accepts and emits.
///
/// Decided once at ingestion; everything downstream matches on the variant
/// rather than inspecting MIME strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
}

impl ImageKind {
    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    /// Canonical file extension (used for DOCX media parts).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    /// Parse a declared MIME type. Parameters (`;charset=...`) and case are
    /// ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Infer the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "bmp" | "dib" => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// An image exactly as the caller supplied it.
///
/// The payload sits behind an `Arc` so that handing the image to the
/// compression worker moves a handle, not the bytes.
#[derive(Debug, Clone)]
pub struct RawImage {
    name: String,
    kind: ImageKind,
    data: Arc<[u8]>,
}

impl RawImage {
    pub fn new(name: impl Into<String>, kind: ImageKind, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            kind,
            data: data.into(),
        }
    }

    /// Build a raw image from a declared MIME type, rejecting anything
    /// outside the supported set.
    pub fn from_mime(
        name: impl Into<String>,
        mime: &str,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        let name = name.into();
        let kind = ImageKind::from_mime(mime).ok_or_else(|| {
            BildwerkError::InvalidInputFormat(format!("{name}: unsupported image type {mime:?}"))
        })?;
        Ok(Self::new(name, kind, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// Compression parameters for a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    quality: f32,
    max_width: u32,
    max_height: u32,
}

impl CompressOptions {
    /// Default lossy quality when the caller does not pick one.
    pub const DEFAULT_QUALITY: f32 = 0.92;
    /// Default bounding box for re-encoded images.
    pub const DEFAULT_MAX_SIDE: u32 = 1920;

    /// `quality` must lie in (0, 1]; both bounds must be non-zero.
    pub fn new(quality: f32, max_width: u32, max_height: u32) -> Result<Self> {
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(BildwerkError::InvalidOptions(format!(
                "quality must be in (0, 1], got {quality}"
            )));
        }
        if max_width == 0 || max_height == 0 {
            return Err(BildwerkError::InvalidOptions(format!(
                "maximum dimensions must be positive, got {max_width}x{max_height}"
            )));
        }
        Ok(Self {
            quality,
            max_width,
            max_height,
        })
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            quality: Self::DEFAULT_QUALITY,
            max_width: Self::DEFAULT_MAX_SIDE,
            max_height: Self::DEFAULT_MAX_SIDE,
        }
    }
}

/// Result of the compression pipeline: either the re-encoded image or the
/// untouched original, never a partial mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub kind: ImageKind,
    /// Pixel width of the encoded image.
    pub width: u32,
    /// Pixel height of the encoded image.
    pub height: u32,
}

impl CompressedImage {
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// An ingested image ready to be laid out and exported.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub name: String,
    pub compressed: Arc<CompressedImage>,
    /// Byte length of the file before compression.
    pub original_size: usize,
    pub caption: Option<String>,
}

impl PreparedImage {
    pub fn new(name: impl Into<String>, compressed: CompressedImage, original_size: usize) -> Self {
        Self {
            name: name.into(),
            compressed: Arc::new(compressed),
            original_size,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn set_caption(&mut self, caption: Option<String>) {
        self.caption = caption;
    }

    pub fn compressed_size(&self) -> usize {
        self.compressed.byte_size()
    }

    /// Fraction of the original size saved by compression (0.0 when the
    /// original was kept).
    pub fn savings_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let saved = self.original_size.saturating_sub(self.compressed_size());
        saved as f64 / self.original_size as f64
    }
}

/// Sum of (original, compressed) byte sizes over a batch.
pub fn total_sizes(images: &[PreparedImage]) -> (usize, usize) {
    images.iter().fold((0, 0), |(original, compressed), img| {
        (original + img.original_size, compressed + img.compressed_size())
    })
}

/// Physical page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PageSize {
    /// A custom size; a missing side falls back to the A4 value.
    pub fn custom(width_mm: Option<f32>, height_mm: Option<f32>) -> Self {
        let (a4_w, a4_h) = Self::A4.dimensions_mm();
        let pick = |value: Option<f32>, fallback: f32| match value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => fallback,
        };
        Self::Custom {
            width_mm: pick(width_mm, a4_w),
            height_mm: pick(height_mm, a4_h),
        }
    }

    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (216.0, 279.0),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Everything the pagination engine needs besides the images themselves.
///
/// Image and page heights are in logical pixels; the page size is physical
/// and only consulted by the renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConstraints {
    pub max_image_width: f64,
    pub max_image_height: f64,
    pub max_page_content_height: f64,
    pub page_size: PageSize,
    pub watermark_text: Option<String>,
}

impl LayoutConstraints {
    /// The watermark, if one was given and it is not blank.
    pub fn watermark(&self) -> Option<&str> {
        self.watermark_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// One image's placement, as decided by the pagination engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    /// 0-based position in the input sequence.
    pub index: usize,
    pub display_width: f64,
    pub display_height: f64,
    pub caption_text: String,
    pub starts_new_page: bool,
    /// 0-based logical page the item lands on.
    pub page: usize,
}

/// Output document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    Docx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Pdf => "application/pdf",
        }
    }
}

/// Caller-facing export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub quality: f32,
    pub max_image_width: f64,
    pub max_image_height: f64,
    pub max_page_content_height: f64,
    pub page_size: PageSize,
    pub watermark_text: Option<String>,
}

impl ExportOptions {
    /// Check the numeric bounds the layout engine relies on.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_image_width) || !positive(self.max_image_height) {
            return Err(BildwerkError::InvalidOptions(format!(
                "image bounds must be positive, got {}x{}",
                self.max_image_width, self.max_image_height
            )));
        }
        if !positive(self.max_page_content_height) {
            return Err(BildwerkError::InvalidOptions(format!(
                "page content height must be positive, got {}",
                self.max_page_content_height
            )));
        }
        let (w, h) = self.page_size.dimensions_mm();
        if !(w.is_finite() && w > 0.0 && h.is_finite() && h > 0.0) {
            return Err(BildwerkError::InvalidOptions(format!(
                "page size must be positive, got {w}x{h}mm"
            )));
        }
        Ok(())
    }

    pub fn layout_constraints(&self) -> LayoutConstraints {
        LayoutConstraints {
            max_image_width: self.max_image_width,
            max_image_height: self.max_image_height,
            max_page_content_height: self.max_page_content_height,
            page_size: self.page_size,
            watermark_text: self.watermark_text.clone(),
        }
    }
}

/// A serialised output document.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    /// Suggested file name, e.g. `images-export-2026-10-19T08-30-00.pdf`.
    pub filename: String,
    pub format: ExportFormat,
}
