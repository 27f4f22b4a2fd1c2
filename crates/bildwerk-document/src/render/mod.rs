// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render module: the shared render plan plus the DOCX (flow) and PDF
// (coordinate) renderers.
//
// Both renderers go through `plan`, so an image that fails at render time is
// skipped the same way in each format and the surviving images land on the
// same pages.

pub mod docx;
pub mod pdf;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{ExportFormat, LayoutConstraints, LayoutItem, PreparedImage};
use image::DynamicImage;
use tracing::warn;

/// A serialised document together with what went into it.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    /// Items drawn into the document.
    pub rendered: usize,
    /// Items skipped because their image could not be used.
    pub failed: usize,
    /// Physical pages in the output.
    pub pages: usize,
}

/// One item that survived preparation.
#[derive(Debug)]
pub struct PlannedItem<'a, T> {
    pub item: &'a LayoutItem,
    pub image: &'a PreparedImage,
    pub payload: T,
    /// Whether a page break precedes this item in the output.
    pub page_break: bool,
}

/// Items to draw, in order, plus the number that were dropped.
#[derive(Debug)]
pub struct RenderPlan<'a, T> {
    pub entries: Vec<PlannedItem<'a, T>>,
    pub failed: usize,
}

impl<T> RenderPlan<'_, T> {
    /// Physical pages the plan produces. An empty plan still yields one
    /// (blank) page.
    pub fn page_count(&self) -> usize {
        1 + self.entries.iter().filter(|e| e.page_break).count()
    }
}

/// Prepare every item with `prepare`, dropping the ones that fail.
///
/// A dropped item's page break moves to the next item that survives, so
/// nothing after it shifts onto an earlier page. A break with nothing
/// rendered before it is discarded to avoid a blank first page.
pub fn plan<'a, T>(
    items: &'a [LayoutItem],
    images: &'a [PreparedImage],
    mut prepare: impl FnMut(&PreparedImage) -> Result<T>,
) -> RenderPlan<'a, T> {
    let mut entries: Vec<PlannedItem<'a, T>> = Vec::with_capacity(items.len());
    let mut failed = 0;
    let mut carried_break = false;

    for item in items {
        let wants_break = item.starts_new_page || carried_break;

        let Some(image) = images.get(item.index) else {
            warn!(index = item.index, "layout item has no matching image, skipping");
            failed += 1;
            carried_break = wants_break;
            continue;
        };

        match prepare(image) {
            Ok(payload) => {
                let page_break = wants_break && !entries.is_empty();
                entries.push(PlannedItem {
                    item,
                    image,
                    payload,
                    page_break,
                });
                carried_break = false;
            }
            Err(err) => {
                warn!(index = item.index, name = %image.name, error = %err, "skipping image that cannot be rendered");
                failed += 1;
                carried_break = wants_break;
            }
        }
    }

    RenderPlan { entries, failed }
}

/// Fully decode an image's bytes. Both renderers prepare items through
/// this, so a body that is damaged past a readable header fails in each.
pub fn decode_image(image: &PreparedImage) -> Result<DynamicImage> {
    ::image::load_from_memory(&image.compressed.data)
        .map_err(|err| BildwerkError::Decode(format!("{}: {}", image.name, err)))
}

/// Render `items` in the requested format.
pub fn render(
    format: ExportFormat,
    items: &[LayoutItem],
    images: &[PreparedImage],
    constraints: &LayoutConstraints,
) -> Result<RenderedDocument> {
    match format {
        ExportFormat::Docx => docx::render(items, images, constraints),
        ExportFormat::Pdf => pdf::render(items, images, constraints),
    }
}
