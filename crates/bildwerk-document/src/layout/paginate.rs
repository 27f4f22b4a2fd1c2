// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Greedy single-pass pagination.
//
// Scaling and page breaks are decided here exactly once. Renderers follow
// the resulting items and never re-measure, which is what keeps the DOCX and
// PDF outputs on the same pages.

use bildwerk_core::error::Result;
use bildwerk_core::types::{LayoutConstraints, LayoutItem, PreparedImage};
use tracing::{debug, instrument};

use crate::image::fit;

/// Logical height reserved for a caption line.
pub const CAPTION_HEIGHT: f64 = 30.0;
/// Logical gap after each captioned image.
pub const ITEM_SPACING: f64 = 20.0;

/// Lay out `images` in order.
///
/// An item breaks to a new page when it does not fit in what is left of the
/// current one. The first item never breaks, and an item taller than a whole
/// page is still placed on its own page rather than shrunk.
#[instrument(skip_all, fields(images = images.len(), capacity = constraints.max_page_content_height))]
pub fn layout(images: &[PreparedImage], constraints: &LayoutConstraints) -> Result<Vec<LayoutItem>> {
    let mut items = Vec::with_capacity(images.len());
    let mut current = 0.0;
    let mut page = 0;

    for (index, image) in images.iter().enumerate() {
        let (display_width, display_height) = fit(
            f64::from(image.compressed.width),
            f64::from(image.compressed.height),
            constraints.max_image_width,
            constraints.max_image_height,
        )?;

        let total = display_height + CAPTION_HEIGHT + ITEM_SPACING;
        let starts_new_page = index > 0 && current + total > constraints.max_page_content_height;
        if starts_new_page {
            current = 0.0;
            page += 1;
        }
        current += total;

        items.push(LayoutItem {
            index,
            display_width,
            display_height,
            caption_text: caption_text(index, image.caption.as_deref()),
            starts_new_page,
            page,
        });
    }

    debug!(pages = page_count(&items), "Layout complete");
    Ok(items)
}

/// `Figure N`, or `Figure N - caption` when a non-blank caption is set.
pub fn caption_text(index: usize, caption: Option<&str>) -> String {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => format!("Figure {} - {}", index + 1, caption),
        None => format!("Figure {}", index + 1),
    }
}

/// Number of logical pages the items span (0 for no items).
pub fn page_count(items: &[LayoutItem]) -> usize {
    items.last().map_or(0, |item| item.page + 1)
}
