// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Aspect-preserving fit of an image into a bounding box.

use bildwerk_core::error::{BildwerkError, Result};

/// Fit `natural_width` x `natural_height` into `max_width` x `max_height`
/// without changing the aspect ratio.
///
/// Width is constrained first, then the (possibly reduced) height. Images
/// already inside the box come back unchanged; nothing is ever enlarged.
pub fn fit(
    natural_width: f64,
    natural_height: f64,
    max_width: f64,
    max_height: f64,
) -> Result<(f64, f64)> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(natural_width) || !positive(natural_height) {
        return Err(BildwerkError::InvalidDimensions(format!(
            "natural size must be positive, got {natural_width}x{natural_height}"
        )));
    }
    if !positive(max_width) || !positive(max_height) {
        return Err(BildwerkError::InvalidDimensions(format!(
            "bounding box must be positive, got {max_width}x{max_height}"
        )));
    }

    let aspect = natural_width / natural_height;
    let mut width = natural_width;
    let mut height = natural_height;

    if width > max_width {
        width = max_width;
        height = width / aspect;
    }
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }

    Ok((width, height))
}

/// Integer variant of [`fit`] for resampling targets. Each side is rounded
/// to the nearest pixel and never drops below 1.
pub fn fit_pixels(
    natural_width: u32,
    natural_height: u32,
    max_width: u32,
    max_height: u32,
) -> Result<(u32, u32)> {
    let (width, height) = fit(
        f64::from(natural_width),
        f64::from(natural_height),
        f64::from(max_width),
        f64::from(max_height),
    )?;
    let to_px = |v: f64| (v.round() as u32).max(1);
    Ok((to_px(width), to_px(height)))
}
