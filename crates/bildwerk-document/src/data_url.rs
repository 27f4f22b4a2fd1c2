// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `data:` URLs for compressed images (previews, clipboard, embedding).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{CompressedImage, ImageKind};

/// `data:<mime>;base64,<payload>`
pub fn encode(image: &CompressedImage) -> String {
    format!(
        "data:{};base64,{}",
        image.kind.mime_type(),
        STANDARD.encode(&image.data)
    )
}

/// Parse a base64 image data URL back into its kind and bytes.
pub fn decode(url: &str) -> Result<(ImageKind, Vec<u8>)> {
    let invalid = || BildwerkError::InvalidInputFormat("invalid data URL format".into());

    let rest = url.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = header.strip_suffix(";base64").ok_or_else(invalid)?;
    let kind = ImageKind::from_mime(mime).ok_or_else(|| {
        BildwerkError::InvalidInputFormat(format!("unsupported data URL type {mime:?}"))
    })?;
    if payload.is_empty() {
        return Err(invalid());
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| BildwerkError::InvalidInputFormat(format!("invalid data URL payload: {err}")))?;
    Ok((kind, bytes))
}

/// Approximate decoded size of a data URL's payload (`len * 3 / 4`), or 0
/// when there is no payload.
pub fn payload_size(url: &str) -> usize {
    url.split_once(',')
        .map_or(0, |(_, payload)| payload.len() * 3 / 4)
}
