// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression pipeline: decode, fit, Lanczos3 resample, re-encode as JPEG,
// and keep whichever of original and re-encoded is smaller.

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{CompressOptions, CompressedImage, ImageKind, RawImage};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{debug, instrument};

use super::fit::fit_pixels;

/// PNG sources are always re-encoded at this quality, whatever the caller asked for.
pub const PNG_REENCODE_QUALITY: f32 = 0.9;

/// Run the full pipeline on one image.
///
/// Never returns something larger than the input: if re-encoding does not
/// shrink the file, the original bytes come back with their original kind.
#[instrument(skip(raw, options), fields(name = raw.name(), kind = ?raw.kind(), bytes = raw.byte_size()))]
pub fn compress(raw: &RawImage, options: &CompressOptions) -> Result<CompressedImage> {
    let decoded = ::image::load_from_memory(raw.data()).map_err(|err| {
        BildwerkError::Decode(format!("failed to decode {}: {}", raw.name(), err))
    })?;
    let (natural_w, natural_h) = (decoded.width(), decoded.height());

    let (target_w, target_h) = fit_pixels(
        natural_w,
        natural_h,
        options.max_width(),
        options.max_height(),
    )?;

    let resized = if (target_w, target_h) == (natural_w, natural_h) {
        decoded
    } else {
        debug!(from_w = natural_w, from_h = natural_h, target_w, target_h, "Resampling");
        decoded.resize_exact(target_w, target_h, FilterType::Lanczos3)
    };

    let quality = output_quality(raw.kind(), options);
    let encoded = encode_jpeg(&resized, quality)?;

    if encoded.len() >= raw.byte_size() {
        debug!(
            encoded = encoded.len(),
            original = raw.byte_size(),
            "Re-encode not smaller, keeping original"
        );
        return Ok(CompressedImage {
            data: raw.data().to_vec(),
            kind: raw.kind(),
            width: natural_w,
            height: natural_h,
        });
    }

    debug!(encoded = encoded.len(), quality, "Compressed");
    Ok(CompressedImage {
        data: encoded,
        kind: ImageKind::Jpeg,
        width: target_w,
        height: target_h,
    })
}

/// JPEG quality used for a given source kind.
pub fn output_quality(kind: ImageKind, options: &CompressOptions) -> f32 {
    match kind {
        ImageKind::Png => PNG_REENCODE_QUALITY,
        ImageKind::Jpeg | ImageKind::Gif | ImageKind::Bmp => options.quality(),
    }
}

/// Encode as baseline JPEG. `quality` is in (0, 1]; transparent pixels are
/// composited onto white first.
pub fn encode_jpeg(image: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let rgb = flatten_onto_white(image);
    let jpeg_quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| BildwerkError::Encode(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}

pub(crate) fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    /// Deterministic noisy photo-like image; PNG barely compresses it.
    pub(crate) fn noisy_rgb(width: u32, height: u32, seed: u32) -> RgbImage {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        RgbImage::from_fn(width, height, |x, y| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let noise = (state >> 16) as u8 & 0x3f;
            Rgb([
                (x * 255 / width.max(1)) as u8 ^ noise,
                (y * 255 / height.max(1)) as u8 ^ noise,
                128u8.wrapping_add(noise),
            ])
        })
    }

    pub(crate) fn encode_as(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).expect("encode test image");
        buffer.into_inner()
    }

    fn options(quality: f32, max: u32) -> CompressOptions {
        CompressOptions::new(quality, max, max).expect("valid options")
    }

    #[test]
    fn png_is_reencoded_at_fixed_quality() {
        let source = DynamicImage::ImageRgb8(noisy_rgb(128, 96, 7));
        let png = encode_as(&source, ImageFormat::Png);
        let raw = RawImage::new("noise.png", ImageKind::Png, png.clone());

        let out = compress(&raw, &options(0.5, 1920)).expect("compress");
        assert_eq!(out.kind, ImageKind::Jpeg);
        assert!(out.byte_size() < png.len());

        let decoded = ::image::load_from_memory(&png).unwrap();
        assert_eq!(out.data, encode_jpeg(&decoded, 0.9).unwrap());
        assert_ne!(out.data, encode_jpeg(&decoded, 0.5).unwrap());
    }

    #[test]
    fn jpeg_uses_requested_quality() {
        let opts = options(0.4, 1920);
        assert_eq!(output_quality(ImageKind::Jpeg, &opts), 0.4);
        assert_eq!(output_quality(ImageKind::Bmp, &opts), 0.4);
        assert_eq!(output_quality(ImageKind::Png, &opts), 0.9);
    }

    #[test]
    fn larger_reencode_returns_original() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([10, 200, 30])));
        let png = encode_as(&flat, ImageFormat::Png);
        let raw = RawImage::new("flat.png", ImageKind::Png, png.clone());

        let out = compress(&raw, &options(0.92, 1920)).expect("compress");
        assert_eq!(out.kind, ImageKind::Png);
        assert_eq!(out.data, png);
        assert_eq!((out.width, out.height), (32, 32));
    }

    #[test]
    fn oversized_image_is_resampled_into_bounds() {
        let source = DynamicImage::ImageRgb8(noisy_rgb(400, 200, 3));
        let bmp = encode_as(&source, ImageFormat::Bmp);
        let raw = RawImage::new("wide.bmp", ImageKind::Bmp, bmp);

        let out = compress(&raw, &options(0.8, 100)).expect("compress");
        assert_eq!(out.kind, ImageKind::Jpeg);
        assert_eq!((out.width, out.height), (100, 50));
        let decoded = ::image::load_from_memory(&out.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn output_never_exceeds_input() {
        for (seed, size) in [(1, 8), (2, 40), (3, 160)] {
            let source = DynamicImage::ImageRgb8(noisy_rgb(size, size, seed));
            for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Bmp] {
                let bytes = encode_as(&source, format);
                let kind = match format {
                    ImageFormat::Png => ImageKind::Png,
                    ImageFormat::Jpeg => ImageKind::Jpeg,
                    _ => ImageKind::Bmp,
                };
                let raw = RawImage::new("img", kind, bytes.clone());
                let out = compress(&raw, &options(0.92, 64)).expect("compress");
                assert!(out.byte_size() <= bytes.len());
            }
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let raw = RawImage::new("broken.jpg", ImageKind::Jpeg, vec![0xFF, 0xD8, 0x00, 0x01]);
        let err = compress(&raw, &CompressOptions::default()).unwrap_err();
        assert!(matches!(err, BildwerkError::Decode(_)));
        assert!(err.is_item_failure());
    }

    #[test]
    fn transparency_flattens_to_white() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        let rgb = flatten_onto_white(&clear);
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);

        let half = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128])));
        let [r, _, _] = flatten_onto_white(&half).get_pixel(0, 0).0;
        assert!((126..=128).contains(&r));
    }
}
