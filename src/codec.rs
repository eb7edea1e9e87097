//! Codec dispatch: (bytes, source format, target format) → converted bytes.
//!
//! Decoding and encoding are delegated to the `image` crate; this module owns
//! the dispatch decisions the library's defaults would otherwise make
//! silently:
//!
//! * **Downgrades are explicit.** A target with no encoder (`svg`) is served
//!   in a documented fallback format and the result says so
//!   ([`ConvertedImage::downgraded`]); the delivery step reports the format
//!   actually produced. Silent substitution is treated as a defect.
//! * **Alpha is canonicalised deliberately.** Sources with transparency
//!   headed for a target that cannot keep it (JPEG, BMP) are flattened onto
//!   an opaque white background, rather than whatever the encoder would do.
//! * **Failure classes stay distinct.** Bytes that do not decode as the
//!   declared source format are [`Img2AnyError::CorruptInput`]; an encoder
//!   gap is [`Img2AnyError::UnsupportedConversion`]. Users and logs see
//!   different messages for the two.
//!
//! All functions here are synchronous and CPU-bound; the orchestrator runs
//! them under `spawn_blocking`.

use crate::error::Img2AnyError;
use crate::format::{ImageFormat, TargetFormat};
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// The result of a conversion, with the produced format made explicit.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub bytes: Vec<u8>,
    /// The format actually encoded. Differs from the requested target only
    /// when `downgraded` is true.
    pub produced: ImageFormat,
    /// True when the requested target had no encoder and the documented
    /// fallback was substituted.
    pub downgraded: bool,
}

/// Transcode `bytes` from the declared source format to the requested target.
///
/// # Errors
/// * [`Img2AnyError::CorruptInput`] — `bytes` do not decode as `source`.
/// * [`Img2AnyError::UnsupportedConversion`] — the encoder rejected the
///   request (should not occur for the enumerated set; kept as a guard
///   against future format additions without dispatch entries).
pub fn convert(
    bytes: &[u8],
    source: ImageFormat,
    target: TargetFormat,
    jpeg_quality: u8,
) -> Result<ConvertedImage, Img2AnyError> {
    let img = image::load_from_memory_with_format(bytes, source.to_image_format()).map_err(
        |e| Img2AnyError::CorruptInput {
            declared: source.to_string(),
            detail: e.to_string(),
        },
    )?;

    let (produced, downgraded) = target.resolve();
    if downgraded {
        debug!(%target, %produced, "no encoder for target, downgrading");
    }

    let img = if img.color().has_alpha() && !produced.supports_alpha() {
        flatten_onto_white(&img)
    } else {
        img
    };

    let bytes = encode(&img, produced, jpeg_quality).map_err(|e| match e {
        image::ImageError::Unsupported(u) => Img2AnyError::UnsupportedConversion {
            source: source.to_string(),
            target: format!("{target} ({u})"),
        },
        other => Img2AnyError::Internal(format!("encode failed: {other}")),
    })?;

    debug!(
        %source,
        %produced,
        downgraded,
        out_bytes = bytes.len(),
        "conversion complete"
    );

    Ok(ConvertedImage {
        bytes,
        produced,
        downgraded,
    })
}

/// Encode a decoded image into the given raster format.
fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                Cursor::new(&mut buf),
                jpeg_quality,
            );
            img.write_with_encoder(encoder)?;
        }
        other => {
            img.write_to(&mut Cursor::new(&mut buf), other.to_image_format())?;
        }
    }
    Ok(buf)
}

/// Composite an image with transparency onto an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);

    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u16;
        let blend = |c: u8| -> u8 { ((c as u16 * a + 255 * (255 - a)) / 255) as u8 };
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }

    DynamicImage::ImageRgb8(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// A small semi-transparent red square encoded as `format`.
    fn sample(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([255, 0, 0, 128])));
        let img = if format.supports_alpha() {
            img
        } else {
            flatten_onto_white(&img)
        };
        encode(&img, format, 90).expect("sample encode should succeed")
    }

    #[test]
    fn round_trip_preserves_dimensions() {
        // Every (source, raster target) pair: geometry must survive.
        let sources = [
            ImageFormat::Png,
            ImageFormat::Jpeg,
            ImageFormat::Gif,
            ImageFormat::Bmp,
        ];
        let targets = [
            TargetFormat::Png,
            TargetFormat::Jpeg,
            TargetFormat::Gif,
            TargetFormat::Bmp,
        ];
        for source in sources {
            let input = sample(source);
            for target in targets {
                let out = convert(&input, source, target, 90)
                    .unwrap_or_else(|e| panic!("{source} -> {target} failed: {e}"));
                let decoded = image::load_from_memory_with_format(
                    &out.bytes,
                    out.produced.to_image_format(),
                )
                .expect("output must decode as the produced format");
                assert_eq!(decoded.width(), 8, "{source} -> {target}");
                assert_eq!(decoded.height(), 6, "{source} -> {target}");
                assert!(!out.downgraded);
            }
        }
    }

    #[test]
    fn svg_request_downgrades_to_png() {
        let input = sample(ImageFormat::Png);
        let out = convert(&input, ImageFormat::Png, TargetFormat::Svg, 90).unwrap();
        assert!(out.downgraded);
        assert_eq!(out.produced, ImageFormat::Png);
        // Output really is a PNG.
        image::load_from_memory_with_format(&out.bytes, image::ImageFormat::Png)
            .expect("downgraded output must be valid PNG");
    }

    #[test]
    fn transparent_png_to_jpeg_flattens() {
        let input = sample(ImageFormat::Png);
        let out = convert(&input, ImageFormat::Png, TargetFormat::Jpeg, 90).unwrap();
        let decoded =
            image::load_from_memory_with_format(&out.bytes, image::ImageFormat::Jpeg).unwrap();
        // 50% red over white ≈ (255, 127, 127); JPEG is lossy, so allow slack.
        let px = decoded.to_rgb8().get_pixel(4, 3).0;
        assert!(px[0] > 200, "red channel too dark: {px:?}");
        assert!(px[1] > 80 && px[1] < 180, "green channel off: {px:?}");
    }

    #[test]
    fn garbage_bytes_are_corrupt_input() {
        let err = convert(b"definitely not an image", ImageFormat::Png, TargetFormat::Jpeg, 90)
            .unwrap_err();
        assert!(matches!(err, Img2AnyError::CorruptInput { .. }), "got {err:?}");
    }

    #[test]
    fn wrong_declared_format_is_corrupt_input() {
        // Valid JPEG bytes declared as PNG must fail decode, not be sniffed.
        let jpeg = sample(ImageFormat::Jpeg);
        let err = convert(&jpeg, ImageFormat::Png, TargetFormat::Png, 90).unwrap_err();
        assert!(matches!(err, Img2AnyError::CorruptInput { .. }), "got {err:?}");
    }

    #[test]
    fn flatten_blends_toward_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flat = flatten_onto_white(&img).to_rgb8();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);

        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let flat = flatten_onto_white(&img).to_rgb8();
        assert_eq!(flat.get_pixel(1, 1).0, [10, 20, 30]);
    }
}
