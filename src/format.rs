//! Image format enumerations: what we accept, what we offer, what we produce.
//!
//! Two enums, not one, because the sets genuinely differ:
//!
//! * [`ImageFormat`] — raster encodings we can decode *and* encode. Every
//!   source artifact is validated against this set at intake, and every
//!   delivered output is one of these.
//! * [`TargetFormat`] — the user-facing choice set. It is `ImageFormat` plus
//!   targets that have no encoder and are served via a documented downgrade
//!   (currently `svg` → PNG). The downgrade is resolved in the codec and
//!   surfaced to delivery; it is never silent.
//!
//! Adding a format means adding an enum variant, a dispatch entry, and a
//! presented choice — the session state machine does not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raster image encoding with both a decoder and an encoder available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Map a declared mime type to a supported source format.
    ///
    /// Validation happens here, at intake — formats are declared, never
    /// sniffed. `image/jpg` is accepted as a widely-seen alias.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/gif" => Some(ImageFormat::Gif),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Canonical mime type for delivery metadata.
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    /// File extension used for delivered output filenames.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// Whether the encoder preserves an alpha channel losslessly.
    ///
    /// Sources with transparency headed for a format that answers `false`
    /// are flattened onto an opaque background before re-encoding.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, ImageFormat::Jpeg | ImageFormat::Bmp)
    }

    /// The corresponding `image` crate format for decode/encode dispatch.
    pub fn to_image_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A target format the user may select.
///
/// The set is fixed and versioned through the callback payload: unknown
/// tokens arriving from the transport are rejected before any state
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    /// No encoder available; served as PNG with an explicit downgrade
    /// notice to the chat.
    Svg,
}

impl TargetFormat {
    /// Every target offered as an inline choice, in presentation order.
    pub const ALL: [TargetFormat; 5] = [
        TargetFormat::Png,
        TargetFormat::Jpeg,
        TargetFormat::Gif,
        TargetFormat::Bmp,
        TargetFormat::Svg,
    ];

    /// Wire token carried in the callback payload.
    pub fn token(&self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Gif => "gif",
            TargetFormat::Bmp => "bmp",
            TargetFormat::Svg => "svg",
        }
    }

    /// Parse a wire token. Returns `None` for anything outside the
    /// enumerated set — callers reject before touching session state.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "png" => Some(TargetFormat::Png),
            "jpeg" => Some(TargetFormat::Jpeg),
            "gif" => Some(TargetFormat::Gif),
            "bmp" => Some(TargetFormat::Bmp),
            "svg" => Some(TargetFormat::Svg),
            _ => None,
        }
    }

    /// Button label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            TargetFormat::Png => "Convert to PNG",
            TargetFormat::Jpeg => "Convert to JPEG",
            TargetFormat::Gif => "Convert to GIF",
            TargetFormat::Bmp => "Convert to BMP",
            TargetFormat::Svg => "Convert to SVG",
        }
    }

    /// Resolve the format actually produced and whether that is a downgrade.
    ///
    /// The second element is `true` only when the requested target has no
    /// encoder and a documented fallback is substituted. Delivery must
    /// surface this to the chat.
    pub fn resolve(&self) -> (ImageFormat, bool) {
        match self {
            TargetFormat::Png => (ImageFormat::Png, false),
            TargetFormat::Jpeg => (ImageFormat::Jpeg, false),
            TargetFormat::Gif => (ImageFormat::Gif, false),
            TargetFormat::Bmp => (ImageFormat::Bmp, false),
            TargetFormat::Svg => (ImageFormat::Png, true),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_parsing_accepts_aliases() {
        assert_eq!(ImageFormat::from_mime("image/png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime("IMAGE/JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::from_mime("image/x-ms-bmp"),
            Some(ImageFormat::Bmp)
        );
        assert_eq!(ImageFormat::from_mime("application/pdf"), None);
        assert_eq!(ImageFormat::from_mime(""), None);
    }

    #[test]
    fn token_round_trip_for_all_targets() {
        for t in TargetFormat::ALL {
            assert_eq!(TargetFormat::from_token(t.token()), Some(t));
        }
        assert_eq!(TargetFormat::from_token("tiff"), None);
        assert_eq!(TargetFormat::from_token("PNG"), None); // tokens are exact
    }

    #[test]
    fn svg_resolves_to_png_downgrade() {
        let (produced, downgraded) = TargetFormat::Svg.resolve();
        assert_eq!(produced, ImageFormat::Png);
        assert!(downgraded);

        let (produced, downgraded) = TargetFormat::Jpeg.resolve();
        assert_eq!(produced, ImageFormat::Jpeg);
        assert!(!downgraded);
    }

    #[test]
    fn alpha_support_table() {
        assert!(ImageFormat::Png.supports_alpha());
        assert!(ImageFormat::Gif.supports_alpha());
        assert!(!ImageFormat::Jpeg.supports_alpha());
        assert!(!ImageFormat::Bmp.supports_alpha());
    }
}
