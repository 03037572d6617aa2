//! Image encoding: raw image bytes ⇄ `data:` URI strings.
//!
//! The media type is sniffed from the bytes rather than trusted from the
//! requested format: ImageMagick may be configured (policy.xml, delegates)
//! to write something other than what the extension asked for, and the URI
//! must describe what is actually inside.

use crate::config::ImageFormat;
use crate::error::Pdf64Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encode `bytes` as `data:<media-type>;base64,<payload>`.
///
/// Falls back to `requested`'s media type when the bytes are not a format
/// the `image` crate recognises.
pub fn to_data_uri(bytes: &[u8], requested: ImageFormat) -> String {
    let media_type = sniff_media_type(bytes).unwrap_or(requested.media_type());
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Media type of `bytes` from their magic number, if recognised.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// File extension matching the media type (`jpg` when unknown).
    pub fn extension(&self) -> &'static str {
        match self.media_type.parse::<ImageFormat>() {
            Ok(format) => format.extension(),
            Err(_) => ImageFormat::Jpeg.extension(),
        }
    }
}

/// Parse a base64 `data:` URI back into bytes.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, Pdf64Error> {
    let malformed = |why: &str| Pdf64Error::Internal(format!("Malformed data URI: {why}"));

    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| malformed("missing 'data:' scheme"))?;
    let (media_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| malformed("not base64-encoded"))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| malformed(&e.to_string()))?;

    Ok(DecodedImage {
        media_type: media_type.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(format: image::ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn media_type_follows_content() {
        let png = encoded(image::ImageFormat::Png);
        // Asked for JPEG, got PNG bytes: the URI must say PNG.
        let uri = to_data_uri(&png, ImageFormat::Jpeg);
        assert!(uri.starts_with("data:image/png;base64,"), "{uri}");

        let jpeg = encoded(image::ImageFormat::Jpeg);
        let uri = to_data_uri(&jpeg, ImageFormat::Png);
        assert!(uri.starts_with("data:image/jpeg;base64,"), "{uri}");
    }

    #[test]
    fn unknown_bytes_use_requested_format() {
        let uri = to_data_uri(b"not an image", ImageFormat::Jpeg);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn decode_restores_bytes() {
        let png = encoded(image::ImageFormat::Png);
        let decoded = decode_data_uri(&to_data_uri(&png, ImageFormat::Png)).unwrap();
        assert_eq!(decoded.bytes, png);
        assert_eq!(decoded.extension(), "png");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_data_uri("http://example.com/a.png").is_err());
        assert!(decode_data_uri("data:image/png,rawtext").is_err());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
    }
}
