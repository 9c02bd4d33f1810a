//! Image encoding: engine `DynamicImage` → bytes in the configured encoding.
//!
//! Every published image uses one fixed encoding so downstream consumers can
//! rely on the content type. JPEG has no alpha channel, so JPEG output is
//! written from an RGB copy of the image.

use crate::config::ImageEncoding;
use crate::error::PublishError;
use image::{DynamicImage, ImageFormat};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::debug;

/// An extracted image serialised and ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// The engine's key for this image, as referenced in the text.
    pub key: String,
    pub bytes: Vec<u8>,
    pub encoding: ImageEncoding,
}

/// Serialise `img` with `encoding`.
pub fn encode_image(img: &DynamicImage, encoding: ImageEncoding) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match encoding {
        ImageEncoding::Png => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?,
        ImageEncoding::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?,
    }
    debug!(
        "Encoded {}x{} image → {} bytes {}",
        img.width(),
        img.height(),
        buf.len(),
        encoding.extension()
    );
    Ok(buf)
}

/// Encode every image of an engine result, keeping its key.
pub fn encode_all(
    images: &BTreeMap<String, DynamicImage>,
    encoding: ImageEncoding,
) -> Result<Vec<EncodedImage>, PublishError> {
    images
        .iter()
        .map(|(key, img)| {
            let bytes = encode_image(img, encoding).map_err(|e| PublishError::Encode {
                key: key.clone(),
                detail: e.to_string(),
            })?;
            Ok(EncodedImage {
                key: key.clone(),
                bytes,
                encoding,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 128])))
    }

    #[test]
    fn png_has_png_signature() {
        let bytes = encode_image(&red_square(), ImageEncoding::Png).expect("encode should succeed");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn jpeg_from_rgba_source() {
        let bytes = encode_image(&red_square(), ImageEncoding::Jpeg).expect("encode should succeed");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encode_all_keeps_keys_in_order() {
        let mut images = BTreeMap::new();
        images.insert("b".to_string(), red_square());
        images.insert("a".to_string(), red_square());
        let encoded = encode_all(&images, ImageEncoding::Png).unwrap();
        let keys: Vec<_> = encoded.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["a", "b"]);
        assert!(encoded.iter().all(|e| e.encoding == ImageEncoding::Png));
    }
}
