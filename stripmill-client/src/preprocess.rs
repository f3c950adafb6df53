//! Image preparation before upload.

use crate::error::ClientError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

/// JPEG quality used for uploads.
pub const UPLOAD_JPEG_QUALITY: u8 = 95;

/// Decodes `bytes`, optionally resizes to exactly `size` and re-encodes as
/// JPEG.
pub fn preprocess(bytes: &[u8], size: Option<(u32, u32)>) -> Result<Vec<u8>, ClientError> {
    let mut image =
        image::load_from_memory(bytes).map_err(|e| ClientError::Image(e.to_string()))?;

    if let Some((width, height)) = size {
        if width == 0 || height == 0 {
            return Err(ClientError::Image(format!(
                "invalid target size {}x{}",
                width, height
            )));
        }
        image = image.resize_exact(width, height, FilterType::Triangle);
    }

    let mut out = Vec::new();
    image
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, UPLOAD_JPEG_QUALITY))
        .map_err(|e| ClientError::Image(e.to_string()))?;
    Ok(out)
}

/// Parses a `WIDTHxHEIGHT` size such as `640x480`.
pub fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(['x', 'X'])?;
    let size = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    if size.0 == 0 || size.1 == 0 {
        return None;
    }
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .write_with_encoder(PngEncoder::new(&mut out))
            .unwrap();
        out
    }

    #[test]
    fn test_reencodes_as_jpeg() {
        let out = preprocess(&png(8, 6), None).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_resizes() {
        let out = preprocess(&png(8, 6), Some((4, 12))).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 12));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            preprocess(b"not an image", None),
            Err(ClientError::Image(_))
        ));
        assert!(preprocess(&png(2, 2), Some((0, 2))).is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480"), Some((640, 480)));
        assert_eq!(parse_size("32X16"), Some((32, 16)));
        assert_eq!(parse_size("0x10"), None);
        assert_eq!(parse_size("640"), None);
        assert_eq!(parse_size("ax480"), None);
    }
}
