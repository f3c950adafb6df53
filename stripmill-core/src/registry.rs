//! Operation registry: resolves an operation kind to a pixel transform.

use crate::error::CoreError;
use crate::operation::OperationKind;
use crate::raster::{EncodeFormat, ImageFrame};
use image::imageops::FilterType;

/// A pure, deterministic transform over one strip.
///
/// Implementations must return the input unchanged for
/// `OperationKind::Other`.
pub trait StripTransform: Send + Sync {
    fn apply(&self, strip: &ImageFrame, operation: &OperationKind)
        -> Result<ImageFrame, CoreError>;
}

/// The built-in transforms.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    /// Side of the square window used by erosion and dilation.
    pub morph_kernel: u32,
    /// Gaussian sigma for `blur`.
    pub blur_sigma: f32,
    /// Gradient magnitude at or above which a pixel counts as an edge.
    pub edge_threshold: f32,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self {
            morph_kernel: 25,
            // sigma implied by a 25x25 kernel: 0.3 * ((25 - 1) / 2 - 1) + 0.8
            blur_sigma: 4.1,
            edge_threshold: 150.0,
        }
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `operation` to encoded image bytes and re-encodes the result.
    ///
    /// Unknown operations return `bytes` untouched without decoding them.
    pub fn apply_encoded(
        &self,
        bytes: &[u8],
        operation: &OperationKind,
        format: EncodeFormat,
    ) -> Result<Vec<u8>, CoreError> {
        if operation.is_identity() {
            return Ok(bytes.to_vec());
        }
        let frame = ImageFrame::decode(bytes)?;
        self.apply(&frame, operation)?.encode(format)
    }

    fn invert(strip: &ImageFrame) -> Result<ImageFrame, CoreError> {
        let data = strip.data().iter().map(|v| 255 - v).collect();
        ImageFrame::new(strip.width(), strip.height(), strip.channels(), data)
    }

    fn resize_half(strip: &ImageFrame) -> Result<ImageFrame, CoreError> {
        let (width, height) = (strip.width() / 2, strip.height() / 2);
        if width == 0 || height == 0 {
            return Err(CoreError::Transform {
                operation: "resize".to_string(),
                reason: format!("{}x{} is too small to halve", strip.width(), strip.height()),
            });
        }
        let resized = strip
            .to_dynamic()?
            .resize_exact(width, height, FilterType::Triangle);
        Ok(ImageFrame::from_dynamic(resized, strip.channels()))
    }

    fn blur(&self, strip: &ImageFrame) -> Result<ImageFrame, CoreError> {
        let blurred = strip.to_dynamic()?.blur(self.blur_sigma);
        Ok(ImageFrame::from_dynamic(blurred, strip.channels()))
    }

    /// Sobel gradient magnitude, thresholded to a 1-channel edge map.
    fn edges(&self, strip: &ImageFrame) -> Result<ImageFrame, CoreError> {
        let gray = strip.to_dynamic()?.to_luma8();
        let (w, h) = (gray.width() as i64, gray.height() as i64);
        let px = |x: i64, y: i64| -> f32 {
            let x = x.clamp(0, w - 1) as u32;
            let y = y.clamp(0, h - 1) as u32;
            gray.get_pixel(x, y)[0] as f32
        };

        let mut out = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
                let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
                let magnitude = (gx * gx + gy * gy).sqrt();
                out.push(if magnitude >= self.edge_threshold { 255 } else { 0 });
            }
        }
        ImageFrame::new(strip.width(), strip.height(), 1, out)
    }

    /// Square min (erode) or max (dilate) filter, window clipped at borders.
    fn morph(&self, strip: &ImageFrame, dilate: bool) -> Result<ImageFrame, CoreError> {
        let radius = (self.morph_kernel / 2) as usize;
        let (w, h, c) = (
            strip.width() as usize,
            strip.height() as usize,
            strip.channels() as usize,
        );
        let pick = |a: u8, b: u8| if dilate { a.max(b) } else { a.min(b) };
        let src = strip.data();

        // Horizontal pass then vertical pass; a square window is separable.
        let mut horizontal = vec![0u8; src.len()];
        for y in 0..h {
            for x in 0..w {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(w - 1);
                for ch in 0..c {
                    let mut acc = src[(y * w + lo) * c + ch];
                    for xx in lo + 1..=hi {
                        acc = pick(acc, src[(y * w + xx) * c + ch]);
                    }
                    horizontal[(y * w + x) * c + ch] = acc;
                }
            }
        }

        let mut out = vec![0u8; src.len()];
        for y in 0..h {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            for x in 0..w {
                for ch in 0..c {
                    let mut acc = horizontal[(lo * w + x) * c + ch];
                    for yy in lo + 1..=hi {
                        acc = pick(acc, horizontal[(yy * w + x) * c + ch]);
                    }
                    out[(y * w + x) * c + ch] = acc;
                }
            }
        }

        ImageFrame::new(strip.width(), strip.height(), strip.channels(), out)
    }
}

impl StripTransform for OperationRegistry {
    fn apply(
        &self,
        strip: &ImageFrame,
        operation: &OperationKind,
    ) -> Result<ImageFrame, CoreError> {
        if strip.is_empty() {
            return Err(CoreError::EmptyStrip {
                width: strip.width(),
                height: strip.height(),
            });
        }

        tracing::trace!(
            operation = %operation,
            width = strip.width(),
            height = strip.height(),
            "applying transform"
        );

        match operation {
            OperationKind::EdgeDetection => self.edges(strip),
            OperationKind::ColorInversion => Self::invert(strip),
            OperationKind::Resize => Self::resize_half(strip),
            OperationKind::Blur => self.blur(strip),
            OperationKind::Erosion => self.morph(strip, false),
            OperationKind::Dilation => self.morph(strip, true),
            OperationKind::Other(_) => Ok(strip.clone()),
        }
    }
}
