//! Decoded rasters.

use crate::error::CoreError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GrayImage, RgbImage};
use std::ops::Range;

/// Output encoding for processed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// JPEG at the given quality (1..=100).
    Jpeg { quality: u8 },
}

/// A decoded raster stored row-major, `channels` interleaved samples per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl ImageFrame {
    /// Creates a raster from raw samples.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, CoreError> {
        if channels != 1 && channels != 3 {
            return Err(CoreError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(CoreError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Creates an RGB raster with every sample set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            channels: 3,
            data: vec![value; width as usize * height as usize * 3],
        }
    }

    /// Decodes encoded image bytes into a 3-channel RGB raster.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| CoreError::Decode {
            reason: e.to_string(),
        })?;
        Ok(Self::from_rgb(decoded.to_rgb8()))
    }

    /// Encodes the raster.
    pub fn encode(&self, format: EncodeFormat) -> Result<Vec<u8>, CoreError> {
        let image = self.to_dynamic()?;
        let mut out = Vec::new();
        let result = match format {
            EncodeFormat::Png => image.write_with_encoder(PngEncoder::new(&mut out)),
            EncodeFormat::Jpeg { quality } => {
                image.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
            }
        };
        result.map_err(|e| CoreError::Encode {
            reason: e.to_string(),
        })?;
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes per row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// True if the raster has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copies out the rows in `range`.
    ///
    /// The range is clamped to the raster height.
    pub fn rows(&self, range: Range<u32>) -> Self {
        let start = range.start.min(self.height);
        let end = range.end.clamp(start, self.height);
        let row_len = self.row_len();
        Self {
            width: self.width,
            height: end - start,
            channels: self.channels,
            data: self.data[start as usize * row_len..end as usize * row_len].to_vec(),
        }
    }

    pub(crate) fn to_dynamic(&self) -> Result<DynamicImage, CoreError> {
        let buffer_error = || CoreError::BufferSize {
            expected: self.width as usize * self.height as usize * self.channels as usize,
            actual: self.data.len(),
        };
        match self.channels {
            1 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(buffer_error),
            3 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(buffer_error),
            other => Err(CoreError::UnsupportedChannels(other)),
        }
    }

    /// Converts back from an `image` buffer, keeping `channels`.
    pub(crate) fn from_dynamic(image: DynamicImage, channels: u8) -> Self {
        if channels == 1 {
            Self::from_gray(image.to_luma8())
        } else {
            Self::from_rgb(image.to_rgb8())
        }
    }

    pub(crate) fn from_rgb(image: RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: 3,
            data: image.into_raw(),
        }
    }

    pub(crate) fn from_gray(image: GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: 1,
            data: image.into_raw(),
        }
    }
}
