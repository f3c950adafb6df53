//! Row-wise strip splitting and merging.
//!
//! `split(image, n)` cuts `n` bands of `floor(height / n)` rows each. When the
//! height is not a multiple of `n` the last `height % n` rows belong to no
//! strip and are dropped from the merged output.

use crate::error::CoreError;
use crate::raster::ImageFrame;
use std::ops::Range;

/// A horizontal band of an image, bound for the worker at `rank`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strip {
    /// Target rank; strip `i` always goes to rank `i`.
    pub rank: usize,
    /// Rows of the source image this band covers.
    pub rows: Range<u32>,
    /// The band's pixels.
    pub frame: ImageFrame,
}

impl Strip {
    pub fn height(&self) -> u32 {
        self.frame.height()
    }
}

/// Splits `image` into `n` equal-height strips, ranks `0..n`.
///
/// Returns no strips when `n` is zero.
pub fn split(image: &ImageFrame, n: usize) -> Vec<Strip> {
    if n == 0 {
        return Vec::new();
    }
    // More ranks than u32 can count means more ranks than rows
    let strip_height = u32::try_from(n).map_or(0, |n| image.height() / n);

    (0..n)
        .map(|rank| {
            let start = rank as u32 * strip_height;
            let rows = start..start + strip_height;
            Strip {
                rank,
                frame: image.rows(rows.clone()),
                rows,
            }
        })
        .collect()
}

/// Concatenates strips top to bottom in the order given.
///
/// No reordering happens here; callers pass strips in rank order. All strips
/// must share width and channel count.
pub fn merge(strips: Vec<ImageFrame>) -> Result<ImageFrame, CoreError> {
    let first = strips.first().ok_or(CoreError::EmptyMerge)?;
    let (width, channels) = (first.width(), first.channels());

    let mut height = 0u32;
    let mut total = 0usize;
    for (index, strip) in strips.iter().enumerate() {
        if strip.width() != width || strip.channels() != channels {
            return Err(CoreError::ShapeMismatch {
                index,
                expected_width: width,
                expected_channels: channels,
                actual_width: strip.width(),
                actual_channels: strip.channels(),
            });
        }
        height += strip.height();
        total += strip.data().len();
    }

    let mut data = Vec::with_capacity(total);
    for strip in strips {
        data.extend_from_slice(strip.data());
    }

    ImageFrame::new(width, height, channels, data)
}
