//! Whole-image helpers used when presenting or capturing surfaces

use ::image::imageops::{self, FilterType};
use ::image::{Rgba, RgbaImage};
use rsx_proc_macros::{EnumAll, EnumDisplay, EnumFromStr};
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumDisplay, EnumFromStr, EnumAll)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScaleFilter {
    #[default]
    Nearest,
    Bilinear,
}

/// 32-bit pixel formats, named by channel order in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumDisplay, EnumFromStr, EnumAll)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Bgra8,
    Argb8,
    Abgr8,
}

impl ScaleFilter {
    fn to_filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
        }
    }
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: u32 = 4;

    // Memory position of the R, G, B, and A channels
    fn channel_offsets(self) -> [usize; 4] {
        match self {
            Self::Rgba8 => [0, 1, 2, 3],
            Self::Bgra8 => [2, 1, 0, 3],
            Self::Argb8 => [1, 2, 3, 0],
            Self::Abgr8 => [3, 2, 1, 0],
        }
    }

    #[inline]
    #[must_use]
    pub fn to_rgba(self, pixel: [u8; 4]) -> [u8; 4] {
        self.channel_offsets().map(|offset| pixel[offset])
    }

    #[inline]
    #[must_use]
    pub fn from_rgba(self, rgba: [u8; 4]) -> [u8; 4] {
        let mut pixel = [0; 4];
        for (channel, offset) in self.channel_offsets().into_iter().enumerate() {
            pixel[offset] = rgba[channel];
        }
        pixel
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("pitch {pitch} is smaller than a row of {row_bytes} bytes")]
    PitchTooSmall { pitch: u32, row_bytes: u64 },
    #[error("{buffer} buffer is too small: need {required} bytes, have {actual}")]
    BufferTooSmall { buffer: &'static str, required: u64, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Display for ClipRect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} at ({}, {})", self.width, self.height, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Row pitch in bytes
    pub pitch: u32,
}

impl ImageDesc {
    #[must_use]
    pub fn packed(format: PixelFormat, width: u32, height: u32) -> Self {
        Self { format, width, height, pitch: width.saturating_mul(PixelFormat::BYTES_PER_PIXEL) }
    }

    fn row_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(PixelFormat::BYTES_PER_PIXEL)
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Minimum buffer length holding every row of this image.
    #[must_use]
    pub fn required_len(&self) -> u64 {
        required_len(self.height, self.pitch, self.row_bytes())
    }

    fn validate(&self, buffer: &'static str, len: usize) -> Result<(), ImageError> {
        if self.height > 1 && self.row_bytes() > u64::from(self.pitch) {
            return Err(ImageError::PitchTooSmall { pitch: self.pitch, row_bytes: self.row_bytes() });
        }

        check_len(buffer, self.required_len(), len)
    }

    fn pixel_offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.pitch as usize + x as usize * PixelFormat::BYTES_PER_PIXEL as usize
    }

    fn read_rgba(&self, buffer: &[u8], x: u32, y: u32) -> [u8; 4] {
        let offset = self.pixel_offset(x, y);
        let pixel = [buffer[offset], buffer[offset + 1], buffer[offset + 2], buffer[offset + 3]];
        self.format.to_rgba(pixel)
    }

    fn write_rgba(&self, buffer: &mut [u8], x: u32, y: u32, rgba: [u8; 4]) {
        let offset = self.pixel_offset(x, y);
        buffer[offset..offset + 4].copy_from_slice(&self.format.from_rgba(rgba));
    }
}

fn required_len(rows: u32, pitch: u32, row_bytes: u64) -> u64 {
    if rows == 0 || row_bytes == 0 {
        return 0;
    }

    u64::from(rows - 1) * u64::from(pitch) + row_bytes
}

fn check_len(buffer: &'static str, required: u64, actual: usize) -> Result<(), ImageError> {
    if (actual as u64) < required {
        return Err(ImageError::BufferTooSmall { buffer, required, actual });
    }

    Ok(())
}

/// Copy the `rect` sub-image of `src` to the top-left corner of `dst`, one row at a time.
///
/// # Errors
///
/// Returns an error if the destination pitch cannot hold one clipped row, or if either buffer is
/// too small for the rows being copied.
pub fn clip_image(
    dst: &mut [u8],
    src: &[u8],
    rect: ClipRect,
    bytes_per_pixel: u32,
    src_pitch: u32,
    dst_pitch: u32,
) -> Result<(), ImageError> {
    let row_bytes = u64::from(rect.width) * u64::from(bytes_per_pixel);
    if rect.height > 1 && row_bytes > u64::from(dst_pitch) {
        return Err(ImageError::PitchTooSmall { pitch: dst_pitch, row_bytes });
    }

    if row_bytes == 0 || rect.height == 0 {
        return Ok(());
    }

    let src_start = u64::from(rect.y) * u64::from(src_pitch)
        + u64::from(rect.x) * u64::from(bytes_per_pixel);
    check_len("source", src_start + required_len(rect.height, src_pitch, row_bytes), src.len())?;
    check_len("destination", required_len(rect.height, dst_pitch, row_bytes), dst.len())?;

    let row_bytes = row_bytes as usize;
    let mut src_offset = src_start as usize;
    let mut dst_offset = 0;
    for _ in 0..rect.height {
        dst[dst_offset..dst_offset + row_bytes]
            .copy_from_slice(&src[src_offset..src_offset + row_bytes]);
        src_offset += src_pitch as usize;
        dst_offset += dst_pitch as usize;
    }

    Ok(())
}

/// Resize `src` into `dst`, converting between channel orders.
///
/// Pixels are gathered into an RGBA buffer, resampled with [`imageops::resize`], and written
/// back in the destination channel order at the destination pitch.
///
/// # Errors
///
/// Returns an error if either image's pitch is smaller than one row or if either buffer is too
/// small for its described image.
pub fn convert_scale_image(
    dst: &mut [u8],
    dst_desc: &ImageDesc,
    src: &[u8],
    src_desc: &ImageDesc,
    filter: ScaleFilter,
) -> Result<(), ImageError> {
    src_desc.validate("source", src.len())?;
    dst_desc.validate("destination", dst.len())?;

    if dst_desc.is_empty() {
        return Ok(());
    }

    if src_desc.is_empty() {
        // Nothing to sample from
        for y in 0..dst_desc.height {
            for x in 0..dst_desc.width {
                dst_desc.write_rgba(dst, x, y, [0; 4]);
            }
        }
        return Ok(());
    }

    let source = RgbaImage::from_fn(src_desc.width, src_desc.height, |x, y| {
        Rgba(src_desc.read_rgba(src, x, y))
    });
    let scaled =
        imageops::resize(&source, dst_desc.width, dst_desc.height, filter.to_filter_type());

    for (x, y, pixel) in scaled.enumerate_pixels() {
        dst_desc.write_rgba(dst, x, y, pixel.0);
    }

    Ok(())
}
