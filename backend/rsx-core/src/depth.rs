//! Depth buffer transcoding between linear `f32` depth and packed 24-bit depth
//!
//! All buffers are little-endian byte slices holding one 32-bit word per pixel. Every transcoder
//! processes pixels in groups of 4, so the pixel count must be a multiple of 4.

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86;

use crate::config::ConverterBackend;
use rsx_proc_macros::{EnumAll, EnumDisplay, EnumFromStr};
use rsx_common::num::{D24_MASK, U24Ext};
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum representable 24-bit depth value used when normalizing; matches the RSX's scale of
/// `2^24 - 2` rather than `2^24 - 1`
pub const D24_SCALE: f32 = 16777214.0;

pub(crate) const D24_INV_SCALE: f32 = 1.0 / D24_SCALE;

const BYTES_PER_PIXEL: usize = 4;
const GROUP_BYTES: usize = 4 * BYTES_PER_PIXEL;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepthConvertError {
    #[error("pixel count {pixels} ({width}x{rows}) is not a multiple of 4")]
    UnalignedPixelCount { width: u32, rows: u32, pixels: u64 },
    #[error("{buffer} buffer is too small: need {required} bytes, have {actual}")]
    BufferTooSmall { buffer: &'static str, required: usize, actual: usize },
}

/// A concrete transcoder implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumDisplay, EnumFromStr, EnumAll)]
pub enum DepthBackend {
    Ssse3,
    Sse2,
    Scalar,
}

impl DepthBackend {
    #[must_use]
    pub fn is_supported(self) -> bool {
        match self {
            Self::Scalar => true,
            Self::Ssse3 => {
                cfg_if::cfg_if! {
                    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
                        std::arch::is_x86_feature_detected!("ssse3")
                    } else {
                        false
                    }
                }
            }
            Self::Sse2 => {
                cfg_if::cfg_if! {
                    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
                        std::arch::is_x86_feature_detected!("sse2")
                    } else {
                        false
                    }
                }
            }
        }
    }

    /// Fastest backend supported by the host CPU.
    #[must_use]
    pub fn detect() -> Self {
        Self::ALL.iter().copied().find(|backend| backend.is_supported()).unwrap_or(Self::Scalar)
    }

    /// Every backend supported by the host CPU, fastest first.
    pub fn supported() -> impl Iterator<Item = Self> {
        Self::ALL.iter().copied().filter(|backend| backend.is_supported())
    }
}

// Both slices are the same length and a multiple of 16 bytes
type ConvertFn = fn(&mut [u8], &[u8]);

#[derive(Debug, Clone, Copy)]
struct ConvertFns {
    f32_to_be_d24: ConvertFn,
    le_d24_to_be_d24: ConvertFn,
    le_d24x8_to_f32: ConvertFn,
}

impl ConvertFns {
    fn for_backend(backend: DepthBackend) -> Self {
        match backend {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            DepthBackend::Ssse3 => x86::SSSE3_FNS,
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            DepthBackend::Sse2 => x86::SSE2_FNS,
            _ => SCALAR_FNS,
        }
    }
}

const SCALAR_FNS: ConvertFns = ConvertFns {
    f32_to_be_d24: f32_to_be_d24_scalar,
    le_d24_to_be_d24: le_d24_to_be_d24_scalar,
    le_d24x8_to_f32: le_d24x8_to_f32_scalar,
};

/// Depth transcoder bound to one backend.
///
/// The backend is chosen once at construction. Every backend produces bit-identical output.
#[derive(Debug, Clone, Copy)]
pub struct DepthConverter {
    backend: DepthBackend,
    fns: ConvertFns,
}

impl DepthConverter {
    #[must_use]
    pub fn new(requested: ConverterBackend) -> Self {
        let backend = match requested {
            ConverterBackend::Auto => DepthBackend::detect(),
            ConverterBackend::Ssse3 => Self::supported_or_detect(DepthBackend::Ssse3),
            ConverterBackend::Sse2 => Self::supported_or_detect(DepthBackend::Sse2),
            ConverterBackend::Scalar => DepthBackend::Scalar,
        };

        log::debug!("Using {backend} depth transcoders (requested {requested})");

        Self { backend, fns: ConvertFns::for_backend(backend) }
    }

    #[must_use]
    pub fn detect() -> Self {
        Self::new(ConverterBackend::Auto)
    }

    /// Bind a specific backend, falling back to the fastest supported backend if the host CPU
    /// does not support it.
    #[must_use]
    pub fn with_backend(backend: DepthBackend) -> Self {
        let backend = Self::supported_or_detect(backend);
        Self { backend, fns: ConvertFns::for_backend(backend) }
    }

    fn supported_or_detect(backend: DepthBackend) -> DepthBackend {
        if backend.is_supported() {
            return backend;
        }

        let fallback = DepthBackend::detect();
        log::warn!("{backend} depth transcoders are not supported on this CPU; using {fallback}");
        fallback
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> DepthBackend {
        self.backend
    }

    /// Convert little-endian `f32` depth in `[0, 1]` to big-endian packed 24-bit depth.
    ///
    /// Values are scaled by [`D24_SCALE`] and truncated toward zero. The top byte of each output
    /// word is the high byte of the truncated integer, which is zero for in-range input.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel count is not a multiple of 4 or if either buffer is too small.
    pub fn f32_to_packed_be_24(
        &self,
        dst: &mut [u8],
        src: &[u8],
        width: u32,
        rows: u32,
    ) -> Result<(), DepthConvertError> {
        let len = checked_buffer_len(dst, src, width, rows)?;
        (self.fns.f32_to_be_d24)(&mut dst[..len], &src[..len]);
        Ok(())
    }

    /// Reverse the low three bytes of each little-endian word, preserving the top byte.
    ///
    /// This is its own inverse and converts in either direction between little-endian and
    /// big-endian D24.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel count is not a multiple of 4 or if either buffer is too small.
    pub fn packed_le_24_to_packed_be_24(
        &self,
        dst: &mut [u8],
        src: &[u8],
        width: u32,
        rows: u32,
    ) -> Result<(), DepthConvertError> {
        let len = checked_buffer_len(dst, src, width, rows)?;
        (self.fns.le_d24_to_be_d24)(&mut dst[..len], &src[..len]);
        Ok(())
    }

    /// Convert little-endian D24X8 words to normalized `f32` depth, ignoring the top byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel count is not a multiple of 4 or if either buffer is too small.
    pub fn packed_le_24x8_to_f32(
        &self,
        dst: &mut [u8],
        src: &[u8],
        width: u32,
        rows: u32,
    ) -> Result<(), DepthConvertError> {
        let len = checked_buffer_len(dst, src, width, rows)?;
        (self.fns.le_d24x8_to_f32)(&mut dst[..len], &src[..len]);
        Ok(())
    }
}

impl Default for DepthConverter {
    fn default() -> Self {
        Self::detect()
    }
}

static DETECTED_CONVERTER: LazyLock<DepthConverter> = LazyLock::new(DepthConverter::detect);

/// Process-wide converter bound to the fastest backend available, detected on first use.
#[must_use]
pub fn detected_converter() -> &'static DepthConverter {
    &DETECTED_CONVERTER
}

/// [`DepthConverter::f32_to_packed_be_24`] using the fastest backend available.
///
/// # Errors
///
/// See [`DepthConverter::f32_to_packed_be_24`].
pub fn f32_to_packed_be_24(
    dst: &mut [u8],
    src: &[u8],
    width: u32,
    rows: u32,
) -> Result<(), DepthConvertError> {
    DETECTED_CONVERTER.f32_to_packed_be_24(dst, src, width, rows)
}

/// [`DepthConverter::packed_le_24_to_packed_be_24`] using the fastest backend available.
///
/// # Errors
///
/// See [`DepthConverter::packed_le_24_to_packed_be_24`].
pub fn packed_le_24_to_packed_be_24(
    dst: &mut [u8],
    src: &[u8],
    width: u32,
    rows: u32,
) -> Result<(), DepthConvertError> {
    DETECTED_CONVERTER.packed_le_24_to_packed_be_24(dst, src, width, rows)
}

/// [`DepthConverter::packed_le_24x8_to_f32`] using the fastest backend available.
///
/// # Errors
///
/// See [`DepthConverter::packed_le_24x8_to_f32`].
pub fn packed_le_24x8_to_f32(
    dst: &mut [u8],
    src: &[u8],
    width: u32,
    rows: u32,
) -> Result<(), DepthConvertError> {
    DETECTED_CONVERTER.packed_le_24x8_to_f32(dst, src, width, rows)
}

fn checked_buffer_len(
    dst: &[u8],
    src: &[u8],
    width: u32,
    rows: u32,
) -> Result<usize, DepthConvertError> {
    let pixels = u64::from(width) * u64::from(rows);
    if pixels % 4 != 0 {
        return Err(DepthConvertError::UnalignedPixelCount { width, rows, pixels });
    }

    let required = usize::try_from(pixels * BYTES_PER_PIXEL as u64).unwrap_or(usize::MAX);
    if src.len() < required {
        return Err(DepthConvertError::BufferTooSmall {
            buffer: "source",
            required,
            actual: src.len(),
        });
    }
    if dst.len() < required {
        return Err(DepthConvertError::BufferTooSmall {
            buffer: "destination",
            required,
            actual: dst.len(),
        });
    }

    debug_assert!(required % GROUP_BYTES == 0);
    Ok(required)
}

// Float-to-int conversion with CVTTPS2DQ semantics: truncate toward zero, and produce
// 0x80000000 for NaN and for values outside the i32 range
#[inline]
fn truncate_f32_to_i32(value: f32) -> i32 {
    if value.is_nan() || !(-2147483648.0..2147483648.0).contains(&value) {
        i32::MIN
    } else {
        value as i32
    }
}

#[inline]
fn words(bytes: &[u8]) -> impl Iterator<Item = [u8; 4]> + '_ {
    bytes.chunks_exact(BYTES_PER_PIXEL).map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
}

fn f32_to_be_d24_scalar(dst: &mut [u8], src: &[u8]) {
    for (dst_word, src_word) in dst.chunks_exact_mut(BYTES_PER_PIXEL).zip(words(src)) {
        let depth = f32::from_le_bytes(src_word);
        let packed = truncate_f32_to_i32(depth * D24_SCALE) as u32;
        dst_word.copy_from_slice(&packed.reverse_low_bytes().to_le_bytes());
    }
}

fn le_d24_to_be_d24_scalar(dst: &mut [u8], src: &[u8]) {
    for (dst_word, src_word) in dst.chunks_exact_mut(BYTES_PER_PIXEL).zip(words(src)) {
        let packed = u32::from_le_bytes(src_word);
        dst_word.copy_from_slice(&packed.reverse_low_bytes().to_le_bytes());
    }
}

fn le_d24x8_to_f32_scalar(dst: &mut [u8], src: &[u8]) {
    for (dst_word, src_word) in dst.chunks_exact_mut(BYTES_PER_PIXEL).zip(words(src)) {
        let depth = (u32::from_le_bytes(src_word) & D24_MASK) as f32 * D24_INV_SCALE;
        dst_word.copy_from_slice(&depth.to_le_bytes());
    }
}

#[cfg(test)]
mod tests;
