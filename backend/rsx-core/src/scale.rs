//! Nearest-neighbour image upscaling by integer sample factors
//!
//! Each source element is written `samples_u` times horizontally, and each finished destination
//! row is repeated `samples_v` times vertically. Elements are optionally byte-swapped on read,
//! which converts big-endian guest surfaces to host order.

use bytemuck::Pod;
use rsx_common::num::SwapBytes;
use std::mem;
use thiserror::Error;

/// A pixel element the scaler can replicate.
pub trait Element: Pod + SwapBytes {}

impl<T: Pod + SwapBytes> Element for T {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("unsupported element size {0}; expected 1, 2, 4, or 8")]
    UnsupportedElementSize(u8),
    #[error("sample factors must be non-zero (u={samples_u}, v={samples_v})")]
    InvalidSampleCount { samples_u: u8, samples_v: u8 },
    #[error("destination pitch {dst_pitch} is smaller than a scaled row of {row_bytes} bytes")]
    DstPitchTooSmall { dst_pitch: u32, row_bytes: u64 },
    #[error("source pitch {src_pitch} is smaller than a source row of {row_bytes} bytes")]
    SrcPitchTooSmall { src_pitch: u32, row_bytes: u64 },
    #[error("{buffer} buffer is too small: need {required} bytes, have {actual}")]
    BufferTooSmall { buffer: &'static str, required: u64, actual: usize },
}

/// Layout of a nearest-neighbour scale operation. Pitches are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDescriptor {
    pub src_width: u32,
    pub src_height: u32,
    pub src_pitch: u32,
    pub dst_pitch: u32,
    pub element_size: u8,
    pub samples_u: u8,
    pub samples_v: u8,
    pub swap_bytes: bool,
}

impl ScaleDescriptor {
    /// Descriptor for a tightly packed source image; the destination pitch is exactly one
    /// scaled row.
    #[must_use]
    pub fn packed(
        src_width: u32,
        src_height: u32,
        element_size: u8,
        samples_u: u8,
        samples_v: u8,
    ) -> Self {
        let src_pitch = src_width.saturating_mul(element_size.into());
        Self {
            src_width,
            src_height,
            src_pitch,
            dst_pitch: src_pitch.saturating_mul(samples_u.into()),
            element_size,
            samples_u,
            samples_v,
            swap_bytes: false,
        }
    }

    #[must_use]
    pub fn with_swap_bytes(self, swap_bytes: bool) -> Self {
        Self { swap_bytes, ..self }
    }

    /// Unused elements at the end of each destination row.
    ///
    /// # Errors
    ///
    /// Returns an error if the element size or sample factors are invalid, or if a scaled row
    /// does not fit in the destination pitch.
    pub fn row_padding(&self) -> Result<u32, ScaleError> {
        let layout = ScaleLayout::new(self)?;
        let dst_width = self.dst_pitch / u32::from(self.element_size);
        Ok(dst_width - (layout.dst_row_bytes / layout.element_size.bytes()) as u32)
    }

    /// Number of destination bytes written or skipped over, from the first destination row to the
    /// end of the last scaled row.
    ///
    /// # Errors
    ///
    /// See [`Self::row_padding`].
    pub fn required_dst_len(&self) -> Result<u64, ScaleError> {
        ScaleLayout::new(self).map(|layout| layout.required_dst_len())
    }

    /// # Errors
    ///
    /// See [`Self::row_padding`].
    pub fn required_src_len(&self) -> Result<u64, ScaleError> {
        ScaleLayout::new(self).map(|layout| layout.required_src_len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementSize {
    One,
    Two,
    Four,
    Eight,
}

impl ElementSize {
    fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            8 => Some(Self::Eight),
            _ => None,
        }
    }

    fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

// Validated descriptor; all sizes in bytes unless noted otherwise
#[derive(Debug, Clone, Copy)]
struct ScaleLayout {
    element_size: ElementSize,
    width: usize,
    height: usize,
    src_pitch: usize,
    dst_pitch: usize,
    src_row_bytes: usize,
    dst_row_bytes: usize,
    samples_u: usize,
    samples_v: usize,
    swap_bytes: bool,
}

impl ScaleLayout {
    fn new(desc: &ScaleDescriptor) -> Result<Self, ScaleError> {
        let element_size = ElementSize::from_bytes(desc.element_size)
            .ok_or(ScaleError::UnsupportedElementSize(desc.element_size))?;

        if desc.samples_u == 0 || desc.samples_v == 0 {
            return Err(ScaleError::InvalidSampleCount {
                samples_u: desc.samples_u,
                samples_v: desc.samples_v,
            });
        }

        let src_row_bytes = u64::from(desc.src_width) * element_size.bytes() as u64;
        if src_row_bytes > u64::from(desc.src_pitch) && desc.src_height > 1 {
            return Err(ScaleError::SrcPitchTooSmall {
                src_pitch: desc.src_pitch,
                row_bytes: src_row_bytes,
            });
        }

        let dst_row_bytes = src_row_bytes * u64::from(desc.samples_u);
        if dst_row_bytes > u64::from(desc.dst_pitch) {
            return Err(ScaleError::DstPitchTooSmall {
                dst_pitch: desc.dst_pitch,
                row_bytes: dst_row_bytes,
            });
        }

        // Both row sizes are bounded by a u32 pitch at this point
        Ok(Self {
            element_size,
            width: desc.src_width as usize,
            height: desc.src_height as usize,
            src_pitch: desc.src_pitch as usize,
            dst_pitch: desc.dst_pitch as usize,
            src_row_bytes: src_row_bytes as usize,
            dst_row_bytes: dst_row_bytes as usize,
            samples_u: desc.samples_u.into(),
            samples_v: desc.samples_v.into(),
            swap_bytes: desc.swap_bytes,
        })
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn dst_rows(&self) -> u64 {
        self.height as u64 * self.samples_v as u64
    }

    fn required_dst_len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }

        (self.dst_rows() - 1) * self.dst_pitch as u64 + self.dst_row_bytes as u64
    }

    fn required_src_len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }

        (self.height as u64 - 1) * self.src_pitch as u64 + self.src_row_bytes as u64
    }

    fn check_buffers(&self, dst: &[u8], src: &[u8]) -> Result<(), ScaleError> {
        let required = self.required_src_len();
        if (src.len() as u64) < required {
            return Err(ScaleError::BufferTooSmall { buffer: "source", required, actual: src.len() });
        }

        let required = self.required_dst_len();
        if (dst.len() as u64) < required {
            return Err(ScaleError::BufferTooSmall {
                buffer: "destination",
                required,
                actual: dst.len(),
            });
        }

        Ok(())
    }
}

/// Upscale `src` into `dst` by replicating every element `samples_u` times horizontally and
/// every row `samples_v` times vertically.
///
/// Source rows start every `src_pitch` bytes and destination rows every `dst_pitch` bytes. Bytes
/// between the end of a scaled row and the next destination row are left untouched. A zero
/// width or height is a no-op.
///
/// Element sizes 1, 2, 4, and 8 are accepted on every path. In particular, 8-byte elements are
/// not rejected when `samples_v > 1` or when `samples_u` has no fast path; the generic path
/// replicates and byte swaps them like any other size.
///
/// # Errors
///
/// Returns an error if the element size is not 1, 2, 4, or 8, if either sample factor is zero,
/// if a row does not fit in its pitch, or if either buffer is too small for the described image.
pub fn scale_image_nearest(
    dst: &mut [u8],
    src: &[u8],
    desc: &ScaleDescriptor,
) -> Result<(), ScaleError> {
    let layout = ScaleLayout::new(desc)?;
    layout.check_buffers(dst, src)?;

    if layout.is_empty() {
        return Ok(());
    }

    if layout.samples_v != 1 {
        scale_fallback(dst, src, &layout);
        return Ok(());
    }

    match layout.samples_u {
        1 => scale_fast::<1>(dst, src, &layout),
        2 => scale_fast::<2>(dst, src, &layout),
        3 => scale_fast::<3>(dst, src, &layout),
        4 => scale_fast::<4>(dst, src, &layout),
        8 => scale_fast::<8>(dst, src, &layout),
        16 => scale_fast::<16>(dst, src, &layout),
        _ => scale_fallback(dst, src, &layout),
    }

    Ok(())
}

/// [`scale_image_nearest`] without the fixed-factor fast paths.
///
/// Produces identical output for every descriptor.
///
/// # Errors
///
/// See [`scale_image_nearest`].
pub fn scale_image_nearest_fallback(
    dst: &mut [u8],
    src: &[u8],
    desc: &ScaleDescriptor,
) -> Result<(), ScaleError> {
    let layout = ScaleLayout::new(desc)?;
    layout.check_buffers(dst, src)?;

    if !layout.is_empty() {
        scale_fallback(dst, src, &layout);
    }

    Ok(())
}

#[inline(always)]
fn read_element<T: Element, const SWAP: bool>(bytes: &[u8]) -> T {
    let value: T = bytemuck::pod_read_unaligned(bytes);
    if SWAP { value.swap_bytes() } else { value }
}

fn scale_fast<const N: usize>(dst: &mut [u8], src: &[u8], layout: &ScaleLayout) {
    // Swapping a single byte is a no-op
    match (layout.element_size, layout.swap_bytes) {
        (ElementSize::One, _) => scale_rows_fast::<u8, N, false>(dst, src, layout),
        (ElementSize::Two, false) => scale_rows_fast::<u16, N, false>(dst, src, layout),
        (ElementSize::Two, true) => scale_rows_fast::<u16, N, true>(dst, src, layout),
        (ElementSize::Four, false) => scale_rows_fast::<u32, N, false>(dst, src, layout),
        (ElementSize::Four, true) => scale_rows_fast::<u32, N, true>(dst, src, layout),
        (ElementSize::Eight, false) => scale_rows_fast::<u64, N, false>(dst, src, layout),
        (ElementSize::Eight, true) => scale_rows_fast::<u64, N, true>(dst, src, layout),
    }
}

fn scale_rows_fast<T: Element, const N: usize, const SWAP: bool>(
    dst: &mut [u8],
    src: &[u8],
    layout: &ScaleLayout,
) {
    let element_bytes = mem::size_of::<T>();

    for row in 0..layout.height {
        let src_row = &src[row * layout.src_pitch..][..layout.src_row_bytes];
        let dst_row = &mut dst[row * layout.dst_pitch..][..layout.dst_row_bytes];

        for (dst_samples, src_element) in
            dst_row.chunks_exact_mut(N * element_bytes).zip(src_row.chunks_exact(element_bytes))
        {
            let value = read_element::<T, SWAP>(src_element);
            let value_bytes = bytemuck::bytes_of(&value);
            for dst_element in dst_samples.chunks_exact_mut(element_bytes) {
                dst_element.copy_from_slice(value_bytes);
            }
        }
    }
}

fn scale_fallback(dst: &mut [u8], src: &[u8], layout: &ScaleLayout) {
    match (layout.element_size, layout.swap_bytes) {
        (ElementSize::One, _) => scale_rows_fallback::<u8, false>(dst, src, layout),
        (ElementSize::Two, false) => scale_rows_fallback::<u16, false>(dst, src, layout),
        (ElementSize::Two, true) => scale_rows_fallback::<u16, true>(dst, src, layout),
        (ElementSize::Four, false) => scale_rows_fallback::<u32, false>(dst, src, layout),
        (ElementSize::Four, true) => scale_rows_fallback::<u32, true>(dst, src, layout),
        (ElementSize::Eight, false) => scale_rows_fallback::<u64, false>(dst, src, layout),
        (ElementSize::Eight, true) => scale_rows_fallback::<u64, true>(dst, src, layout),
    }
}

fn scale_rows_fallback<T: Element, const SWAP: bool>(
    dst: &mut [u8],
    src: &[u8],
    layout: &ScaleLayout,
) {
    let element_bytes = mem::size_of::<T>();

    for row in 0..layout.height {
        let src_row = &src[row * layout.src_pitch..][..layout.src_row_bytes];
        let row_start = row * layout.samples_v * layout.dst_pitch;
        let dst_row = &mut dst[row_start..][..layout.dst_row_bytes];

        let mut dst_elements = dst_row.chunks_exact_mut(element_bytes);
        for src_element in src_row.chunks_exact(element_bytes) {
            let value = read_element::<T, SWAP>(src_element);
            let value_bytes = bytemuck::bytes_of(&value);
            for dst_element in dst_elements.by_ref().take(layout.samples_u) {
                dst_element.copy_from_slice(value_bytes);
            }
        }

        for n in 1..layout.samples_v {
            let copy_start = row_start + n * layout.dst_pitch;
            dst.copy_within(row_start..row_start + layout.dst_row_bytes, copy_start);
        }
    }
}
