//! SSE2/SSSE3 depth transcoders; each step converts one group of 4 pixels
//!
//! The safe wrappers in this module are only reachable through the function tables below, and
//! a table is only bound to a `DepthConverter` after the required instruction set was detected.

use crate::depth::{ConvertFns, D24_INV_SCALE, D24_SCALE, GROUP_BYTES};

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        #[allow(clippy::wildcard_imports)]
        use std::arch::x86_64::*;
    } else {
        #[allow(clippy::wildcard_imports)]
        use std::arch::x86::*;
    }
}

pub(super) const SSSE3_FNS: ConvertFns = ConvertFns {
    f32_to_be_d24: f32_to_be_d24_ssse3,
    le_d24_to_be_d24: le_d24_to_be_d24_ssse3,
    le_d24x8_to_f32: le_d24x8_to_f32_sse2,
};

pub(super) const SSE2_FNS: ConvertFns = ConvertFns {
    f32_to_be_d24: f32_to_be_d24_sse2,
    le_d24_to_be_d24: le_d24_to_be_d24_sse2,
    le_d24x8_to_f32: le_d24x8_to_f32_sse2,
};

fn f32_to_be_d24_ssse3(dst: &mut [u8], src: &[u8]) {
    // SAFETY: Only bound after verifying that the CPU supports SSSE3
    unsafe { f32_to_be_d24_ssse3_impl(dst, src) }
}

fn le_d24_to_be_d24_ssse3(dst: &mut [u8], src: &[u8]) {
    // SAFETY: Only bound after verifying that the CPU supports SSSE3
    unsafe { le_d24_to_be_d24_ssse3_impl(dst, src) }
}

fn f32_to_be_d24_sse2(dst: &mut [u8], src: &[u8]) {
    // SAFETY: Only bound after verifying that the CPU supports SSE2
    unsafe { f32_to_be_d24_sse2_impl(dst, src) }
}

fn le_d24_to_be_d24_sse2(dst: &mut [u8], src: &[u8]) {
    // SAFETY: Only bound after verifying that the CPU supports SSE2
    unsafe { le_d24_to_be_d24_sse2_impl(dst, src) }
}

fn le_d24x8_to_f32_sse2(dst: &mut [u8], src: &[u8]) {
    // SAFETY: Only bound after verifying that the CPU supports SSE2 (implied by SSSE3)
    unsafe { le_d24x8_to_f32_sse2_impl(dst, src) }
}

// Byte shuffle that reverses bytes 0-2 of every 32-bit lane and keeps byte 3 in place
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn d24_swap_mask() -> __m128i {
    _mm_set_epi8(15, 12, 13, 14, 11, 8, 9, 10, 7, 4, 5, 6, 3, 0, 1, 2)
}

// Same transform as the shuffle above, built from masks and shifts:
// (v & 0xFF00FF00) | ((v << 16) & 0x00FF0000) | ((v >> 16) & 0x000000FF)
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn reverse_low_bytes_sse2(v: __m128i) -> __m128i {
    let mask1 = _mm_set1_epi32(0xFF00FF00_u32 as i32);
    let mask2 = _mm_set1_epi32(0x00FF0000);
    let mask3 = _mm_set1_epi32(0x000000FF);

    let v1 = _mm_and_si128(v, mask1);
    let v2 = _mm_and_si128(_mm_slli_epi32::<16>(v), mask2);
    let v3 = _mm_and_si128(_mm_srli_epi32::<16>(v), mask3);
    _mm_or_si128(_mm_or_si128(v1, v2), v3)
}

#[target_feature(enable = "ssse3")]
unsafe fn f32_to_be_d24_ssse3_impl(dst: &mut [u8], src: &[u8]) {
    debug_assert!(dst.len() == src.len() && src.len() % GROUP_BYTES == 0);

    // SAFETY: Every load and store covers exactly one 16-byte chunk of a slice; unaligned
    // load/store instructions are used
    unsafe {
        let scale = _mm_set1_ps(D24_SCALE);
        let swap_mask = d24_swap_mask();

        for (dst_group, src_group) in
            dst.chunks_exact_mut(GROUP_BYTES).zip(src.chunks_exact(GROUP_BYTES))
        {
            let depth = _mm_loadu_ps(src_group.as_ptr().cast());
            let packed = _mm_cvttps_epi32(_mm_mul_ps(depth, scale));
            let shuffled = _mm_shuffle_epi8(packed, swap_mask);
            _mm_storeu_si128(dst_group.as_mut_ptr().cast(), shuffled);
        }
    }
}

#[target_feature(enable = "ssse3")]
unsafe fn le_d24_to_be_d24_ssse3_impl(dst: &mut [u8], src: &[u8]) {
    debug_assert!(dst.len() == src.len() && src.len() % GROUP_BYTES == 0);

    // SAFETY: See f32_to_be_d24_ssse3_impl
    unsafe {
        let swap_mask = d24_swap_mask();

        for (dst_group, src_group) in
            dst.chunks_exact_mut(GROUP_BYTES).zip(src.chunks_exact(GROUP_BYTES))
        {
            let packed = _mm_loadu_si128(src_group.as_ptr().cast());
            let shuffled = _mm_shuffle_epi8(packed, swap_mask);
            _mm_storeu_si128(dst_group.as_mut_ptr().cast(), shuffled);
        }
    }
}

#[target_feature(enable = "sse2")]
unsafe fn f32_to_be_d24_sse2_impl(dst: &mut [u8], src: &[u8]) {
    debug_assert!(dst.len() == src.len() && src.len() % GROUP_BYTES == 0);

    // SAFETY: See f32_to_be_d24_ssse3_impl
    unsafe {
        let scale = _mm_set1_ps(D24_SCALE);

        for (dst_group, src_group) in
            dst.chunks_exact_mut(GROUP_BYTES).zip(src.chunks_exact(GROUP_BYTES))
        {
            let depth = _mm_loadu_ps(src_group.as_ptr().cast());
            let packed = _mm_cvttps_epi32(_mm_mul_ps(depth, scale));
            _mm_storeu_si128(dst_group.as_mut_ptr().cast(), reverse_low_bytes_sse2(packed));
        }
    }
}

#[target_feature(enable = "sse2")]
unsafe fn le_d24_to_be_d24_sse2_impl(dst: &mut [u8], src: &[u8]) {
    debug_assert!(dst.len() == src.len() && src.len() % GROUP_BYTES == 0);

    // SAFETY: See f32_to_be_d24_ssse3_impl
    unsafe {
        for (dst_group, src_group) in
            dst.chunks_exact_mut(GROUP_BYTES).zip(src.chunks_exact(GROUP_BYTES))
        {
            let packed = _mm_loadu_si128(src_group.as_ptr().cast());
            _mm_storeu_si128(dst_group.as_mut_ptr().cast(), reverse_low_bytes_sse2(packed));
        }
    }
}

#[target_feature(enable = "sse2")]
unsafe fn le_d24x8_to_f32_sse2_impl(dst: &mut [u8], src: &[u8]) {
    debug_assert!(dst.len() == src.len() && src.len() % GROUP_BYTES == 0);

    // SAFETY: See f32_to_be_d24_ssse3_impl
    unsafe {
        let scale = _mm_set1_ps(D24_INV_SCALE);
        let mask = _mm_set1_epi32(0x00FFFFFF);

        for (dst_group, src_group) in
            dst.chunks_exact_mut(GROUP_BYTES).zip(src.chunks_exact(GROUP_BYTES))
        {
            let packed = _mm_and_si128(mask, _mm_loadu_si128(src_group.as_ptr().cast()));
            let depth = _mm_mul_ps(_mm_cvtepi32_ps(packed), scale);
            _mm_storeu_ps(dst_group.as_mut_ptr().cast(), depth);
        }
    }
}
