use super::*;
use std::iter;
use test_log::test;

fn scalar() -> DepthConverter {
    DepthConverter::with_backend(DepthBackend::Scalar)
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn bytes_to_u32(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap())).collect()
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap())).collect()
}

fn random_bytes(len: usize) -> Vec<u8> {
    iter::repeat_with(rand::random).take(len).collect()
}

#[test]
fn f32_to_be_d24_known_values() {
    let src = f32_bytes(&[0.0, 1.0, 0.5, 0.25]);
    let mut dst = vec![0; src.len()];
    scalar().f32_to_packed_be_24(&mut dst, &src, 4, 1).unwrap();

    // 1.0 -> 0xFFFFFE, 0.5 -> 0x7FFFFF, 0.25 -> 0x3FFFFF (truncated from 4194303.5)
    assert_eq!(dst, [
        0x00, 0x00, 0x00, 0x00, //
        0xFF, 0xFF, 0xFE, 0x00, //
        0x7F, 0xFF, 0xFF, 0x00, //
        0x3F, 0xFF, 0xFF, 0x00,
    ]);
}

#[test]
fn f32_to_be_d24_truncates() {
    // 0.3 * 16777214 = 5033164.2 in f32 arithmetic; must truncate rather than round
    let src = f32_bytes(&[0.3, 0.9999999, 0.0000001, 0.75]);
    let mut dst = vec![0; src.len()];
    scalar().f32_to_packed_be_24(&mut dst, &src, 2, 2).unwrap();

    let expected: Vec<u32> = [0.3_f32, 0.9999999, 0.0000001, 0.75]
        .into_iter()
        .map(|value| ((value * D24_SCALE).trunc() as u32).reverse_low_bytes())
        .collect();
    assert_eq!(bytes_to_u32(&dst), expected);
}

#[test]
fn scalar_truncation_matches_cvttps2dq() {
    assert_eq!(truncate_f32_to_i32(1.9), 1);
    assert_eq!(truncate_f32_to_i32(-1.9), -1);
    assert_eq!(truncate_f32_to_i32(f32::NAN), i32::MIN);
    assert_eq!(truncate_f32_to_i32(f32::INFINITY), i32::MIN);
    assert_eq!(truncate_f32_to_i32(f32::NEG_INFINITY), i32::MIN);
    assert_eq!(truncate_f32_to_i32(2147483648.0), i32::MIN);
    assert_eq!(truncate_f32_to_i32(-2147483648.0), i32::MIN);
    assert_eq!(truncate_f32_to_i32(2147483520.0), 2147483520);
}

#[test]
fn le_d24_to_be_d24_known_values() {
    let src = u32_bytes(&[0x00123456, 0xAB123456, 0x00FFFFFF, 0xFF000001]);
    let mut dst = vec![0; src.len()];
    scalar().packed_le_24_to_packed_be_24(&mut dst, &src, 4, 1).unwrap();

    assert_eq!(bytes_to_u32(&dst), [0x00563412, 0xAB563412, 0x00FFFFFF, 0xFF010000]);
}

#[test]
fn le_d24_round_trip() {
    let fills = [
        vec![0; 64],
        u32_bytes(&[0x00FFFFFF; 16]),
        u32_bytes(&[0xFFFFFFFF; 16]),
        random_bytes(64),
        random_bytes(4096),
    ];

    for backend in DepthBackend::supported() {
        let converter = DepthConverter::with_backend(backend);
        for src in &fills {
            let pixels = (src.len() / 4) as u32;

            let mut swapped = vec![0; src.len()];
            converter.packed_le_24_to_packed_be_24(&mut swapped, src, pixels, 1).unwrap();
            let mut restored = vec![0; src.len()];
            converter.packed_le_24_to_packed_be_24(&mut restored, &swapped, pixels, 1).unwrap();

            assert_eq!(&restored, src, "round trip failed for backend {backend}");
        }
    }
}

#[test]
fn d24x8_to_f32_known_values() {
    let src = u32_bytes(&[0x00000000, 0xFFFFFFFE, 0x007FFFFF, 0xAB000000]);
    let mut dst = vec![0; src.len()];
    scalar().packed_le_24x8_to_f32(&mut dst, &src, 1, 4).unwrap();

    let depth = bytes_to_f32(&dst);
    assert_eq!(depth[0], 0.0);
    assert!((depth[1] - 1.0).abs() < 1e-6, "{}", depth[1]);
    assert!((depth[2] - 0.5).abs() < 1e-6, "{}", depth[2]);
    // Stencil byte is ignored
    assert_eq!(depth[3], 0.0);
}

#[test]
fn d24_round_trip_through_f32() {
    let src = u32_bytes(&[0, 1, 0x123456, 0xFFFFFE, 0x800000, 0x7FFFFF, 0x000100, 0xABCDEF]);
    let mut depth = vec![0; src.len()];
    scalar().packed_le_24x8_to_f32(&mut depth, &src, 8, 1).unwrap();

    let mut packed_be = vec![0; src.len()];
    scalar().f32_to_packed_be_24(&mut packed_be, &depth, 8, 1).unwrap();
    let mut packed_le = vec![0; src.len()];
    scalar().packed_le_24_to_packed_be_24(&mut packed_le, &packed_be, 8, 1).unwrap();

    // Truncation may lose at most one LSB
    for (original, converted) in bytes_to_u32(&src).into_iter().zip(bytes_to_u32(&packed_le)) {
        assert!(original.abs_diff(converted) <= 1, "{original:06X} -> {converted:06X}");
    }
}

#[test]
fn backends_agree() {
    let random = random_bytes(16 * 256);
    let depths = f32_bytes(
        &iter::repeat_with(rand::random::<f32>).take(1024).collect::<Vec<_>>(),
    );
    let special = f32_bytes(&[
        f32::NAN,
        f32::INFINITY,
        f32::NEG_INFINITY,
        -0.0,
        -1.0,
        2.0,
        1.0e30,
        f32::MIN_POSITIVE,
        1.0,
        0.0,
        0.5,
        0.999_999_94,
    ]);

    let reference = scalar();
    for backend in DepthBackend::supported() {
        let converter = DepthConverter::with_backend(backend);
        assert_eq!(converter.backend(), backend);

        for src in [&random, &depths, &special] {
            let pixels = (src.len() / 4) as u32;

            let mut expected = vec![0; src.len()];
            let mut actual = vec![0; src.len()];

            reference.f32_to_packed_be_24(&mut expected, src, pixels, 1).unwrap();
            converter.f32_to_packed_be_24(&mut actual, src, pixels, 1).unwrap();
            assert_eq!(actual, expected, "f32_to_packed_be_24 mismatch for backend {backend}");

            reference.packed_le_24_to_packed_be_24(&mut expected, src, pixels, 1).unwrap();
            converter.packed_le_24_to_packed_be_24(&mut actual, src, pixels, 1).unwrap();
            assert_eq!(
                actual, expected,
                "packed_le_24_to_packed_be_24 mismatch for backend {backend}"
            );

            reference.packed_le_24x8_to_f32(&mut expected, src, pixels, 1).unwrap();
            converter.packed_le_24x8_to_f32(&mut actual, src, pixels, 1).unwrap();
            assert_eq!(actual, expected, "packed_le_24x8_to_f32 mismatch for backend {backend}");
        }
    }
}

#[test]
fn unaligned_pixel_count() {
    let src = vec![0; 64];
    let mut dst = vec![0; 64];

    assert_eq!(
        scalar().f32_to_packed_be_24(&mut dst, &src, 3, 1),
        Err(DepthConvertError::UnalignedPixelCount { width: 3, rows: 1, pixels: 3 })
    );
    assert_eq!(
        scalar().packed_le_24x8_to_f32(&mut dst, &src, 5, 3),
        Err(DepthConvertError::UnalignedPixelCount { width: 5, rows: 3, pixels: 15 })
    );

    // Odd width is fine as long as the total pixel count is a multiple of 4
    assert!(scalar().packed_le_24_to_packed_be_24(&mut dst, &src, 2, 6).is_ok());
}

#[test]
fn buffers_too_small() {
    let src = vec![0; 32];
    let mut dst = vec![0; 16];

    assert_eq!(
        scalar().packed_le_24_to_packed_be_24(&mut dst, &src, 8, 1),
        Err(DepthConvertError::BufferTooSmall { buffer: "destination", required: 32, actual: 16 })
    );
    assert_eq!(
        scalar().packed_le_24_to_packed_be_24(&mut dst, &src[..8], 4, 1),
        Err(DepthConvertError::BufferTooSmall { buffer: "source", required: 16, actual: 8 })
    );
}

#[test]
fn only_requested_pixels_are_written() {
    let src = u32_bytes(&[0x00112233; 8]);
    let mut dst = vec![0xEE; 40];
    scalar().packed_le_24_to_packed_be_24(&mut dst, &src, 4, 2).unwrap();

    assert_eq!(&bytes_to_u32(&dst[..32]), &[0x00332211; 8]);
    assert_eq!(&dst[32..], &[0xEE; 8]);
}

#[test]
fn backend_selection() {
    assert_eq!(DepthConverter::new(ConverterBackend::Scalar).backend(), DepthBackend::Scalar);
    assert_eq!(DepthConverter::new(ConverterBackend::Auto).backend(), DepthBackend::detect());
    assert!(DepthConverter::new(ConverterBackend::Ssse3).backend().is_supported());
    assert!(DepthBackend::supported().any(|backend| backend == DepthBackend::Scalar));
}

#[test]
fn free_functions_use_detected_backend() {
    let converter = detected_converter();
    assert_eq!(converter.backend(), DepthBackend::detect());
    assert!(std::ptr::eq(converter, detected_converter()));

    let src = f32_bytes(&[1.0; 4]);
    let mut dst = vec![0; 16];
    f32_to_packed_be_24(&mut dst, &src, 4, 1).unwrap();
    assert_eq!(bytes_to_u32(&dst), [0x00FEFFFF; 4]);

    let mut depth = vec![0; 16];
    packed_le_24_to_packed_be_24(&mut depth, &dst, 4, 1).unwrap();
    assert_eq!(bytes_to_u32(&depth), [0x00FFFFFE; 4]);

    packed_le_24x8_to_f32(&mut dst, &depth, 4, 1).unwrap();
    assert!(bytes_to_f32(&dst).iter().all(|&value| (value - 1.0).abs() < 1e-6));
}
