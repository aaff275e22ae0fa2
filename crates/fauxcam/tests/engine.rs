use std::io::Cursor;

use fauxcam::prelude::*;
use image::{ImageFormat, Rgba, RgbaImage};
use smallvec::{SmallVec, smallvec};

const SENTINEL: u8 = 0xEE;
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn nv21() -> FourCc {
    FourCc::new(*b"NV21")
}

fn rgba() -> FourCc {
    FourCc::new(*b"RGBA")
}

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 255 / w) as u8, (y * 255 / h) as u8, 64, 255])
    })
}

fn engine_with(image: RgbaImage) -> FrameEngine {
    let engine = FrameEngine::default();
    engine.set_source_image(image);
    engine
}

/// Request a frame into a single tightly packed plane of `len` bytes.
fn request_single(
    engine: &FrameEngine,
    w: u32,
    h: u32,
    code: FourCc,
    len: usize,
    stride: usize,
    pixel_stride: usize,
) -> (WriteResult, Vec<u8>) {
    let mut buf = vec![SENTINEL; len];
    let result = {
        let mut planes = [PlaneMut::new(&mut buf, stride, pixel_stride)];
        engine.request_frame(w, h, code, &mut planes)
    };
    (result, buf)
}

#[test_log::test]
fn red_source_fills_nv21_with_bt601_values() {
    let engine = engine_with(RgbaImage::from_pixel(100, 100, RED));
    let (result, buf) = request_single(&engine, 50, 50, nv21(), 50 * 50 * 3 / 2, 50, 1);

    let report = result.report().copied().expect("written");
    assert_eq!(report.format, WireFormat::Nv21);
    assert_eq!(report.stage, FallbackStage::Primary(WireFormat::Nv21));
    assert_eq!(report.bytes_written, 3750);
    assert!(!report.degraded);
    assert!(!report.placeholder);
    assert!(buf[..2500].iter().all(|&y| y == 82));
    for pair in buf[2500..].chunks_exact(2) {
        assert_eq!(pair, [240, 90]);
    }
}

#[test_log::test]
fn identical_requests_hit_the_cache() {
    let engine = engine_with(gradient(64, 48));
    let len = 32 * 24 * 3 / 2;
    let (first, a) = request_single(&engine, 32, 24, nv21(), len, 32, 1);
    let (second, b) = request_single(&engine, 32, 24, nv21(), len, 32, 1);

    assert!(!first.report().unwrap().cache_hit);
    assert!(second.report().unwrap().cache_hit);
    assert_eq!(a, b);

    let stats = engine.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.frames_written, 2);
    assert_eq!(stats.compositor_allocations, 1);
}

#[test_log::test]
fn cache_is_keyed_by_format_and_size() {
    let engine = engine_with(gradient(64, 48));
    request_single(&engine, 16, 16, nv21(), 384, 16, 1);
    let (other_size, _) = request_single(&engine, 8, 8, nv21(), 96, 8, 1);
    assert!(!other_size.report().unwrap().cache_hit);
    let (other_format, _) =
        request_single(&engine, 8, 8, FourCc::new(*b"YU12"), 96, 8, 1);
    assert!(!other_format.report().unwrap().cache_hit);
    assert_eq!(other_format.report().unwrap().format, WireFormat::I420);
}

#[test_log::test]
fn pan_changes_output_and_invalidates_cache() {
    let engine = engine_with(gradient(64, 64));
    let len = 64 * 64 * 3 / 2;
    let (_, before) = request_single(&engine, 64, 64, nv21(), len, 64, 1);
    engine.adjust_pan(5, 0);
    let (result, after) = request_single(&engine, 64, 64, nv21(), len, 64, 1);

    assert!(!result.report().unwrap().cache_hit);
    assert_ne!(before, after);
    assert_eq!(engine.current_transform_state().pan(), (5, 0));

    engine.reset_adjustments();
    let (_, reset) = request_single(&engine, 64, 64, nv21(), len, 64, 1);
    assert_eq!(before, reset);
}

#[test_log::test]
fn three_plane_write_leaves_padding_alone() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let mut y = vec![SENTINEL; 32];
    let mut u = vec![SENTINEL; 8];
    let mut v = vec![SENTINEL; 8];
    let result = {
        let mut planes = [
            PlaneMut::new(&mut y, 8, 1),
            PlaneMut::new(&mut u, 4, 2),
            PlaneMut::new(&mut v, 4, 2),
        ];
        engine.request_frame(4, 4, nv21(), &mut planes)
    };

    let report = result.report().copied().unwrap();
    assert_eq!(report.bytes_written, 24);
    for row in y.chunks_exact(8) {
        assert_eq!(&row[..4], &[82; 4]);
        assert_eq!(&row[4..], &[SENTINEL; 4]);
    }
    assert_eq!(u, [90, SENTINEL, 90, SENTINEL, 90, SENTINEL, 90, SENTINEL]);
    assert_eq!(v, [240, SENTINEL, 240, SENTINEL, 240, SENTINEL, 240, SENTINEL]);
}

#[test_log::test]
fn unknown_tag_on_rgba_sized_buffer_uses_heuristic() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let (result, buf) = request_single(&engine, 4, 4, FourCc::new(*b"ABCD"), 64, 16, 4);

    let report = result.report().copied().unwrap();
    assert_eq!(
        report.stage,
        FallbackStage::DirectBufferHeuristic(WireFormat::Rgba8888)
    );
    assert_eq!(report.bytes_written, 4 * 4 * 4);
    assert!(buf.chunks_exact(4).all(|px| px == RED.0));
    assert_eq!(engine.stats().fallbacks, 1);
}

#[test_log::test]
fn unknown_tag_on_three_planes_writes_generic_yuv() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let (mut y, mut u, mut v) = (vec![0u8; 16], vec![0u8; 4], vec![0u8; 4]);
    let result = {
        let mut planes = [
            PlaneMut::new(&mut y, 4, 1),
            PlaneMut::new(&mut u, 2, 1),
            PlaneMut::new(&mut v, 2, 1),
        ];
        engine.request_frame(4, 4, FourCc::new(*b"????"), &mut planes)
    };
    let report = result.report().copied().unwrap();
    assert_eq!(report.stage, FallbackStage::YuvGeneric);
    assert_eq!(report.format, WireFormat::I420);
    assert_eq!(report.bytes_written, 24);
    assert_eq!(u, [90; 4]);
    assert_eq!(v, [240; 4]);
}

#[test_log::test]
fn two_planes_cannot_carry_packed_formats() {
    // No stage writes a packed format across two planes.
    let engine = engine_with(RgbaImage::from_pixel(4, 4, RED));
    let (mut a, mut b) = (vec![0u8; 32], vec![0u8; 32]);
    let result = {
        let mut planes = [PlaneMut::new(&mut a, 8, 2), PlaneMut::new(&mut b, 8, 2)];
        engine.request_frame(4, 4, FourCc::new(*b"RGBP"), &mut planes)
    };
    assert_eq!(result, WriteResult::Failed);
    assert_eq!(engine.stats().frames_failed, 1);
}

#[test_log::test]
fn fit_letterboxes_wide_source() {
    let engine = engine_with(RgbaImage::from_pixel(200, 100, RED));
    engine.set_scale_mode(ScaleMode::Fit);
    let (result, buf) = request_single(&engine, 100, 100, rgba(), 100 * 100 * 4, 400, 4);
    assert!(result.is_written());

    for (y, row) in buf.chunks_exact(400).enumerate() {
        let expected = if (25..75).contains(&y) { RED.0 } else { [0; 4] };
        for x in [0, 50, 99] {
            assert_eq!(&row[x * 4..x * 4 + 4], &expected, "pixel ({x}, {y})");
        }
    }
}

#[test_log::test]
fn zero_sized_request_is_a_noop() {
    let engine = engine_with(RgbaImage::from_pixel(4, 4, RED));
    let (result, buf) = request_single(&engine, 0, 10, nv21(), 32, 4, 1);
    assert_eq!(result, WriteResult::NoOp);
    assert!(buf.iter().all(|&b| b == SENTINEL));
    assert_eq!(engine.stats().frames_written, 0);
}

#[test_log::test]
fn no_source_writes_placeholder_without_caching() {
    let engine = FrameEngine::default();
    assert!(!engine.is_active());
    let len = 32 * 24 * 3 / 2;
    let (first, _) = request_single(&engine, 32, 24, nv21(), len, 32, 1);
    let (second, _) = request_single(&engine, 32, 24, nv21(), len, 32, 1);

    for result in [first, second] {
        let report = result.report().copied().unwrap();
        assert!(report.placeholder);
        assert!(!report.cache_hit);
    }
    assert_eq!(engine.stats().placeholders, 2);
}

#[test_log::test]
fn randomize_bypasses_cache() {
    let engine = engine_with(RgbaImage::from_pixel(16, 16, Rgba([128, 128, 128, 255])));
    engine.set_randomize_each_frame(true);
    assert!(engine.randomize_each_frame());
    for _ in 0..2 {
        let (result, _) = request_single(&engine, 16, 16, nv21(), 384, 16, 1);
        assert!(!result.report().unwrap().cache_hit);
    }
    assert_eq!(engine.stats().cache_hits, 0);
}

#[test_log::test]
fn rotating_sources_alternate() {
    let engine = FrameEngine::default();
    engine.set_source_images(vec![
        RgbaImage::from_pixel(8, 8, RED),
        RgbaImage::from_pixel(8, 8, BLUE),
    ]);
    let lumas: Vec<u8> = (0..3)
        .map(|_| {
            let (result, buf) = request_single(&engine, 8, 8, nv21(), 96, 8, 1);
            assert!(!result.report().unwrap().cache_hit);
            buf[0]
        })
        .collect();
    assert_eq!(lumas, [82, 41, 82]);
}

#[test_log::test]
fn small_plane_is_truncated_and_reported() {
    let engine = engine_with(RgbaImage::from_pixel(4, 4, RED));
    let (result, buf) = request_single(&engine, 4, 4, nv21(), 20, 4, 1);
    let report = result.report().copied().unwrap();
    assert!(report.degraded);
    assert_eq!(report.bytes_written, 20);
    assert!(buf[..16].iter().all(|&y| y == 82));
}

#[test_log::test]
fn jpeg_request_writes_compressed_stream() {
    let engine = engine_with(gradient(32, 32));
    let (result, buf) =
        request_single(&engine, 32, 32, FourCc::new(*b"JPEG"), 64 * 1024, 0, 1);
    let report = result.report().copied().unwrap();
    assert_eq!(report.format, WireFormat::Jpeg);
    assert_eq!(&buf[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&buf[..report.bytes_written]).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 32));
}

struct PreviewBuffer {
    y: Vec<u8>,
    vu: Vec<u8>,
    width: usize,
}

impl PlaneTarget for PreviewBuffer {
    fn planes_mut(&mut self) -> SmallVec<[PlaneMut<'_>; 3]> {
        smallvec![
            PlaneMut::new(&mut self.y, self.width, 1),
            PlaneMut::new(&mut self.vu, self.width, 2),
        ]
    }
}

#[test_log::test]
fn plane_target_with_interleaved_chroma() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let mut target = PreviewBuffer {
        y: vec![0; 16],
        vu: vec![0; 8],
        width: 4,
    };
    let result = engine.request_frame_into(4, 4, nv21(), &mut target);
    assert!(result.is_written());
    assert_eq!(target.y, [82; 16]);
    assert_eq!(target.vu, [240, 90, 240, 90, 240, 90, 240, 90]);
}

fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[test_log::test]
fn still_capture_passes_raw_bytes_until_adjusted() {
    let engine = FrameEngine::default();
    let encoded = png_bytes(&gradient(16, 16));
    engine.set_source_encoded(&encoded).unwrap();
    assert!(engine.is_active());

    assert_eq!(engine.encode_still_capture(16, 16).unwrap(), encoded);

    engine.adjust_zoom(2.0);
    let jpeg = engine.encode_still_capture(16, 16).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    engine.reset_adjustments();
    engine.set_orientation(FrameTransform {
        rotation: Rotation90::Deg90,
        mirror: false,
    });
    let rotated = engine.encode_still_capture(16, 16).unwrap();
    assert_eq!(&rotated[..2], &[0xFF, 0xD8]);
    assert_eq!(engine.encode_still_capture(0, 16), None);
}

#[test_log::test]
fn undecodable_source_is_rejected() {
    let engine = FrameEngine::default();
    let err = engine.set_source_encoded(b"not an image").unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
    assert!(!engine.is_active());
}

#[test_log::test]
fn export_produces_owned_frames() {
    let engine = engine_with(RgbaImage::from_pixel(16, 16, RED));
    let nv = engine.export_frame(8, 8, WireFormat::Nv21).unwrap();
    assert_eq!(nv.meta().format.code, nv21());
    let data = nv.planes()[0].data();
    assert_eq!(data.len(), 96);
    assert_eq!(data[0], 82);

    let jpeg = engine.export_frame(8, 8, WireFormat::Jpeg).unwrap();
    assert_eq!(&jpeg.planes()[0].data()[..2], &[0xFF, 0xD8]);
    assert!(engine.export_frame(0, 8, WireFormat::Jpeg).is_none());
}

#[test_log::test]
fn transform_state_tracks_adjustments() {
    let engine = FrameEngine::default();
    engine.set_scale_mode(ScaleMode::Fit);
    engine.adjust_zoom(2.0);
    engine.adjust_zoom(100.0);
    engine.adjust_pan(-3, 7);
    let state = engine.current_transform_state();
    assert_eq!(state.zoom(), 10.0);
    assert_eq!(state.pan(), (-3, 7));

    engine.reset_adjustments();
    let state = engine.current_transform_state();
    assert_eq!(state.zoom(), 1.0);
    assert_eq!(state.pan(), (0, 0));
    assert_eq!(state.scale_mode(), ScaleMode::Fit);
}

#[test_log::test]
fn engine_is_shareable_across_threads() {
    let engine = std::sync::Arc::new(engine_with(gradient(32, 32)));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                engine.adjust_pan(i, 0);
                let (result, _) = request_single(&engine, 16, 16, nv21(), 384, 16, 1);
                result.is_written()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(engine.stats().frames_written, 4);
}

#[test_log::test]
fn pooled_multi_plane_frame_is_a_target() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let res = Resolution::new(4, 4).unwrap();
    let pool = BufferPool::with_limits(3, 16, 3);
    let layout = |len, stride| PlaneLayout {
        offset: 0,
        len,
        stride,
        pixel_stride: 1,
    };
    let mut frame = FrameLease::multi_plane(
        FrameMeta::new(
            MediaFormat::new(FourCc::new(*b"YU12"), res, ColorSpace::Bt601),
            0,
        ),
        smallvec![pool.lease(), pool.lease(), pool.lease()],
        smallvec![layout(16, 4), layout(4, 2), layout(4, 2)],
    );

    let result = engine.request_frame_into(4, 4, FourCc::new(*b"YU12"), &mut frame);
    assert_eq!(result.report().unwrap().bytes_written, 24);
    let planes = frame.planes();
    assert_eq!(planes[0].data(), &[82; 16]);
    assert_eq!(planes[1].data(), &[90; 4]);
    assert_eq!(planes[2].data(), &[240; 4]);
}

#[test_log::test]
fn unknown_tag_on_odd_sized_buffer_writes_generic_rgba() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let (result, buf) = request_single(&engine, 4, 4, FourCc::new(*b"ABCD"), 80, 16, 4);

    let report = result.report().copied().unwrap();
    assert_eq!(report.stage, FallbackStage::RgbaGeneric);
    assert_eq!(report.format, WireFormat::Rgba8888);
    assert_eq!(report.bytes_written, 4 * 4 * 4);
    assert!(!report.degraded);
    assert!(buf[..64].chunks_exact(4).all(|px| px == RED.0));
    assert_eq!(&buf[64..], &[SENTINEL; 16]);
    assert_eq!(engine.stats().fallbacks, 1);
}

#[test_log::test]
fn unknown_tag_on_two_byte_buffer_writes_rgb565() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    let (result, buf) = request_single(&engine, 4, 4, FourCc::new(*b"ABCD"), 32, 8, 2);

    let report = result.report().copied().unwrap();
    assert_eq!(
        report.stage,
        FallbackStage::DirectBufferHeuristic(WireFormat::Rgb565)
    );
    assert_eq!(report.bytes_written, 32);
    assert!(buf.chunks_exact(2).all(|px| px == [0x00, 0xF8]));
}

#[test_log::test]
fn codec_stats_count_frame_request_encodes() {
    let engine = engine_with(RgbaImage::from_pixel(8, 8, RED));
    request_single(&engine, 4, 4, rgba(), 64, 16, 4);
    request_single(&engine, 4, 4, nv21(), 24, 4, 1);
    assert_eq!(engine.stats().codec.processed(), 2);
}
