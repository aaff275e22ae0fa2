use fauxcam_core::prelude::*;
use image::RgbaImage;
use rayon::prelude::*;

use crate::{Codec, CodecDescriptor, CodecError, encode_frame, prepare_output};

pub use fauxcam_core::format::{I420, NV21};

/// Value of a chroma sample that carries no color.
pub const NEUTRAL_CHROMA: u8 = 128;

/// BT.601 limited-range conversion used by every YUV output.
///
/// # Example
/// ```rust
/// use fauxcam_codec::encoder::yuv::rgb_to_yuv;
///
/// assert_eq!(rgb_to_yuv(255, 0, 0), (82, 90, 240));
/// assert_eq!(rgb_to_yuv(0, 0, 0), (16, 128, 128));
/// ```
#[inline(always)]
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(16, 235) as u8,
        u.clamp(16, 240) as u8,
        v.clamp(16, 240) as u8,
    )
}

#[inline(always)]
fn luma(px: &[u8]) -> u8 {
    rgb_to_yuv(px[0], px[1], px[2]).0
}

fn write_luma(src: &RgbaImage, dst: &mut [u8]) {
    let width = src.width() as usize;
    let raw = src.as_raw();
    dst.par_chunks_mut(width)
        .zip(raw.par_chunks(width * 4))
        .for_each(|(dst_line, src_line)| {
            for (out, px) in dst_line.iter_mut().zip(src_line.chunks_exact(4)) {
                *out = luma(px);
            }
        });
}

/// Chroma pair sampled at the top-left pixel of block (`cx`, `cy`).
#[inline(always)]
fn block_chroma(raw: &[u8], width: usize, cx: usize, cy: usize) -> (u8, u8) {
    let idx = (cy * 2 * width + cx * 2) * 4;
    let (_, u, v) = rgb_to_yuv(raw[idx], raw[idx + 1], raw[idx + 2]);
    (u, v)
}

fn check_source(src: &RgbaImage) -> Result<Resolution, CodecError> {
    Resolution::new(src.width(), src.height())
        .ok_or_else(|| CodecError::InvalidGeometry("empty source image".into()))
}

/// RGBA → NV21: full-resolution Y followed by interleaved V/U at quarter resolution.
pub struct Nv21Encoder {
    descriptor: CodecDescriptor,
    pool: BufferPool,
}

impl Default for Nv21Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Nv21Encoder {
    pub fn new() -> Self {
        Self::with_pool(BufferPool::with_limits(0, 0, 2))
    }

    pub fn with_pool(pool: BufferPool) -> Self {
        Self {
            descriptor: CodecDescriptor {
                input: WireFormat::Rgba8888.fourcc(),
                output: NV21,
                name: "yuv420",
                impl_name: "nv21-cpu",
            },
            pool,
        }
    }
}

impl Codec for Nv21Encoder {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError> {
        let res = check_source(src)?;
        let pixels = res.pixels();
        let len = WireFormat::Nv21.frame_len(res).unwrap_or(0);
        prepare_output(dst, len)?;
        let (luma_out, chroma_out) = dst.split_at_mut(pixels);
        write_luma(src, luma_out);

        chroma_out.fill(NEUTRAL_CHROMA);
        let (cw, ch) = chroma_dims(res);
        if cw == 0 || ch == 0 {
            return Ok(());
        }
        let width = res.w();
        let raw = src.as_raw();
        chroma_out[..cw * ch * 2]
            .par_chunks_mut(cw * 2)
            .enumerate()
            .for_each(|(cy, line)| {
                for (cx, pair) in line.chunks_exact_mut(2).enumerate() {
                    let (u, v) = block_chroma(raw, width, cx, cy);
                    pair[0] = v;
                    pair[1] = u;
                }
            });
        Ok(())
    }

    fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError> {
        encode_frame(self, &self.pool, input)
    }
}

/// RGBA → I420: Y, then U, then V, each chroma plane tightly packed.
pub struct I420Encoder {
    descriptor: CodecDescriptor,
    pool: BufferPool,
}

impl Default for I420Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl I420Encoder {
    pub fn new() -> Self {
        Self::with_pool(BufferPool::with_limits(0, 0, 2))
    }

    pub fn with_pool(pool: BufferPool) -> Self {
        Self {
            descriptor: CodecDescriptor {
                input: WireFormat::Rgba8888.fourcc(),
                output: I420,
                name: "yuv420",
                impl_name: "i420-cpu",
            },
            pool,
        }
    }
}

impl Codec for I420Encoder {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError> {
        let res = check_source(src)?;
        let pixels = res.pixels();
        let len = WireFormat::I420.frame_len(res).unwrap_or(0);
        prepare_output(dst, len)?;
        let (luma_out, chroma_out) = dst.split_at_mut(pixels);
        write_luma(src, luma_out);

        chroma_out.fill(NEUTRAL_CHROMA);
        let (cw, ch) = chroma_dims(res);
        if cw == 0 || ch == 0 {
            return Ok(());
        }
        let width = res.w();
        let raw = src.as_raw();
        let (u_out, v_out) = chroma_out.split_at_mut(pixels / 4);
        u_out[..cw * ch]
            .par_chunks_mut(cw)
            .zip(v_out[..cw * ch].par_chunks_mut(cw))
            .enumerate()
            .for_each(|(cy, (u_line, v_line))| {
                for cx in 0..cw {
                    let (u, v) = block_chroma(raw, width, cx, cy);
                    u_line[cx] = u;
                    v_line[cx] = v;
                }
            });
        Ok(())
    }

    fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError> {
        encode_frame(self, &self.pool, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    #[test]
    fn descriptors_use_canonical_tags() {
        assert_eq!(Nv21Encoder::new().descriptor().output, WireFormat::Nv21.fourcc());
        assert_eq!(I420Encoder::new().descriptor().output, WireFormat::I420.fourcc());
    }

    #[test]
    fn red_nv21_matches_reference_values() {
        let src = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let mut out = Vec::new();
        Nv21Encoder::new().encode_into(&src, &mut out).unwrap();
        assert_eq!(out.len(), 24);
        assert!(out[..16].iter().all(|&y| y == 82));
        assert_eq!(&out[16..], &[240, 90, 240, 90, 240, 90, 240, 90]);
    }

    #[test]
    fn chroma_comes_from_top_left_of_each_block() {
        let mut src = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let mut out = Vec::new();
        I420Encoder::new().encode_into(&src, &mut out).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], 82);
        assert_eq!(&out[4..], &[90, 240]);
    }

    #[test]
    fn odd_sizes_keep_trailing_chroma_neutral() {
        let src = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        let mut out = vec![0u8; 3];
        Nv21Encoder::new().encode_into(&src, &mut out).unwrap();
        // 9 luma + 4 chroma bytes; only one 2x2 block is sampled.
        assert_eq!(out.len(), 13);
        assert_eq!(&out[9..], &[240, 90, NEUTRAL_CHROMA, NEUTRAL_CHROMA]);

        let mut planar = Vec::new();
        I420Encoder::new().encode_into(&src, &mut planar).unwrap();
        assert_eq!(planar.len(), 13);
        assert_eq!(&planar[9..], &[90, NEUTRAL_CHROMA, 240, NEUTRAL_CHROMA]);
    }

    #[test]
    fn output_buffer_capacity_is_reused() {
        let src = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
        let encoder = Nv21Encoder::new();
        let mut out = Vec::new();
        encoder.encode_into(&src, &mut out).unwrap();
        let ptr = out.as_ptr();
        encoder.encode_into(&src, &mut out).unwrap();
        assert_eq!(out.as_ptr(), ptr);
    }

    proptest! {
        #[test]
        fn yuv_stays_in_limited_range(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let (y, u, v) = rgb_to_yuv(r, g, b);
            prop_assert!((16..=235).contains(&y));
            prop_assert!((16..=240).contains(&u));
            prop_assert!((16..=240).contains(&v));
        }

        #[test]
        fn encoded_sizes_follow_the_format(w in 1u32..24, h in 1u32..24) {
            let src = RgbaImage::new(w, h);
            let pixels = (w * h) as usize;
            let mut out = Vec::new();
            Nv21Encoder::new().encode_into(&src, &mut out).unwrap();
            prop_assert_eq!(out.len(), pixels + pixels / 2);
            I420Encoder::new().encode_into(&src, &mut out).unwrap();
            prop_assert_eq!(out.len(), pixels + 2 * (pixels / 4));
        }
    }
}
