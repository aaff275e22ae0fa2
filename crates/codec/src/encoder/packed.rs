use fauxcam_core::prelude::*;
use image::RgbaImage;
use rayon::prelude::*;

use crate::{Codec, CodecDescriptor, CodecError, encode_frame, prepare_output};

/// Pack RGB565 little-endian.
///
/// # Example
/// ```rust
/// use fauxcam_codec::encoder::packed::pack_rgb565;
///
/// assert_eq!(pack_rgb565(255, 0, 0), [0x00, 0xF8]);
/// assert_eq!(pack_rgb565(255, 255, 255), [0xFF, 0xFF]);
/// ```
#[inline(always)]
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> [u8; 2] {
    let value = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
    value.to_le_bytes()
}

/// Convert every pixel of `src` with `write`, `bpp` output bytes per pixel, rows in parallel.
fn encode_packed(
    src: &RgbaImage,
    dst: &mut Vec<u8>,
    bpp: usize,
    write: impl Fn(&[u8], &mut [u8]) + Sync,
) -> Result<(), CodecError> {
    let width = src.width() as usize;
    let height = src.height() as usize;
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidGeometry("empty source image".into()));
    }
    prepare_output(dst, width * height * bpp)?;
    dst.par_chunks_mut(width * bpp)
        .zip(src.as_raw().par_chunks(width * 4))
        .for_each(|(dst_line, src_line)| {
            for (out, px) in dst_line.chunks_exact_mut(bpp).zip(src_line.chunks_exact(4)) {
                write(px, out);
            }
        });
    Ok(())
}

macro_rules! packed_encoder {
    ($(#[$doc:meta])* $name:ident, $format:expr, $impl_name:literal, $bpp:literal, $write:expr) => {
        $(#[$doc])*
        pub struct $name {
            descriptor: CodecDescriptor,
            pool: BufferPool,
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            pub fn new() -> Self {
                Self::with_pool(BufferPool::with_limits(0, 0, 2))
            }

            pub fn with_pool(pool: BufferPool) -> Self {
                Self {
                    descriptor: CodecDescriptor {
                        input: WireFormat::Rgba8888.fourcc(),
                        output: $format.fourcc(),
                        name: "packed-rgb",
                        impl_name: $impl_name,
                    },
                    pool,
                }
            }
        }

        impl Codec for $name {
            fn descriptor(&self) -> &CodecDescriptor {
                &self.descriptor
            }

            fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError> {
                encode_packed(src, dst, $bpp, $write)
            }

            fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError> {
                encode_frame(self, &self.pool, input)
            }
        }
    };
}

packed_encoder!(
    /// RGBA → RGBA8888 (straight copy).
    RgbaEncoder,
    WireFormat::Rgba8888,
    "rgba-cpu",
    4,
    |px: &[u8], out: &mut [u8]| out.copy_from_slice(px)
);

packed_encoder!(
    /// RGBA → RGB565, little-endian.
    Rgb565Encoder,
    WireFormat::Rgb565,
    "rgb565-cpu",
    2,
    |px: &[u8], out: &mut [u8]| out.copy_from_slice(&pack_rgb565(px[0], px[1], px[2]))
);

packed_encoder!(
    /// RGBA → RGB888, alpha dropped.
    Rgb888Encoder,
    WireFormat::Rgb888,
    "rgb888-cpu",
    3,
    |px: &[u8], out: &mut [u8]| out.copy_from_slice(&px[..3])
);
