use fauxcam_core::prelude::*;
use image::{ExtendedColorType, ImageEncoder, RgbaImage, codecs::jpeg::JpegEncoder};

use crate::{Codec, CodecDescriptor, CodecError, encode_frame};

/// Strip alpha; transparent regions keep their (black) color channels.
fn rgb_bytes(src: &RgbaImage) -> Vec<u8> {
    src.as_raw()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

fn jpeg_descriptor(impl_name: &'static str) -> CodecDescriptor {
    CodecDescriptor {
        input: WireFormat::Rgba8888.fourcc(),
        output: WireFormat::Jpeg.fourcc(),
        name: "jpeg",
        impl_name,
    }
}

/// JPEG encoder using the `image` crate.
pub struct ImageJpegEncoder {
    descriptor: CodecDescriptor,
    pool: BufferPool,
    quality: u8,
}

impl ImageJpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self::with_pool(quality, BufferPool::with_limits(0, 0, 2))
    }

    pub fn with_pool(quality: u8, pool: BufferPool) -> Self {
        Self {
            descriptor: jpeg_descriptor("image-jpeg"),
            pool,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Codec for ImageJpegEncoder {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError> {
        let rgb = rgb_bytes(src);
        dst.clear();
        JpegEncoder::new_with_quality(&mut *dst, self.quality).write_image(
            &rgb,
            src.width(),
            src.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(())
    }

    fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError> {
        encode_frame(self, &self.pool, input)
    }
}

/// JPEG encoder using mozjpeg.
#[cfg(feature = "codec-mozjpeg")]
pub struct MozjpegEncoder {
    descriptor: CodecDescriptor,
    pool: BufferPool,
    quality: u8,
}

#[cfg(feature = "codec-mozjpeg")]
impl MozjpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self::with_pool(quality, BufferPool::with_limits(0, 0, 2))
    }

    pub fn with_pool(quality: u8, pool: BufferPool) -> Self {
        Self {
            descriptor: jpeg_descriptor("mozjpeg"),
            pool,
            quality: quality.clamp(1, 100),
        }
    }
}

#[cfg(feature = "codec-mozjpeg")]
impl Codec for MozjpegEncoder {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError> {
        let width = src.width() as usize;
        let height = src.height() as usize;
        let rgb = rgb_bytes(src);

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width, height);
        comp.set_quality(self.quality as f32);
        let mut started = comp
            .start_compress(std::mem::take(dst))
            .map_err(|e| CodecError::Codec(e.to_string()))?;
        for line in rgb.chunks_exact(width * 3) {
            started
                .write_scanlines(line)
                .map_err(|e| CodecError::Codec(e.to_string()))?;
        }
        let mut jpeg = started
            .finish()
            .map_err(|e| CodecError::Codec(e.to_string()))?;
        std::mem::swap(dst, &mut jpeg);
        Ok(())
    }

    fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError> {
        encode_frame(self, &self.pool, input)
    }
}
