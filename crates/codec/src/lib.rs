#![doc = include_str!("../README.md")]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use fauxcam_core::prelude::*;
use image::RgbaImage;

/// Descriptor for a codec implementation.
///
/// # Example
/// ```rust
/// use fauxcam_codec::CodecDescriptor;
/// use fauxcam_core::prelude::FourCc;
///
/// let desc = CodecDescriptor {
///     input: FourCc::new(*b"RGBA"),
///     output: FourCc::new(*b"NV21"),
///     name: "yuv420",
///     impl_name: "nv21-cpu",
/// };
/// assert_eq!(desc.name, "yuv420");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CodecDescriptor {
    /// Expected input FourCc.
    pub input: FourCc,
    /// Output FourCc produced.
    pub output: FourCc,
    /// Algorithm family (e.g. "yuv420", "jpeg").
    pub name: &'static str,
    /// Implementation/backend identifier (e.g. "nv21-cpu", "mozjpeg").
    pub impl_name: &'static str,
}

/// Unified encoder trait.
///
/// Every codec consumes RGBA8 and produces one wire format. `encode_into` is the
/// allocation-aware entry point used by the frame engine; `process` wraps it for owned,
/// pooled frames.
///
/// # Example
/// ```rust
/// use fauxcam_codec::{Codec, CodecDescriptor, CodecError};
/// use fauxcam_core::prelude::{FourCc, FrameLease};
/// use image::RgbaImage;
///
/// struct Raw {
///     desc: CodecDescriptor,
/// }
///
/// impl Codec for Raw {
///     fn descriptor(&self) -> &CodecDescriptor { &self.desc }
///     fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError> {
///         dst.clear();
///         dst.extend_from_slice(src.as_raw());
///         Ok(())
///     }
///     fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError> {
///         Ok(input)
///     }
/// }
/// ```
pub trait Codec: Send + Sync + 'static {
    /// Describes what this codec expects and produces.
    fn descriptor(&self) -> &CodecDescriptor;

    /// Encode `src` into `dst`, replacing its contents and reusing its capacity.
    fn encode_into(&self, src: &RgbaImage, dst: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Encode an RGBA frame into a new owned frame.
    fn process(&self, input: FrameLease) -> Result<FrameLease, CodecError>;
}

/// Errors emitted by codecs.
///
/// # Example
/// ```rust
/// use fauxcam_codec::CodecError;
/// use fauxcam_core::prelude::FourCc;
///
/// let err = CodecError::FormatMismatch {
///     expected: FourCc::new(*b"RGBA"),
///     actual: FourCc::new(*b"RG24"),
/// };
/// assert!(matches!(err, CodecError::FormatMismatch { .. }));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Input did not match the expected FourCc.
    #[error("format mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        /// Expected input FourCc.
        expected: FourCc,
        /// Actual FourCc encountered.
        actual: FourCc,
    },
    /// The allocator refused an output buffer.
    #[error("failed to allocate {bytes} bytes")]
    Alloc { bytes: usize },
    /// Input frame geometry does not match its plane.
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),
    /// Codec-specific failure detail.
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<image::ImageError> for CodecError {
    fn from(err: image::ImageError) -> Self {
        CodecError::Codec(err.to_string())
    }
}

/// Errors surfaced by the registry.
///
/// # Example
/// ```rust
/// use fauxcam_codec::RegistryError;
/// use fauxcam_core::prelude::FourCc;
///
/// let err = RegistryError::NotFound(FourCc::new(*b"NV12"));
/// assert!(matches!(err, RegistryError::NotFound(_)));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No codec registered for the requested FourCc.
    #[error("codec not registered for {0}")]
    NotFound(FourCc),
    /// Codec failed while processing.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Basic stats for codec processing.
///
/// # Example
/// ```rust
/// use fauxcam_codec::CodecStats;
///
/// let stats = CodecStats::default();
/// stats.inc_processed();
/// assert_eq!(stats.processed(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodecStats {
    processed: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    last_nanos: Arc<AtomicU64>,
    window: Arc<Mutex<WindowState>>,
}

#[derive(Debug, Clone)]
struct WindowState {
    samples: VecDeque<u64>,
    max: usize,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            samples: VecDeque::new(),
            max: DEFAULT_WINDOW,
        }
    }
}

const DEFAULT_WINDOW: usize = 120;

impl CodecStats {
    /// Increment processed count.
    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment error count.
    pub fn inc_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of processed frames.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Snapshot of errors.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Samples within the current window.
    pub fn samples(&self) -> u64 {
        self.window
            .lock()
            .map(|w| w.samples.len() as u64)
            .unwrap_or(0)
    }

    /// Record a successful processing duration.
    pub fn record_duration(&self, dur: Duration) {
        let nanos = dur.as_nanos().min(u64::MAX as u128) as u64;
        self.last_nanos.store(nanos, Ordering::Relaxed);
        if let Ok(mut win) = self.window.lock() {
            win.samples.push_back(nanos);
            while win.samples.len() > win.max {
                win.samples.pop_front();
            }
        }
    }

    /// Average processing time in milliseconds, if any samples were recorded.
    pub fn avg_millis(&self) -> Option<f64> {
        self.window.lock().ok().and_then(|w| {
            let count = w.samples.len();
            if count == 0 {
                return None;
            }
            let total: u128 = w.samples.iter().map(|n| *n as u128).sum();
            Some(total as f64 / 1_000_000.0 / count as f64)
        })
    }

    /// Last processing duration in milliseconds, if any samples were recorded.
    pub fn last_millis(&self) -> Option<f64> {
        let last = self.last_nanos.load(Ordering::Relaxed);
        if last == 0 {
            None
        } else {
            Some(last as f64 / 1_000_000.0)
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    codecs: HashMap<FourCc, Vec<Arc<dyn Codec>>>,
}

/// Thread-safe handle for codec registration/lookups.
///
/// Codecs are keyed by the FourCc they produce; the first registration for a FourCc
/// wins plain lookups.
///
/// # Example
/// ```rust
/// use fauxcam_codec::CodecRegistry;
/// use fauxcam_core::prelude::FourCc;
///
/// let registry = CodecRegistry::with_default_encoders(90);
/// let handle = registry.handle();
/// let nv21 = handle.lookup(FourCc::new(*b"NV21"))?;
/// assert_eq!(nv21.descriptor().impl_name, "nv21-cpu");
/// # Ok::<(), fauxcam_codec::RegistryError>(())
/// ```
#[derive(Clone)]
pub struct CodecRegistryHandle {
    inner: Arc<RwLock<RegistryInner>>,
    stats: CodecStats,
}

impl CodecRegistryHandle {
    /// Lookup a codec by output FourCc.
    pub fn lookup(&self, fourcc: FourCc) -> Result<Arc<dyn Codec>, RegistryError> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .codecs
            .get(&fourcc)
            .and_then(|v| v.first().cloned())
            .ok_or(RegistryError::NotFound(fourcc))
    }

    /// Lookup a codec by output FourCc and implementation name.
    pub fn lookup_named(
        &self,
        fourcc: FourCc,
        impl_name: &str,
    ) -> Result<Arc<dyn Codec>, RegistryError> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .codecs
            .get(&fourcc)
            .and_then(|v| {
                v.iter()
                    .find(|c| c.descriptor().impl_name.eq_ignore_ascii_case(impl_name))
                    .cloned()
            })
            .ok_or(RegistryError::NotFound(fourcc))
    }

    /// Encode a frame with the codec registered for `fourcc`.
    pub fn process(&self, fourcc: FourCc, frame: FrameLease) -> Result<FrameLease, RegistryError> {
        let start = Instant::now();
        let codec = self.lookup(fourcc)?;
        self.run_codec(start, codec, frame)
    }

    /// Encode with a specific implementation name.
    pub fn process_named(
        &self,
        fourcc: FourCc,
        impl_name: &str,
        frame: FrameLease,
    ) -> Result<FrameLease, RegistryError> {
        let start = Instant::now();
        let codec = self.lookup_named(fourcc, impl_name)?;
        self.run_codec(start, codec, frame)
    }

    /// Encode an image straight into `dst` with the codec registered for `fourcc`.
    pub fn encode_into(
        &self,
        fourcc: FourCc,
        src: &RgbaImage,
        dst: &mut Vec<u8>,
    ) -> Result<(), RegistryError> {
        let start = Instant::now();
        let codec = self.lookup(fourcc)?;
        match codec.encode_into(src, dst) {
            Ok(()) => {
                self.stats.inc_processed();
                self.stats.record_duration(start.elapsed());
                Ok(())
            }
            Err(err) => {
                self.stats.inc_errors();
                Err(RegistryError::Codec(err))
            }
        }
    }

    /// Stats snapshot.
    pub fn stats(&self) -> CodecStats {
        self.stats.clone()
    }

    /// Snapshot of all registered codecs grouped by FourCc (descriptor-only).
    pub fn list_registered(&self) -> Vec<(FourCc, Vec<CodecDescriptor>)> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .codecs
            .iter()
            .map(|(fourcc, list)| {
                let descs = list.iter().map(|c| c.descriptor().clone()).collect();
                (*fourcc, descs)
            })
            .collect()
    }

    fn run_codec(
        &self,
        start: Instant,
        codec: Arc<dyn Codec>,
        frame: FrameLease,
    ) -> Result<FrameLease, RegistryError> {
        let expected = codec.descriptor().input;
        let actual = frame.meta().format.code;
        if actual != expected {
            self.stats.inc_errors();
            return Err(RegistryError::Codec(CodecError::FormatMismatch {
                expected,
                actual,
            }));
        }

        match codec.process(frame) {
            Ok(out) => {
                self.stats.inc_processed();
                self.stats.record_duration(start.elapsed());
                Ok(out)
            }
            Err(err) => {
                self.stats.inc_errors();
                Err(RegistryError::Codec(err))
            }
        }
    }
}

/// Registry used to install codecs.
///
/// # Example
/// ```rust
/// use fauxcam_codec::CodecRegistry;
///
/// let registry = CodecRegistry::new();
/// let handle = registry.handle();
/// assert!(handle.list_registered().is_empty());
/// ```
pub struct CodecRegistry {
    handle: CodecRegistryHandle,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let handle = CodecRegistryHandle {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            stats: CodecStats::default(),
        };
        Self { handle }
    }

    /// Obtain a clonable handle.
    pub fn handle(&self) -> CodecRegistryHandle {
        self.handle.clone()
    }

    /// Register a codec implementation under the FourCc it produces.
    pub fn register(&self, fourcc: FourCc, codec: Arc<dyn Codec>) {
        let mut guard = self
            .handle
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.codecs.entry(fourcc).or_default().push(codec);
    }

    /// Registry with one encoder per wire format; JPEG uses `jpeg_quality`.
    pub fn with_default_encoders(jpeg_quality: u8) -> Self {
        let registry = Self::new();
        registry.register_default_encoders(jpeg_quality);
        registry
    }

    /// Register the built-in encoders available under the current feature set.
    pub fn register_default_encoders(&self, jpeg_quality: u8) {
        self.register(encoder::yuv::NV21, Arc::new(encoder::yuv::Nv21Encoder::new()));
        self.register(encoder::yuv::I420, Arc::new(encoder::yuv::I420Encoder::new()));
        self.register(
            WireFormat::Rgba8888.fourcc(),
            Arc::new(encoder::packed::RgbaEncoder::new()),
        );
        self.register(
            WireFormat::Rgb565.fourcc(),
            Arc::new(encoder::packed::Rgb565Encoder::new()),
        );
        self.register(
            WireFormat::Rgb888.fourcc(),
            Arc::new(encoder::packed::Rgb888Encoder::new()),
        );

        // mozjpeg goes first so plain lookups pick it when compiled in.
        #[cfg(feature = "codec-mozjpeg")]
        self.register(
            WireFormat::Jpeg.fourcc(),
            Arc::new(jpeg_encoder::MozjpegEncoder::new(jpeg_quality)),
        );
        self.register(
            WireFormat::Jpeg.fourcc(),
            Arc::new(jpeg_encoder::ImageJpegEncoder::new(jpeg_quality)),
        );
        log::debug!("registered default encoders, jpeg quality {jpeg_quality}");
    }
}

/// Copy an RGBA frame's first plane into an image, honoring its row stride.
pub fn rgba_from_frame(frame: &FrameLease) -> Result<RgbaImage, CodecError> {
    let meta = frame.meta();
    let res = meta.format.resolution;
    let planes = frame.planes();
    let plane = planes
        .first()
        .ok_or_else(|| CodecError::InvalidGeometry("frame has no planes".into()))?;
    let row_bytes = res.w() * 4;
    let stride = plane.stride().max(row_bytes);
    let data = plane.data();
    let required = stride * (res.h() - 1) + row_bytes;
    if data.len() < required {
        return Err(CodecError::InvalidGeometry(format!(
            "plane holds {} bytes, {res} RGBA needs {required}",
            data.len()
        )));
    }
    let mut raw = Vec::new();
    if !try_resize(&mut raw, row_bytes * res.h()) {
        return Err(CodecError::Alloc {
            bytes: row_bytes * res.h(),
        });
    }
    for (y, row) in raw.chunks_exact_mut(row_bytes).enumerate() {
        row.copy_from_slice(&data[y * stride..y * stride + row_bytes]);
    }
    RgbaImage::from_raw(res.width.get(), res.height.get(), raw)
        .ok_or_else(|| CodecError::InvalidGeometry("rgba buffer size".into()))
}

/// Wrap an image in a single-plane RGBA frame leased from `pool`.
pub fn frame_from_rgba(image: RgbaImage, sequence: u64, pool: &BufferPool) -> Option<FrameLease> {
    let res = Resolution::new(image.width(), image.height())?;
    let layout = plane_layout_from_dims(res.width, res.height, 4);
    let mut buf = pool.lease();
    buf.replace_owned(image.into_raw());
    Some(FrameLease::single_plane(
        FrameMeta::new(
            MediaFormat::new(WireFormat::Rgba8888.fourcc(), res, ColorSpace::Srgb),
            sequence,
        ),
        buf,
        layout,
    ))
}

/// Shared `Codec::process` body: decode the RGBA input, encode, lease the output.
pub(crate) fn encode_frame<C: Codec + ?Sized>(
    codec: &C,
    pool: &BufferPool,
    input: FrameLease,
) -> Result<FrameLease, CodecError> {
    let desc = codec.descriptor();
    let meta = input.meta().clone();
    if meta.format.code != desc.input {
        return Err(CodecError::FormatMismatch {
            expected: desc.input,
            actual: meta.format.code,
        });
    }
    let image = rgba_from_frame(&input)?;
    drop(input);

    let mut out = Vec::new();
    codec.encode_into(&image, &mut out)?;
    let res = meta.format.resolution;
    let wire = WireFormat::from_fourcc(desc.output);
    let layout = match wire.and_then(WireFormat::bytes_per_pixel) {
        Some(bpp) => plane_layout_from_dims(res.width, res.height, bpp),
        None if wire.is_some_and(WireFormat::is_yuv) => PlaneLayout {
            offset: 0,
            len: out.len(),
            stride: res.w(),
            pixel_stride: 1,
        },
        None => plane_layout_for_bytes(out.len()),
    };
    let color = wire.map(WireFormat::color).unwrap_or(ColorSpace::Unknown);
    let mut buf = pool.lease();
    buf.replace_owned(out);
    Ok(FrameLease::single_plane(
        FrameMeta::new(MediaFormat::new(desc.output, res, color), meta.sequence),
        buf,
        layout,
    ))
}

/// Reserve exactly `len` bytes in `dst`, mapping allocator refusal to [`CodecError::Alloc`].
pub(crate) fn prepare_output(dst: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    if try_resize(dst, len) {
        Ok(())
    } else {
        Err(CodecError::Alloc { bytes: len })
    }
}

pub mod compositor;
pub mod encoder;
pub mod jpeg_encoder;
pub mod placeholder;

pub mod prelude {
    #[cfg(feature = "codec-mozjpeg")]
    pub use crate::jpeg_encoder::MozjpegEncoder;
    pub use crate::{
        Codec, CodecDescriptor, CodecError, CodecRegistry, CodecRegistryHandle, CodecStats,
        RegistryError,
        compositor::{Compositor, add_noise},
        encoder::packed::{Rgb565Encoder, Rgb888Encoder, RgbaEncoder},
        encoder::yuv::{I420Encoder, Nv21Encoder, rgb_to_yuv},
        frame_from_rgba,
        jpeg_encoder::ImageJpegEncoder,
        placeholder::placeholder,
        rgba_from_frame,
    };
    #[allow(unused_imports)]
    pub use fauxcam_core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_frame(w: u32, h: u32) -> FrameLease {
        let image = RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]));
        let pool = BufferPool::with_limits(1, (w * h * 4) as usize, 2);
        frame_from_rgba(image, 7, &pool).unwrap()
    }

    #[test]
    fn registry_routes_by_output_fourcc() {
        let registry = CodecRegistry::with_default_encoders(90);
        let handle = registry.handle();

        let out = handle
            .process(FourCc::new(*b"NV21"), red_frame(4, 4))
            .expect("process");
        assert_eq!(out.meta().format.code, FourCc::new(*b"NV21"));
        assert_eq!(out.meta().sequence, 7);
        assert_eq!(out.planes()[0].data().len(), 24);
        assert_eq!(handle.stats().processed(), 1);
        assert!(handle.stats().last_millis().is_some());

        let missing = handle.process(FourCc::new(*b"NV12"), red_frame(2, 2));
        assert!(matches!(missing, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn rejects_non_rgba_input() {
        let registry = CodecRegistry::with_default_encoders(90);
        let handle = registry.handle();
        let nv21 = handle
            .process(FourCc::new(*b"NV21"), red_frame(2, 2))
            .unwrap();
        let err = handle.process(FourCc::new(*b"RGBP"), nv21);
        assert!(matches!(
            err,
            Err(RegistryError::Codec(CodecError::FormatMismatch { .. }))
        ));
        assert_eq!(handle.stats().errors(), 1);
    }

    #[test]
    fn named_lookup_finds_image_jpeg() {
        let registry = CodecRegistry::with_default_encoders(80);
        let handle = registry.handle();
        let out = handle
            .process_named(FourCc::new(*b"JPEG"), "image-jpeg", red_frame(8, 8))
            .unwrap();
        let data = out.planes()[0].data();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        let listed = handle.list_registered();
        assert_eq!(listed.len(), 6);
    }

    #[test]
    fn strided_rgba_frame_is_compacted() {
        let res = Resolution::new(2, 2).unwrap();
        let layout = PlaneLayout {
            offset: 0,
            len: 20,
            stride: 10,
            pixel_stride: 4,
        };
        let pool = BufferPool::with_limits(1, 20, 1);
        let mut buf = pool.lease();
        buf.resize(20);
        buf.as_mut_slice()
            .copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 9, 10, 11, 12, 13, 14, 15, 16, 0, 0]);
        let fmt = MediaFormat::new(WireFormat::Rgba8888.fourcc(), res, ColorSpace::Srgb);
        let frame = FrameLease::single_plane(FrameMeta::new(fmt, 0), buf, layout);
        let image = rgba_from_frame(&frame).unwrap();
        assert_eq!(image.as_raw(), &(1..=16).collect::<Vec<u8>>());
    }
}
