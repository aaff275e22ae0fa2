use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use fauxcam_codec::prelude::*;
use image::RgbaImage;

use crate::{
    cache::{CacheKey, EncodedFrameCache},
    config::EngineTunables,
    fallback::{self, FallbackStage},
    metrics::{EngineMetrics, EngineStats},
    request::{EngineError, FrameReport, WriteResult},
    source::SourceImageStore,
};

/// Everything guarded by the processing lock.
struct EngineState {
    transform: TransformState,
    /// Bumped on every change that alters synthesized pixels.
    generation: u64,
    randomize: bool,
    source: SourceImageStore,
    compositor: Compositor,
    cache: EncodedFrameCache,
    sequence: u64,
}

impl EngineState {
    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cache.invalidate();
    }
}

/// Pixels a frame is encoded from.
enum Canvas<'a> {
    /// The compositor's scratch buffer.
    Source(&'a mut RgbaImage),
    Placeholder(RgbaImage),
}

impl Canvas<'_> {
    fn image(&self) -> &RgbaImage {
        match self {
            Canvas::Source(image) => image,
            Canvas::Placeholder(image) => image,
        }
    }

    fn is_placeholder(&self) -> bool {
        matches!(self, Canvas::Placeholder(_))
    }

    fn into_owned(self) -> RgbaImage {
        match self {
            Canvas::Source(image) => image.clone(),
            Canvas::Placeholder(image) => image,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum StageError {
    #[error(transparent)]
    Encode(#[from] RegistryError),
    #[error(transparent)]
    Write(#[from] PlaneError),
}

/// Write already-encoded `bytes` of `format` into the destination planes.
fn write_encoded(
    format: WireFormat,
    res: Resolution,
    bytes: &[u8],
    planes: &mut [PlaneMut<'_>],
) -> Result<WriteReport, PlaneError> {
    match format {
        WireFormat::Nv21 | WireFormat::I420 => {
            let src = YuvSource::new(bytes, res, format)?;
            write_yuv420(&src, planes)
        }
        WireFormat::Jpeg => write_stream(bytes, planes),
        packed => write_packed(bytes, res, packed, planes),
    }
}

/// Synthetic camera frame engine.
///
/// All state (source images, transform, compositor scratch and encoded-frame cache)
/// lives behind one processing lock; every public method takes it, so the engine can be
/// shared across threads by reference or `Arc`. Synthesis runs on the calling thread.
///
/// # Example
/// ```rust
/// use fauxcam::prelude::*;
/// use image::{Rgba, RgbaImage};
///
/// let engine = FrameEngine::new(EngineTunables::default());
/// engine.set_source_image(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])));
/// engine.adjust_zoom(2.0);
///
/// let mut rgba = vec![0u8; 4 * 4 * 4];
/// let mut planes = [PlaneMut::new(&mut rgba, 16, 4)];
/// let result = engine.request_frame(4, 4, FourCc::new(*b"RGBA"), &mut planes);
/// assert_eq!(result.report().unwrap().bytes_written, 64);
/// assert_eq!(&rgba[..4], &[0, 0, 255, 255]);
/// ```
pub struct FrameEngine {
    state: Mutex<EngineState>,
    tunables: EngineTunables,
    registry: CodecRegistryHandle,
    capture_codec: Arc<dyn Codec>,
    export_pool: BufferPool,
    compositor_metrics: Arc<Metrics>,
    metrics: EngineMetrics,
}

impl Default for FrameEngine {
    fn default() -> Self {
        Self::new(EngineTunables::default())
    }
}

impl FrameEngine {
    pub fn new(tunables: EngineTunables) -> Self {
        let tunables = tunables.sanitized();
        let registry = CodecRegistry::with_default_encoders(tunables.export_jpeg_quality);
        #[cfg(feature = "codec-mozjpeg")]
        let capture_codec: Arc<dyn Codec> =
            Arc::new(MozjpegEncoder::new(tunables.capture_jpeg_quality));
        #[cfg(not(feature = "codec-mozjpeg"))]
        let capture_codec: Arc<dyn Codec> =
            Arc::new(ImageJpegEncoder::new(tunables.capture_jpeg_quality));

        let compositor = Compositor::new();
        let compositor_metrics = compositor.metrics();
        Self {
            state: Mutex::new(EngineState {
                transform: TransformState::default(),
                generation: 0,
                randomize: tunables.randomize_each_frame,
                source: SourceImageStore::default(),
                compositor,
                cache: EncodedFrameCache::default(),
                sequence: 0,
            }),
            registry: registry.handle(),
            capture_codec,
            export_pool: BufferPool::with_limits(0, 0, 4),
            compositor_metrics,
            metrics: EngineMetrics::default(),
            tunables,
        }
    }

    pub fn tunables(&self) -> &EngineTunables {
        &self.tunables
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate(&self, f: impl FnOnce(&mut EngineState)) {
        let mut state = self.lock();
        f(&mut state);
        state.invalidate();
    }

    /// Replace the source with a single image. The still bytes are dropped.
    pub fn set_source_image(&self, image: RgbaImage) {
        if image.width() == 0 || image.height() == 0 {
            log::warn!("fauxcam: ignoring empty source image, clearing source");
            self.clear_source();
            return;
        }
        log::debug!("fauxcam: source image {}x{}", image.width(), image.height());
        self.mutate(|state| state.source.set_single(image, None));
    }

    /// Replace the source with a list that advances on every frame request.
    pub fn set_source_images(&self, images: Vec<RgbaImage>) {
        let images: Vec<RgbaImage> = images
            .into_iter()
            .filter(|image| image.width() > 0 && image.height() > 0)
            .collect();
        log::debug!("fauxcam: rotating source of {} image(s)", images.len());
        self.mutate(|state| state.source.set_rotating(images));
    }

    /// Decode an encoded image (JPEG, PNG) and use it as the source; the encoded bytes
    /// become the still-capture bytes.
    pub fn set_source_encoded(&self, bytes: &[u8]) -> Result<(), EngineError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::EmptyImage);
        }
        let still = bytes.to_vec();
        self.mutate(|state| state.source.set_single(image, Some(still)));
        Ok(())
    }

    /// Pre-encoded bytes returned by [`Self::encode_still_capture`] when no adjustment
    /// is active.
    pub fn set_still_bytes(&self, bytes: Vec<u8>) {
        self.lock().source.set_still(bytes);
    }

    pub fn clear_source(&self) {
        self.mutate(|state| state.source.clear());
    }

    /// Rotate/mirror every configured source image.
    pub fn set_orientation(&self, orientation: FrameTransform) {
        self.mutate(|state| state.source.set_orientation(orientation));
    }

    /// Whether a source image is configured.
    pub fn is_active(&self) -> bool {
        self.lock().source.is_active()
    }

    pub fn current_transform_state(&self) -> TransformState {
        self.lock().transform
    }

    pub fn adjust_zoom(&self, multiplier: f32) {
        self.mutate(|state| state.transform.adjust_zoom(multiplier));
    }

    pub fn set_zoom(&self, zoom: f32) {
        self.mutate(|state| state.transform.set_zoom(zoom));
    }

    pub fn adjust_pan(&self, dx: i32, dy: i32) {
        self.mutate(|state| state.transform.adjust_pan(dx, dy));
    }

    /// Zoom back to 1 and pan to 0; the scale mode is kept.
    pub fn reset_adjustments(&self) {
        self.mutate(|state| state.transform.reset());
    }

    pub fn set_scale_mode(&self, mode: ScaleMode) {
        self.mutate(|state| state.transform.set_scale_mode(mode));
    }

    pub fn set_randomize_each_frame(&self, enabled: bool) {
        self.mutate(|state| state.randomize = enabled);
    }

    pub fn randomize_each_frame(&self) -> bool {
        self.lock().randomize
    }

    /// Synthesize a frame and write it into `planes`.
    ///
    /// `format` is the consumer's wire format tag. Unknown tags, or plane layouts the
    /// format cannot use, go through the fallback chain; nothing here panics or returns
    /// an error.
    pub fn request_frame(
        &self,
        width: u32,
        height: u32,
        format: FourCc,
        planes: &mut [PlaneMut<'_>],
    ) -> WriteResult {
        let Some(res) = Resolution::new(width, height) else {
            log::debug!("fauxcam: zero-sized {format} request ({width}x{height})");
            return WriteResult::NoOp;
        };
        let result = match catch_unwind(AssertUnwindSafe(|| self.synthesize(res, format, planes)))
        {
            Ok(result) => result,
            Err(_) => {
                log::error!("fauxcam: frame synthesis panicked ({format} {res})");
                WriteResult::Failed
            }
        };
        match result {
            WriteResult::Written(_) => self.metrics.written(),
            WriteResult::Failed => self.metrics.failed(),
            WriteResult::NoOp => {}
        }
        result
    }

    /// [`Self::request_frame`] for any consumer type exposing its planes.
    pub fn request_frame_into<T: PlaneTarget + ?Sized>(
        &self,
        width: u32,
        height: u32,
        format: FourCc,
        target: &mut T,
    ) -> WriteResult {
        let mut planes = target.planes_mut();
        self.request_frame(width, height, format, &mut planes)
    }

    fn synthesize(&self, res: Resolution, code: FourCc, planes: &mut [PlaneMut<'_>]) -> WriteResult {
        let stages = fallback::plan(code, res, planes);
        let Some(&first) = stages.first() else {
            log::warn!(
                "fauxcam: no strategy for {code} over {} plane(s) at {res}",
                planes.len()
            );
            return WriteResult::Failed;
        };
        if first.is_fallback() {
            log::warn!("fauxcam: unsupported format tag {code}, trying {first}");
            self.metrics.frames.fallback();
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        state.sequence = state.sequence.wrapping_add(1);
        if state.source.is_rotating() {
            state.invalidate();
        }
        let version = state.generation;
        let cacheable = !state.randomize;
        let key_for = |format: WireFormat| CacheKey {
            resolution: res,
            format,
            version,
        };

        let mut skip = 0;
        if cacheable
            && first.format().is_yuv()
            && let Some(bytes) = state.cache.get(&key_for(first.format()))
        {
            self.metrics.frames.hit();
            let start = Instant::now();
            match write_encoded(first.format(), res, bytes, planes) {
                Ok(report) => {
                    self.metrics.write.record(start.elapsed());
                    return WriteResult::Written(FrameReport {
                        format: first.format(),
                        stage: first,
                        bytes_written: report.bytes_written(),
                        degraded: report.is_degraded(),
                        placeholder: false,
                        cache_hit: true,
                    });
                }
                Err(err) => {
                    log::warn!("fauxcam: {first} failed for {code} at {res}: {err}");
                    self.metrics.frames.fallback();
                    skip = 1;
                }
            }
        }

        let EngineState {
            transform,
            randomize,
            source,
            compositor,
            cache,
            ..
        } = state;
        let Some(canvas) = self.render(compositor, source.advance(), res, transform, *randomize)
        else {
            log::error!("fauxcam: cannot allocate any {res} frame");
            return WriteResult::Failed;
        };

        for &stage in &stages[skip..] {
            let key = (cacheable && !canvas.is_placeholder() && stage.format().is_yuv())
                .then(|| key_for(stage.format()));
            if key.is_some() {
                self.metrics.frames.miss();
            }
            match self.run_stage(stage, res, canvas.image(), cache, key, planes) {
                Ok(report) => {
                    log::debug!(
                        "fauxcam: wrote {} bytes via {stage} at {res}",
                        report.bytes_written()
                    );
                    return WriteResult::Written(FrameReport {
                        format: stage.format(),
                        stage,
                        bytes_written: report.bytes_written(),
                        degraded: report.is_degraded(),
                        placeholder: canvas.is_placeholder(),
                        cache_hit: false,
                    });
                }
                Err(err) => {
                    log::warn!("fauxcam: {stage} failed for {code} at {res}: {err}");
                    self.metrics.frames.fallback();
                }
            }
        }
        log::warn!("fauxcam: every strategy failed for {code} at {res}");
        WriteResult::Failed
    }

    /// Composite the source (or build the placeholder) at `res`.
    fn render<'a>(
        &self,
        compositor: &'a mut Compositor,
        source: Option<&RgbaImage>,
        res: Resolution,
        transform: &TransformState,
        randomize: bool,
    ) -> Option<Canvas<'a>> {
        let start = Instant::now();
        let composed = match source {
            Some(src) => compositor.composite(src, res, transform),
            None => None,
        };
        let canvas = match composed {
            Some(image) => {
                if randomize {
                    add_noise(image, self.tunables.noise_amplitude);
                }
                Canvas::Source(image)
            }
            None => {
                self.metrics.placeholder();
                log::debug!("fauxcam: placeholder frame at {res}");
                Canvas::Placeholder(placeholder(
                    res,
                    self.tunables.placeholder_rgba,
                    &self.tunables.placeholder_label,
                )?)
            }
        };
        self.metrics.compose.record(start.elapsed());
        Some(canvas)
    }

    fn run_stage(
        &self,
        stage: FallbackStage,
        res: Resolution,
        image: &RgbaImage,
        cache: &mut EncodedFrameCache,
        key: Option<CacheKey>,
        planes: &mut [PlaneMut<'_>],
    ) -> Result<WriteReport, StageError> {
        let format = stage.format();
        let start = Instant::now();
        let mut owned = Vec::new();
        let bytes: &[u8] = if format.is_yuv() {
            self.registry
                .encode_into(format.fourcc(), image, cache.begin())?;
            if let Some(key) = key {
                cache.commit(key);
            }
            cache.bytes()
        } else {
            self.registry
                .encode_into(format.fourcc(), image, &mut owned)?;
            &owned
        };
        self.metrics.encode.record(start.elapsed());

        let start = Instant::now();
        let report = write_encoded(format, res, bytes, planes)?;
        self.metrics.write.record(start.elapsed());
        Ok(report)
    }

    /// Compressed still for photo capture.
    ///
    /// Configured still bytes are returned verbatim while no zoom, pan, orientation or
    /// randomization is active (and `prefer_raw_still` is set); otherwise the composited
    /// frame is JPEG-encoded at the capture quality.
    pub fn encode_still_capture(&self, width: u32, height: u32) -> Option<Vec<u8>> {
        let res = Resolution::new(width, height)?;
        catch_unwind(AssertUnwindSafe(|| self.still_capture(res))).unwrap_or_else(|_| {
            log::error!("fauxcam: still capture panicked ({res})");
            None
        })
    }

    fn still_capture(&self, res: Resolution) -> Option<Vec<u8>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if self.tunables.prefer_raw_still
            && state.transform.is_identity()
            && state.source.orientation().is_identity()
            && !state.randomize
            && let Some(still) = state.source.still()
        {
            log::debug!("fauxcam: still capture passthrough ({} bytes)", still.len());
            return Some(still.to_vec());
        }

        let EngineState {
            transform,
            randomize,
            source,
            compositor,
            ..
        } = state;
        let canvas = self.render(compositor, source.current(), res, transform, *randomize)?;
        let mut out = Vec::new();
        match self.capture_codec.encode_into(canvas.image(), &mut out) {
            Ok(()) => Some(out),
            Err(err) => {
                log::warn!("fauxcam: still capture encode failed at {res}: {err}");
                None
            }
        }
    }

    /// Owned, encoded copy of the current frame in `format` (JPEG at export quality).
    pub fn export_frame(&self, width: u32, height: u32, format: WireFormat) -> Option<FrameLease> {
        let res = Resolution::new(width, height)?;
        catch_unwind(AssertUnwindSafe(|| self.export(res, format))).unwrap_or_else(|_| {
            log::error!("fauxcam: export panicked ({format} {res})");
            None
        })
    }

    fn export(&self, res: Resolution, format: WireFormat) -> Option<FrameLease> {
        let (image, sequence) = {
            let mut guard = self.lock();
            let EngineState {
                transform,
                randomize,
                source,
                compositor,
                sequence,
                ..
            } = &mut *guard;
            let canvas = self.render(compositor, source.current(), res, transform, *randomize)?;
            (canvas.into_owned(), *sequence)
        };
        let frame = frame_from_rgba(image, sequence, &self.export_pool)?;
        match self.registry.process(format.fourcc(), frame) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!("fauxcam: export to {format} failed at {res}: {err}");
                None
            }
        }
    }

    /// Counters and stage timings.
    pub fn stats(&self) -> EngineStats {
        self.metrics
            .snapshot(&self.compositor_metrics, self.registry.stats())
    }
}
