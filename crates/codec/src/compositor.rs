//! Geometric compositor: scales, zooms and pans a source image into a target-sized
//! RGBA scratch buffer.
//!
//! The forward mapping from source to target coordinates is
//! `dst = zoom * s * (src - src_center) + dst_center + pan`, with `s` the per-mode base
//! scale. Drawing inverts it at every target pixel center and samples bilinearly;
//! pixels whose center maps outside the source stay transparent.

use std::sync::Arc;

use fauxcam_core::prelude::*;
use image::RgbaImage;
use rand::Rng;
use rayon::prelude::*;

/// Base scale for fitting a `src` sized image into `dst` under `mode`.
pub fn base_scale(src: (u32, u32), dst: (u32, u32), mode: ScaleMode) -> f32 {
    let sx = dst.0 as f32 / src.0 as f32;
    let sy = dst.1 as f32 / src.1 as f32;
    match mode {
        ScaleMode::Fill => sx.max(sy),
        ScaleMode::Fit => sx.min(sy),
    }
}

/// Inverse of the compositor's forward affine map.
#[derive(Debug, Clone, Copy)]
struct InverseMap {
    inv_scale: f32,
    src_cx: f32,
    src_cy: f32,
    dst_cx: f32,
    dst_cy: f32,
}

impl InverseMap {
    fn new(src: (u32, u32), dst: (u32, u32), state: &TransformState) -> Self {
        let scale = base_scale(src, dst, state.scale_mode()) * state.zoom();
        let (pan_x, pan_y) = state.pan();
        Self {
            inv_scale: 1.0 / scale,
            src_cx: src.0 as f32 / 2.0,
            src_cy: src.1 as f32 / 2.0,
            dst_cx: dst.0 as f32 / 2.0 + pan_x as f32,
            dst_cy: dst.1 as f32 / 2.0 + pan_y as f32,
        }
    }

    #[inline(always)]
    fn source_x(&self, dst_x: f32) -> f32 {
        (dst_x - self.dst_cx) * self.inv_scale + self.src_cx
    }

    #[inline(always)]
    fn source_y(&self, dst_y: f32) -> f32 {
        (dst_y - self.dst_cy) * self.inv_scale + self.src_cy
    }
}

#[inline(always)]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Bilinear sample at continuous source coordinates (pixel centers at `i + 0.5`).
#[inline(always)]
fn sample_bilinear(raw: &[u8], width: usize, height: usize, x: f32, y: f32) -> [u8; 4] {
    let fx = (x - 0.5).max(0.0);
    let fy = (y - 0.5).max(0.0);
    let x0 = (fx as usize).min(width - 1);
    let y0 = (fy as usize).min(height - 1);
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let p00 = (y0 * width + x0) * 4;
    let p10 = (y0 * width + x1) * 4;
    let p01 = (y1 * width + x0) * 4;
    let p11 = (y1 * width + x1) * 4;
    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = lerp(raw[p00 + c] as f32, raw[p10 + c] as f32, tx);
        let bottom = lerp(raw[p01 + c] as f32, raw[p11 + c] as f32, tx);
        *slot = lerp(top, bottom, ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Draws source images into a reusable target-sized scratch buffer.
///
/// # Example
/// ```rust
/// use fauxcam_codec::compositor::Compositor;
/// use fauxcam_core::prelude::{Resolution, ScaleMode, TransformState};
/// use image::{Rgba, RgbaImage};
///
/// let source = RgbaImage::from_pixel(200, 100, Rgba([0, 255, 0, 255]));
/// let mut state = TransformState::default();
/// state.set_scale_mode(ScaleMode::Fit);
/// let mut compositor = Compositor::new();
/// let out = compositor
///     .composite(&source, Resolution::new(100, 100).unwrap(), &state)
///     .unwrap();
/// assert_eq!(out.get_pixel(50, 0).0, [0, 0, 0, 0]);
/// assert_eq!(out.get_pixel(50, 50).0, [0, 255, 0, 255]);
/// ```
pub struct Compositor {
    scratch: Option<RgbaImage>,
    metrics: Arc<Metrics>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            scratch: None,
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Allocation counters: `allocations` counts scratch (re)allocations, `hits` reuses.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Draw `source` into the scratch buffer sized to `target`.
    ///
    /// Returns `None` when the scratch buffer cannot be allocated.
    pub fn composite(
        &mut self,
        source: &RgbaImage,
        target: Resolution,
        state: &TransformState,
    ) -> Option<&mut RgbaImage> {
        if source.width() == 0 || source.height() == 0 {
            return None;
        }
        let scratch = self.scratch_for(target)?;
        let map = InverseMap::new(
            source.dimensions(),
            (target.width.get(), target.height.get()),
            state,
        );
        let src_w = source.width() as usize;
        let src_h = source.height() as usize;
        let raw = source.as_raw();
        let row_bytes = target.w() * 4;

        let pixels: &mut [u8] = &mut *scratch;
        pixels
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let sy = map.source_y(y as f32 + 0.5);
                if !(0.0..src_h as f32).contains(&sy) {
                    return;
                }
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let sx = map.source_x(x as f32 + 0.5);
                    if (0.0..src_w as f32).contains(&sx) {
                        px.copy_from_slice(&sample_bilinear(raw, src_w, src_h, sx, sy));
                    }
                }
            });
        Some(scratch)
    }

    /// Scratch buffer for `target`, cleared to transparent.
    fn scratch_for(&mut self, target: Resolution) -> Option<&mut RgbaImage> {
        let dims = (target.width.get(), target.height.get());
        let reuse = self
            .scratch
            .as_ref()
            .is_some_and(|img| img.dimensions() == dims);
        if reuse {
            self.metrics.hit();
        } else {
            self.scratch = None;
            let mut raw = Vec::new();
            if !try_resize(&mut raw, target.pixels() * 4) {
                log::warn!("compositor: cannot allocate {target} scratch buffer");
                return None;
            }
            self.metrics.alloc();
            log::debug!("compositor: allocated {target} scratch buffer");
            self.scratch = RgbaImage::from_raw(dims.0, dims.1, raw);
        }
        let scratch = self.scratch.as_mut()?;
        let pixels: &mut [u8] = &mut *scratch;
        pixels.fill(0);
        Some(scratch)
    }
}

/// Add uniform per-channel noise in `[-amplitude, amplitude]` to the color channels.
pub fn add_noise(image: &mut RgbaImage, amplitude: u8) {
    if amplitude == 0 {
        return;
    }
    let amp = amplitude as i16;
    let mut rng = rand::rng();
    for px in image.pixels_mut() {
        for channel in &mut px.0[..3] {
            let delta: i16 = rng.random_range(-amp..=amp);
            *channel = (*channel as i16 + delta).clamp(0, 255) as u8;
        }
    }
}
