//! Orientation of source images and the live zoom/pan state of the viewport.

/// Rotation in 90-degree steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Rotation90 {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// Orientation applied to source images before they are composited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameTransform {
    /// Rotation in 90-degree steps, clockwise.
    pub rotation: Rotation90,
    /// Mirror horizontally (left-right), applied after rotation.
    pub mirror: bool,
}

impl FrameTransform {
    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation90::Deg0 && !self.mirror
    }

    /// Dimensions of a `width`x`height` image once this transform is applied.
    pub fn output_dims(&self, width: u32, height: u32) -> (u32, u32) {
        match self.rotation {
            Rotation90::Deg90 | Rotation90::Deg270 => (height, width),
            Rotation90::Deg0 | Rotation90::Deg180 => (width, height),
        }
    }
}

/// How a source is scaled into a target of a different aspect ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScaleMode {
    /// Cover the whole target, cropping the overflowing axis.
    #[default]
    Fill,
    /// Fit the whole source inside the target, letterboxing the rest.
    Fit,
}

/// Live viewport adjustments: zoom about the target center plus an integer pan.
///
/// Zoom is clamped to [`TransformState::MIN_ZOOM`, `TransformState::MAX_ZOOM`] by every
/// mutation.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::TransformState;
///
/// let mut state = TransformState::default();
/// state.adjust_zoom(100.0);
/// assert_eq!(state.zoom(), TransformState::MAX_ZOOM);
/// state.adjust_pan(5, -3);
/// assert_eq!(state.pan(), (5, -3));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformState {
    zoom: f32,
    pan_x: i32,
    pan_y: i32,
    scale_mode: ScaleMode,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0,
            pan_y: 0,
            scale_mode: ScaleMode::Fill,
        }
    }
}

impl TransformState {
    pub const MIN_ZOOM: f32 = 0.1;
    pub const MAX_ZOOM: f32 = 10.0;

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Pan offset in target pixels.
    pub fn pan(&self) -> (i32, i32) {
        (self.pan_x, self.pan_y)
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    /// Set an absolute zoom. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        }
    }

    /// Multiply the zoom. Non-finite or non-positive multipliers are ignored.
    pub fn adjust_zoom(&mut self, multiplier: f32) {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.set_zoom(self.zoom * multiplier);
        }
    }

    pub fn adjust_pan(&mut self, dx: i32, dy: i32) {
        self.pan_x = self.pan_x.saturating_add(dx);
        self.pan_y = self.pan_y.saturating_add(dy);
    }

    pub fn set_scale_mode(&mut self, mode: ScaleMode) {
        self.scale_mode = mode;
    }

    /// Reset zoom and pan; the scale mode is a user preference and stays.
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan_x = 0;
        self.pan_y = 0;
    }

    /// True when neither zoom nor pan alter the base mapping.
    pub fn is_identity(&self) -> bool {
        self.zoom == 1.0 && self.pan_x == 0 && self.pan_y == 0
    }
}
