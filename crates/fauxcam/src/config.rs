/// Default JPEG quality for still captures.
pub const DEFAULT_CAPTURE_QUALITY: u8 = 95;
/// Default JPEG quality for generic frame export.
pub const DEFAULT_EXPORT_QUALITY: u8 = 90;
/// Default per-channel noise amplitude in randomize-each-frame mode.
pub const DEFAULT_NOISE_AMPLITUDE: u8 = 3;
/// Default placeholder fill color (RGBA).
pub const DEFAULT_PLACEHOLDER_RGBA: [u8; 4] = [48, 48, 48, 255];
/// Default placeholder label.
pub const DEFAULT_PLACEHOLDER_LABEL: &str = "NO IMAGE";

/// Tunables for a [`crate::FrameEngine`].
///
/// # Example
/// ```rust
/// use fauxcam::prelude::EngineTunables;
///
/// let tunables = EngineTunables {
///     randomize_each_frame: true,
///     ..EngineTunables::default()
/// };
/// assert_eq!(tunables.capture_jpeg_quality, 95);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineTunables {
    /// JPEG quality (1-100) for `encode_still_capture`.
    pub capture_jpeg_quality: u8,
    /// JPEG quality (1-100) for JPEG requests and `export_frame`.
    pub export_jpeg_quality: u8,
    /// Start with randomize-each-frame enabled.
    pub randomize_each_frame: bool,
    /// Per-channel noise amplitude applied in randomize mode.
    pub noise_amplitude: u8,
    /// Return configured still bytes verbatim when no adjustment is active.
    pub prefer_raw_still: bool,
    /// Placeholder fill color.
    pub placeholder_rgba: [u8; 4],
    /// Placeholder label; empty disables the label.
    pub placeholder_label: String,
}

impl Default for EngineTunables {
    fn default() -> Self {
        Self {
            capture_jpeg_quality: DEFAULT_CAPTURE_QUALITY,
            export_jpeg_quality: DEFAULT_EXPORT_QUALITY,
            randomize_each_frame: false,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            prefer_raw_still: true,
            placeholder_rgba: DEFAULT_PLACEHOLDER_RGBA,
            placeholder_label: DEFAULT_PLACEHOLDER_LABEL.to_string(),
        }
    }
}

impl EngineTunables {
    pub(crate) fn sanitized(self) -> Self {
        Self {
            capture_jpeg_quality: self.capture_jpeg_quality.clamp(1, 100),
            export_jpeg_quality: self.export_jpeg_quality.clamp(1, 100),
            ..self
        }
    }
}
