use std::{fmt, num::NonZeroU32, str::FromStr};

/// Four-character code tagging a wire pixel format.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::FourCc;
///
/// let fcc = FourCc::new(*b"NV21");
/// assert_eq!(fcc.to_string(), "NV21");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Construct from raw bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Little-endian u32 encoding.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Try to convert to a printable string.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            write!(f, "{s}")
        } else {
            write!(f, "0x{:08x}", self.to_u32())
        }
    }
}

impl FromStr for FourCc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err("fourcc must be four ASCII bytes".into());
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(FourCc(arr))
    }
}

/// Resolution of a frame.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::Resolution;
///
/// let res = Resolution::new(640, 480).unwrap();
/// assert_eq!(res.pixels(), 640 * 480);
/// assert!(Resolution::new(0, 480).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Resolution {
    /// Create a resolution, returning `None` if width or height are zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }

    /// Create a resolution from signed dimensions as handed over by a host runtime.
    pub fn from_signed(width: i32, height: i32) -> Option<Self> {
        Self::new(u32::try_from(width).ok()?, u32::try_from(height).ok()?)
    }

    /// Width as `usize`.
    pub fn w(&self) -> usize {
        self.width.get() as usize
    }

    /// Height as `usize`.
    pub fn h(&self) -> usize {
        self.height.get() as usize
    }

    /// Pixel count.
    pub fn pixels(&self) -> usize {
        self.w() * self.h()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Basic color space hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorSpace {
    /// Standard sRGB (packed RGB outputs).
    Srgb,
    /// Limited-range Rec. 601 (YUV outputs).
    Bt601,
    /// Unspecified/unknown, e.g. compressed payloads.
    Unknown,
}

/// Media format including code and geometry.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::{ColorSpace, FourCc, MediaFormat, Resolution};
///
/// let res = Resolution::new(1920, 1080).unwrap();
/// let fmt = MediaFormat::new(FourCc::new(*b"RGBA"), res, ColorSpace::Srgb);
/// assert_eq!(fmt.code.to_string(), "RGBA");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    /// FourCc code describing pixel layout.
    pub code: FourCc,
    /// Resolution of the frame.
    pub resolution: Resolution,
    /// Color space hint.
    pub color: ColorSpace,
}

impl MediaFormat {
    /// Build a new format.
    pub fn new(code: FourCc, resolution: Resolution, color: ColorSpace) -> Self {
        Self {
            code,
            resolution,
            color,
        }
    }
}

/// Wire formats the engine knows how to synthesize.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::{FourCc, Resolution, WireFormat};
///
/// let fmt = WireFormat::from_fourcc(FourCc::new(*b"NV21")).unwrap();
/// let res = Resolution::new(4, 4).unwrap();
/// assert_eq!(fmt.frame_len(res), Some(24));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WireFormat {
    /// Y plane followed by interleaved V/U, subsampled 2x2.
    Nv21,
    /// Y, U and V in three separate regions, subsampled 2x2.
    I420,
    /// Packed R,G,B,A.
    Rgba8888,
    /// Packed little-endian 5-6-5.
    Rgb565,
    /// Packed R,G,B.
    Rgb888,
    /// Compressed still image.
    Jpeg,
}

pub const NV21: FourCc = FourCc::new(*b"NV21");
pub const I420: FourCc = FourCc::new(*b"YU12");
pub const RGBA: FourCc = FourCc::new(*b"RGBA");
pub const RGB565: FourCc = FourCc::new(*b"RGBP");
pub const RGB888: FourCc = FourCc::new(*b"RG24");
pub const JPEG: FourCc = FourCc::new(*b"JPEG");

impl WireFormat {
    /// Every synthesizable format.
    pub const ALL: [WireFormat; 6] = [
        WireFormat::Nv21,
        WireFormat::I420,
        WireFormat::Rgba8888,
        WireFormat::Rgb565,
        WireFormat::Rgb888,
        WireFormat::Jpeg,
    ];

    /// Canonical FourCc tag.
    pub const fn fourcc(self) -> FourCc {
        match self {
            WireFormat::Nv21 => NV21,
            WireFormat::I420 => I420,
            WireFormat::Rgba8888 => RGBA,
            WireFormat::Rgb565 => RGB565,
            WireFormat::Rgb888 => RGB888,
            WireFormat::Jpeg => JPEG,
        }
    }

    /// Resolve a FourCc tag, accepting common aliases.
    pub fn from_fourcc(code: FourCc) -> Option<Self> {
        match &code.0 {
            b"NV21" => Some(WireFormat::Nv21),
            b"YU12" | b"I420" => Some(WireFormat::I420),
            b"RGBA" | b"AB24" => Some(WireFormat::Rgba8888),
            b"RGBP" | b"R565" => Some(WireFormat::Rgb565),
            b"RG24" | b"RGB3" => Some(WireFormat::Rgb888),
            b"JPEG" | b"MJPG" => Some(WireFormat::Jpeg),
            _ => None,
        }
    }

    /// Map an Android `ImageFormat` / `PixelFormat` constant.
    ///
    /// `YUV_420_888` resolves to the three-plane convention; strides come from the
    /// destination planes.
    pub fn from_android(code: i32) -> Option<Self> {
        match code {
            0x11 => Some(WireFormat::Nv21),
            0x23 => Some(WireFormat::I420),
            0x100 => Some(WireFormat::Jpeg),
            0x4 => Some(WireFormat::Rgb565),
            0x1 | 0x2a => Some(WireFormat::Rgba8888),
            0x3 => Some(WireFormat::Rgb888),
            _ => None,
        }
    }

    /// Bytes per pixel for packed formats.
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            WireFormat::Rgba8888 => Some(4),
            WireFormat::Rgb565 => Some(2),
            WireFormat::Rgb888 => Some(3),
            WireFormat::Nv21 | WireFormat::I420 | WireFormat::Jpeg => None,
        }
    }

    /// Planar 4:2:0 formats.
    pub const fn is_yuv(self) -> bool {
        matches!(self, WireFormat::Nv21 | WireFormat::I420)
    }

    /// Color space hint attached to frames of this format.
    pub const fn color(self) -> ColorSpace {
        match self {
            WireFormat::Nv21 | WireFormat::I420 => ColorSpace::Bt601,
            WireFormat::Jpeg => ColorSpace::Unknown,
            _ => ColorSpace::Srgb,
        }
    }

    /// Encoded length in bytes; `None` for compressed output.
    pub fn frame_len(self, res: Resolution) -> Option<usize> {
        let pixels = res.pixels();
        match self {
            WireFormat::Nv21 => Some(pixels + pixels / 2),
            WireFormat::I420 => Some(pixels + 2 * (pixels / 4)),
            WireFormat::Jpeg => None,
            packed => packed.bytes_per_pixel().map(|bpp| pixels * bpp),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

/// Dimensions of the subsampled chroma grid for 4:2:0 formats.
///
/// Odd trailing rows/columns share the previous block and are not sampled.
pub fn chroma_dims(res: Resolution) -> (usize, usize) {
    (res.w() / 2, res.h() / 2)
}

#[cfg(feature = "serde")]
impl serde::Serialize for FourCc {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Prefer string encoding so decoding does not rely on `deserialize_any`.
        let encoded = self.as_str().unwrap_or("FFFF");
        serializer.serialize_str(encoded)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FourCc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FourCcVisitor;

        impl<'de> serde::de::Visitor<'de> for FourCcVisitor {
            type Value = FourCc;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 4-character FourCc string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                FourCc::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(FourCcVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_tags() {
        for fmt in WireFormat::ALL {
            assert_eq!(WireFormat::from_fourcc(fmt.fourcc()), Some(fmt));
        }
        assert_eq!(
            WireFormat::from_fourcc(FourCc::new(*b"I420")),
            Some(WireFormat::I420)
        );
        assert_eq!(
            WireFormat::from_fourcc(FourCc::new(*b"MJPG")),
            Some(WireFormat::Jpeg)
        );
        assert_eq!(WireFormat::from_fourcc(FourCc::new(*b"YUYV")), None);
    }

    #[test]
    fn android_codes() {
        assert_eq!(WireFormat::from_android(17), Some(WireFormat::Nv21));
        assert_eq!(WireFormat::from_android(35), Some(WireFormat::I420));
        assert_eq!(WireFormat::from_android(256), Some(WireFormat::Jpeg));
        assert_eq!(WireFormat::from_android(0x32315659), None);
    }

    #[test]
    fn frame_lengths() {
        let res = Resolution::new(640, 480).unwrap();
        assert_eq!(WireFormat::Nv21.frame_len(res), Some(640 * 480 * 3 / 2));
        assert_eq!(WireFormat::I420.frame_len(res), Some(640 * 480 * 3 / 2));
        assert_eq!(WireFormat::Rgba8888.frame_len(res), Some(640 * 480 * 4));
        assert_eq!(WireFormat::Rgb565.frame_len(res), Some(640 * 480 * 2));
        assert_eq!(WireFormat::Rgb888.frame_len(res), Some(640 * 480 * 3));
        assert_eq!(WireFormat::Jpeg.frame_len(res), None);
    }

    #[test]
    fn signed_dimensions_reject_non_positive() {
        assert!(Resolution::from_signed(-4, 4).is_none());
        assert!(Resolution::from_signed(4, 0).is_none());
        assert_eq!(
            Resolution::from_signed(4, 2),
            Resolution::new(4, 2)
        );
    }
}
