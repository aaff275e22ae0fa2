//! Ordered strategies for satisfying a request whose format or plane layout the engine
//! cannot honor directly.

use std::fmt;

use fauxcam_core::prelude::{FourCc, PlaneMut, Resolution, WireFormat};
use smallvec::SmallVec;

/// One attempt in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStage {
    /// The format the caller asked for.
    Primary(WireFormat),
    /// Single plane of unknown format: format guessed from capacity per pixel.
    DirectBufferHeuristic(WireFormat),
    /// Three or more planes: written as planar 4:2:0.
    YuvGeneric,
    /// Single plane: written as tightly packed RGBA.
    RgbaGeneric,
}

impl FallbackStage {
    /// Wire format this stage encodes.
    pub fn format(&self) -> WireFormat {
        match *self {
            FallbackStage::Primary(format) | FallbackStage::DirectBufferHeuristic(format) => {
                format
            }
            FallbackStage::YuvGeneric => WireFormat::I420,
            FallbackStage::RgbaGeneric => WireFormat::Rgba8888,
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, FallbackStage::Primary(_))
    }
}

impl fmt::Display for FallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackStage::Primary(format) => write!(f, "primary {format}"),
            FallbackStage::DirectBufferHeuristic(format) => write!(f, "heuristic {format}"),
            FallbackStage::YuvGeneric => f.write_str("generic yuv"),
            FallbackStage::RgbaGeneric => f.write_str("generic rgba"),
        }
    }
}

/// Packed format implied by a single buffer's capacity per pixel (4 → RGBA, 2 → RGB565).
pub fn infer_packed_format(capacity: usize, res: Resolution) -> Option<WireFormat> {
    match capacity / res.pixels() {
        4 => Some(WireFormat::Rgba8888),
        2 => Some(WireFormat::Rgb565),
        _ => None,
    }
}

/// Stages to try, in order, for a request.
pub fn plan(code: FourCc, res: Resolution, planes: &[PlaneMut<'_>]) -> SmallVec<[FallbackStage; 4]> {
    let mut stages = SmallVec::new();
    if let Some(format) = WireFormat::from_fourcc(code) {
        stages.push(FallbackStage::Primary(format));
    }
    if let [single] = planes
        && let Some(format) = infer_packed_format(single.capacity(), res)
    {
        stages.push(FallbackStage::DirectBufferHeuristic(format));
    }
    if planes.len() >= 3 {
        stages.push(FallbackStage::YuvGeneric);
    }
    if planes.len() == 1 {
        stages.push(FallbackStage::RgbaGeneric);
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res() -> Resolution {
        Resolution::new(4, 4).unwrap()
    }

    #[test]
    fn known_format_on_one_plane() {
        let mut buf = vec![0u8; 24];
        let planes = [PlaneMut::new(&mut buf, 4, 1)];
        let stages = plan(FourCc::new(*b"NV21"), res(), &planes);
        assert_eq!(
            stages.as_slice(),
            &[
                FallbackStage::Primary(WireFormat::Nv21),
                FallbackStage::RgbaGeneric
            ]
        );
    }

    #[test]
    fn unknown_format_uses_capacity_heuristic() {
        let mut buf = vec![0u8; 32];
        let planes = [PlaneMut::new(&mut buf, 8, 2)];
        let stages = plan(FourCc::new(*b"????"), res(), &planes);
        assert_eq!(
            stages.as_slice(),
            &[
                FallbackStage::DirectBufferHeuristic(WireFormat::Rgb565),
                FallbackStage::RgbaGeneric
            ]
        );
        assert!(stages[0].is_fallback());
    }

    #[test]
    fn unknown_format_on_three_planes_is_yuv() {
        let (mut y, mut u, mut v) = (vec![0u8; 16], vec![0u8; 4], vec![0u8; 4]);
        let planes = [
            PlaneMut::new(&mut y, 4, 1),
            PlaneMut::new(&mut u, 2, 1),
            PlaneMut::new(&mut v, 2, 1),
        ];
        let stages = plan(FourCc::new(*b"XXXX"), res(), &planes);
        assert_eq!(stages.as_slice(), &[FallbackStage::YuvGeneric]);
        assert_eq!(stages[0].format(), WireFormat::I420);
    }

    #[test]
    fn nothing_to_try_without_planes() {
        assert!(plan(FourCc::new(*b"XXXX"), res(), &[]).is_empty());
    }
}
