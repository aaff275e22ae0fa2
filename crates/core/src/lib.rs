#![doc = include_str!("../README.md")]

pub mod buffer;
pub mod format;
pub mod metrics;
pub mod plane;
pub mod transform;

pub mod prelude {
    pub use crate::{
        buffer::{
            BufferLease, BufferPool, BufferPoolMetrics, FrameLease, FrameMeta, Plane, PlaneLayout,
            PlaneMut, PlaneTarget, plane_layout_for_bytes, plane_layout_from_dims, try_resize,
        },
        format::{ColorSpace, FourCc, MediaFormat, Resolution, WireFormat, chroma_dims},
        metrics::Metrics,
        plane::{
            PlaneError, PlaneSource, PlaneWrite, WriteReport, YuvSource, copy_plane,
            write_packed, write_stream, write_yuv420,
        },
        transform::{FrameTransform, Rotation90, ScaleMode, TransformState},
    };
}
