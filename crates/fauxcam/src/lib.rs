#![doc = include_str!("../README.md")]

pub use fauxcam_codec as codec;
pub use fauxcam_core as core;

pub use thiserror;

pub mod cache;
pub mod config;
mod engine;
pub mod fallback;
pub mod metrics;
pub mod request;
pub mod source;

pub use engine::FrameEngine;

pub mod prelude {
    pub use crate::{
        FrameEngine,
        config::EngineTunables,
        fallback::FallbackStage,
        metrics::{EngineStats, StageMetrics},
        request::{EngineError, FrameReport, WriteResult},
    };
    pub use fauxcam_codec::prelude::*;
}
