//! RGBA8 encoders, one module per pixel family.

pub mod packed;
pub mod yuv;
