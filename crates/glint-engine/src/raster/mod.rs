//! Offscreen rasterizers: the render contract and its wgpu implementation.
//!
//! A rasterizer is one compiled shader program bound to one offscreen GPU
//! context at a fixed resolution. It is expensive to build and must only be
//! driven by one caller at a time, which is why rasterizers live in a
//! [`crate::pool::ResourcePool`].
//!
//! Conventions:
//! - shader stages are WGSL; each stage module has one entry point for its stage
//! - output images are RGBA `f32`, row 0 is the top row

mod config;
mod matrix;
mod program;
mod rasterizer;
mod readback;
mod wgpu_rasterizer;

pub use config::{ClearValues, RasterizerConfig, ShaderProgram, Topology};
pub use rasterizer::Rasterizer;
pub use wgpu_rasterizer::WgpuRasterizer;
