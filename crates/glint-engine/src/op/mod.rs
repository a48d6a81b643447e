//! The batched rasterize operator.
//!
//! `RasterizeOp` owns a pool of rasterizers for its lifetime. Each `compute`
//! call validates the per-sample variables, derives the batch shape, checks
//! one rasterizer out of the pool and renders one image per batch element.

mod binder;
mod config;
mod rasterize;
mod validate;
mod variable;

pub use binder::BindingStrategy;
pub use config::RasterizeOpConfig;
pub use rasterize::RasterizeOp;
pub use validate::batch_shape;
pub use variable::{VariableDecl, VariableKind};
