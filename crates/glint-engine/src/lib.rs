//! Glint engine crate.
//!
//! Batched offscreen rasterization: a pool of GPU contexts, a render contract for
//! those contexts, and the batch coordinator that binds per-sample variables and
//! renders one image per batch element.

pub mod device;
pub mod error;
pub mod logging;
pub mod op;
pub mod pool;
pub mod raster;
pub mod tensor;

pub use error::{ComputeError, RasterError};
