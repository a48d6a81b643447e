//! Host-side tensors exchanged with the batch coordinator.
//!
//! Layout is dense row-major. Only `f32` data can be bound to a shader program;
//! the other element types exist so callers get a typed rejection instead of a
//! silent reinterpretation.

mod dtype;
mod shape;
#[allow(clippy::module_inception)]
mod tensor;

pub use dtype::DType;
pub use shape::TensorShape;
pub use tensor::{Tensor, TensorData};
