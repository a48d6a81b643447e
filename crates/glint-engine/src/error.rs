//! Error types shared by the pool, the rasterizer backends and the batch coordinator.

use std::fmt;

use crate::tensor::{DType, Tensor, TensorShape};

/// Failure raised by any glint operation.
#[derive(Debug)]
pub enum RasterError {
    /// Invalid construction-time configuration (attribute lists, resolution, kinds).
    Config(String),

    /// Per-call input rejected before any GPU work (counts, ranks, vertex count).
    Validation(String),

    /// A variable's batch shape differs from the one established by earlier variables.
    ShapeMismatch {
        name: String,
        batch_shape: TensorShape,
        expected: TensorShape,
    },

    /// No binding strategy exists for this (kind, element type) pair.
    UnsupportedVariable {
        name: String,
        kind: String,
        shape: TensorShape,
        dtype: DType,
    },

    /// GPU adapter/device bring-up failed.
    Device(String),

    /// Shader parsing, validation or reflection failed.
    Shader(String),

    /// A variable could not be bound to the compiled program.
    Binding(String),

    /// Draw or readback failed.
    Render(String),
}

impl RasterError {
    /// Returns true for failures raised while constructing a context resource.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, RasterError::Device(_) | RasterError::Shader(_))
    }

    pub(crate) fn device(err: anyhow::Error) -> Self {
        RasterError::Device(format!("{err:#}"))
    }
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            RasterError::Validation(msg) => write!(f, "invalid argument: {msg}"),
            RasterError::ShapeMismatch {
                name,
                batch_shape,
                expected,
            } => write!(
                f,
                "incompatible batch shape for variable with name='{name}', \
                 batch shape={batch_shape}, expected {expected}"
            ),
            RasterError::UnsupportedVariable {
                name,
                kind,
                shape,
                dtype,
            } => write!(
                f,
                "don't know how to handle variable with name='{name}', \
                 kind={kind} shape={shape} and type={dtype}"
            ),
            RasterError::Device(msg) => write!(f, "gpu context creation failed: {msg}"),
            RasterError::Shader(msg) => write!(f, "shader program error: {msg}"),
            RasterError::Binding(msg) => write!(f, "variable binding failed: {msg}"),
            RasterError::Render(msg) => write!(f, "render failed: {msg}"),
        }
    }
}

impl std::error::Error for RasterError {}

/// Failure of one batch render call.
///
/// Validation and acquisition failures carry no output. A failure inside the
/// render loop carries the output tensor as it stood: images before
/// `failed_index` are rendered, the rest are left zeroed.
#[derive(Debug)]
pub struct ComputeError {
    error: RasterError,
    failed_index: Option<usize>,
    partial_output: Option<Tensor>,
}

impl ComputeError {
    pub(crate) fn in_batch(error: RasterError, failed_index: usize, partial_output: Tensor) -> Self {
        Self {
            error,
            failed_index: Some(failed_index),
            partial_output: Some(partial_output),
        }
    }

    /// The underlying failure.
    pub fn error(&self) -> &RasterError {
        &self.error
    }

    /// Batch index whose binding or render failed, if the loop had started.
    pub fn failed_index(&self) -> Option<usize> {
        self.failed_index
    }

    /// Output written before the failure, if the loop had started.
    pub fn partial_output(&self) -> Option<&Tensor> {
        self.partial_output.as_ref()
    }

    pub fn into_parts(self) -> (RasterError, Option<Tensor>) {
        (self.error, self.partial_output)
    }
}

impl From<RasterError> for ComputeError {
    fn from(error: RasterError) -> Self {
        Self {
            error,
            failed_index: None,
            partial_output: None,
        }
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failed_index {
            Some(i) => write!(f, "batch element {i}: {}", self.error),
            None => self.error.fmt(f),
        }
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_variable() {
        let err = RasterError::ShapeMismatch {
            name: "verts".into(),
            batch_shape: TensorShape::new(vec![2, 4]),
            expected: TensorShape::new(vec![2, 3]),
        };
        let msg = err.to_string();
        assert!(msg.contains("name='verts'"));
        assert!(msg.contains("[2,4]"));
        assert!(msg.contains("[2,3]"));
    }

    #[test]
    fn unsupported_variable_lists_kind_shape_and_type() {
        let err = RasterError::UnsupportedVariable {
            name: "view".into(),
            kind: "mat".into(),
            shape: TensorShape::new(vec![4, 4]),
            dtype: DType::I32,
        };
        assert_eq!(
            err.to_string(),
            "don't know how to handle variable with name='view', kind=mat shape=[4,4] and type=int32"
        );
    }

    #[test]
    fn acquisition_classification() {
        assert!(RasterError::Device("no adapter".into()).is_acquisition());
        assert!(RasterError::Shader("parse".into()).is_acquisition());
        assert!(!RasterError::Render("map".into()).is_acquisition());
    }

    #[test]
    fn compute_error_from_raster_error_has_no_output() {
        let err = ComputeError::from(RasterError::Validation("count".into()));
        assert!(err.partial_output().is_none());
        assert!(err.failed_index().is_none());
        assert_eq!(err.to_string(), "invalid argument: count");
    }

    #[test]
    fn compute_error_in_batch_mentions_index() {
        let out = Tensor::zeros(TensorShape::new(vec![1, 1, 1, 4]));
        let err = ComputeError::in_batch(RasterError::Render("boom".into()), 3, out);
        assert_eq!(err.failed_index(), Some(3));
        assert!(err.partial_output().is_some());
        assert_eq!(err.to_string(), "batch element 3: render failed: boom");
    }
}
