use crate::error::RasterError;

use super::{DType, TensorShape};

/// Typed element storage of a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::I32(_) => DType::I32,
            TensorData::I64(_) => DType::I64,
            TensorData::U8(_) => DType::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dense row-major tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: TensorShape,
    data: TensorData,
}

impl Tensor {
    /// Creates a tensor, checking that `data` holds exactly `shape.num_elements()` values.
    pub fn new(shape: impl Into<TensorShape>, data: TensorData) -> Result<Self, RasterError> {
        let shape = shape.into();
        let Some(expected) = shape.checked_num_elements() else {
            return Err(RasterError::Validation(format!(
                "tensor of shape {shape} has more elements than fit in memory"
            )));
        };
        if data.len() != expected {
            return Err(RasterError::Validation(format!(
                "tensor of shape {shape} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Shorthand for an `f32` tensor.
    pub fn from_f32(shape: impl Into<TensorShape>, data: Vec<f32>) -> Result<Self, RasterError> {
        Self::new(shape, TensorData::F32(data))
    }

    /// Wraps a buffer whose length is already known to match `shape`.
    pub(crate) fn from_f32_parts(shape: TensorShape, data: Vec<f32>) -> Self {
        debug_assert_eq!(shape.num_elements(), data.len());
        Self {
            shape,
            data: TensorData::F32(data),
        }
    }

    /// Zero-filled `f32` tensor.
    pub fn zeros(shape: impl Into<TensorShape>) -> Self {
        let shape = shape.into();
        let data = TensorData::F32(vec![0.0; shape.num_elements()]);
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[inline]
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }
}
