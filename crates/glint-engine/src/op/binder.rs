//! Variable binding dispatch.
//!
//! `BINDINGS` maps a declared kind and a runtime element type to the render
//! contract call that uploads one batch element. Adding a kind or element type
//! means adding a row here.

use crate::error::RasterError;
use crate::raster::Rasterizer;
use crate::tensor::{DType, Tensor};

use super::validate::rank_error;
use super::{VariableDecl, VariableKind};

/// How one batch element of a variable reaches the shader program.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingStrategy {
    /// `Rasterizer::set_uniform_matrix` with row-major data.
    UniformMatrix,
    /// `Rasterizer::set_shader_storage_buffer`.
    StorageBuffer,
}

const BINDINGS: &[(VariableKind, DType, BindingStrategy)] = &[
    (VariableKind::Matrix, DType::F32, BindingStrategy::UniformMatrix),
    (VariableKind::Buffer, DType::F32, BindingStrategy::StorageBuffer),
];

impl BindingStrategy {
    /// Looks up the strategy for a (kind, element type) pair.
    pub fn lookup(kind: VariableKind, dtype: DType) -> Option<Self> {
        BINDINGS
            .iter()
            .find(|(k, d, _)| *k == kind && *d == dtype)
            .map(|&(_, _, strategy)| strategy)
    }

    /// Like [`BindingStrategy::lookup`], but names the variable on failure.
    pub(crate) fn resolve(decl: &VariableDecl, value: &Tensor) -> Result<Self, RasterError> {
        Self::lookup(decl.kind, value.dtype()).ok_or_else(|| RasterError::UnsupportedVariable {
            name: decl.name.clone(),
            kind: decl.kind.to_string(),
            shape: value.shape().clone(),
            dtype: value.dtype(),
        })
    }
}

/// Binds batch element `index` of every variable.
///
/// Values must already have passed batch validation.
pub(crate) fn bind_variables<R: Rasterizer + ?Sized>(
    rasterizer: &mut R,
    decls: &[VariableDecl],
    values: &[Tensor],
    index: usize,
) -> Result<(), RasterError> {
    for (decl, value) in decls.iter().zip(values) {
        let strategy = BindingStrategy::resolve(decl, value)?;
        let data = value.as_f32().ok_or_else(|| RasterError::UnsupportedVariable {
            name: decl.name.clone(),
            kind: decl.kind.to_string(),
            shape: value.shape().clone(),
            dtype: value.dtype(),
        })?;
        let shape = value.shape();

        match strategy {
            BindingStrategy::UniformMatrix => {
                let (Some(rows), Some(cols)) = (shape.dim_from_back(2), shape.dim_from_back(1))
                else {
                    return Err(rank_error(decl, value));
                };
                let n = rows * cols;
                rasterizer.set_uniform_matrix(
                    &decl.name,
                    cols,
                    rows,
                    true,
                    &data[index * n..(index + 1) * n],
                )?;
            }
            BindingStrategy::StorageBuffer => {
                let Some(len) = shape.dim_from_back(1) else {
                    return Err(rank_error(decl, value));
                };
                rasterizer.set_shader_storage_buffer(&decl.name, &data[index * len..(index + 1) * len])?;
            }
        }
    }
    Ok(())
}
