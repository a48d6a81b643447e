use crate::error::RasterError;
use crate::tensor::{Tensor, TensorShape};

use super::{BindingStrategy, VariableDecl};

/// Derives the batch shape shared by all variables.
///
/// Each value loses its trailing element dims (2 for matrices, 1 for buffers);
/// what remains must be identical across variables. With no variables the batch
/// is the scalar shape, i.e. a single image.
pub fn batch_shape(decls: &[VariableDecl], values: &[Tensor]) -> Result<TensorShape, RasterError> {
    if decls.len() != values.len() {
        return Err(RasterError::Validation(format!(
            "the variable names, kinds, and values must have the same size \
             ({} declared, {} supplied)",
            decls.len(),
            values.len()
        )));
    }

    let mut batch: Option<TensorShape> = None;
    for (decl, value) in decls.iter().zip(values) {
        BindingStrategy::resolve(decl, value)?;

        let Some(shape) = value.shape().remove_last_dims(decl.kind.element_rank()) else {
            return Err(rank_error(decl, value));
        };
        match &batch {
            None => batch = Some(shape),
            Some(expected) if *expected != shape => {
                return Err(RasterError::ShapeMismatch {
                    name: decl.name.clone(),
                    batch_shape: shape,
                    expected: expected.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(batch.unwrap_or_default())
}

pub(super) fn rank_error(decl: &VariableDecl, value: &Tensor) -> RasterError {
    RasterError::Validation(format!(
        "variable '{}' of kind {} needs at least {} dims, got shape {}",
        decl.name,
        decl.kind,
        decl.kind.element_rank(),
        value.shape()
    ))
}
