//! Packing of host matrices into WGSL uniform layout.
//!
//! A `matCxR<f32>` uniform is stored column by column; each column is a
//! `vecR<f32>` aligned to 8 bytes for R = 2 and 16 bytes for R = 3 or 4.

use crate::error::RasterError;

/// Floats occupied by one column of a matrix with `rows` rows.
pub(crate) fn column_stride(rows: usize) -> usize {
    if rows == 2 { 2 } else { 4 }
}

/// Packs `data` (`rows * cols` floats) into padded column-major order.
pub(crate) fn pack_matrix(
    cols: usize,
    rows: usize,
    transpose: bool,
    data: &[f32],
) -> Result<Vec<f32>, RasterError> {
    if !(2..=4).contains(&cols) || !(2..=4).contains(&rows) {
        return Err(RasterError::Binding(format!(
            "matrix must be between 2x2 and 4x4, got {rows}x{cols}"
        )));
    }
    if data.len() != rows * cols {
        return Err(RasterError::Binding(format!(
            "a {rows}x{cols} matrix needs {} floats, got {}",
            rows * cols,
            data.len()
        )));
    }

    let stride = column_stride(rows);
    let mut packed = vec![0.0f32; cols * stride];
    for c in 0..cols {
        for r in 0..rows {
            let src = if transpose { r * cols + c } else { c * rows + r };
            packed[c * stride + r] = data[src];
        }
    }
    Ok(packed)
}
