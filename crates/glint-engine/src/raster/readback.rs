//! Framebuffer readback helpers.

/// Bytes per `Rgba32Float` texel.
pub(crate) const BYTES_PER_PIXEL: u32 = 16;

/// Row pitch of the staging buffer; texture copies need 256-byte aligned rows.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies a row-padded RGBA `f32` image into a tightly packed slice.
pub(crate) fn copy_rows(mapped: &[u8], padded_bytes_per_row: u32, width: u32, out: &mut [f32]) {
    let row_bytes = (width * BYTES_PER_PIXEL) as usize;
    let pitch = padded_bytes_per_row as usize;
    let out_bytes: &mut [u8] = bytemuck::cast_slice_mut(out);

    for (row, dst) in out_bytes.chunks_exact_mut(row_bytes).enumerate() {
        let src = row * pitch;
        dst.copy_from_slice(&mapped[src..src + row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_aligned() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(16), 256);
        assert_eq!(padded_bytes_per_row(17), 512);
        assert_eq!(padded_bytes_per_row(64), 1024);
    }

    #[test]
    fn copy_strips_row_padding() {
        let width = 2;
        let height = 2;
        let pitch = padded_bytes_per_row(width);

        let mut mapped = vec![0u8; (pitch * height) as usize];
        for row in 0..height as usize {
            let texels: Vec<f32> = (0..8).map(|i| (row * 8 + i) as f32).collect();
            let bytes: &[u8] = bytemuck::cast_slice(&texels);
            let start = row * pitch as usize;
            mapped[start..start + bytes.len()].copy_from_slice(bytes);
        }

        let mut out = vec![-1.0f32; 16];
        copy_rows(&mapped, pitch, width, &mut out);
        let expected: Vec<f32> = (0..16).map(|v| v as f32).collect();
        assert_eq!(out, expected);
    }
}
