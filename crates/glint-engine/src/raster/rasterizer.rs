use crate::error::RasterError;
use crate::pool::PooledResource;

/// Render contract of one offscreen context.
///
/// Resolution and program are fixed at construction. Calls are synchronous and
/// leave the context ready for the next call; bound variables persist until
/// overwritten.
pub trait Rasterizer: PooledResource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Number of floats `render` writes: `width * height * 4`.
    fn image_len(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }

    /// Binds a `rows x cols` float matrix to the uniform called `name`.
    ///
    /// `data` is row-major when `transpose` is set, column-major otherwise.
    fn set_uniform_matrix(
        &mut self,
        name: &str,
        cols: usize,
        rows: usize,
        transpose: bool,
        data: &[f32],
    ) -> Result<(), RasterError>;

    /// Uploads `data` into the storage buffer called `name`.
    fn set_shader_storage_buffer(&mut self, name: &str, data: &[f32]) -> Result<(), RasterError>;

    /// Clears, draws `num_points` vertices and reads the RGBA framebuffer into `image`.
    ///
    /// `image` must hold exactly [`Rasterizer::image_len`] floats.
    fn render(&mut self, num_points: u32, image: &mut [f32]) -> Result<(), RasterError>;
}
