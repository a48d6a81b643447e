use crate::error::{ComputeError, RasterError};
use crate::pool::{PoolStats, ResourcePool};
use crate::raster::{Rasterizer, WgpuRasterizer};
use crate::tensor::{Tensor, TensorShape};

use super::binder::bind_variables;
use super::validate::batch_shape;
use super::{RasterizeOpConfig, VariableDecl};

/// Batched rasterize operator.
///
/// Safe to call from many threads at once: every call checks out its own
/// rasterizer, and the pool grows to the peak number of concurrent calls.
pub struct RasterizeOp<R: Rasterizer> {
    height: u32,
    width: u32,
    variables: Vec<VariableDecl>,
    pool: ResourcePool<R, RasterError>,
}

impl RasterizeOp<WgpuRasterizer> {
    /// Creates an operator whose rasterizers are wgpu contexts.
    ///
    /// No GPU work happens here; the first context is built by the first call.
    pub fn new(config: &RasterizeOpConfig) -> Result<Self, RasterError> {
        let raster_config = config.rasterizer_config();
        let init = config.device.clone();
        Self::with_factory(config, move || WgpuRasterizer::new(&raster_config, &init))
    }
}

impl<R: Rasterizer> RasterizeOp<R> {
    /// Creates an operator that builds its rasterizers with `factory`.
    pub fn with_factory<F>(config: &RasterizeOpConfig, factory: F) -> Result<Self, RasterError>
    where
        F: Fn() -> Result<R, RasterError> + Send + Sync + 'static,
    {
        config.rasterizer_config().validate()?;
        let variables = config.declarations()?;

        Ok(Self {
            height: config.height,
            width: config.width,
            variables,
            pool: ResourcePool::new(factory),
        })
    }

    pub fn variables(&self) -> &[VariableDecl] {
        &self.variables
    }

    /// `batch ++ [height, width, 4]`.
    pub fn output_shape(&self, batch: &TensorShape) -> TensorShape {
        batch.concat(&[self.height as usize, self.width as usize, 4])
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Renders one image per batch element.
    ///
    /// `values` are the per-variable tensors in declaration order. On a failure
    /// inside the render loop the returned error carries the output rendered so
    /// far; the rasterizer goes back to the pool either way unless it reports
    /// itself corrupt.
    pub fn compute(&self, num_points: i32, values: &[Tensor]) -> Result<Tensor, ComputeError> {
        let num_points = u32::try_from(num_points).map_err(|_| {
            RasterError::Validation(format!("num_points must be non-negative, got {num_points}"))
        })?;
        let batch = batch_shape(&self.variables, values)?;

        let output_shape = self.output_shape(&batch);
        let image_len = self.width as usize * self.height as usize * 4;
        let (count, total) = batch
            .checked_num_elements()
            .and_then(|count| Some((count, output_len(count, image_len)?)))
            .ok_or_else(|| {
                RasterError::Validation(format!(
                    "output of shape {output_shape} does not fit in memory"
                ))
            })?;
        let mut pixels = vec![0.0f32; total];

        if count == 0 {
            log::debug!("rasterize: empty batch {batch}, nothing to render");
            return Ok(Tensor::from_f32_parts(output_shape, pixels));
        }

        let mut rasterizer = self.pool.acquire()?;
        if rasterizer.image_len() != image_len {
            return Err(RasterError::Config(format!(
                "rasterizer renders {}x{} images, operator expects {}x{}",
                rasterizer.width(),
                rasterizer.height(),
                self.width,
                self.height
            ))
            .into());
        }

        log::debug!(
            "rasterize: batch {batch} ({count} images) at {}x{}, {num_points} points",
            self.width,
            self.height
        );
        let outcome = render_batch(
            &mut *rasterizer,
            &self.variables,
            values,
            num_points,
            &mut pixels,
            image_len,
        );
        drop(rasterizer);

        let output = Tensor::from_f32_parts(output_shape, pixels);
        match outcome {
            Ok(()) => Ok(output),
            Err((index, error)) => {
                log::debug!("rasterize: batch element {index} failed: {error}");
                Err(ComputeError::in_batch(error, index, output))
            }
        }
    }
}

/// Float count of `count` images, if the byte size stays addressable.
fn output_len(count: usize, image_len: usize) -> Option<usize> {
    let len = count.checked_mul(image_len)?;
    let bytes = len.checked_mul(std::mem::size_of::<f32>())?;
    (bytes <= isize::MAX as usize).then_some(len)
}

/// Binds then renders each element in order, stopping at the first failure.
fn render_batch<R: Rasterizer + ?Sized>(
    rasterizer: &mut R,
    decls: &[VariableDecl],
    values: &[Tensor],
    num_points: u32,
    pixels: &mut [f32],
    image_len: usize,
) -> Result<(), (usize, RasterError)> {
    for (index, image) in pixels.chunks_exact_mut(image_len).enumerate() {
        bind_variables(rasterizer, decls, values, index).map_err(|e| (index, e))?;
        rasterizer.render(num_points, image).map_err(|e| (index, e))?;
    }
    Ok(())
}
