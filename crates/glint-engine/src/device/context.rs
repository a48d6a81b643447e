use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use super::DeviceInit;
use crate::error::RasterError;

/// Owns the wgpu core objects of one offscreen context.
///
/// Every rasterizer gets its own instance of this type; device and queue are
/// never shared between two rasterizers.
pub struct GpuContext {
    /// Kept alive for the lifetime of the adapter/device.
    _instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Set by the uncaptured-error handler.
    faulted: Arc<AtomicBool>,
}

impl GpuContext {
    /// Creates a headless context, blocking on adapter and device requests.
    pub fn new(init: &DeviceInit) -> Result<Self, RasterError> {
        pollster::block_on(Self::request(init)).map_err(RasterError::device)
    }

    async fn request(init: &DeviceInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("gpu context: using {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("glint-engine device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        // Errors outside an `ErrorScope` land here instead of panicking.
        let faulted = Arc::new(AtomicBool::new(false));
        let flag = faulted.clone();
        device.on_uncaptured_error(Arc::new(move |error: wgpu::Error| {
            log::error!("gpu context: uncaptured wgpu error: {error}");
            flag.store(true, Ordering::Release);
        }));

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            faulted,
        })
    }

    /// Returns the adapter description.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns true once the device reported an error no scope captured.
    ///
    /// The device state is unknown after that; the context should be dropped.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
