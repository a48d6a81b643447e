/// Initialization parameters for a headless GPU context.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct DeviceInit {
    /// Backends wgpu may pick an adapter from.
    ///
    /// The primary backends all support float render targets and storage
    /// buffers in the vertex stage; GL is excluded by default.
    pub backends: wgpu::Backends,

    /// Adapter selection preference.
    pub power_preference: wgpu::PowerPreference,

    /// Accept only a software adapter (useful on CI machines).
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,
}

impl Default for DeviceInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}
