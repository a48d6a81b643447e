//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - reporting bring-up failures as typed errors instead of panics
//! - routing wgpu validation errors into error scopes or a fault flag, never
//!   into wgpu's default panicking handler

mod context;
mod init;
mod scope;

pub use context::GpuContext;
pub use init::DeviceInit;
pub use scope::ErrorScope;
