use crate::device::DeviceInit;
use crate::error::RasterError;
use crate::raster::{ClearValues, RasterizerConfig, ShaderProgram, Topology};

use super::VariableDecl;

/// Construction-time attributes of a [`super::RasterizeOp`].
///
/// Fixed for the lifetime of the operator. `variable_names` and
/// `variable_kinds` are parallel lists; kinds are spelled "mat" or "buffer".
#[derive(Debug, Clone)]
pub struct RasterizeOpConfig {
    pub height: u32,
    pub width: u32,

    pub red_clear: f32,
    pub green_clear: f32,
    pub blue_clear: f32,
    pub alpha_clear: f32,
    pub depth_clear: f32,

    pub vertex_shader: String,
    /// Must stay empty: the wgpu backend has no geometry stage. A non-empty
    /// source is accepted here but makes the first `compute` fail with
    /// `RasterError::Config` when the context is built; expand primitives in
    /// the vertex stage instead.
    pub geometry_shader: String,
    pub fragment_shader: String,

    pub variable_names: Vec<String>,
    pub variable_kinds: Vec<String>,

    pub topology: Topology,
    pub device: DeviceInit,
}

impl Default for RasterizeOpConfig {
    fn default() -> Self {
        Self {
            height: 0,
            width: 0,
            red_clear: 0.0,
            green_clear: 0.0,
            blue_clear: 0.0,
            alpha_clear: 1.0,
            depth_clear: 1.0,
            vertex_shader: String::new(),
            geometry_shader: String::new(),
            fragment_shader: String::new(),
            variable_names: Vec::new(),
            variable_kinds: Vec::new(),
            topology: Topology::default(),
            device: DeviceInit::default(),
        }
    }
}

impl RasterizeOpConfig {
    /// Config with an output resolution and nothing else set.
    pub fn with_resolution(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            ..Self::default()
        }
    }

    /// Adds one declared variable.
    pub fn variable(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.variable_names.push(name.into());
        self.variable_kinds.push(kind.into());
        self
    }

    pub fn shaders(
        mut self,
        vertex: impl Into<String>,
        geometry: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        self.vertex_shader = vertex.into();
        self.geometry_shader = geometry.into();
        self.fragment_shader = fragment.into();
        self
    }

    /// Parses the declared variables, rejecting malformed attribute lists.
    pub fn declarations(&self) -> Result<Vec<VariableDecl>, RasterError> {
        VariableDecl::from_lists(&self.variable_names, &self.variable_kinds)
    }

    /// The per-context configuration every pooled rasterizer is built from.
    pub fn rasterizer_config(&self) -> RasterizerConfig {
        RasterizerConfig {
            width: self.width,
            height: self.height,
            clear: ClearValues {
                color: [self.red_clear, self.green_clear, self.blue_clear, self.alpha_clear],
                depth: self.depth_clear,
            },
            program: ShaderProgram {
                vertex: self.vertex_shader.clone(),
                geometry: self.geometry_shader.clone(),
                fragment: self.fragment_shader.clone(),
            },
            topology: self.topology,
        }
    }
}
