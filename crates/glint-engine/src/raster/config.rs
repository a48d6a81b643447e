use crate::error::RasterError;

/// Values the framebuffer is cleared to before every draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearValues {
    /// Linear RGBA.
    pub color: [f32; 4],
    pub depth: f32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
        }
    }
}

/// WGSL sources of the three program stages.
///
/// `vertex` and `fragment` may be the same source when one module carries both
/// entry points. An empty `geometry` means the stage is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderProgram {
    pub vertex: String,
    pub geometry: String,
    pub fragment: String,
}

impl ShaderProgram {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            geometry: String::new(),
            fragment: fragment.into(),
        }
    }

    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = geometry.into();
        self
    }

    pub fn has_geometry_stage(&self) -> bool {
        !self.geometry.trim().is_empty()
    }
}

/// How the drawn vertices are assembled into primitives.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Everything fixed at rasterizer construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizerConfig {
    pub width: u32,
    pub height: u32,
    pub clear: ClearValues,
    pub program: ShaderProgram,
    pub topology: Topology,
}

impl RasterizerConfig {
    pub fn new(width: u32, height: u32, program: ShaderProgram) -> Self {
        Self {
            width,
            height,
            clear: ClearValues::default(),
            program,
            topology: Topology::default(),
        }
    }

    /// Number of floats in one rendered RGBA image.
    pub fn image_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn validate(&self) -> Result<(), RasterError> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::Config(format!(
                "output resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}
