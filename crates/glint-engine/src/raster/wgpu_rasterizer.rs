use std::sync::mpsc;

use crate::device::{DeviceInit, ErrorScope, GpuContext};
use crate::error::RasterError;
use crate::pool::PooledResource;

use super::matrix::pack_matrix;
use super::program::{BindingSlot, ReflectedProgram, SlotKind};
use super::readback::{copy_rows, padded_bytes_per_row};
use super::{ClearValues, Rasterizer, RasterizerConfig, Topology};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A binding slot together with the GPU buffer currently backing it.
struct BoundSlot {
    slot: BindingSlot,
    buffer: wgpu::Buffer,
}

/// Rasterizer backed by its own headless wgpu device.
///
/// Owns:
/// - the device/queue (one per rasterizer, never shared)
/// - the render pipeline built from the reflected program
/// - one buffer per uniform/storage binding
/// - float color + depth targets and a row-padded readback buffer
pub struct WgpuRasterizer {
    gpu: GpuContext,

    width: u32,
    height: u32,
    clear: ClearValues,

    program: ReflectedProgram,
    pipeline: wgpu::RenderPipeline,
    group_layouts: Vec<wgpu::BindGroupLayout>,

    /// Parallel to `program.slots`.
    slots: Vec<BoundSlot>,
    bind_groups: Vec<wgpu::BindGroup>,
    bind_groups_dirty: bool,

    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,

    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,

    /// Set once a draw, poll or readback map failed.
    corrupt: bool,
}

impl WgpuRasterizer {
    /// Compiles the program and creates a dedicated GPU context for it.
    ///
    /// The program is validated before the device is requested, so shader
    /// errors are reported without paying for context creation.
    pub fn new(config: &RasterizerConfig, init: &DeviceInit) -> Result<Self, RasterError> {
        config.validate()?;
        let program = ReflectedProgram::compile(&config.program)?;

        let gpu = GpuContext::new(init)?;
        let device = gpu.device();
        let limits = device.limits();

        let max_dim = limits.max_texture_dimension_2d;
        if config.width > max_dim || config.height > max_dim {
            return Err(RasterError::Config(format!(
                "output resolution {}x{} exceeds the device limit of {max_dim}",
                config.width, config.height
            )));
        }
        let padded_bytes_per_row = padded_bytes_per_row(config.width);
        let readback_size = u64::from(padded_bytes_per_row) * u64::from(config.height);
        if readback_size > limits.max_buffer_size {
            return Err(RasterError::Config(format!(
                "a {}x{} readback needs {readback_size} bytes, the device allows {}",
                config.width, config.height, limits.max_buffer_size
            )));
        }

        // naga checked each stage alone; the stage interface and the target
        // format are only checked here.
        let scope = ErrorScope::push(device);
        let (group_layouts, pipeline) = create_pipeline(device, &program, config.topology);
        scope
            .finish()
            .map_err(|e| RasterError::Shader(format!("render pipeline rejected: {e}")))?;

        let scope = ErrorScope::push(device);
        let slots: Vec<BoundSlot> = program
            .slots
            .iter()
            .map(|slot| BoundSlot {
                buffer: create_slot_buffer(device, slot, initial_size(slot)),
                slot: slot.clone(),
            })
            .collect();

        let extent = wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        };
        let color = create_target(
            device,
            "glint color target",
            extent,
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = create_target(
            device,
            "glint depth target",
            extent,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glint readback"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        scope
            .finish()
            .map_err(|e| RasterError::Device(format!("allocating render resources: {e}")))?;

        log::debug!(
            "rasterizer: {}x{} program with {} bindings in {} groups",
            config.width,
            config.height,
            program.slots.len(),
            group_layouts.len()
        );

        Ok(Self {
            gpu,
            width: config.width,
            height: config.height,
            clear: config.clear,
            program,
            pipeline,
            group_layouts,
            slots,
            bind_groups: Vec::new(),
            bind_groups_dirty: true,
            color,
            color_view,
            depth_view,
            readback,
            padded_bytes_per_row,
            corrupt: false,
        })
    }

    /// Returns the adapter this rasterizer renders on.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.gpu.adapter_info()
    }

    fn ensure_bind_groups(&mut self) {
        if !self.bind_groups_dirty {
            return;
        }
        let device = self.gpu.device();

        self.bind_groups = self
            .group_layouts
            .iter()
            .enumerate()
            .map(|(group, layout)| {
                let entries: Vec<wgpu::BindGroupEntry<'_>> = self
                    .slots
                    .iter()
                    .filter(|b| b.slot.group as usize == group)
                    .map(|b| wgpu::BindGroupEntry {
                        binding: b.slot.binding,
                        resource: b.buffer.as_entire_binding(),
                    })
                    .collect();

                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("glint bind group"),
                    layout,
                    entries: &entries,
                })
            })
            .collect();
        self.bind_groups_dirty = false;
    }

    fn encode_frame(&self, num_points: u32) -> wgpu::CommandBuffer {
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint frame encoder"),
            });

        // Render pass is dropped before the encoder is used for the copy.
        {
            let [r, g, b, a] = self.clear.color;
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint draw"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(r),
                            g: f64::from(g),
                            b: f64::from(b),
                            a: f64::from(a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear.depth),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            for (group, bind_group) in self.bind_groups.iter().enumerate() {
                rpass.set_bind_group(group as u32, bind_group, &[]);
            }
            if num_points > 0 {
                rpass.draw(0..num_points, 0..1);
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        encoder.finish()
    }

    /// Maps the readback buffer and copies the image out.
    ///
    /// Any failure here means the device is in an unknown state.
    fn read_image(&mut self, image: &mut [f32]) -> Result<(), RasterError> {
        let slice = self.readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });

        if let Err(err) = self.gpu.device().poll(wgpu::PollType::wait_indefinitely()) {
            self.corrupt = true;
            return Err(RasterError::Render(format!("device poll failed: {err}")));
        }
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.corrupt = true;
                return Err(RasterError::Render(format!("readback map failed: {err}")));
            }
            Err(_) => {
                self.corrupt = true;
                return Err(RasterError::Render("readback map was never completed".into()));
            }
        }

        {
            let mapped = slice.get_mapped_range();
            copy_rows(&mapped, self.padded_bytes_per_row, self.width, image);
        }
        self.readback.unmap();
        Ok(())
    }
}

impl PooledResource for WgpuRasterizer {
    fn is_corrupt(&self) -> bool {
        self.corrupt || self.gpu.is_faulted()
    }
}

impl Rasterizer for WgpuRasterizer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_uniform_matrix(
        &mut self,
        name: &str,
        cols: usize,
        rows: usize,
        transpose: bool,
        data: &[f32],
    ) -> Result<(), RasterError> {
        let Some((index, slot)) = self.program.slot(name) else {
            return Err(RasterError::Binding(format!(
                "'{name}' is not a uniform declared by the shader program"
            )));
        };
        match slot.kind {
            SlotKind::Uniform {
                matrix: Some((c, r)),
                ..
            } if (c, r) == (cols, rows) => {}
            SlotKind::Uniform {
                matrix: Some((c, r)),
                ..
            } => {
                return Err(RasterError::Binding(format!(
                    "uniform '{name}' is mat{c}x{r}<f32> but got a {rows}x{cols} matrix"
                )));
            }
            _ => {
                return Err(RasterError::Binding(format!(
                    "'{name}' is not a float matrix uniform"
                )));
            }
        }

        let packed = pack_matrix(cols, rows, transpose, data)?;
        let scope = ErrorScope::push(self.gpu.device());
        self.gpu
            .queue()
            .write_buffer(&self.slots[index].buffer, 0, bytemuck::cast_slice(&packed));
        scope
            .finish()
            .map_err(|e| RasterError::Binding(format!("uploading uniform '{name}': {e}")))
    }

    fn set_shader_storage_buffer(&mut self, name: &str, data: &[f32]) -> Result<(), RasterError> {
        let Some((index, slot)) = self.program.slot(name) else {
            return Err(RasterError::Binding(format!(
                "'{name}' is not a storage buffer declared by the shader program"
            )));
        };
        let SlotKind::Storage { layout, .. } = slot.kind else {
            return Err(RasterError::Binding(format!("'{name}' is not a storage buffer")));
        };

        let bytes = std::mem::size_of_val(data) as u64;
        if !layout.accepts(bytes) {
            return Err(RasterError::Binding(format!(
                "storage buffer '{name}' cannot hold {} floats",
                data.len()
            )));
        }

        let limit = storage_size_limit(&self.gpu.device().limits());
        if bytes > limit {
            return Err(RasterError::Binding(format!(
                "storage buffer '{name}' needs {bytes} bytes, the device allows {limit}"
            )));
        }

        // The old buffer stays bound until the upload is known to be good.
        let scope = ErrorScope::push(self.gpu.device());
        let bound = &mut self.slots[index];
        let replacement = (bound.buffer.size() != bytes)
            .then(|| create_slot_buffer(self.gpu.device(), &bound.slot, bytes));
        let target = replacement.as_ref().unwrap_or(&bound.buffer);
        self.gpu
            .queue()
            .write_buffer(target, 0, bytemuck::cast_slice(data));
        scope
            .finish()
            .map_err(|e| RasterError::Binding(format!("uploading storage buffer '{name}': {e}")))?;

        if let Some(buffer) = replacement {
            bound.buffer = buffer;
            self.bind_groups_dirty = true;
        }
        Ok(())
    }

    fn render(&mut self, num_points: u32, image: &mut [f32]) -> Result<(), RasterError> {
        if image.len() != self.image_len() {
            return Err(RasterError::Render(format!(
                "output slice holds {} floats, a {}x{} RGBA image needs {}",
                image.len(),
                self.width,
                self.height,
                self.image_len()
            )));
        }

        let scope = ErrorScope::push(self.gpu.device());
        self.ensure_bind_groups();
        let commands = self.encode_frame(num_points);
        self.gpu.queue().submit(std::iter::once(commands));
        if let Err(err) = scope.finish() {
            self.corrupt = true;
            return Err(RasterError::Render(format!("draw rejected by the device: {err}")));
        }
        self.read_image(image)
    }
}

fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::PointList => wgpu::PrimitiveTopology::PointList,
        Topology::LineList => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Builds the bind group layouts and the render pipeline for a program.
///
/// wgpu reports pipeline errors through the device, so callers wrap this in
/// an [`ErrorScope`].
fn create_pipeline(
    device: &wgpu::Device,
    program: &ReflectedProgram,
    topology: Topology,
) -> (Vec<wgpu::BindGroupLayout>, wgpu::RenderPipeline) {
    let vs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("glint vertex stage"),
        source: wgpu::ShaderSource::Wgsl(program.vertex.source.as_str().into()),
    });
    let fs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("glint fragment stage"),
        source: wgpu::ShaderSource::Wgsl(program.fragment.source.as_str().into()),
    });

    let group_layouts: Vec<wgpu::BindGroupLayout> = (0..program.group_count())
        .map(|group| create_group_layout(device, &program.slots, group))
        .collect();
    let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("glint pipeline layout"),
        bind_group_layouts: &layout_refs,
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("glint pipeline"),
        layout: Some(&pipeline_layout),

        vertex: wgpu::VertexState {
            module: &vs,
            entry_point: Some(program.vertex.entry_point.as_str()),
            compilation_options: Default::default(),
            // Vertices are pulled from storage buffers by vertex_index.
            buffers: &[],
        },

        fragment: Some(wgpu::FragmentState {
            module: &fs,
            entry_point: Some(program.fragment.entry_point.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                // Float32 targets are not blendable without an extra feature.
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(topology),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    });

    (group_layouts, pipeline)
}

fn create_group_layout(
    device: &wgpu::Device,
    slots: &[BindingSlot],
    group: u32,
) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = slots
        .iter()
        .filter(|s| s.group == group)
        .map(|s| wgpu::BindGroupLayoutEntry {
            binding: s.binding,
            visibility: s.visibility,
            ty: wgpu::BindingType::Buffer {
                ty: match s.kind {
                    SlotKind::Uniform { .. } => wgpu::BufferBindingType::Uniform,
                    SlotKind::Storage { read_only, .. } => {
                        wgpu::BufferBindingType::Storage { read_only }
                    }
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("glint bgl"),
        entries: &entries,
    })
}

/// Size of a slot's buffer before anything is uploaded.
fn initial_size(slot: &BindingSlot) -> u64 {
    match slot.kind {
        SlotKind::Uniform { size, .. } => size,
        SlotKind::Storage { layout, .. } => layout.min_size().next_multiple_of(4),
    }
}

/// Largest storage buffer a single binding may hold on this device.
fn storage_size_limit(limits: &wgpu::Limits) -> u64 {
    u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size)
}

fn create_slot_buffer(device: &wgpu::Device, slot: &BindingSlot, size: u64) -> wgpu::Buffer {
    let usage = match slot.kind {
        SlotKind::Uniform { .. } => wgpu::BufferUsages::UNIFORM,
        SlotKind::Storage { .. } => wgpu::BufferUsages::STORAGE,
    };
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(slot.name.as_str()),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}
