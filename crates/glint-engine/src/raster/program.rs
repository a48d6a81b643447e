//! Shader program compilation and reflection.
//!
//! Stages are parsed and validated with naga before anything touches the GPU,
//! so malformed programs surface as `RasterError::Shader` instead of a device
//! validation panic. Reflection collects the named buffer bindings the batch
//! coordinator can address.

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

use crate::error::RasterError;

use super::ShaderProgram;

/// How a storage binding's byte size is constrained.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum StorageLayout {
    /// Fixed-size type; uploads must match `size` exactly.
    Fixed { size: u64 },
    /// Ends in a runtime-sized array: `head` fixed bytes, then whole `stride` elements.
    RuntimeArray { head: u64, stride: u64 },
}

impl StorageLayout {
    /// Smallest byte size a bound buffer may have.
    pub(crate) fn min_size(self) -> u64 {
        match self {
            StorageLayout::Fixed { size } => size,
            StorageLayout::RuntimeArray { head, stride } => head + stride,
        }
    }

    pub(crate) fn accepts(self, bytes: u64) -> bool {
        match self {
            StorageLayout::Fixed { size } => bytes == size,
            StorageLayout::RuntimeArray { head, stride } => {
                bytes >= head + stride && (bytes - head) % stride == 0
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum SlotKind {
    /// `var<uniform>`; `matrix` is `(columns, rows)` when the type is `matCxR<f32>`.
    Uniform { size: u64, matrix: Option<(usize, usize)> },
    /// `var<storage>`.
    Storage { read_only: bool, layout: StorageLayout },
}

/// One named buffer binding of the program.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BindingSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: SlotKind,
    pub visibility: wgpu::ShaderStages,
}

/// A validated stage: its source and the entry point to run.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStage {
    pub source: String,
    pub entry_point: String,
}

/// A parsed stage kept around for reflection.
struct StageModule {
    module: naga::Module,
    info: ModuleInfo,
    /// Index of the stage's entry point in `module.entry_points`.
    entry_index: usize,
}

impl StageModule {
    /// Whether the stage's entry point reads or writes `var`.
    fn uses(&self, var: naga::Handle<naga::GlobalVariable>) -> bool {
        !self.info.get_entry_point(self.entry_index)[var].is_empty()
    }
}

/// Result of compiling and reflecting a [`ShaderProgram`].
#[derive(Debug, Clone)]
pub(crate) struct ReflectedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    pub slots: Vec<BindingSlot>,
}

impl ReflectedProgram {
    pub(crate) fn compile(program: &ShaderProgram) -> Result<Self, RasterError> {
        if program.has_geometry_stage() {
            return Err(RasterError::Config(
                "geometry stage is not supported by the wgpu backend; \
                 expand primitives in the vertex stage"
                    .into(),
            ));
        }

        let (vertex, vs_stage) = compile_stage("vertex", &program.vertex, naga::ShaderStage::Vertex)?;
        let (fragment, fs_stage) =
            compile_stage("fragment", &program.fragment, naga::ShaderStage::Fragment)?;

        let mut slots = Vec::new();
        for slot in reflect_slots("vertex", &vs_stage, wgpu::ShaderStages::VERTEX)? {
            merge_slot(&mut slots, slot)?;
        }
        for slot in reflect_slots("fragment", &fs_stage, wgpu::ShaderStages::FRAGMENT)? {
            merge_slot(&mut slots, slot)?;
        }

        Ok(Self {
            vertex,
            fragment,
            slots,
        })
    }

    pub(crate) fn slot(&self, name: &str) -> Option<(usize, &BindingSlot)> {
        self.slots.iter().enumerate().find(|(_, s)| s.name == name)
    }

    /// Number of bind groups the pipeline layout needs (gaps included).
    pub(crate) fn group_count(&self) -> u32 {
        self.slots.iter().map(|s| s.group + 1).max().unwrap_or(0)
    }
}

fn compile_stage(
    label: &str,
    source: &str,
    stage: naga::ShaderStage,
) -> Result<(CompiledStage, StageModule), RasterError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        RasterError::Shader(format!("{label} shader: {}", e.emit_to_string(source)))
    })?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| RasterError::Shader(format!("{label} shader failed validation: {e}")))?;

    let mut entries = module
        .entry_points
        .iter()
        .enumerate()
        .filter(|(_, ep)| ep.stage == stage);
    let (entry_index, entry_point) = match (entries.next(), entries.next()) {
        (Some((index, ep)), None) => (index, ep.name.clone()),
        (None, _) => {
            return Err(RasterError::Shader(format!(
                "{label} shader has no @{label} entry point"
            )));
        }
        (Some(_), Some(_)) => {
            return Err(RasterError::Shader(format!(
                "{label} shader has more than one @{label} entry point"
            )));
        }
    };

    let compiled = CompiledStage {
        source: source.to_owned(),
        entry_point,
    };
    let stage_module = StageModule {
        module,
        info,
        entry_index,
    };
    Ok((compiled, stage_module))
}

/// Collects the buffer bindings a stage's module declares.
///
/// Globals the entry point never touches are still reflected, so a source
/// shared between stages keeps every variable addressable, but they add no
/// visibility and skip the vertex-stage write check.
fn reflect_slots(
    label: &str,
    stage_module: &StageModule,
    stage: wgpu::ShaderStages,
) -> Result<Vec<BindingSlot>, RasterError> {
    let module = &stage_module.module;
    let mut layouter = naga::proc::Layouter::default();
    layouter
        .update(module.to_ctx())
        .map_err(|e| RasterError::Shader(format!("{label} shader layout: {e}")))?;

    let mut slots = Vec::new();
    for (handle, var) in module.global_variables.iter() {
        let (Some(name), Some(rb)) = (var.name.as_ref(), var.binding.as_ref()) else {
            continue;
        };
        let visibility = if stage_module.uses(handle) {
            stage
        } else {
            wgpu::ShaderStages::NONE
        };
        let inner = &module.types[var.ty].inner;
        let size = u64::from(layouter[var.ty].size);

        let kind = match var.space {
            naga::AddressSpace::Uniform => SlotKind::Uniform {
                size: size.next_multiple_of(16),
                matrix: matrix_dims(inner),
            },
            naga::AddressSpace::Storage { access } => {
                let read_only = !access.contains(naga::StorageAccess::STORE);
                if visibility == wgpu::ShaderStages::VERTEX && !read_only {
                    return Err(RasterError::Shader(format!(
                        "storage buffer '{name}' is writable in the vertex stage; \
                         declare it var<storage, read>"
                    )));
                }
                SlotKind::Storage {
                    read_only,
                    layout: storage_layout(module, inner, size),
                }
            }
            _ => {
                return Err(RasterError::Shader(format!(
                    "'{name}' at @group({}) @binding({}) is not a uniform or storage buffer",
                    rb.group, rb.binding
                )));
            }
        };

        slots.push(BindingSlot {
            name: name.clone(),
            group: rb.group,
            binding: rb.binding,
            kind,
            visibility,
        });
    }
    Ok(slots)
}

fn matrix_dims(inner: &naga::TypeInner) -> Option<(usize, usize)> {
    match *inner {
        naga::TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if scalar == naga::Scalar::F32 => Some((columns as usize, rows as usize)),
        _ => None,
    }
}

fn storage_layout(module: &naga::Module, inner: &naga::TypeInner, size: u64) -> StorageLayout {
    match *inner {
        naga::TypeInner::Array {
            size: naga::ArraySize::Dynamic,
            stride,
            ..
        } => StorageLayout::RuntimeArray {
            head: 0,
            stride: u64::from(stride),
        },
        naga::TypeInner::Struct { ref members, .. } => {
            let tail = members.last().map(|m| (m.offset, &module.types[m.ty].inner));
            match tail {
                Some((
                    offset,
                    &naga::TypeInner::Array {
                        size: naga::ArraySize::Dynamic,
                        stride,
                        ..
                    },
                )) => StorageLayout::RuntimeArray {
                    head: u64::from(offset),
                    stride: u64::from(stride),
                },
                _ => StorageLayout::Fixed { size },
            }
        }
        _ => StorageLayout::Fixed { size },
    }
}

/// Adds `slot`, or widens the visibility of an existing declaration of the same name.
fn merge_slot(slots: &mut Vec<BindingSlot>, slot: BindingSlot) -> Result<(), RasterError> {
    if let Some(existing) = slots.iter_mut().find(|s| s.name == slot.name) {
        if (existing.group, existing.binding, existing.kind) != (slot.group, slot.binding, slot.kind) {
            return Err(RasterError::Shader(format!(
                "'{}' is declared differently in the vertex and fragment stages",
                slot.name
            )));
        }
        existing.visibility |= slot.visibility;
        return Ok(());
    }

    if let Some(clash) = slots
        .iter()
        .find(|s| s.group == slot.group && s.binding == slot.binding)
    {
        return Err(RasterError::Shader(format!(
            "'{}' and '{}' share @group({}) @binding({})",
            clash.name, slot.name, slot.group, slot.binding
        )));
    }

    slots.push(slot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHADER: &str = r#"
struct Params {
    tint: vec4<f32>,
    points: array<vec4<f32>>,
}

@group(0) @binding(0) var<uniform> view: mat4x4<f32>;
@group(0) @binding(1) var<storage, read> verts: array<f32>;
@group(1) @binding(0) var<storage, read> params: Params;
@group(1) @binding(1) var<uniform> offset: mat3x2<f32>;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    let p = vec4<f32>(verts[i * 2u], verts[i * 2u + 1u], 0.0, 1.0);
    return view * p + params.points[0] * 0.0 + vec4<f32>(offset[0], 0.0, 0.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return params.tint;
}
"#;

    fn program() -> ShaderProgram {
        ShaderProgram::new(SHADER, SHADER)
    }

    // ── compile ───────────────────────────────────────────────────────────

    #[test]
    fn entry_points_are_found_per_stage() {
        let p = ReflectedProgram::compile(&program()).unwrap();
        assert_eq!(p.vertex.entry_point, "vs_main");
        assert_eq!(p.fragment.entry_point, "fs_main");
    }

    #[test]
    fn parse_error_is_shader_error() {
        let err = ReflectedProgram::compile(&ShaderProgram::new("fn (", SHADER)).unwrap_err();
        assert!(matches!(err, RasterError::Shader(_)));
        assert!(err.to_string().contains("vertex shader"));
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let fs_only = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = ReflectedProgram::compile(&ShaderProgram::new(fs_only, fs_only)).unwrap_err();
        assert!(err.to_string().contains("no @vertex entry point"));
    }

    #[test]
    fn geometry_stage_is_rejected() {
        let err = ReflectedProgram::compile(&program().with_geometry("gs")).unwrap_err();
        assert!(matches!(err, RasterError::Config(_)));
    }

    // ── reflection ────────────────────────────────────────────────────────

    #[test]
    fn uniform_matrix_is_reflected() {
        let p = ReflectedProgram::compile(&program()).unwrap();
        let (_, view) = p.slot("view").unwrap();
        assert_eq!((view.group, view.binding), (0, 0));
        assert_eq!(
            view.kind,
            SlotKind::Uniform {
                size: 64,
                matrix: Some((4, 4))
            }
        );

        let (_, offset) = p.slot("offset").unwrap();
        assert_eq!(
            offset.kind,
            SlotKind::Uniform {
                size: 32,
                matrix: Some((3, 2))
            }
        );
    }

    #[test]
    fn runtime_arrays_are_reflected() {
        let p = ReflectedProgram::compile(&program()).unwrap();
        let (_, verts) = p.slot("verts").unwrap();
        assert_eq!(
            verts.kind,
            SlotKind::Storage {
                read_only: true,
                layout: StorageLayout::RuntimeArray { head: 0, stride: 4 }
            }
        );

        let (_, params) = p.slot("params").unwrap();
        assert_eq!(
            params.kind,
            SlotKind::Storage {
                read_only: true,
                layout: StorageLayout::RuntimeArray { head: 16, stride: 16 }
            }
        );
    }

    #[test]
    fn shared_module_merges_visibility() {
        let p = ReflectedProgram::compile(&program()).unwrap();
        assert_eq!(p.slots.len(), 4);
        let (_, params) = p.slot("params").unwrap();
        assert_eq!(
            params.visibility,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT
        );
        assert_eq!(p.group_count(), 2);
    }

    #[test]
    fn visibility_follows_entry_point_usage() {
        let p = ReflectedProgram::compile(&program()).unwrap();
        let (_, view) = p.slot("view").unwrap();
        assert_eq!(view.visibility, wgpu::ShaderStages::VERTEX);
    }

    #[test]
    fn fragment_only_writable_storage_in_shared_source_is_accepted() {
        let src = r#"
@group(0) @binding(0) var<storage, read_write> scratch: array<f32>;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    scratch[0] = 1.0;
    return vec4<f32>(1.0);
}
"#;
        let p = ReflectedProgram::compile(&ShaderProgram::new(src, src)).unwrap();
        let (_, scratch) = p.slot("scratch").unwrap();
        assert_eq!(scratch.visibility, wgpu::ShaderStages::FRAGMENT);
        assert!(matches!(scratch.kind, SlotKind::Storage { read_only: false, .. }));
    }

    #[test]
    fn writable_storage_used_by_vertex_stage_is_rejected() {
        let src = r#"
@group(0) @binding(0) var<storage, read_write> scratch: array<f32>;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(scratch[i], 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
        let err = ReflectedProgram::compile(&ShaderProgram::new(src, src)).unwrap_err();
        assert!(err.to_string().contains("writable in the vertex stage"), "{err}");
    }

    #[test]
    fn textures_are_rejected() {
        let src = r#"
@group(0) @binding(0) var tex: texture_2d<f32>;
@vertex fn vs() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
@fragment fn fs() -> @location(0) vec4<f32> { return textureLoad(tex, vec2<i32>(0, 0), 0); }
"#;
        let err = ReflectedProgram::compile(&ShaderProgram::new(src, src)).unwrap_err();
        assert!(err.to_string().contains("'tex'"));
    }

    #[test]
    fn conflicting_declarations_are_rejected() {
        let vs = r#"
@group(0) @binding(0) var<uniform> m: mat4x4<f32>;
@vertex fn vs() -> @builtin(position) vec4<f32> { return m[0]; }
"#;
        let fs = r#"
@group(0) @binding(1) var<uniform> m: mat4x4<f32>;
@fragment fn fs() -> @location(0) vec4<f32> { return m[0]; }
"#;
        let err = ReflectedProgram::compile(&ShaderProgram::new(vs, fs)).unwrap_err();
        assert!(err.to_string().contains("declared differently"));
    }

    // ── storage layout ────────────────────────────────────────────────────

    #[test]
    fn storage_layout_size_rules() {
        let fixed = StorageLayout::Fixed { size: 32 };
        assert!(fixed.accepts(32));
        assert!(!fixed.accepts(28));

        let runtime = StorageLayout::RuntimeArray { head: 16, stride: 16 };
        assert_eq!(runtime.min_size(), 32);
        assert!(runtime.accepts(48));
        assert!(!runtime.accepts(16));
        assert!(!runtime.accepts(40));
    }
}
