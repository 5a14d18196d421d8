//! GPU device abstraction
//!
//! The scene, geometry and material layers never touch a graphics API
//! directly. They go through [`GpuDevice`], which hands out opaque handles
//! and accepts a small, GL-like command vocabulary: buffers, programs with
//! named inputs, vertex arrays, textures, depth targets, passes and draws.
//!
//! Two implementations ship with the crate:
//! - [`WgpuDevice`]: the real backend, presenting to a window surface
//! - [`HeadlessDevice`]: records everything in memory for tests and
//!   offscreen validation

use std::borrow::Cow;

mod headless;
mod uniforms;
mod wgpu_device;

pub use headless::{HeadlessDevice, RecordedDraw, RecordedPass, ResourceCounts};
pub use uniforms::{DrawUniforms, LightUniform, LIGHT_DIRECTIONAL, LIGHT_NONE, LIGHT_POINT, MAX_LIGHTS};
pub use wgpu_device::WgpuDevice;

slotmap::new_key_type! {
    /// Vertex data storage.
    pub struct BufferHandle;
    /// A compiled shader program.
    pub struct ProgramHandle;
    /// Association of buffers with one program's inputs.
    pub struct VertexArrayHandle;
    /// Sampled RGBA texture.
    pub struct TextureHandle;
    /// Off-screen depth target, sampleable after it has been rendered.
    pub struct DepthTargetHandle;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("shader program '{label}' failed to compile: {message}")]
    ProgramCompilation { label: String, message: String },

    #[error("shader program '{label}' declares input location {location} twice")]
    DuplicateInputLocation { label: String, location: u32 },

    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),

    #[error("failed to request GPU device: {0}")]
    RequestDevice(String),

    #[error("surface error: {0}")]
    Surface(String),
}

/// Per-vertex element layout. Integer attributes are widened to floats
/// before they reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn components(self) -> usize {
        match self {
            VertexFormat::Float32 => 1,
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 => 4,
        }
    }

    pub fn byte_size(self) -> u64 {
        (self.components() * std::mem::size_of::<f32>()) as u64
    }

    pub(crate) fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
}

impl Topology {
    pub fn is_triangles(self) -> bool {
        matches!(self, Topology::Triangles | Topology::TriangleStrip)
    }

    pub fn is_lines(self) -> bool {
        matches!(
            self,
            Topology::Lines | Topology::LineStrip | Topology::LineLoop
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    Alpha,
}

/// Fixed-function state applied to subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub topology: Topology,
    pub line_width: f32,
    pub point_size: f32,
    pub double_sided: bool,
    pub wireframe: bool,
    pub blend: BlendMode,
    /// Depth compare is always less-or-equal when enabled.
    pub depth_test: bool,
    pub depth_write: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            topology: Topology::Triangles,
            line_width: 1.0,
            point_size: 1.0,
            double_sided: false,
            wireframe: false,
            blend: BlendMode::Alpha,
            depth_test: true,
            depth_write: true,
        }
    }
}

/// One named vertex input declared by a program.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderInput {
    pub name: Cow<'static, str>,
    pub location: u32,
    pub format: VertexFormat,
}

/// Program description handed to [`GpuDevice::create_program`].
///
/// The WGSL source must declare `@location(n)` inputs matching `inputs` and
/// read its per-draw data from a [`DrawUniforms`] block at group 0, binding 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSource {
    pub label: Cow<'static, str>,
    pub wgsl: Cow<'static, str>,
    pub vertex_entry: Cow<'static, str>,
    /// `None` for depth-only programs.
    pub fragment_entry: Option<Cow<'static, str>>,
    pub inputs: Vec<ShaderInput>,
}

impl ShaderSource {
    pub fn new(label: impl Into<Cow<'static, str>>, wgsl: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            wgsl: wgsl.into(),
            vertex_entry: Cow::Borrowed("vs_main"),
            fragment_entry: Some(Cow::Borrowed("fs_main")),
            inputs: Vec::new(),
        }
    }

    pub fn with_input(
        mut self,
        name: impl Into<Cow<'static, str>>,
        location: u32,
        format: VertexFormat,
    ) -> Self {
        self.inputs.push(ShaderInput {
            name: name.into(),
            location,
            format,
        });
        self
    }

    pub fn without_fragment(mut self) -> Self {
        self.fragment_entry = None;
        self
    }

    pub fn input(&self, name: &str) -> Option<&ShaderInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Checks the declaration itself; source compilation is backend work.
    pub(crate) fn validate(&self) -> Result<(), DeviceError> {
        for (i, input) in self.inputs.iter().enumerate() {
            if self.inputs[..i].iter().any(|other| other.location == input.location) {
                return Err(DeviceError::DuplicateInputLocation {
                    label: self.label.to_string(),
                    location: input.location,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

/// RGBA8 texture contents.
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
    pub filter: TextureFilter,
    pub repeat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassTarget {
    /// The presented surface plus its depth buffer.
    Screen,
    /// Depth-only rendering into an off-screen target.
    Depth(DepthTargetHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub label: &'static str,
    pub target: PassTarget,
    /// `None` keeps the previous color contents.
    pub clear_color: Option<[f32; 4]>,
    /// `None` keeps the previous depth contents.
    pub clear_depth: Option<f32>,
}

/// Backend interface used by the engine core.
///
/// Draw state (`use_program`, `set_render_state`, the texture bindings) is
/// global and persists until changed, the way a GL context behaves.
pub trait GpuDevice {
    fn create_buffer(&mut self, label: &str) -> BufferHandle;
    /// Replaces the buffer contents.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]);
    fn release_buffer(&mut self, buffer: BufferHandle);

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, DeviceError>;
    fn release_program(&mut self, program: ProgramHandle);
    /// `None` when the program does not declare `name`.
    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    fn create_vertex_array(&mut self, program: ProgramHandle) -> VertexArrayHandle;
    fn bind_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        location: u32,
        buffer: BufferHandle,
        format: VertexFormat,
    );
    fn release_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle;
    fn release_texture(&mut self, texture: TextureHandle);
    fn create_depth_target(&mut self, width: u32, height: u32) -> DepthTargetHandle;
    fn release_depth_target(&mut self, target: DepthTargetHandle);

    fn viewport_size(&self) -> (u32, u32);

    fn begin_pass(&mut self, pass: &PassDescriptor);
    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn set_render_state(&mut self, state: &RenderState);
    fn bind_texture(&mut self, texture: Option<TextureHandle>);
    fn bind_shadow_map(&mut self, target: Option<DepthTargetHandle>);
    /// Draws `vertex_count` vertices with the current program and state.
    fn draw(&mut self, vertex_array: VertexArrayHandle, uniforms: &DrawUniforms, vertex_count: u32);
    fn end_pass(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_input_locations_are_rejected() {
        let source = ShaderSource::new("dup", "fn vs_main() {}")
            .with_input("position", 0, VertexFormat::Float32x3)
            .with_input("normal", 0, VertexFormat::Float32x3);
        assert_eq!(
            source.validate(),
            Err(DeviceError::DuplicateInputLocation {
                label: "dup".into(),
                location: 0
            })
        );
    }

    #[test]
    fn test_topology_families() {
        assert!(Topology::LineLoop.is_lines());
        assert!(Topology::TriangleStrip.is_triangles());
        assert!(!Topology::Points.is_lines() && !Topology::Points.is_triangles());
    }
}
