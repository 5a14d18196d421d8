//! In-memory device
//!
//! Keeps every resource on the CPU and records passes and draws instead of
//! rasterizing them. Tests inspect the recording to check what the engine
//! asked the GPU to do.

use std::collections::BTreeMap;

use slotmap::SlotMap;

use super::{
    BufferHandle, DepthTargetHandle, DeviceError, DrawUniforms, GpuDevice, PassDescriptor,
    ProgramHandle, RenderState, ShaderSource, TextureDescriptor, TextureHandle,
    VertexArrayHandle, VertexFormat,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: Option<ProgramHandle>,
    pub vertex_array: VertexArrayHandle,
    pub state: RenderState,
    pub texture: Option<TextureHandle>,
    pub shadow_map: Option<DepthTargetHandle>,
    pub uniforms: DrawUniforms,
    pub vertex_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub descriptor: PassDescriptor,
    pub draws: Vec<RecordedDraw>,
}

/// Live resource totals, used to check teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub buffers: usize,
    pub programs: usize,
    pub vertex_arrays: usize,
    pub textures: usize,
    pub depth_targets: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.buffers + self.programs + self.vertex_arrays + self.textures + self.depth_targets
    }
}

#[derive(Debug)]
struct VertexArrayRecord {
    program: ProgramHandle,
    bindings: BTreeMap<u32, (BufferHandle, VertexFormat)>,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    viewport: (u32, u32),
    buffers: SlotMap<BufferHandle, Vec<u8>>,
    programs: SlotMap<ProgramHandle, ShaderSource>,
    vertex_arrays: SlotMap<VertexArrayHandle, VertexArrayRecord>,
    textures: SlotMap<TextureHandle, (u32, u32)>,
    depth_targets: SlotMap<DepthTargetHandle, (u32, u32)>,
    passes: Vec<RecordedPass>,
    current: Option<RecordedPass>,
    program: Option<ProgramHandle>,
    state: RenderState,
    texture: Option<TextureHandle>,
    shadow_map: Option<DepthTargetHandle>,
    writes: usize,
}

impl HeadlessDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            buffers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            depth_targets: SlotMap::with_key(),
            passes: Vec::new(),
            current: None,
            program: None,
            state: RenderState::default(),
            texture: None,
            shadow_map: None,
            writes: 0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    pub fn buffer_bytes(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer).map(Vec::as_slice)
    }

    /// Buffer contents reinterpreted as floats.
    pub fn buffer_floats(&self, buffer: BufferHandle) -> Vec<f32> {
        self.buffer_bytes(buffer)
            .map(bytemuck::pod_collect_to_vec::<u8, f32>)
            .unwrap_or_default()
    }

    /// Number of `write_buffer` calls so far.
    pub fn buffer_writes(&self) -> usize {
        self.writes
    }

    pub fn vertex_array_bindings(
        &self,
        vertex_array: VertexArrayHandle,
    ) -> Vec<(u32, BufferHandle, VertexFormat)> {
        self.vertex_arrays
            .get(vertex_array)
            .map(|record| {
                record
                    .bindings
                    .iter()
                    .map(|(location, (buffer, format))| (*location, *buffer, *format))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn vertex_array_program(&self, vertex_array: VertexArrayHandle) -> Option<ProgramHandle> {
        self.vertex_arrays.get(vertex_array).map(|record| record.program)
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(program).map(|source| source.label.as_ref())
    }

    pub fn depth_target_size(&self, target: DepthTargetHandle) -> Option<(u32, u32)> {
        self.depth_targets.get(target).copied()
    }

    pub fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    /// Drains the recording, typically once per simulated frame.
    pub fn take_passes(&mut self) -> Vec<RecordedPass> {
        std::mem::take(&mut self.passes)
    }

    pub fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            buffers: self.buffers.len(),
            programs: self.programs.len(),
            vertex_arrays: self.vertex_arrays.len(),
            textures: self.textures.len(),
            depth_targets: self.depth_targets.len(),
        }
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(&mut self, _label: &str) -> BufferHandle {
        self.buffers.insert(Vec::new())
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        match self.buffers.get_mut(buffer) {
            Some(storage) => {
                storage.clear();
                storage.extend_from_slice(data);
                self.writes += 1;
            }
            None => log::warn!("write to released buffer {:?}", buffer),
        }
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer);
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, DeviceError> {
        source.validate()?;
        if !source.wgsl.contains(source.vertex_entry.as_ref()) {
            return Err(DeviceError::ProgramCompilation {
                label: source.label.to_string(),
                message: format!("missing entry point '{}'", source.vertex_entry),
            });
        }
        Ok(self.programs.insert(source.clone()))
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(program);
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs
            .get(program)?
            .input(name)
            .map(|input| input.location)
    }

    fn create_vertex_array(&mut self, program: ProgramHandle) -> VertexArrayHandle {
        self.vertex_arrays.insert(VertexArrayRecord {
            program,
            bindings: BTreeMap::new(),
        })
    }

    fn bind_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        location: u32,
        buffer: BufferHandle,
        format: VertexFormat,
    ) {
        if let Some(record) = self.vertex_arrays.get_mut(vertex_array) {
            record.bindings.insert(location, (buffer, format));
        }
    }

    fn release_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(vertex_array);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        self.textures.insert((desc.width, desc.height))
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture);
    }

    fn create_depth_target(&mut self, width: u32, height: u32) -> DepthTargetHandle {
        self.depth_targets.insert((width, height))
    }

    fn release_depth_target(&mut self, target: DepthTargetHandle) {
        self.depth_targets.remove(target);
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) {
        if let Some(open) = self.current.take() {
            log::warn!("pass '{}' was not ended before '{}'", open.descriptor.label, pass.label);
            self.passes.push(open);
        }
        self.current = Some(RecordedPass {
            descriptor: pass.clone(),
            draws: Vec::new(),
        });
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.program = program;
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.state = *state;
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.texture = texture;
    }

    fn bind_shadow_map(&mut self, target: Option<DepthTargetHandle>) {
        self.shadow_map = target;
    }

    fn draw(&mut self, vertex_array: VertexArrayHandle, uniforms: &DrawUniforms, vertex_count: u32) {
        let Some(pass) = self.current.as_mut() else {
            log::warn!("draw outside of a pass ignored");
            return;
        };
        pass.draws.push(RecordedDraw {
            program: self.program,
            vertex_array,
            state: self.state,
            texture: self.texture,
            shadow_map: self.shadow_map,
            uniforms: *uniforms,
            vertex_count,
        });
    }

    fn end_pass(&mut self) {
        if let Some(pass) = self.current.take() {
            self.passes.push(pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::{PassTarget, Topology};

    fn program(device: &mut HeadlessDevice) -> ProgramHandle {
        let source = ShaderSource::new("test", "@vertex fn vs_main() {}")
            .with_input("position", 0, VertexFormat::Float32x3);
        device.create_program(&source).unwrap()
    }

    #[test]
    fn test_draws_capture_current_state() {
        let mut device = HeadlessDevice::default();
        let program = program(&mut device);
        let vao = device.create_vertex_array(program);

        device.begin_pass(&PassDescriptor {
            label: "main",
            target: PassTarget::Screen,
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
            clear_depth: Some(1.0),
        });
        device.use_program(Some(program));
        device.set_render_state(&RenderState {
            topology: Topology::Lines,
            ..RenderState::default()
        });
        device.draw(vao, &DrawUniforms::default(), 4);
        device.end_pass();

        let passes = device.take_passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].draws[0].program, Some(program));
        assert_eq!(passes[0].draws[0].state.topology, Topology::Lines);
        assert!(device.passes().is_empty());
    }

    #[test]
    fn test_missing_entry_point_fails_to_compile() {
        let mut device = HeadlessDevice::default();
        let source = ShaderSource::new("broken", "@fragment fn fs_main() {}");
        assert!(matches!(
            device.create_program(&source),
            Err(DeviceError::ProgramCompilation { .. })
        ));
    }

    #[test]
    fn test_release_drops_resources() {
        let mut device = HeadlessDevice::default();
        let program = program(&mut device);
        let buffer = device.create_buffer("b");
        device.write_buffer(buffer, bytemuck::cast_slice(&[1.0f32, 2.0, 3.0]));
        assert_eq!(device.buffer_floats(buffer), vec![1.0, 2.0, 3.0]);

        device.release_buffer(buffer);
        device.release_program(program);
        assert_eq!(device.live_resources().total(), 0);
    }
}
