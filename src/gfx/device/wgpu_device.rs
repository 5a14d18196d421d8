//! wgpu backend for [`GpuDevice`]
//!
//! Commands are recorded during the frame and encoded in [`WgpuDevice::end_frame`]:
//! - render pipelines are created lazily and cached by program, render
//!   state, target kind and vertex layout
//! - per-draw uniforms are packed into one dynamic-offset uniform buffer and
//!   uploaded once before submission
//! - every attribute lives in its own vertex buffer slot; program inputs a
//!   vertex array leaves unbound read a shared zero attribute
//! - line loops are drawn as indexed line strips closing back to vertex 0

use std::collections::{BTreeMap, HashMap, HashSet};

use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use super::{
    BlendMode, BufferHandle, DepthTargetHandle, DeviceError, DrawUniforms, GpuDevice,
    PassDescriptor, PassTarget, ProgramHandle, RenderState, ShaderSource, TextureDescriptor,
    TextureFilter, TextureHandle, Topology, VertexArrayHandle, VertexFormat,
};
use crate::wgpu_utils::{binding_types, DynamicUniformBuffer, TextureResource};

const INITIAL_UNIFORM_BLOCKS: u64 = 256;
/// Large enough for the widest vertex format.
const ZERO_ATTRIBUTE_SIZE: u64 = 16;

struct GpuBuffer {
    label: String,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    len: u64,
}

struct GpuProgram {
    module: wgpu::ShaderModule,
    source: ShaderSource,
}

struct VertexArray {
    program: ProgramHandle,
    bindings: BTreeMap<u32, (BufferHandle, VertexFormat)>,
}

struct SampledTexture {
    resource: TextureResource,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InputLayout {
    location: u32,
    format: VertexFormat,
    bound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    depth_only: bool,
    topology: Topology,
    cull: bool,
    wireframe: bool,
    blend: BlendMode,
    depth_test: bool,
    depth_write: bool,
    inputs: Vec<InputLayout>,
}

struct DrawCommand {
    pipeline: usize,
    vertex_buffers: Vec<Option<BufferHandle>>,
    uniform_offset: u32,
    texture: Option<TextureHandle>,
    shadow_map: Option<DepthTargetHandle>,
    vertex_count: u32,
    line_loop: bool,
}

struct PassRecording {
    descriptor: PassDescriptor,
    draws: Vec<DrawCommand>,
}

struct BindingLayouts {
    uniforms: wgpu::BindGroupLayout,
    texture: wgpu::BindGroupLayout,
    shadow: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

/// Window-backed device. Call [`begin_frame`](Self::begin_frame) before
/// recording and [`end_frame`](Self::end_frame) to submit and present.
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    polygon_line: bool,
    layouts: BindingLayouts,
    draw_uniforms: DynamicUniformBuffer<DrawUniforms>,

    buffers: SlotMap<BufferHandle, GpuBuffer>,
    programs: SlotMap<ProgramHandle, GpuProgram>,
    vertex_arrays: SlotMap<VertexArrayHandle, VertexArray>,
    textures: SlotMap<TextureHandle, SampledTexture>,
    depth_targets: SlotMap<DepthTargetHandle, SampledTexture>,
    white_texture: SampledTexture,
    blank_shadow_map: SampledTexture,
    zero_attribute: wgpu::Buffer,

    pipeline_index: HashMap<PipelineKey, usize>,
    pipelines: Vec<Option<wgpu::RenderPipeline>>,
    failed_pipelines: HashSet<PipelineKey>,
    loop_indices: HashMap<u32, wgpu::Buffer>,

    passes: Vec<PassRecording>,
    current: Option<PassRecording>,
    program: Option<ProgramHandle>,
    state: RenderState,
    texture: Option<TextureHandle>,
    shadow_map: Option<DepthTargetHandle>,
    warned_wide_lines: bool,
}

impl WgpuDevice {
    /// Creates the surface, adapter and device for `window`.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<WgpuDevice, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| DeviceError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| DeviceError::Adapter(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("using adapter '{}' ({:?})", info.name, info.backend);

        // Wireframe materials need line polygon mode; without it they fill.
        let polygon_line = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        if !polygon_line {
            log::warn!("adapter lacks POLYGON_MODE_LINE; wireframe surfaces render filled");
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: if polygon_line {
                    wgpu::Features::POLYGON_MODE_LINE
                } else {
                    wgpu::Features::empty()
                },
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| DeviceError::RequestDevice(e.to_string()))?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| DeviceError::Surface("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureResource::create_depth_texture(&device, config.width, config.height, "depth_texture");
        let layouts = create_layouts(&device);
        let draw_uniforms =
            DynamicUniformBuffer::new(&device, &layouts.uniforms, INITIAL_UNIFORM_BLOCKS);

        let white = TextureResource::create_from_rgba_data(
            &device,
            &queue,
            &[255, 255, 255, 255],
            1,
            1,
            "white texture",
            wgpu::FilterMode::Nearest,
            true,
        );
        let white_texture = sampled(&device, &layouts.texture, white, "white texture");
        let blank = TextureResource::create_depth_texture(&device, 1, 1, "blank shadow map");
        let blank_shadow_map = sampled(&device, &layouts.shadow, blank, "blank shadow map");

        let zero_attribute = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zero attribute"),
            size: ZERO_ATTRIBUTE_SIZE,
            usage: wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            polygon_line,
            layouts,
            draw_uniforms,
            buffers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            depth_targets: SlotMap::with_key(),
            white_texture,
            blank_shadow_map,
            zero_attribute,
            pipeline_index: HashMap::new(),
            pipelines: Vec::new(),
            failed_pipelines: HashSet::new(),
            loop_indices: HashMap::new(),
            passes: Vec::new(),
            current: None,
            program: None,
            state: RenderState::default(),
            texture: None,
            shadow_map: None,
            warned_wide_lines: false,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, width, height, "depth_texture");
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        self.surface.configure(&self.device, &self.config);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Drops any recording left over from an aborted frame.
    pub fn begin_frame(&mut self) {
        if !self.passes.is_empty() || self.current.is_some() {
            log::warn!("discarding {} unsubmitted passes", self.passes.len());
        }
        self.passes.clear();
        self.current = None;
        self.draw_uniforms.discard();
    }

    /// Encodes every recorded pass, submits and presents.
    pub fn end_frame(&mut self) -> Result<(), DeviceError> {
        if let Some(open) = self.current.take() {
            log::warn!("pass '{}' was not ended before end_frame", open.descriptor.label);
            self.passes.push(open);
        }
        let passes = std::mem::take(&mut self.passes);

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.draw_uniforms.discard();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout; frame dropped");
                self.draw_uniforms.discard();
                return Ok(());
            }
            Err(e) => return Err(DeviceError::Surface(e.to_string())),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.draw_uniforms
            .upload(&self.device, &self.queue, &self.layouts.uniforms);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        for pass in &passes {
            self.encode_pass(&mut encoder, &view, pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        pass: &PassRecording,
    ) {
        let depth_ops = wgpu::Operations {
            load: match pass.descriptor.clear_depth {
                Some(depth) => wgpu::LoadOp::Clear(depth),
                None => wgpu::LoadOp::Load,
            },
            store: wgpu::StoreOp::Store,
        };

        match pass.descriptor.target {
            PassTarget::Screen => {
                let load = match pass.descriptor.clear_color {
                    Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: a as f64,
                    }),
                    None => wgpu::LoadOp::Load,
                };
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(pass.descriptor.label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: surface_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth_texture.view,
                        depth_ops: Some(depth_ops),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                self.replay(&mut render_pass, &pass.draws);
            }
            PassTarget::Depth(target) => {
                let Some(target) = self.depth_targets.get(target) else {
                    log::warn!("pass '{}' targets a released depth target", pass.descriptor.label);
                    return;
                };
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(pass.descriptor.label),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target.resource.view,
                        depth_ops: Some(depth_ops),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                self.replay(&mut render_pass, &pass.draws);
            }
        }
    }

    fn replay(&self, render_pass: &mut wgpu::RenderPass<'_>, draws: &[DrawCommand]) {
        for draw in draws {
            let Some(Some(pipeline)) = self.pipelines.get(draw.pipeline) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, self.draw_uniforms.bind_group(), &[draw.uniform_offset]);

            let texture = draw
                .texture
                .and_then(|handle| self.textures.get(handle))
                .unwrap_or(&self.white_texture);
            render_pass.set_bind_group(1, &texture.bind_group, &[]);
            let shadow = draw
                .shadow_map
                .and_then(|handle| self.depth_targets.get(handle))
                .unwrap_or(&self.blank_shadow_map);
            render_pass.set_bind_group(2, &shadow.bind_group, &[]);

            for (slot, handle) in draw.vertex_buffers.iter().enumerate() {
                let buffer = handle
                    .and_then(|handle| self.buffers.get(handle))
                    .and_then(|buffer| buffer.buffer.as_ref())
                    .unwrap_or(&self.zero_attribute);
                render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }

            match self.loop_indices.get(&draw.vertex_count) {
                Some(indices) if draw.line_loop => {
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..draw.vertex_count + 1, 0, 0..1);
                }
                _ => render_pass.draw(0..draw.vertex_count, 0..1),
            }
        }
    }

    fn pipeline_for(&mut self, key: PipelineKey) -> Option<usize> {
        if let Some(&index) = self.pipeline_index.get(&key) {
            return Some(index);
        }
        if self.failed_pipelines.contains(&key) {
            return None;
        }
        let program = self.programs.get(key.program)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = build_pipeline(
            &self.device,
            &self.layouts.pipeline,
            self.config.format,
            self.polygon_line,
            &key,
            program,
        );
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!(
                "pipeline for program '{}' rejected: {}",
                program.source.label,
                error
            );
            self.failed_pipelines.insert(key);
            return None;
        }

        log::debug!(
            "created pipeline #{} for program '{}' ({:?})",
            self.pipelines.len(),
            program.source.label,
            key.topology
        );
        let index = self.pipelines.len();
        self.pipelines.push(Some(pipeline));
        self.pipeline_index.insert(key, index);
        Some(index)
    }

    fn ensure_loop_indices(&mut self, vertex_count: u32) {
        if self.loop_indices.contains_key(&vertex_count) {
            return;
        }
        let indices: Vec<u32> = (0..vertex_count).chain(std::iter::once(0)).collect();
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("line loop indices"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.loop_indices.insert(vertex_count, buffer);
    }
}

fn create_layouts(device: &wgpu::Device) -> BindingLayouts {
    let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("draw uniforms layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: binding_types::uniform_dynamic(Some(
                DynamicUniformBuffer::<DrawUniforms>::binding_size(),
            )),
            count: None,
        }],
    });
    let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("material texture layout"),
        entries: &[
            binding_types::fragment_entry(0, binding_types::texture_2d()),
            binding_types::fragment_entry(
                1,
                binding_types::sampler(wgpu::SamplerBindingType::Filtering),
            ),
        ],
    });
    let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("shadow map layout"),
        entries: &[
            binding_types::fragment_entry(0, binding_types::texture_depth_2d()),
            binding_types::fragment_entry(
                1,
                binding_types::sampler(wgpu::SamplerBindingType::Comparison),
            ),
        ],
    });
    let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene pipeline layout"),
        bind_group_layouts: &[&uniforms, &texture, &shadow],
        push_constant_ranges: &[],
    });

    BindingLayouts {
        uniforms,
        texture,
        shadow,
        pipeline,
    }
}

fn sampled(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    resource: TextureResource,
    label: &str,
) -> SampledTexture {
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&resource.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&resource.sampler),
            },
        ],
    });
    SampledTexture {
        resource,
        bind_group,
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    polygon_line: bool,
    key: &PipelineKey,
    program: &GpuProgram,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
        .inputs
        .iter()
        .map(|input| {
            [wgpu::VertexAttribute {
                format: input.format.to_wgpu(),
                offset: 0,
                shader_location: input.location,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = key
        .inputs
        .iter()
        .zip(&attributes)
        .map(|(input, attribute)| wgpu::VertexBufferLayout {
            array_stride: input.format.byte_size(),
            // unbound inputs read element 0 of the zero attribute
            step_mode: if input.bound {
                wgpu::VertexStepMode::Vertex
            } else {
                wgpu::VertexStepMode::Instance
            },
            attributes: attribute,
        })
        .collect();

    let topology = match key.topology {
        Topology::Points => wgpu::PrimitiveTopology::PointList,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip | Topology::LineLoop => wgpu::PrimitiveTopology::LineStrip,
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    };
    let strip_index_format = matches!(
        topology,
        wgpu::PrimitiveTopology::LineStrip | wgpu::PrimitiveTopology::TriangleStrip
    )
    .then_some(wgpu::IndexFormat::Uint32);

    let color_targets = [Some(wgpu::ColorTargetState {
        format,
        blend: Some(match key.blend {
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
        }),
        write_mask: wgpu::ColorWrites::ALL,
    })];
    let fragment = match (&program.source.fragment_entry, key.depth_only) {
        (Some(entry), false) => Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some(entry.as_ref()),
            targets: &color_targets,
            compilation_options: Default::default(),
        }),
        _ => None,
    };

    // Slope-scaled bias in the shadow pass; only valid for triangles.
    let bias = if key.depth_only && key.topology.is_triangles() {
        wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.source.label.as_ref()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some(program.source.vertex_entry.as_ref()),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment,
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if key.cull {
                Some(wgpu::Face::Back)
            } else {
                None
            },
            polygon_mode: if key.wireframe && polygon_line && key.topology.is_triangles() {
                wgpu::PolygonMode::Line
            } else {
                wgpu::PolygonMode::Fill
            },
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: TextureResource::DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias,
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(&mut self, label: &str) -> BufferHandle {
        self.buffers.insert(GpuBuffer {
            label: label.to_string(),
            buffer: None,
            capacity: 0,
            len: 0,
        })
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        let Some(slot) = self.buffers.get_mut(buffer) else {
            log::warn!("write to released buffer {:?}", buffer);
            return;
        };
        slot.len = data.len() as u64;
        if data.is_empty() {
            return;
        }

        let size = wgpu::util::align_to(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        if slot.buffer.is_none() || slot.capacity < size {
            slot.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&slot.label),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            slot.capacity = size;
        }
        if let Some(gpu_buffer) = slot.buffer.as_ref() {
            self.queue.write_buffer(gpu_buffer, 0, data);
        }
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(slot) = self.buffers.remove(buffer) {
            if let Some(gpu_buffer) = slot.buffer {
                gpu_buffer.destroy();
            }
        }
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, DeviceError> {
        source.validate()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.label.as_ref()),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DeviceError::ProgramCompilation {
                label: source.label.to_string(),
                message: error.to_string(),
            });
        }

        log::debug!("compiled program '{}'", source.label);
        Ok(self.programs.insert(GpuProgram {
            module,
            source: source.clone(),
        }))
    }

    fn release_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(program).is_none() {
            return;
        }
        let pipelines = &mut self.pipelines;
        self.pipeline_index.retain(|key, index| {
            if key.program == program {
                pipelines[*index] = None;
                false
            } else {
                true
            }
        });
        self.failed_pipelines.retain(|key| key.program != program);
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs
            .get(program)?
            .source
            .input(name)
            .map(|input| input.location)
    }

    fn create_vertex_array(&mut self, program: ProgramHandle) -> VertexArrayHandle {
        self.vertex_arrays.insert(VertexArray {
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
        let filter = match desc.filter {
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            TextureFilter::Linear => wgpu::FilterMode::Linear,
        };
        let resource = TextureResource::create_from_rgba_data(
            &self.device,
            &self.queue,
            desc.rgba,
            desc.width,
            desc.height,
            desc.label,
            filter,
            desc.repeat,
        );
        let texture = sampled(&self.device, &self.layouts.texture, resource, desc.label);
        self.textures.insert(texture)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(texture) = self.textures.remove(texture) {
            texture.resource.texture.destroy();
        }
    }

    fn create_depth_target(&mut self, width: u32, height: u32) -> DepthTargetHandle {
        let resource = TextureResource::create_depth_texture(&self.device, width, height, "shadow map");
        let target = sampled(&self.device, &self.layouts.shadow, resource, "shadow map");
        self.depth_targets.insert(target)
    }

    fn release_depth_target(&mut self, target: DepthTargetHandle) {
        if let Some(target) = self.depth_targets.remove(target) {
            target.resource.texture.destroy();
        }
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) {
        if let Some(open) = self.current.take() {
            log::warn!("pass '{}' was not ended before '{}'", open.descriptor.label, pass.label);
            self.passes.push(open);
        }
        self.current = Some(PassRecording {
            descriptor: pass.clone(),
            draws: Vec::new(),
        });
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.program = program;
    }

    fn set_render_state(&mut self, state: &RenderState) {
        if state.line_width > 1.0 && !self.warned_wide_lines {
            log::debug!("line width {} rasterizes at 1px on wgpu", state.line_width);
            self.warned_wide_lines = true;
        }
        self.state = *state;
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.texture = texture;
    }

    fn bind_shadow_map(&mut self, target: Option<DepthTargetHandle>) {
        self.shadow_map = target;
    }

    fn draw(&mut self, vertex_array: VertexArrayHandle, uniforms: &DrawUniforms, vertex_count: u32) {
        if vertex_count == 0 {
            return;
        }
        let Some(depth_only) = self
            .current
            .as_ref()
            .map(|pass| matches!(pass.descriptor.target, PassTarget::Depth(_)))
        else {
            log::warn!("draw outside of a pass ignored");
            return;
        };
        let Some(program) = self.program else {
            log::warn!("draw without a program ignored");
            return;
        };
        let (Some(record), Some(gpu_program)) =
            (self.vertex_arrays.get(vertex_array), self.programs.get(program))
        else {
            log::warn!("draw with a released vertex array or program ignored");
            return;
        };
        if record.program != program {
            log::debug!("vertex array was built for another program; binding by location");
        }

        let mut declared: Vec<_> = gpu_program.source.inputs.iter().collect();
        declared.sort_by_key(|input| input.location);

        let mut inputs = Vec::with_capacity(declared.len());
        let mut vertex_buffers = Vec::with_capacity(declared.len());
        for input in declared {
            let bound = record.bindings.get(&input.location).and_then(|&(buffer, format)| {
                let slot = self.buffers.get(buffer)?;
                let needed = format.byte_size() * vertex_count as u64;
                (slot.buffer.is_some() && slot.len >= needed).then_some((buffer, format))
            });
            match bound {
                Some((buffer, format)) => {
                    inputs.push(InputLayout {
                        location: input.location,
                        format,
                        bound: true,
                    });
                    vertex_buffers.push(Some(buffer));
                }
                None => {
                    if record.bindings.contains_key(&input.location) {
                        log::warn!(
                            "attribute '{}' holds fewer than {} vertices; reading zeros",
                            input.name,
                            vertex_count
                        );
                    }
                    inputs.push(InputLayout {
                        location: input.location,
                        format: input.format,
                        bound: false,
                    });
                    vertex_buffers.push(None);
                }
            }
        }

        let key = PipelineKey {
            program,
            depth_only,
            topology: self.state.topology,
            cull: !self.state.double_sided,
            wireframe: self.state.wireframe,
            blend: self.state.blend,
            depth_test: self.state.depth_test,
            depth_write: self.state.depth_write,
            inputs,
        };
        let Some(pipeline) = self.pipeline_for(key) else {
            return;
        };

        let line_loop = self.state.topology == Topology::LineLoop;
        if line_loop {
            self.ensure_loop_indices(vertex_count);
        }
        let uniform_offset = self.draw_uniforms.push(uniforms);
        let texture = self.texture;
        let shadow_map = self.shadow_map;
        if let Some(pass) = self.current.as_mut() {
            pass.draws.push(DrawCommand {
                pipeline,
                vertex_buffers,
                uniform_offset,
                texture,
                shadow_map,
                vertex_count,
                line_loop,
            });
        }
    }

    fn end_pass(&mut self) {
        if let Some(pass) = self.current.take() {
            self.passes.push(pass);
        }
    }
}
