//! # Renderer
//!
//! Draws a [`Scene`] from one camera node in up to two passes:
//!
//! 1. **Shadow pass** (optional): depth-only render of shadow-casting
//!    triangle meshes from the first shadow-casting directional light, into
//!    an off-screen depth target.
//! 2. **Main pass**: every visible mesh in traversal order, with camera
//!    matrices, lights and, for materials that use it, the shadow map.
//!
//! The shadow pass is skipped, and shadows simply disappear, when shadows
//! are disabled or no light can cast them.

use cgmath::Matrix4;

use super::lights::{LightEnvironment, ShadowCaster};
use crate::error::Result;
use crate::gfx::device::{
    BlendMode, DepthTargetHandle, DrawUniforms, GpuDevice, PassDescriptor, PassTarget,
    ProgramHandle, RenderState, Topology,
};
use crate::gfx::scene::{Drawable, NodeId, Scene};
use crate::gfx::shaders;
use crate::gfx::transform::{self, Projection};

/// Env switch for per-frame shadow diagnostics at `info` level.
pub const SHADOW_DEBUG_ENV: &str = "LUMEN_SHADOW_DEBUG";

/// Orthographic light volume and depth comparison parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    /// Square depth-map side in texels, independent of the viewport.
    pub resolution: u32,
    /// left, right, bottom, top of the light's orthographic volume.
    pub bounds: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub bias: f32,
    /// 0 disables darkening, 1 is fully black.
    pub strength: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 512,
            bounds: [-5.0, 5.0, -5.0, 5.0],
            near: 0.0,
            far: 20.0,
            bias: 0.01,
            strength: 0.5,
        }
    }
}

impl ShadowConfig {
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    pub fn with_bounds(mut self, bounds: [f32; 4], near: f32, far: f32) -> Self {
        self.bounds = bounds;
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_bias(mut self, bias: f32) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    fn projection(&self) -> Matrix4<f32> {
        let [left, right, bottom, top] = self.bounds;
        Projection::orthographic(left, right, bottom, top, self.near, self.far).matrix()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    pub clear_color: [f32; 4],
    /// `None` renders without shadows.
    pub shadow: Option<ShadowConfig>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.2, 0.2, 0.2, 1.0],
            shadow: None,
        }
    }
}

impl RendererConfig {
    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_shadows(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = Some(shadow);
        self
    }
}

/// Per-call clearing, e.g. a HUD drawn over the main scene keeps its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub clear_color: bool,
    pub clear_depth: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            clear_color: true,
            clear_depth: true,
        }
    }
}

impl RenderOptions {
    /// Keeps the color buffer, clears depth.
    pub fn overlay() -> Self {
        Self {
            clear_color: false,
            clear_depth: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPhase {
    Idle,
    ShadowPass,
    MainPass,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub shadow_passes: u64,
    pub main_passes: u64,
    pub draw_calls: u64,
    pub shadow_draw_calls: u64,
}

/// Output of a shadow pass, consumed by the main pass.
#[derive(Debug, Clone, Copy)]
struct ShadowFrame {
    target: DepthTargetHandle,
    light_space: Matrix4<f32>,
    slot: usize,
    bias: f32,
    strength: f32,
}

#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    depth_program: Option<ProgramHandle>,
    shadow_target: Option<(DepthTargetHandle, u32)>,
    phase: RenderPhase,
    last_frame_phases: Vec<RenderPhase>,
    stats: RenderStats,
    shadow_debug: bool,
    warned_no_caster: bool,
}

impl Renderer {
    /// Shadow resources are created on the first frame that needs them.
    pub fn new(config: RendererConfig) -> Self {
        let shadow_debug = std::env::var_os(SHADOW_DEBUG_ENV).is_some();
        if shadow_debug {
            log::info!("{SHADOW_DEBUG_ENV} set; logging shadow pass details");
        }
        Self {
            config,
            depth_program: None,
            shadow_target: None,
            phase: RenderPhase::Idle,
            last_frame_phases: Vec::new(),
            stats: RenderStats::default(),
            shadow_debug,
            warned_no_caster: false,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_clear_color(&mut self, clear_color: [f32; 4]) {
        self.config.clear_color = clear_color;
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Passes executed by the last [`render`](Self::render) call.
    pub fn last_frame_phases(&self) -> &[RenderPhase] {
        &self.last_frame_phases
    }

    pub fn shadows_enabled(&self) -> bool {
        self.config.shadow.is_some()
    }

    pub fn enable_shadows(&mut self, shadow: ShadowConfig) {
        self.config.shadow = Some(shadow);
        self.warned_no_caster = false;
    }

    /// Frees the depth target; the depth program is kept for re-enabling.
    pub fn disable_shadows(&mut self, device: &mut dyn GpuDevice) {
        self.config.shadow = None;
        if let Some((target, _)) = self.shadow_target.take() {
            device.release_depth_target(target);
        }
    }

    /// Updates the camera's aspect ratio to the new viewport.
    pub fn resize(&mut self, scene: &mut Scene, camera: NodeId, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        scene
            .camera_mut(camera)?
            .set_aspect_ratio(width as f32 / height as f32);
        log::debug!("renderer resized to {width}x{height}");
        Ok(())
    }

    pub fn render(&mut self, device: &mut dyn GpuDevice, scene: &mut Scene, camera: NodeId) -> Result<()> {
        self.render_with(device, scene, camera, RenderOptions::default())
    }

    pub fn render_with(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &mut Scene,
        camera: NodeId,
        options: RenderOptions,
    ) -> Result<()> {
        let projection = scene.camera(camera)?.projection_matrix();
        let camera_world = scene.world_transform(camera)?;
        let view = transform::inverse(&camera_world);
        let camera_position: [f32; 3] = transform::position_of(&camera_world).into();

        let visible = scene.world_transforms();
        let lights = LightEnvironment::collect(scene, &visible);

        self.stats.frames += 1;
        self.last_frame_phases.clear();

        let shadow = match (self.config.shadow, lights.shadow_caster()) {
            (Some(config), Some(caster)) => {
                let caster = *caster;
                Some(self.shadow_pass(device, scene, &visible, &config, &caster)?)
            }
            (Some(_), None) => {
                if !self.warned_no_caster {
                    log::warn!("shadows enabled but no directional light casts them; skipping shadow pass");
                    self.warned_no_caster = true;
                }
                None
            }
            (None, _) => None,
        };

        self.phase = RenderPhase::MainPass;
        self.last_frame_phases.push(RenderPhase::MainPass);
        self.stats.main_passes += 1;
        device.begin_pass(&PassDescriptor {
            label: "main pass",
            target: PassTarget::Screen,
            clear_color: options.clear_color.then_some(self.config.clear_color),
            clear_depth: options.clear_depth.then_some(1.0),
        });

        let [ar, ag, ab] = lights.ambient();
        for (id, world) in &visible {
            let Some(mesh) = scene.node_mut(*id)?.as_mesh_mut() else {
                continue;
            };
            let Some(vertex_array) = mesh.vertex_array() else {
                log::warn!("mesh {id:?} has no vertex array; skipped");
                continue;
            };

            let mut uniforms = DrawUniforms::default();
            uniforms.set_camera(&view, &projection, camera_position);
            uniforms.set_model(world);
            uniforms.ambient = [ar, ag, ab, 1.0];
            mesh.material().apply_uniforms(&mut uniforms);
            let filled = lights.fill(&mut uniforms.lights, mesh.material().light_source_count());
            uniforms.flags[3] = filled as u32;

            let shadow_map = match shadow {
                Some(frame) if mesh.material().uses_shadow() => {
                    uniforms.light_space = transform::to_array(&frame.light_space);
                    uniforms.shadow = [frame.bias, frame.strength, 0.0, 0.0];
                    if frame.slot < filled {
                        uniforms.lights[frame.slot].direction[3] = 1.0;
                    }
                    Some(frame.target)
                }
                _ => {
                    uniforms.flags[2] = 0;
                    None
                }
            };

            let vertex_count = mesh.vertex_count();
            mesh.material_mut().activate(device);
            device.bind_shadow_map(shadow_map);
            device.draw(vertex_array, &uniforms, vertex_count);
            mesh.material_mut().deactivate(device);
            self.stats.draw_calls += 1;
        }

        device.bind_shadow_map(None);
        device.end_pass();
        self.phase = RenderPhase::Idle;
        Ok(())
    }

    fn shadow_resources(
        &mut self,
        device: &mut dyn GpuDevice,
        resolution: u32,
    ) -> Result<(ProgramHandle, DepthTargetHandle)> {
        let program = match self.depth_program {
            Some(program) => program,
            None => {
                let program = device.create_program(&shaders::depth_program())?;
                self.depth_program = Some(program);
                program
            }
        };
        let target = match self.shadow_target {
            Some((target, size)) if size == resolution => target,
            stale => {
                if let Some((target, _)) = stale {
                    device.release_depth_target(target);
                }
                let target = device.create_depth_target(resolution, resolution);
                log::debug!("created {resolution}x{resolution} shadow map");
                self.shadow_target = Some((target, resolution));
                target
            }
        };
        Ok((program, target))
    }

    fn shadow_pass(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &mut Scene,
        visible: &[(NodeId, Matrix4<f32>)],
        config: &ShadowConfig,
        caster: &ShadowCaster,
    ) -> Result<ShadowFrame> {
        let (program, target) = self.shadow_resources(device, config.resolution)?;
        self.phase = RenderPhase::ShadowPass;
        self.last_frame_phases.push(RenderPhase::ShadowPass);
        self.stats.shadow_passes += 1;

        let light_view = transform::inverse(&caster.world);
        let light_projection = config.projection();
        let light_space = light_projection * light_view;

        device.begin_pass(&PassDescriptor {
            label: "shadow pass",
            target: PassTarget::Depth(target),
            clear_color: None,
            clear_depth: Some(1.0),
        });
        device.use_program(Some(program));
        device.set_render_state(&RenderState {
            topology: Topology::Triangles,
            double_sided: true,
            blend: BlendMode::Opaque,
            ..RenderState::default()
        });
        device.bind_texture(None);
        device.bind_shadow_map(None);

        let mut casters = 0;
        for (id, world) in visible {
            let Some(mesh) = scene.node_mut(*id)?.as_mesh_mut() else {
                continue;
            };
            if !mesh.casts_shadow || mesh.topology() != Topology::Triangles {
                continue;
            }
            let vertex_array = mesh.shadow_vertex_array(device, program);
            let mut uniforms = DrawUniforms::default();
            uniforms.set_model(world);
            uniforms.view = transform::to_array(&light_view);
            uniforms.projection = transform::to_array(&light_projection);
            uniforms.light_space = transform::to_array(&light_space);
            device.draw(vertex_array, &uniforms, mesh.vertex_count());
            casters += 1;
        }
        device.use_program(None);
        device.end_pass();
        self.stats.shadow_draw_calls += casters;

        if self.shadow_debug {
            log::info!(
                "shadow pass: light {:?}, {casters} caster(s), light space {:?}",
                caster.node,
                transform::to_array(&light_space)
            );
        } else {
            log::trace!("shadow pass drew {casters} caster(s)");
        }

        Ok(ShadowFrame {
            target,
            light_space,
            slot: caster.slot,
            bias: config.bias,
            strength: config.strength,
        })
    }

    /// Frees renderer-owned GPU resources. Scene resources are released by
    /// [`Scene::teardown`].
    pub fn teardown(&mut self, device: &mut dyn GpuDevice) {
        if let Some((target, _)) = self.shadow_target.take() {
            device.release_depth_target(target);
        }
        if let Some(program) = self.depth_program.take() {
            device.release_program(program);
        }
        log::debug!(
            "renderer teardown after {} frame(s), {} draw call(s)",
            self.stats.frames,
            self.stats.draw_calls
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::{HeadlessDevice, RecordedPass};
    use crate::gfx::geometry::{box_geometry, plane};
    use crate::gfx::material::{Material, MaterialKind, SettingValue};
    use crate::gfx::scene::{Camera, Light, Mesh, Node, NodeKind, Positionable};

    fn mesh(device: &mut HeadlessDevice, kind: MaterialKind, settings: &[(&str, SettingValue)]) -> Mesh {
        let geometry = box_geometry(1.0, 1.0, 1.0).build(device);
        let material = Material::new(device, kind)
            .unwrap()
            .with_settings(settings)
            .unwrap();
        Mesh::new(device, geometry, material).unwrap()
    }

    fn camera(scene: &mut Scene) -> NodeId {
        let camera = scene.add_camera("camera", Camera::default());
        scene.node_mut(camera).unwrap().set_position([0.0, 1.0, 5.0]);
        camera
    }

    fn main_pass(passes: &[RecordedPass]) -> &RecordedPass {
        passes.iter().find(|p| p.descriptor.target == PassTarget::Screen).unwrap()
    }

    #[test]
    fn test_shadow_flag_only_toggles_shadow_pass() {
        let mut device = HeadlessDevice::default();
        let mut scene = Scene::new();
        let camera = camera(&mut scene);
        let sun = scene.add_directional_light([1.0; 3], [-1.0, -1.0, 0.0]);
        let unshadowed = mesh(&mut device, MaterialKind::Lambert, &[]);
        scene.add_mesh("box", unshadowed);
        let mut renderer = Renderer::new(RendererConfig::default().with_shadows(ShadowConfig::default()));

        renderer.render(&mut device, &mut scene, camera).unwrap();
        let with_shadow = device.take_passes();
        assert_eq!(renderer.last_frame_phases(), &[RenderPhase::ShadowPass, RenderPhase::MainPass]);
        assert_eq!(with_shadow.len(), 2);
        assert_eq!(with_shadow[0].draws.len(), 1);

        if let Some(light) = scene.node_mut(sun).unwrap().as_light_mut() {
            light.casts_shadow = false;
        }
        renderer.render(&mut device, &mut scene, camera).unwrap();
        let without_shadow = device.take_passes();
        assert_eq!(renderer.last_frame_phases(), &[RenderPhase::MainPass]);
        assert_eq!(without_shadow.len(), 1);
        assert_eq!(main_pass(&with_shadow), main_pass(&without_shadow));

        let stats = renderer.stats();
        assert_eq!((stats.frames, stats.shadow_passes, stats.main_passes), (2, 1, 2));
        assert_eq!(stats.shadow_draw_calls, 1);
        assert_eq!(renderer.phase(), RenderPhase::Idle);
    }

    #[test]
    fn test_shadowed_material_receives_shadow_map() {
        let mut device = HeadlessDevice::default();
        let mut scene = Scene::new();
        let camera = camera(&mut scene);
        scene.add_ambient_light([0.2; 3]);
        scene.add_directional_light([1.0; 3], [0.0, -1.0, 0.0]);
        let floor = plane(10.0, 10.0, 1, 1).build(&mut device);
        let material = Material::new(&mut device, MaterialKind::Phong)
            .unwrap()
            .with_settings(&[("use_shadow", true.into())])
            .unwrap();
        scene.add_mesh("floor", Mesh::new(&mut device, floor, material).unwrap());
        let mut renderer = Renderer::new(RendererConfig::default().with_shadows(ShadowConfig::default()));

        renderer.render(&mut device, &mut scene, camera).unwrap();
        let passes = device.take_passes();
        let PassTarget::Depth(target) = passes[0].descriptor.target else {
            panic!("first pass should render depth");
        };
        assert_eq!(device.depth_target_size(target), Some((512, 512)));

        let draw = &main_pass(&passes).draws[0];
        assert_eq!(draw.shadow_map, Some(target));
        assert_eq!(draw.uniforms.flags[2], 1);
        assert_eq!(draw.uniforms.lights[0].direction[3], 1.0);
        assert_eq!(draw.uniforms.shadow, [0.01, 0.5, 0.0, 0.0]);
        assert_eq!(draw.uniforms.ambient, [0.2, 0.2, 0.2, 1.0]);

        renderer.teardown(&mut device);
        scene.teardown(&mut device);
        assert_eq!(device.live_resources().total(), 0);
    }

    #[test]
    fn test_material_light_budget_ignores_extra_lights() {
        fn first_draw(extra_light: bool) -> DrawUniforms {
            let mut device = HeadlessDevice::default();
            let mut scene = Scene::new();
            let camera = camera(&mut scene);
            scene.add_ambient_light([0.1; 3]);
            scene.add_point_light([1.0, 0.0, 0.0], [2.0, 2.0, 0.0], [1.0, 0.0, 0.1]);
            if extra_light {
                scene.add_point_light([0.0, 1.0, 0.0], [-2.0, 2.0, 0.0], [1.0, 0.0, 0.1]);
            }
            let lit = mesh(&mut device, MaterialKind::Lambert, &[("number_of_light_sources", 1u32.into())]);
            scene.add_mesh("box", lit);
            let mut renderer = Renderer::new(RendererConfig::default());
            renderer.render(&mut device, &mut scene, camera).unwrap();
            let passes = device.take_passes();
            scene.teardown(&mut device);
            let uniforms = main_pass(&passes).draws[0].uniforms;
            uniforms
        }

        let both = first_draw(true);
        assert_eq!(both.light_count(), 1);
        assert_eq!(both.lights[0].color[0], 1.0);
        assert!(both.lights[1].is_empty());
        assert_eq!(both, first_draw(false));
    }

    #[test]
    fn test_no_caster_and_overlay_options() {
        let mut device = HeadlessDevice::default();
        let mut scene = Scene::new();
        let camera = camera(&mut scene);
        let point = Node::new("bulb", NodeKind::Light(Light::point([1.0; 3], [1.0, 0.0, 0.1])));
        scene.add(point);
        let mut renderer = Renderer::new(RendererConfig::default().with_shadows(ShadowConfig::default()));

        renderer
            .render_with(&mut device, &mut scene, camera, RenderOptions::overlay())
            .unwrap();
        let passes = device.take_passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].descriptor.clear_color, None);
        assert_eq!(passes[0].descriptor.clear_depth, Some(1.0));
        assert_eq!(renderer.stats().shadow_passes, 0);
    }

    #[test]
    fn test_hidden_meshes_and_non_casters_are_skipped() {
        let mut device = HeadlessDevice::default();
        let mut scene = Scene::new();
        let camera = camera(&mut scene);
        scene.add_directional_light([1.0; 3], [0.0, -1.0, 0.0]);
        let hidden = scene.add_mesh("hidden", mesh(&mut device, MaterialKind::Surface, &[]));
        scene.node_mut(hidden).unwrap().visible = false;
        let mut lines = mesh(&mut device, MaterialKind::Line, &[]);
        lines.casts_shadow = true;
        scene.add_mesh("lines", lines);
        let mut renderer = Renderer::new(RendererConfig::default().with_shadows(ShadowConfig::default()));

        renderer.render(&mut device, &mut scene, camera).unwrap();
        let passes = device.take_passes();
        assert!(passes[0].draws.is_empty());
        assert_eq!(main_pass(&passes).draws.len(), 1);
        assert_eq!(main_pass(&passes).draws[0].state.topology, Topology::LineStrip);

        renderer.disable_shadows(&mut device);
        renderer.render(&mut device, &mut scene, camera).unwrap();
        assert_eq!(device.take_passes().len(), 1);
        renderer.teardown(&mut device);
        scene.teardown(&mut device);
        assert_eq!(device.live_resources().total(), 0);
    }
}
