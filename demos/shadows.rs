//! # Shadows Demo
//!
//! Phong and Lambert objects on a checkered floor, lit by a directional light
//! that sweeps around the scene and casts shadows.
//!
//! Controls: W/A/S/D move, R/F up/down, Q/E turn, T/G look up/down,
//! Space toggles shadows, Escape quits. Set `LUMEN_SHADOW_DEBUG=1` for
//! per-frame shadow logging.

use lumen::assets::checkerboard_texture;
use lumen::gfx::device::TextureHandle;
use lumen::gfx::geometry::{box_geometry, plane, sphere};
use lumen::prelude::*;
use winit::keyboard::KeyCode;

struct ShadowsDemo {
    scene: Scene,
    renderer: Renderer,
    rig: Option<MovementRig>,
    camera: Option<NodeId>,
    sun: Option<NodeId>,
    texture: Option<TextureHandle>,
}

impl ShadowsDemo {
    fn new() -> Self {
        Self {
            scene: Scene::new(),
            renderer: Renderer::new(
                RendererConfig::default()
                    .with_clear_color([0.05, 0.05, 0.1, 1.0])
                    .with_shadows(ShadowConfig::default().with_resolution(2048)),
            ),
            rig: None,
            camera: None,
            sun: None,
            texture: None,
        }
    }

    fn add_lit(
        &mut self,
        device: &mut dyn GpuDevice,
        name: &str,
        data: GeometryData,
        material: Material,
        position: [f32; 3],
    ) -> anyhow::Result<NodeId> {
        let geometry = data.build(device);
        let node = self.scene.add_mesh(name, Mesh::new(device, geometry, material)?);
        self.scene.node_mut(node)?.set_position(position);
        Ok(node)
    }
}

impl Example for ShadowsDemo {
    fn initialize(&mut self, device: &mut dyn GpuDevice, (width, height): (u32, u32)) -> anyhow::Result<()> {
        let camera = self.scene.add_camera(
            "camera",
            Camera::perspective(60.0, width as f32 / height as f32, 0.1, 1000.0),
        );
        let rig = MovementRig::new(&mut self.scene)?.with_speed(2.0, 60.0);
        rig.attach(&mut self.scene, camera)?;
        rig.set_position(&mut self.scene, [0.0, 1.5, 6.0])?;

        self.scene.add_ambient_light([0.2, 0.2, 0.2]);
        let sun = self.scene.add_directional_light([0.8, 0.8, 0.8], [-1.0, -1.0, 0.0]);
        self.scene.node_mut(sun)?.set_position([2.0, 4.0, 0.0]);
        self.scene.node_mut(sun)?.set_direction([-1.0, -1.0, 0.0]);
        let light = *self
            .scene
            .node(sun)?
            .as_light()
            .ok_or_else(|| anyhow::anyhow!("sun is not a light"))?;
        let gizmo = helpers::directional_light_helper(device, &light)?;
        let gizmo = self.scene.add_mesh("sun gizmo", gizmo);
        self.scene.add_child(sun, gizmo)?;

        let texture = checkerboard_texture(device, 256, 8);
        self.texture = Some(texture);

        let mut floor_material = Material::new(device, MaterialKind::Phong)?.with_settings(&[
            ("use_shadow", true.into()),
            ("repeat_uv", [4.0f32, 4.0].into()),
        ])?;
        floor_material.set_texture(Some(texture))?;
        let floor = self.add_lit(device, "floor", plane(10.0, 10.0, 1, 1), floor_material, [0.0; 3])?;
        self.scene
            .node_mut(floor)?
            .rotate_x(-std::f32::consts::FRAC_PI_2, true);

        let red = Material::new(device, MaterialKind::Lambert)?.with_settings(&[
            ("base_color", [0.9f32, 0.3, 0.3].into()),
            ("use_shadow", true.into()),
        ])?;
        self.add_lit(device, "sphere", sphere(0.6, 16, 32), red, [-1.5, 0.6, 0.0])?;

        let blue = Material::new(device, MaterialKind::Phong)?.with_settings(&[
            ("base_color", [0.3f32, 0.4, 0.9].into()),
            ("use_shadow", true.into()),
            ("shininess", 64.0f32.into()),
        ])?;
        self.add_lit(device, "crate", box_geometry(1.0, 1.0, 1.0), blue, [1.5, 0.5, 0.0])?;

        let grid = helpers::grid_helper(device, 10.0, 10, [0.4; 3], [1.0; 3], 1.0)?;
        let grid = self.scene.add_mesh("grid", grid);
        self.scene.node_mut(grid)?.rotate_x(-std::f32::consts::FRAC_PI_2, true);
        self.scene.node_mut(grid)?.translate(0.0, 0.0, 0.01, true);

        self.rig = Some(rig);
        self.camera = Some(camera);
        self.sun = Some(sun);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) -> anyhow::Result<()> {
        let (Some(rig), Some(camera), Some(sun)) = (self.rig, self.camera, self.sun) else {
            anyhow::bail!("update called before initialize");
        };
        rig.update(&mut self.scene, frame.input, frame.delta_time)?;

        if frame.input.is_key_pressed(KeyCode::Space) {
            if self.renderer.shadows_enabled() {
                self.renderer.disable_shadows(frame.device);
                log::info!("shadows off");
            } else {
                self.renderer.enable_shadows(ShadowConfig::default().with_resolution(2048));
                log::info!("shadows on");
            }
        }

        let angle = frame.time as f32 * 0.5;
        let sun_node = self.scene.node_mut(sun)?;
        sun_node.set_position([4.0 * angle.cos(), 4.0, 4.0 * angle.sin()]);
        self.scene.look_at(sun, [0.0, 0.0, 0.0])?;

        self.renderer.render(frame.device, &mut self.scene, camera)?;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if let Some(camera) = self.camera {
            self.renderer.resize(&mut self.scene, camera, width, height)?;
        }
        Ok(())
    }

    fn shutdown(&mut self, device: &mut dyn GpuDevice) {
        self.renderer.teardown(device);
        self.scene.teardown(device);
        if let Some(texture) = self.texture.take() {
            device.release_texture(texture);
        }
    }
}

fn main() -> anyhow::Result<()> {
    lumen::run(
        AppConfig::new("lumen - shadows").with_size(1024, 768),
        ShadowsDemo::new(),
    )
}
