//! # HUD Demo
//!
//! A spinning lit cube with an orthographic heads-up display drawn on top.
//! The HUD scene is rendered after the main scene with color clearing
//! disabled, so it overlays the 3D view.
//!
//! Controls: W/A/S/D/R/F move, Q/E/T/G look, Escape quits.

use lumen::assets::checkerboard_texture;
use lumen::gfx::device::TextureHandle;
use lumen::gfx::geometry::{box_geometry, rectangle};
use lumen::prelude::*;

struct HudDemo {
    world: Scene,
    hud: Scene,
    renderer: Renderer,
    rig: Option<MovementRig>,
    camera: Option<NodeId>,
    hud_camera: Option<NodeId>,
    cube: Option<NodeId>,
    texture: Option<TextureHandle>,
}

fn hud_camera(width: u32, height: u32) -> Camera {
    Camera::orthographic(0.0, width as f32, 0.0, height as f32, 1.0, -1.0)
}

impl Example for HudDemo {
    fn initialize(&mut self, device: &mut dyn GpuDevice, (width, height): (u32, u32)) -> anyhow::Result<()> {
        let camera = self.world.add_camera(
            "camera",
            Camera::perspective(60.0, width as f32 / height as f32, 0.1, 100.0),
        );
        let rig = MovementRig::new(&mut self.world)?;
        rig.attach(&mut self.world, camera)?;
        rig.set_position(&mut self.world, [0.0, 0.5, 3.0])?;

        self.world.add_ambient_light([0.15; 3]);
        self.world.add_point_light([1.0, 1.0, 0.9], [2.0, 2.0, 2.0], DEFAULT_ATTENUATION);
        let material = Material::new(device, MaterialKind::Phong)?
            .with_settings(&[("base_color", [1.0f32, 0.6, 0.2].into())])?;
        let geometry = box_geometry(1.0, 1.0, 1.0).build(device);
        let cube = self.world.add_mesh("cube", Mesh::new(device, geometry, material)?);

        let axes = helpers::axes_helper(device, 2.0, 1.0)?;
        self.world.add_mesh("axes", axes);

        let hud_camera = self.hud.add_camera("hud camera", hud_camera(width, height));
        let texture = checkerboard_texture(device, 64, 4);
        let mut badge = Material::new(device, MaterialKind::Texture)?;
        badge.set_texture(Some(texture))?;
        let panel = rectangle(160.0, 90.0, [16.0, height as f32 - 16.0], [0.0, 1.0]).build(device);
        self.hud.add_mesh("badge", Mesh::new(device, panel, badge)?);

        let bar = Material::new(device, MaterialKind::Surface)?
            .with_settings(&[("use_vertex_colors", true.into())])?;
        let strip = rectangle(width as f32, 24.0, [0.0, 0.0], [0.0, 0.0]).build(device);
        self.hud.add_mesh("status bar", Mesh::new(device, strip, bar)?);

        self.rig = Some(rig);
        self.camera = Some(camera);
        self.hud_camera = Some(hud_camera);
        self.cube = Some(cube);
        self.texture = Some(texture);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) -> anyhow::Result<()> {
        let (Some(rig), Some(camera), Some(hud_camera), Some(cube)) =
            (self.rig, self.camera, self.hud_camera, self.cube)
        else {
            anyhow::bail!("update called before initialize");
        };
        rig.update(&mut self.world, frame.input, frame.delta_time)?;
        let cube = self.world.node_mut(cube)?;
        cube.rotate_y(0.5 * frame.delta_time, true);
        cube.rotate_x(0.3 * frame.delta_time, true);

        self.renderer.render(frame.device, &mut self.world, camera)?;
        self.renderer
            .render_with(frame.device, &mut self.hud, hud_camera, RenderOptions::overlay())?;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if let Some(camera) = self.camera {
            self.renderer.resize(&mut self.world, camera, width, height)?;
        }
        if let Some(camera) = self.hud_camera {
            *self.hud.camera_mut(camera)? = hud_camera(width, height);
        }
        Ok(())
    }

    fn shutdown(&mut self, device: &mut dyn GpuDevice) {
        self.renderer.teardown(device);
        self.world.teardown(device);
        self.hud.teardown(device);
        if let Some(texture) = self.texture.take() {
            device.release_texture(texture);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let demo = HudDemo {
        world: Scene::new(),
        hud: Scene::new(),
        renderer: Renderer::new(RendererConfig::default()),
        rig: None,
        camera: None,
        hud_camera: None,
        cube: None,
        texture: None,
    };
    lumen::run(AppConfig::new("lumen - hud"), demo)
}
