//! # Geometry Gallery
//!
//! Every procedural primitive, drawn with a different material, plus point
//! and line materials, helpers and two point lights with their gizmos.
//!
//! Pass a path to an OBJ file to add it to the gallery:
//! `cargo run --example gallery -- model.obj`
//!
//! Controls: W/A/S/D/R/F move, Q/E/T/G look, Escape quits.

use std::f32::consts::PI;

use lumen::assets::load_obj;
use lumen::gfx::geometry::{box_geometry, ellipsoid, parametric, plane, sphere};
use lumen::prelude::*;

struct Gallery {
    scene: Scene,
    renderer: Renderer,
    model_path: Option<String>,
    rig: Option<MovementRig>,
    camera: Option<NodeId>,
    spinners: Vec<NodeId>,
}

impl Gallery {
    fn place(
        &mut self,
        device: &mut dyn GpuDevice,
        name: &str,
        data: &GeometryData,
        material: Material,
        position: [f32; 3],
    ) -> anyhow::Result<NodeId> {
        let geometry = data.build(device);
        let node = self.scene.add_mesh(name, Mesh::new(device, geometry, material)?);
        self.scene.node_mut(node)?.set_position(position);
        Ok(node)
    }

    fn lit(device: &mut dyn GpuDevice, kind: MaterialKind, color: [f32; 3]) -> anyhow::Result<Material> {
        Ok(Material::new(device, kind)?.with_settings(&[
            ("base_color", color.into()),
            ("number_of_light_sources", 2u32.into()),
        ])?)
    }

    fn add_models(&mut self, device: &mut dyn GpuDevice, path: &str) -> anyhow::Result<()> {
        let models = load_obj(path)?;
        log::info!("loaded {} model(s) from {path}", models.len());
        for (i, model) in models.iter().enumerate() {
            let color = model.diffuse.unwrap_or([0.8, 0.8, 0.8]);
            let material = Self::lit(device, MaterialKind::Phong, color)?;
            let data = GeometryData::from_loaded_mesh(model);
            let node = self.place(device, &model.name, &data, material, [i as f32 * 2.0, 1.0, -3.0])?;
            self.spinners.push(node);
        }
        Ok(())
    }
}

impl Example for Gallery {
    fn initialize(&mut self, device: &mut dyn GpuDevice, (width, height): (u32, u32)) -> anyhow::Result<()> {
        let camera = self.scene.add_camera(
            "camera",
            Camera::perspective(60.0, width as f32 / height as f32, 0.1, 1000.0),
        );
        let rig = MovementRig::new(&mut self.scene)?.with_speed(3.0, 60.0);
        rig.attach(&mut self.scene, camera)?;
        rig.set_position(&mut self.scene, [0.0, 2.0, 8.0])?;

        self.scene.add_ambient_light([0.1; 3]);
        for (color, position) in [([1.0, 0.9, 0.8], [-3.0, 3.0, 2.0]), ([0.4, 0.6, 1.0], [3.0, 2.0, -1.0])] {
            let bulb = self.scene.add_point_light(color, position, DEFAULT_ATTENUATION);
            let light = Light::point(color, DEFAULT_ATTENUATION);
            let gizmo = helpers::point_light_helper(device, &light, 0.1, 1.0)?;
            let gizmo = self.scene.add_mesh("bulb gizmo", gizmo);
            self.scene.add_child(bulb, gizmo)?;
        }

        let floor = helpers::grid_helper(device, 20.0, 20, [0.3; 3], [0.8; 3], 1.0)?;
        let floor = self.scene.add_mesh("floor grid", floor);
        self.scene.node_mut(floor)?.rotate_x(-PI / 2.0, true);
        let axes = helpers::axes_helper(device, 1.5, 2.0)?;
        self.scene.add_mesh("axes", axes);

        let shapes = [
            ("box", box_geometry(1.0, 1.0, 1.0), MaterialKind::Lambert, [0.9, 0.4, 0.3]),
            ("sphere", sphere(0.6, 16, 32), MaterialKind::Phong, [0.3, 0.7, 0.9]),
            ("ellipsoid", ellipsoid(1.4, 0.8, 0.8, 16, 32), MaterialKind::Phong, [0.8, 0.8, 0.3]),
        ];
        for (i, (name, data, kind, color)) in shapes.into_iter().enumerate() {
            let material = Self::lit(device, kind, color)?;
            let node = self.place(device, name, &data, material, [i as f32 * 2.0 - 2.0, 1.0, 0.0])?;
            self.spinners.push(node);
        }

        let wave = parametric(-2.0..2.0, 32, -2.0..2.0, 32, |u, v| {
            [u, v, 0.2 * (3.0 * u).sin() * (3.0 * v).cos()]
        });
        let wire = Material::new(device, MaterialKind::Surface)?.with_settings(&[
            ("use_vertex_colors", true.into()),
            ("wireframe", true.into()),
            ("double_sided", true.into()),
        ])?;
        let wave = self.place(device, "wave", &wave, wire, [0.0, 0.0, -4.0])?;
        self.scene.node_mut(wave)?.rotate_x(-PI / 2.0, true);

        let sheet = Material::new(device, MaterialKind::Surface)?.with_settings(&[
            ("base_color", [0.5f32, 0.9, 0.5].into()),
            ("double_sided", true.into()),
        ])?;
        let sheet = self.place(device, "sheet", &plane(1.5, 1.5, 4, 4), sheet, [4.0, 1.0, 0.0])?;
        self.spinners.push(sheet);

        let ring: Vec<[f32; 3]> = (0..24)
            .map(|i| {
                let t = i as f32 / 24.0 * 2.0 * PI;
                [t.cos(), t.sin(), 0.0]
            })
            .collect();
        let ring = GeometryData::new().with_attribute(POSITION, ring);
        let looped = Material::new(device, MaterialKind::Line)?.with_settings(&[
            ("line_type", LineType::Loop.into()),
            ("base_color", [1.0f32, 0.5, 0.0].into()),
        ])?;
        self.place(device, "ring", &ring, looped, [-4.0, 1.0, 0.0])?;

        let dots = Material::new(device, MaterialKind::Point)?.with_settings(&[
            ("point_size", 6.0f32.into()),
            ("rounded_points", true.into()),
            ("base_color", [1.0f32, 1.0, 0.0].into()),
        ])?;
        self.place(device, "dots", &sphere(0.5, 8, 16), dots, [-4.0, 3.0, 0.0])?;

        if let Some(path) = self.model_path.clone() {
            if let Err(error) = self.add_models(device, &path) {
                log::warn!("skipping model: {error:#}");
            }
        }

        self.rig = Some(rig);
        self.camera = Some(camera);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) -> anyhow::Result<()> {
        let (Some(rig), Some(camera)) = (self.rig, self.camera) else {
            anyhow::bail!("update called before initialize");
        };
        rig.update(&mut self.scene, frame.input, frame.delta_time)?;
        for id in &self.spinners {
            self.scene.node_mut(*id)?.rotate_y(0.4 * frame.delta_time, true);
        }
        self.renderer.render(frame.device, &mut self.scene, camera)?;
        if frame.frame_index % 600 == 599 {
            let stats = self.renderer.stats();
            log::info!("{} frames, {} draw calls", stats.frames, stats.draw_calls);
        }
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
    }
}

fn main() -> anyhow::Result<()> {
    let gallery = Gallery {
        scene: Scene::new(),
        renderer: Renderer::new(RendererConfig::default()),
        model_path: std::env::args().nth(1),
        rig: None,
        camera: None,
        spinners: Vec::new(),
    };
    lumen::run(AppConfig::new("lumen - gallery").with_size(1280, 720), gallery)
}
