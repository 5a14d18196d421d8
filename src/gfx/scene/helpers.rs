//! Ready-made line meshes for orienting yourself in a scene: a floor grid,
//! coordinate axes and light gizmos. Each returns a [`Mesh`] that the caller
//! adds to the scene and positions like any other node.

use super::{Light, Mesh};
use crate::error::Result;
use crate::gfx::device::GpuDevice;
use crate::gfx::geometry::{axes_lines, grid_lines, sphere, GeometryData, COLOR, POSITION};
use crate::gfx::material::{LineType, Material, MaterialKind};

fn segment_material(device: &mut dyn GpuDevice, line_width: f32) -> Result<Material> {
    Material::new(device, MaterialKind::Line)?.with_settings(&[
        ("line_type", LineType::Segments.into()),
        ("use_vertex_colors", true.into()),
        ("line_width", line_width.into()),
    ])
}

fn line_mesh(device: &mut dyn GpuDevice, data: &GeometryData, line_width: f32) -> Result<Mesh> {
    let material = segment_material(device, line_width)?;
    let geometry = data.build(device);
    let mut mesh = Mesh::new(device, geometry, material)?;
    mesh.casts_shadow = false;
    Ok(mesh)
}

/// Square grid in the XY plane; rotate the node by -90° about X for a floor.
pub fn grid_helper(
    device: &mut dyn GpuDevice,
    size: f32,
    divisions: u32,
    grid_color: [f32; 3],
    center_color: [f32; 3],
    line_width: f32,
) -> Result<Mesh> {
    line_mesh(
        device,
        &grid_lines(size, divisions, grid_color, center_color),
        line_width,
    )
}

/// Red, green and blue segments along +X, +Y and +Z.
pub fn axes_helper(device: &mut dyn GpuDevice, length: f32, line_width: f32) -> Result<Mesh> {
    line_mesh(device, &axes_lines(length), line_width)
}

/// Small wireframe sphere in the light's color. Place it at the light's
/// position (or parent it to the light node).
pub fn point_light_helper(
    device: &mut dyn GpuDevice,
    light: &Light,
    size: f32,
    line_width: f32,
) -> Result<Mesh> {
    let material = Material::new(device, MaterialKind::Surface)?.with_settings(&[
        ("base_color", light.color.into()),
        ("wireframe", true.into()),
        ("double_sided", true.into()),
        ("line_width", line_width.into()),
    ])?;
    let geometry = sphere(size, 2, 4).build(device);
    let mut mesh = Mesh::new(device, geometry, material)?;
    mesh.casts_shadow = false;
    Ok(mesh)
}

/// Unit grid facing the light's forward axis with a ten-unit line along it.
/// Parent it to the directional light node so it follows the light.
pub fn directional_light_helper(device: &mut dyn GpuDevice, light: &Light) -> Result<Mesh> {
    let mut data = grid_lines(1.0, 4, light.color, light.color);
    let ray = GeometryData::new()
        .with_attribute(POSITION, vec![[0.0f32, 0.0, 0.0], [0.0, 0.0, -10.0]])
        .with_attribute(COLOR, vec![light.color; 2]);
    data.merge(&ray)?;
    line_mesh(device, &data, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::{HeadlessDevice, Topology};
    use crate::gfx::material::{SettingKey, SettingValue};
    use crate::gfx::scene::Drawable;

    #[test]
    fn test_grid_helper_draws_segments() {
        let mut device = HeadlessDevice::default();
        let mut grid = grid_helper(&mut device, 10.0, 10, [0.5; 3], [1.0; 3], 2.0).unwrap();
        assert_eq!(grid.topology(), Topology::Lines);
        assert_eq!(grid.vertex_count(), 44);
        assert!(!grid.casts_shadow);
        grid.release(&mut device);
    }

    #[test]
    fn test_light_helpers_take_light_color() {
        let mut device = HeadlessDevice::default();
        let light = Light::directional([1.0, 0.8, 0.2]);

        let mut gizmo = directional_light_helper(&mut device, &light).unwrap();
        // Two grid families of five lines each plus the direction ray.
        assert_eq!(gizmo.vertex_count(), 22);
        let colors = gizmo.geometry().attribute(COLOR).unwrap();
        assert_eq!(colors.data().as_vec3().unwrap()[21], [1.0, 0.8, 0.2]);
        gizmo.release(&mut device);

        let mut bulb = point_light_helper(&mut device, &light, 0.1, 1.0).unwrap();
        assert!(bulb.material().render_state().wireframe);
        assert_eq!(
            bulb.material().setting(SettingKey::BaseColor),
            Some(SettingValue::Color([1.0, 0.8, 0.2]))
        );
        bulb.release(&mut device);
        assert_eq!(device.live_resources().total(), 0);
    }
}
