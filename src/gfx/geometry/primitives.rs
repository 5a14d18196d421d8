//! # Primitive Shape Generation
//!
//! Procedural [`GeometryData`] builders. Every shape is emitted as a
//! non-indexed triangle (or line) list with `position`, `color`, `uv`,
//! `normal` and `faceNormal` attributes, so any built-in material can draw it.

use std::f32::consts::PI;
use std::ops::Range;

use cgmath::{InnerSpace, Vector3};

use super::{GeometryData, COLOR, FACE_NORMAL, NORMAL, POSITION, UV};
use crate::assets::LoadedMesh;
use crate::gfx::transform;

/// Colors cycled over the six vertices of each generated quad.
const QUAD_COLORS: [[f32; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
];

/// Generate an axis-aligned box centered at the origin
///
/// # Arguments
/// * `width`, `height`, `depth` - Extents along X, Y and Z
///
/// Faces are emitted in the order x+, x-, y+, y-, z+, z-, two triangles
/// each, with a distinct color per face. `normal` and `faceNormal` are the
/// face's unit axis.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> GeometryData {
    let (hw, hh, hd) = (width / 2.0, height / 2.0, depth / 2.0);
    let p = [
        [-hw, -hh, -hd],
        [hw, -hh, -hd],
        [-hw, hh, -hd],
        [hw, hh, -hd],
        [-hw, -hh, hd],
        [hw, -hh, hd],
        [-hw, hh, hd],
        [hw, hh, hd],
    ];
    // Corner indices per face, two triangles each.
    let faces: [[usize; 6]; 6] = [
        [5, 1, 3, 5, 3, 7],
        [0, 4, 6, 0, 6, 2],
        [6, 7, 3, 6, 3, 2],
        [0, 1, 5, 0, 5, 4],
        [4, 5, 7, 4, 7, 6],
        [1, 0, 2, 1, 2, 3],
    ];
    let face_colors = [
        [1.0, 0.5, 0.5],
        [0.5, 0.0, 0.0],
        [0.5, 1.0, 0.5],
        [0.0, 0.5, 0.0],
        [0.5, 0.5, 1.0],
        [0.0, 0.0, 0.5],
    ];
    let face_normals = [
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    let (t0, t1, t2, t3) = ([0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]);
    let face_uvs = [t0, t1, t3, t0, t3, t2];

    let mut positions = Vec::with_capacity(36);
    let mut colors = Vec::with_capacity(36);
    let mut uvs = Vec::with_capacity(36);
    let mut normals = Vec::with_capacity(36);
    for (face, corners) in faces.iter().enumerate() {
        for (i, corner) in corners.iter().enumerate() {
            positions.push(p[*corner]);
            colors.push(face_colors[face]);
            uvs.push(face_uvs[i]);
            normals.push(face_normals[face]);
        }
    }

    GeometryData::new()
        .with_attribute(POSITION, positions)
        .with_attribute(COLOR, colors)
        .with_attribute(UV, uvs)
        .with_attribute(NORMAL, normals.clone())
        .with_attribute(FACE_NORMAL, normals)
}

/// Generate a rectangle in the XY plane facing +Z
///
/// # Arguments
/// * `position` - Anchor point in the plane
/// * `alignment` - Fraction of the size placed left of / below the anchor;
///   `(0.5, 0.5)` centers the rectangle, `(0, 0)` puts its lower-left corner
///   on the anchor
pub fn rectangle(width: f32, height: f32, position: [f32; 2], alignment: [f32; 2]) -> GeometryData {
    let [x, y] = position;
    let [a, b] = alignment;
    let p0 = [x - a * width, y - b * height, 0.0];
    let p1 = [x + (1.0 - a) * width, y - b * height, 0.0];
    let p2 = [x - a * width, y + (1.0 - b) * height, 0.0];
    let p3 = [x + (1.0 - a) * width, y + (1.0 - b) * height, 0.0];
    let (c0, c1, c2, c3) = (
        [1.0, 1.0, 1.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    );
    let (t0, t1, t2, t3) = ([0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]);
    let normals = vec![[0.0f32, 0.0, 1.0]; 6];

    GeometryData::new()
        .with_attribute(POSITION, vec![p0, p1, p3, p0, p3, p2])
        .with_attribute(COLOR, vec![c0, c1, c3, c0, c3, c2])
        .with_attribute(UV, vec![t0, t1, t3, t0, t3, t2])
        .with_attribute(NORMAL, normals.clone())
        .with_attribute(FACE_NORMAL, normals)
}

/// Generate a subdivided plane in the XY plane facing +Z
///
/// # Arguments
/// * `width_segments`, `height_segments` - Subdivisions, at least 1 each
pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> GeometryData {
    parametric(
        -width / 2.0..width / 2.0,
        width_segments.max(1),
        -height / 2.0..height / 2.0,
        height_segments.max(1),
        |u, v| [u, v, 0.0],
    )
}

/// Generate a surface `(x, y, z) = f(u, v)` as a triangle list
///
/// Vertex normals are estimated numerically from small steps along `u` and
/// `v`; face normals come from each triangle's corners. Where a cross
/// product degenerates (poles), the normalized position is used instead.
pub fn parametric<F>(
    u_range: Range<f32>,
    u_resolution: u32,
    v_range: Range<f32>,
    v_resolution: u32,
    surface: F,
) -> GeometryData
where
    F: Fn(f32, f32) -> [f32; 3],
{
    let u_res = u_resolution.max(1) as usize;
    let v_res = v_resolution.max(1) as usize;
    let du = (u_range.end - u_range.start) / u_res as f32;
    let dv = (v_range.end - v_range.start) / v_res as f32;

    let mut grid_points = vec![vec![[0.0f32; 3]; v_res + 1]; u_res + 1];
    let mut grid_normals = grid_points.clone();
    let mut grid_uvs = vec![vec![[0.0f32; 2]; v_res + 1]; u_res + 1];
    for i in 0..=u_res {
        for j in 0..=v_res {
            let u = u_range.start + i as f32 * du;
            let v = v_range.start + j as f32 * dv;
            let p = surface(u, v);
            let p1 = surface(u + du / 1000.0, v);
            let p2 = surface(u, v + dv / 1000.0);
            grid_points[i][j] = p;
            grid_normals[i][j] = surface_normal(p, p1, p2);
            grid_uvs[i][j] = [i as f32 / u_res as f32, j as f32 / v_res as f32];
        }
    }

    let quads = u_res * v_res;
    let mut positions = Vec::with_capacity(quads * 6);
    let mut colors = Vec::with_capacity(quads * 6);
    let mut uvs = Vec::with_capacity(quads * 6);
    let mut normals = Vec::with_capacity(quads * 6);
    let mut face_normals = Vec::with_capacity(quads * 6);
    for i in 0..u_res {
        for j in 0..v_res {
            // a-b-c and a-c-d
            let corners = [(i, j), (i + 1, j), (i + 1, j + 1), (i, j), (i + 1, j + 1), (i, j + 1)];
            for (ci, cj) in corners {
                positions.push(grid_points[ci][cj]);
                normals.push(grid_normals[ci][cj]);
                uvs.push(grid_uvs[ci][cj]);
            }
            colors.extend_from_slice(&QUAD_COLORS);

            let (pa, pb, pc, pd) = (
                grid_points[i][j],
                grid_points[i + 1][j],
                grid_points[i + 1][j + 1],
                grid_points[i][j + 1],
            );
            let first = surface_normal(pa, pb, pc);
            let second = surface_normal(pa, pc, pd);
            face_normals.extend_from_slice(&[first, first, first, second, second, second]);
        }
    }

    GeometryData::new()
        .with_attribute(POSITION, positions)
        .with_attribute(COLOR, colors)
        .with_attribute(UV, uvs)
        .with_attribute(NORMAL, normals)
        .with_attribute(FACE_NORMAL, face_normals)
}

/// Unit normal of the triangle `p0, p1, p2`.
///
/// Degeneracy is judged relative to the edge lengths, so tiny but well-shaped
/// cells still get their true normal. A collapsed edge (as at a pole) or
/// collinear edges fall back to the normalized `p0`.
fn surface_normal(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3]) -> [f32; 3] {
    let origin = Vector3::from(p0);
    let (a, b) = (Vector3::from(p1) - origin, Vector3::from(p2) - origin);
    let (la, lb) = (a.magnitude(), b.magnitude());
    let n = a.cross(b);
    let collapsed = la.min(lb) <= 1e-5 * la.max(lb);
    let collinear = n.magnitude() <= 1e-5 * la * lb;
    if !collapsed && !collinear {
        n.normalize().into()
    } else if origin.magnitude() > 1e-6 {
        origin.normalize().into()
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Generate an ellipsoid centered at the origin with poles on ±Y
///
/// # Arguments
/// * `width`, `height`, `depth` - Diameters along X, Y and Z
/// * `theta_segments` - Rings from pole to pole
/// * `phi_segments` - Segments around the axis
pub fn ellipsoid(
    width: f32,
    height: f32,
    depth: f32,
    theta_segments: u32,
    phi_segments: u32,
) -> GeometryData {
    let mut data = parametric(0.0..1.0, phi_segments, 0.0..1.0, theta_segments, |u, v| {
        let phi = 2.0 * PI * u;
        let theta = (1.0 - v) * PI;
        [
            width / 2.0 * theta.sin() * phi.cos(),
            height / 2.0 * theta.sin() * phi.sin(),
            depth / 2.0 * theta.cos(),
        ]
    });
    data.apply_transform(&transform::rotation_x(-PI / 2.0));
    data
}

/// Generate a sphere; see [`ellipsoid`]. Typical segments are 16 and 32.
pub fn sphere(radius: f32, theta_segments: u32, phi_segments: u32) -> GeometryData {
    ellipsoid(
        2.0 * radius,
        2.0 * radius,
        2.0 * radius,
        theta_segments,
        phi_segments,
    )
}

/// Generate a square grid of line segments in the XY plane
///
/// # Arguments
/// * `size` - Side length of the grid
/// * `divisions` - Cells per side
/// * `grid_color` - Color of ordinary lines
/// * `center_color` - Color of the two lines through the origin
///
/// Draw with a segment-list line material.
pub fn grid_lines(
    size: f32,
    divisions: u32,
    grid_color: [f32; 3],
    center_color: [f32; 3],
) -> GeometryData {
    let divisions = divisions.max(1);
    let half = size / 2.0;
    let step = size / divisions as f32;
    let mut positions = Vec::new();
    let mut colors = Vec::new();

    let values: Vec<(f32, bool)> = (0..=divisions)
        .map(|n| (-half + n as f32 * step, 2 * n == divisions))
        .collect();
    for (x, center) in &values {
        positions.push([*x, -half, 0.0]);
        positions.push([*x, half, 0.0]);
        let color = if *center { center_color } else { grid_color };
        colors.extend_from_slice(&[color, color]);
    }
    for (y, center) in &values {
        positions.push([-half, *y, 0.0]);
        positions.push([half, *y, 0.0]);
        let color = if *center { center_color } else { grid_color };
        colors.extend_from_slice(&[color, color]);
    }

    GeometryData::new()
        .with_attribute(POSITION, positions)
        .with_attribute(COLOR, colors)
}

/// Three colored segments from the origin along +X, +Y and +Z.
pub fn axes_lines(length: f32) -> GeometryData {
    let positions = vec![
        [0.0, 0.0, 0.0],
        [length, 0.0, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, length, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, 0.0, length],
    ];
    let colors = vec![
        [1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 1.0],
    ];
    GeometryData::new()
        .with_attribute(POSITION, positions)
        .with_attribute(COLOR, colors)
}

impl GeometryData {
    /// Expands an indexed model into a triangle list.
    ///
    /// Missing normals fall back to face normals, missing UVs to `(0.5, 0.5)`;
    /// every vertex takes the mesh's diffuse color (white when absent).
    pub fn from_loaded_mesh(mesh: &LoadedMesh) -> GeometryData {
        let color = mesh.diffuse.unwrap_or([1.0, 1.0, 1.0]);
        let mut positions = Vec::with_capacity(mesh.indices.len());
        let mut normals = Vec::with_capacity(mesh.indices.len());
        let mut face_normals = Vec::with_capacity(mesh.indices.len());
        let mut uvs = Vec::with_capacity(mesh.indices.len());

        for triangle in mesh.indices.chunks_exact(3) {
            let corners: Vec<[f32; 3]> = triangle
                .iter()
                .map(|i| mesh.positions.get(*i as usize).copied().unwrap_or_default())
                .collect();
            let face = surface_normal(corners[0], corners[1], corners[2]);
            for (k, index) in triangle.iter().enumerate() {
                let index = *index as usize;
                positions.push(corners[k]);
                normals.push(mesh.normals.get(index).copied().unwrap_or(face));
                face_normals.push(face);
                uvs.push(mesh.uvs.get(index).copied().unwrap_or([0.5, 0.5]));
            }
        }

        let colors = vec![color; positions.len()];
        GeometryData::new()
            .with_attribute(POSITION, positions)
            .with_attribute(COLOR, colors)
            .with_attribute(UV, uvs)
            .with_attribute(NORMAL, normals)
            .with_attribute(FACE_NORMAL, face_normals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_generation() {
        let cube = box_geometry(2.0, 4.0, 6.0);
        assert_eq!(cube.vertex_count(), 36);
        let positions = cube.positions().unwrap();
        assert!(positions.iter().all(|p| p[0].abs() == 1.0 && p[1].abs() == 2.0 && p[2].abs() == 3.0));
        for name in [COLOR, UV, NORMAL, FACE_NORMAL] {
            assert_eq!(cube.get(name).unwrap().len(), 36);
        }
        // First face is x+.
        assert!(positions[..6].iter().all(|p| p[0] == 1.0));
    }

    #[test]
    fn test_rectangle_alignment() {
        let rect = rectangle(2.0, 1.0, [0.0, 0.0], [0.0, 0.0]);
        let positions = rect.positions().unwrap();
        assert_eq!(positions[0], [0.0, 0.0, 0.0]);
        assert_eq!(positions[2], [2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_plane_generation() {
        let plane = plane(2.0, 2.0, 2, 2);
        assert_eq!(plane.vertex_count(), 24);
        for n in plane.get(NORMAL).unwrap().as_vec3().unwrap() {
            assert_relative_eq!(n[2], 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_fine_plane_normals_face_up() {
        for (size, segments) in [(1.5, 4), (4.0, 8), (20.0, 40)] {
            let plane = plane(size, size, segments, segments);
            for data in [plane.get(NORMAL), plane.get(FACE_NORMAL)] {
                for n in data.unwrap().as_vec3().unwrap() {
                    assert_relative_eq!(n[0], 0.0, epsilon = 1e-4);
                    assert_relative_eq!(n[1], 0.0, epsilon = 1e-4);
                    assert_relative_eq!(n[2], 1.0, epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_wave_normals_match_analytic_gradient() {
        let wave = parametric(-2.0..2.0, 32, -2.0..2.0, 32, |u, v| {
            [u, v, 0.2 * (3.0 * u).sin() * (3.0 * v).cos()]
        });
        let positions = wave.positions().unwrap();
        let normals = wave.get(NORMAL).unwrap().as_vec3().unwrap();
        for (p, n) in positions.iter().zip(normals) {
            let (u, v) = (p[0], p[1]);
            let dz_du = 0.6 * (3.0 * u).cos() * (3.0 * v).cos();
            let dz_dv = -0.6 * (3.0 * u).sin() * (3.0 * v).sin();
            let expected = Vector3::new(-dz_du, -dz_dv, 1.0).normalize();
            assert!(expected.dot(Vector3::from(*n)) > 0.999, "{p:?} -> {n:?}");
        }
    }

    #[test]
    fn test_ellipsoid_normals_follow_axis_scaling() {
        let ellipsoid = ellipsoid(4.0, 2.0, 2.0, 8, 16);
        let positions = ellipsoid.positions().unwrap();
        let normals = ellipsoid.get(NORMAL).unwrap().as_vec3().unwrap();
        for (p, n) in positions.iter().zip(normals) {
            let expected = Vector3::new(p[0] / 4.0, p[1], p[2]).normalize();
            assert!(expected.dot(Vector3::from(*n)) > 0.999, "{p:?} -> {n:?}");
        }
    }

    #[test]
    fn test_sphere_points_lie_on_radius_with_poles_on_y() {
        let sphere = sphere(2.0, 4, 8);
        assert_eq!(sphere.vertex_count(), 4 * 8 * 6);
        let positions = sphere.positions().unwrap();
        for p in positions {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert_relative_eq!(r, 2.0, epsilon = 1e-4);
        }
        let top = positions.iter().map(|p| p[1]).fold(f32::MIN, f32::max);
        assert_relative_eq!(top, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_grid_lines_mark_center() {
        let grid = grid_lines(10.0, 10, [0.0; 3], [0.5; 3]);
        assert_eq!(grid.vertex_count(), 44);
        let colors = grid.get(COLOR).unwrap().as_vec3().unwrap();
        assert_eq!(colors.iter().filter(|c| **c == [0.5; 3]).count(), 4);
    }

    #[test]
    fn test_loaded_mesh_is_deindexed() {
        let mesh = LoadedMesh {
            name: "quad".into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: vec![0, 1, 2, 0, 2, 3],
            diffuse: Some([0.2, 0.4, 0.6]),
        };
        let data = GeometryData::from_loaded_mesh(&mesh);
        assert_eq!(data.vertex_count(), 6);
        assert_eq!(data.get(NORMAL).unwrap().as_vec3().unwrap()[0], [0.0, 0.0, 1.0]);
        assert_eq!(data.get(COLOR).unwrap().as_vec3().unwrap()[5], [0.2, 0.4, 0.6]);
    }
}
