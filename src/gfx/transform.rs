//! 4x4 transform utilities
//!
//! Column-vector convention throughout: `compose(a, b)` applies `b` first,
//! then `a`. Rotations are right-handed about the named axis and take radians.
//! Nothing here validates its input.

use cgmath::{
    Deg, InnerSpace, Matrix, Matrix3, Matrix4, Point3, Rad, SquareMatrix, Vector3, Vector4,
};

/// Maps OpenGL clip space (z in -1..1) onto wgpu clip space (z in 0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub fn identity() -> Matrix4<f32> {
    Matrix4::identity()
}

pub fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::new(x, y, z))
}

pub fn rotation_x(angle: f32) -> Matrix4<f32> {
    Matrix4::from_angle_x(Rad(angle))
}

pub fn rotation_y(angle: f32) -> Matrix4<f32> {
    Matrix4::from_angle_y(Rad(angle))
}

pub fn rotation_z(angle: f32) -> Matrix4<f32> {
    Matrix4::from_angle_z(Rad(angle))
}

pub fn scale(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::from_nonuniform_scale(x, y, z)
}

pub fn uniform_scale(s: f32) -> Matrix4<f32> {
    Matrix4::from_scale(s)
}

/// `a × b`: transforming a point by the result applies `b`, then `a`.
pub fn compose(a: &Matrix4<f32>, b: &Matrix4<f32>) -> Matrix4<f32> {
    a * b
}

/// Placement matrix for an object at `eye` facing `target`.
///
/// This is the inverse of the view basis: columns are right, up, back (the
/// object looks down its local -Z) and `eye`. When `up` is parallel to the
/// viewing direction it is nudged along X so the basis stays well-defined.
pub fn look_at(eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    let forward = (target - eye).normalize();
    let mut up = up;
    if forward.cross(up).magnitude2() < 1e-12 {
        up.x += 0.001;
    }
    let right = forward.cross(up).normalize();
    let up = right.cross(forward).normalize();
    Matrix4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        (-forward).extend(0.0),
        Vector4::new(eye.x, eye.y, eye.z, 1.0),
    )
}

/// Inverse of `m`, or identity (with a warning) when `m` is singular.
pub fn inverse(m: &Matrix4<f32>) -> Matrix4<f32> {
    m.invert().unwrap_or_else(|| {
        log::warn!("singular transform has no inverse; using identity");
        Matrix4::identity()
    })
}

pub fn transform_point(m: &Matrix4<f32>, p: [f32; 3]) -> [f32; 3] {
    let v = m * Vector4::new(p[0], p[1], p[2], 1.0);
    [v.x, v.y, v.z]
}

/// Applies only the upper-left 3x3 of `m`.
pub fn transform_direction(m: &Matrix4<f32>, d: [f32; 3]) -> [f32; 3] {
    let v = rotation_part(m) * Vector3::new(d[0], d[1], d[2]);
    [v.x, v.y, v.z]
}

pub fn position_of(m: &Matrix4<f32>) -> Vector3<f32> {
    m.w.truncate()
}

pub fn rotation_part(m: &Matrix4<f32>) -> Matrix3<f32> {
    Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate())
}

/// Row-major-free conversion for uniform upload.
pub fn to_array(m: &Matrix4<f32>) -> [[f32; 4]; 4] {
    (*m).into()
}

/// True when the bottom row is `[0, 0, 0, 1]`.
pub fn is_affine(m: &Matrix4<f32>) -> bool {
    let row = m.row(3);
    row.x == 0.0 && row.y == 0.0 && row.z == 0.0 && row.w == 1.0
}

/// Camera projection. Never composed into the node hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_degrees,
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            near,
            far,
        }
    }

    /// Clip-space matrix with wgpu depth range.
    pub fn matrix(&self) -> Matrix4<f32> {
        let gl = match *self {
            Projection::Perspective {
                fov_degrees,
                aspect,
                near,
                far,
            } => cgmath::perspective(Deg(fov_degrees), aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => cgmath::ortho(left, right, bottom, top, near, far),
        };
        OPENGL_TO_WGPU_MATRIX * gl
    }

    /// Only perspective projections carry an aspect ratio.
    pub fn set_aspect(&mut self, new_aspect: f32) {
        if let Projection::Perspective { aspect, .. } = self {
            *aspect = new_aspect;
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::perspective(60.0, 1.0, 0.1, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec3(a: [f32; 3], b: [f32; 3]) {
        for i in 0..3 {
            assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_compose_rotates_then_translates() {
        let m = compose(&translation(1.0, 0.0, 0.0), &rotation_z(FRAC_PI_2));
        // (1,0,0) rotates to (0,1,0), then moves to (1,1,0)
        assert_vec3(transform_point(&m, [1.0, 0.0, 0.0]), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_rotations_are_right_handed() {
        assert_vec3(
            transform_point(&rotation_x(FRAC_PI_2), [0.0, 1.0, 0.0]),
            [0.0, 0.0, 1.0],
        );
        assert_vec3(
            transform_point(&rotation_y(FRAC_PI_2), [0.0, 0.0, 1.0]),
            [1.0, 0.0, 0.0],
        );
        assert_vec3(
            transform_point(&rotation_z(FRAC_PI_2), [1.0, 0.0, 0.0]),
            [0.0, 1.0, 0.0],
        );
    }

    #[test]
    fn test_look_at_faces_target() {
        let eye = Point3::new(0.0, 0.0, 5.0);
        let m = look_at(eye, Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
        // local -Z maps to the direction of the target
        assert_vec3(transform_direction(&m, [0.0, 0.0, -1.0]), [0.0, 0.0, -1.0]);
        assert_vec3(position_of(&m).into(), [0.0, 0.0, 5.0]);

        let view = inverse(&m);
        assert_vec3(transform_point(&view, [0.0, 0.0, 0.0]), [0.0, 0.0, -5.0]);
    }

    #[test]
    fn test_look_at_straight_down_is_finite() {
        let m = look_at(
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        );
        let dir = transform_direction(&m, [0.0, 0.0, -1.0]);
        assert!(dir.iter().all(|c| c.is_finite()));
        assert_abs_diff_eq!(dir[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_affine_composites_keep_bottom_row() {
        let m = compose(
            &compose(&translation(1.0, 2.0, 3.0), &rotation_y(0.3)),
            &scale(2.0, 1.0, 0.5),
        );
        assert!(is_affine(&m));
        assert!(!is_affine(&Projection::default().matrix()));
    }

    #[test]
    fn test_singular_inverse_falls_back_to_identity() {
        assert_eq!(inverse(&scale(0.0, 1.0, 1.0)), identity());
    }

    #[test]
    fn test_orthographic_maps_depth_into_unit_range() {
        let p = Projection::orthographic(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0).matrix();
        let near = p * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let far = p * Vector4::new(0.0, 0.0, -10.0, 1.0);
        assert_abs_diff_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(far.z, 1.0, epsilon = 1e-5);
    }
}
