use cgmath::Matrix4;

use crate::gfx::transform::Projection;

/// Viewpoint payload. Placement comes from the owning node; the view matrix
/// is the inverse of the node's world transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Camera {
    pub projection: Projection,
}

impl Camera {
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::perspective(fov_degrees, aspect, near, far),
        }
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::orthographic(left, right, bottom, top, near, far),
        }
    }

    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::perspective(fov_degrees, aspect, near, far);
    }

    pub fn set_orthographic(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.projection = Projection::orthographic(left, right, bottom, top, near, far);
    }

    /// No effect on orthographic cameras.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.projection.set_aspect(aspect);
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_only_changes_perspective() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(2.0);
        assert_eq!(camera.projection, Projection::perspective(60.0, 2.0, 0.1, 1000.0));

        let mut hud = Camera::orthographic(0.0, 800.0, 0.0, 600.0, 1.0, -1.0);
        let before = hud;
        hud.set_aspect_ratio(2.0);
        assert_eq!(hud, before);
    }
}
