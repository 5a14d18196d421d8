//! # Geometry
//!
//! Vertex attribute storage for meshes.
//!
//! [`GeometryData`] is the CPU-side builder produced by the procedural
//! generators in [`primitives`]; [`Geometry`] owns the GPU-resident
//! [`AttributeBuffer`]s a mesh draws from.
//!
//! ```no_run
//! use lumen::gfx::device::HeadlessDevice;
//! use lumen::gfx::geometry::box_geometry;
//!
//! let mut device = HeadlessDevice::default();
//! let mut cube = box_geometry(1.0, 1.0, 1.0).build(&mut device);
//! assert_eq!(cube.vertex_count(), 36);
//! cube.release(&mut device);
//! ```

pub mod attribute;
pub mod primitives;
mod slots;

pub use attribute::{AttributeBuffer, AttributeData, AttributeType};
pub use primitives::*;
pub use slots::{AttributeSlot, Geometry};

use std::collections::BTreeMap;

use cgmath::{Matrix4, Vector4};

use crate::error::{EngineError, Result};
use crate::gfx::device::GpuDevice;
use crate::gfx::transform;

/// Attribute names the built-in programs read.
pub const POSITION: &str = "position";
pub const NORMAL: &str = "normal";
pub const FACE_NORMAL: &str = "faceNormal";
pub const COLOR: &str = "color";
pub const UV: &str = "uv";

/// Named attribute arrays, not yet on the GPU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    attributes: Vec<(String, AttributeData)>,
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &str, data: impl Into<AttributeData>) -> Self {
        self.set(name, data);
        self
    }

    /// Inserts or replaces `name`, keeping insertion order.
    pub fn set(&mut self, name: &str, data: impl Into<AttributeData>) {
        let data = data.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.attributes.push((name.to_string(), data)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeData> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn positions(&self) -> Option<&[[f32; 3]]> {
        self.get(POSITION).and_then(AttributeData::as_vec3)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(n, _)| n.as_str())
    }

    pub fn vertex_count(&self) -> usize {
        self.get(POSITION).map_or(0, AttributeData::len)
    }

    pub fn apply_transform(&mut self, matrix: &Matrix4<f32>) {
        for (name, data) in &mut self.attributes {
            transform_attribute(name, data, matrix);
        }
    }

    pub fn merge(&mut self, other: &GeometryData) -> Result<()> {
        check_mergeable(
            self.attributes.iter().map(|(n, d)| (n.as_str(), d)),
            other.attributes.iter().map(|(n, d)| (n.as_str(), d)),
        )?;
        for (name, data) in &mut self.attributes {
            if let Some(theirs) = other.get(name) {
                data.extend_from(theirs);
            }
        }
        Ok(())
    }

    /// Uploads every attribute into a new [`Geometry`].
    pub fn build(&self, device: &mut dyn GpuDevice) -> Geometry {
        let mut geometry = Geometry::new();
        for (name, data) in &self.attributes {
            geometry.add_attribute(device, name, data.clone());
        }
        geometry
    }
}

/// Positions take the full matrix; normals only its upper-left 3x3 and are
/// not renormalized.
pub(crate) fn transform_attribute(name: &str, data: &mut AttributeData, matrix: &Matrix4<f32>) -> bool {
    match (name, data) {
        (POSITION, AttributeData::Vec3(points)) => {
            for p in points.iter_mut() {
                *p = transform::transform_point(matrix, *p);
            }
            true
        }
        (POSITION, AttributeData::Vec4(points)) => {
            for p in points.iter_mut() {
                *p = (matrix * Vector4::from(*p)).into();
            }
            true
        }
        (NORMAL | FACE_NORMAL, AttributeData::Vec3(normals)) => {
            let rotation = transform::rotation_part(matrix);
            for n in normals.iter_mut() {
                *n = (rotation * cgmath::Vector3::from(*n)).into();
            }
            true
        }
        _ => false,
    }
}

/// Both sides must carry the same names with the same element types.
pub(crate) fn check_mergeable<'a>(
    left: impl Iterator<Item = (&'a str, &'a AttributeData)>,
    right: impl Iterator<Item = (&'a str, &'a AttributeData)>,
) -> Result<()> {
    let left: BTreeMap<&str, AttributeType> =
        left.map(|(n, d)| (n, d.attribute_type())).collect();
    let right: BTreeMap<&str, AttributeType> =
        right.map(|(n, d)| (n, d.attribute_type())).collect();
    if left == right {
        return Ok(());
    }
    let describe = |m: &BTreeMap<&str, AttributeType>| {
        m.iter()
            .map(|(n, t)| format!("{n}:{}", t.name()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(EngineError::AttributeMismatch {
        left: describe(&left),
        right: describe(&right),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::transform::{rotation_x, scale, translation};
    use approx::assert_relative_eq;

    fn triangle() -> GeometryData {
        GeometryData::new()
            .with_attribute(POSITION, vec![[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .with_attribute(NORMAL, vec![[0.0f32, 0.0, 1.0]; 3])
    }

    #[test]
    fn test_translation_moves_positions_but_not_normals() {
        let mut data = triangle();
        data.apply_transform(&translation(1.0, 2.0, 3.0));
        assert_eq!(data.positions().unwrap()[1], [2.0, 2.0, 3.0]);
        assert_eq!(data.get(NORMAL).unwrap().as_vec3().unwrap()[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotation_turns_normals() {
        let mut data = triangle();
        data.apply_transform(&rotation_x(-std::f32::consts::FRAC_PI_2));
        let n = data.get(NORMAL).unwrap().as_vec3().unwrap()[0];
        assert_relative_eq!(n[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(n[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_non_uniform_scale_leaves_normals_unnormalized() {
        let mut data = triangle();
        data.apply_transform(&scale(1.0, 1.0, 2.0));
        assert_eq!(data.get(NORMAL).unwrap().as_vec3().unwrap()[0], [0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_merge_requires_same_attribute_set() {
        let mut a = triangle();
        let b = GeometryData::new().with_attribute(POSITION, vec![[5.0f32, 5.0, 5.0]]);
        let before = a.clone();
        assert!(matches!(a.merge(&b), Err(EngineError::AttributeMismatch { .. })));
        assert_eq!(a, before);

        a.merge(&triangle()).unwrap();
        assert_eq!(a.vertex_count(), 6);
    }
}
