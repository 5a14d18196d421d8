use std::collections::HashMap;

use cgmath::Matrix4;

use super::{check_mergeable, transform_attribute, AttributeBuffer, AttributeData, AttributeType};
use super::{COLOR, FACE_NORMAL, NORMAL, POSITION, UV};
use crate::error::Result;
use crate::gfx::device::GpuDevice;

const BUILTIN: [&str; 5] = [POSITION, NORMAL, FACE_NORMAL, COLOR, UV];

/// Where an attribute lives in a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSlot {
    Position,
    Normal,
    FaceNormal,
    Color,
    Uv,
    /// Slots past the built-in ones, numbered in order of first use.
    Custom(usize),
}

impl AttributeSlot {
    fn index(self) -> usize {
        match self {
            AttributeSlot::Position => 0,
            AttributeSlot::Normal => 1,
            AttributeSlot::FaceNormal => 2,
            AttributeSlot::Color => 3,
            AttributeSlot::Uv => 4,
            AttributeSlot::Custom(n) => BUILTIN.len() + n,
        }
    }

    fn from_index(index: usize) -> Self {
        match index {
            0 => AttributeSlot::Position,
            1 => AttributeSlot::Normal,
            2 => AttributeSlot::FaceNormal,
            3 => AttributeSlot::Color,
            4 => AttributeSlot::Uv,
            n => AttributeSlot::Custom(n - BUILTIN.len()),
        }
    }
}

/// GPU-resident attribute set of a mesh.
///
/// Attributes live in a fixed arena of slots; names resolve to slots once,
/// when first added. The vertex count follows the `position` attribute.
#[derive(Debug)]
pub struct Geometry {
    slots: Vec<Option<AttributeBuffer>>,
    names: Vec<String>,
    lookup: HashMap<String, usize>,
    vertex_count: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    pub fn new() -> Self {
        let names: Vec<String> = BUILTIN.iter().map(|n| n.to_string()).collect();
        let lookup = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self {
            slots: BUILTIN.iter().map(|_| None).collect(),
            names,
            lookup,
            vertex_count: 0,
        }
    }

    pub fn slot(&self, name: &str) -> Option<AttributeSlot> {
        self.lookup.get(name).copied().map(AttributeSlot::from_index)
    }

    fn slot_index_or_insert(&mut self, name: &str) -> usize {
        if let Some(index) = self.lookup.get(name) {
            return *index;
        }
        let index = self.slots.len();
        self.slots.push(None);
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), index);
        index
    }

    /// Inserts or overwrites `name`. An existing attribute keeps its GPU
    /// buffer and receives the new contents.
    pub fn add_attribute(&mut self, device: &mut dyn GpuDevice, name: &str, data: AttributeData) {
        let index = self.slot_index_or_insert(name);
        if let Some(existing) = self.slots[index].as_mut() {
            *existing.data_mut() = data;
            existing.upload(device);
        } else {
            self.slots[index] = Some(AttributeBuffer::new(device, name, data));
        }
        if name == POSITION {
            self.refresh_vertex_count();
        }
    }

    /// Adds an attribute given by type name and flat components.
    pub fn add_raw_attribute(
        &mut self,
        device: &mut dyn GpuDevice,
        name: &str,
        type_name: &str,
        flat: &[f32],
    ) -> Result<()> {
        let attribute_type: AttributeType = type_name.parse()?;
        let data = AttributeData::from_flat(attribute_type, flat)?;
        self.add_attribute(device, name, data);
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeBuffer> {
        self.lookup
            .get(name)
            .and_then(|i| self.slots[*i].as_ref())
    }

    /// Edits stay local until [`upload`](Self::upload).
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut AttributeBuffer> {
        let index = *self.lookup.get(name)?;
        self.slots[index].as_mut()
    }

    pub fn attribute_at(&self, slot: AttributeSlot) -> Option<&AttributeBuffer> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Present attributes in slot order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeBuffer)> {
        self.slots
            .iter()
            .zip(&self.names)
            .filter_map(|(slot, name)| slot.as_ref().map(|a| (name.as_str(), a)))
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes().map(|(n, _)| n).collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    fn refresh_vertex_count(&mut self) {
        self.vertex_count = self.attribute(POSITION).map_or(0, AttributeBuffer::len);
    }

    /// Re-uploads every attribute.
    pub fn upload(&mut self, device: &mut dyn GpuDevice) {
        for attribute in self.slots.iter_mut().flatten() {
            attribute.upload(device);
        }
        self.refresh_vertex_count();
    }

    /// Re-uploads only the named attributes; unknown names are skipped.
    pub fn upload_named(&mut self, device: &mut dyn GpuDevice, names: &[&str]) {
        for name in names {
            if let Some(attribute) = self.attribute_mut(name) {
                attribute.upload(device);
            }
        }
        self.refresh_vertex_count();
    }

    /// Bakes `matrix` into positions (full 4x4) and normals (upper-left 3x3).
    pub fn apply_transform(&mut self, device: &mut dyn GpuDevice, matrix: &Matrix4<f32>) {
        for (slot, name) in self.slots.iter_mut().zip(&self.names) {
            let Some(attribute) = slot else { continue };
            if transform_attribute(name, attribute.data_mut(), matrix) {
                attribute.upload(device);
            }
        }
        self.refresh_vertex_count();
    }

    /// Appends `other`'s vertices after this geometry's own. `other` is left
    /// untouched; on mismatch neither side changes.
    pub fn merge(&mut self, device: &mut dyn GpuDevice, other: &Geometry) -> Result<()> {
        check_mergeable(
            self.attributes().map(|(n, a)| (n, a.data())),
            other.attributes().map(|(n, a)| (n, a.data())),
        )?;
        for (slot, name) in self.slots.iter_mut().zip(&self.names) {
            let Some(attribute) = slot else { continue };
            if let Some(theirs) = other.attribute(name) {
                attribute.data_mut().extend_from(theirs.data());
                attribute.upload(device);
            }
        }
        self.refresh_vertex_count();
        Ok(())
    }

    /// Frees every attribute buffer. The geometry is empty afterwards.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        for slot in self.slots.iter_mut() {
            if let Some(mut attribute) = slot.take() {
                attribute.release(device);
            }
        }
        self.vertex_count = 0;
    }
}
