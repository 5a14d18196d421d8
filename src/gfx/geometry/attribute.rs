//! Typed per-vertex attribute streams and their GPU storage

use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::gfx::device::{BufferHandle, GpuDevice, ProgramHandle, VertexArrayHandle, VertexFormat};

/// Element type of an attribute. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl AttributeType {
    pub fn components(self) -> usize {
        match self {
            AttributeType::Int | AttributeType::Float => 1,
            AttributeType::Vec2 => 2,
            AttributeType::Vec3 => 3,
            AttributeType::Vec4 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Int => "int",
            AttributeType::Float => "float",
            AttributeType::Vec2 => "vec2",
            AttributeType::Vec3 => "vec3",
            AttributeType::Vec4 => "vec4",
        }
    }

    /// Integers are widened to floats on upload.
    pub fn vertex_format(self) -> VertexFormat {
        match self {
            AttributeType::Int | AttributeType::Float => VertexFormat::Float32,
            AttributeType::Vec2 => VertexFormat::Float32x2,
            AttributeType::Vec3 => VertexFormat::Float32x3,
            AttributeType::Vec4 => VertexFormat::Float32x4,
        }
    }
}

impl FromStr for AttributeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int" => Ok(AttributeType::Int),
            "float" => Ok(AttributeType::Float),
            "vec2" => Ok(AttributeType::Vec2),
            "vec3" => Ok(AttributeType::Vec3),
            "vec4" => Ok(AttributeType::Vec4),
            other => Err(EngineError::InvalidAttributeType(other.to_string())),
        }
    }
}

/// One tuple per vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Vec2(Vec<[f32; 2]>),
    Vec3(Vec<[f32; 3]>),
    Vec4(Vec<[f32; 4]>),
}

impl AttributeData {
    /// Groups `flat` into tuples of `attribute_type`'s arity.
    pub fn from_flat(attribute_type: AttributeType, flat: &[f32]) -> Result<Self> {
        if flat.len() % attribute_type.components() != 0 {
            return Err(EngineError::InvalidAttributeLength {
                type_name: attribute_type.name().to_string(),
                len: flat.len(),
            });
        }
        Ok(match attribute_type {
            AttributeType::Int => AttributeData::Int(flat.iter().map(|v| *v as i32).collect()),
            AttributeType::Float => AttributeData::Float(flat.to_vec()),
            AttributeType::Vec2 => {
                AttributeData::Vec2(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
            }
            AttributeType::Vec3 => AttributeData::Vec3(
                flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
            ),
            AttributeType::Vec4 => AttributeData::Vec4(
                flat.chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect(),
            ),
        })
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeData::Int(_) => AttributeType::Int,
            AttributeData::Float(_) => AttributeType::Float,
            AttributeData::Vec2(_) => AttributeType::Vec2,
            AttributeData::Vec3(_) => AttributeType::Vec3,
            AttributeData::Vec4(_) => AttributeType::Vec4,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AttributeData::Int(v) => v.len(),
            AttributeData::Float(v) => v.len(),
            AttributeData::Vec2(v) => v.len(),
            AttributeData::Vec3(v) => v.len(),
            AttributeData::Vec4(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Device byte layout: tightly packed `f32`s.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            AttributeData::Int(v) => {
                let widened: Vec<f32> = v.iter().map(|i| *i as f32).collect();
                bytemuck::cast_slice(&widened).to_vec()
            }
            AttributeData::Float(v) => bytemuck::cast_slice(v).to_vec(),
            AttributeData::Vec2(v) => bytemuck::cast_slice(v).to_vec(),
            AttributeData::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
            AttributeData::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
        }
    }

    /// Appends `other`; returns `false` (and does nothing) on a type mismatch.
    pub fn extend_from(&mut self, other: &AttributeData) -> bool {
        match (self, other) {
            (AttributeData::Int(a), AttributeData::Int(b)) => a.extend_from_slice(b),
            (AttributeData::Float(a), AttributeData::Float(b)) => a.extend_from_slice(b),
            (AttributeData::Vec2(a), AttributeData::Vec2(b)) => a.extend_from_slice(b),
            (AttributeData::Vec3(a), AttributeData::Vec3(b)) => a.extend_from_slice(b),
            (AttributeData::Vec4(a), AttributeData::Vec4(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    pub fn as_vec3(&self) -> Option<&[[f32; 3]]> {
        match self {
            AttributeData::Vec3(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec3_mut(&mut self) -> Option<&mut Vec<[f32; 3]>> {
        match self {
            AttributeData::Vec3(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<&[[f32; 2]]> {
        match self {
            AttributeData::Vec2(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<i32>> for AttributeData {
    fn from(v: Vec<i32>) -> Self {
        AttributeData::Int(v)
    }
}

impl From<Vec<f32>> for AttributeData {
    fn from(v: Vec<f32>) -> Self {
        AttributeData::Float(v)
    }
}

impl From<Vec<[f32; 2]>> for AttributeData {
    fn from(v: Vec<[f32; 2]>) -> Self {
        AttributeData::Vec2(v)
    }
}

impl From<Vec<[f32; 3]>> for AttributeData {
    fn from(v: Vec<[f32; 3]>) -> Self {
        AttributeData::Vec3(v)
    }
}

impl From<Vec<[f32; 4]>> for AttributeData {
    fn from(v: Vec<[f32; 4]>) -> Self {
        AttributeData::Vec4(v)
    }
}

/// Typed data plus the GPU buffer that mirrors it.
///
/// Mutations through [`data_mut`](Self::data_mut) stay invisible to
/// rendering until [`upload`](Self::upload) is called; nothing tracks
/// staleness. The GPU buffer must be freed with [`release`](Self::release).
#[derive(Debug)]
pub struct AttributeBuffer {
    data: AttributeData,
    buffer: Option<BufferHandle>,
}

impl AttributeBuffer {
    /// Allocates the GPU buffer and uploads `data` immediately.
    pub fn new(device: &mut dyn GpuDevice, label: &str, data: AttributeData) -> Self {
        let buffer = device.create_buffer(label);
        let mut attribute = Self {
            data,
            buffer: Some(buffer),
        };
        attribute.upload(device);
        attribute
    }

    /// Builds from a type name and flat component list.
    pub fn from_raw(
        device: &mut dyn GpuDevice,
        label: &str,
        type_name: &str,
        flat: &[f32],
    ) -> Result<Self> {
        let attribute_type: AttributeType = type_name.parse()?;
        let data = AttributeData::from_flat(attribute_type, flat)?;
        Ok(Self::new(device, label, data))
    }

    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    /// Call [`upload`](Self::upload) after mutating.
    pub fn data_mut(&mut self) -> &mut AttributeData {
        &mut self.data
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.data.attribute_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.buffer
    }

    /// Pushes the current data to the GPU. Safe to repeat.
    pub fn upload(&mut self, device: &mut dyn GpuDevice) {
        if let Some(buffer) = self.buffer {
            device.write_buffer(buffer, &self.data.to_bytes());
        }
    }

    /// Streams this buffer into `input_name` of `program` for draws through
    /// `vertex_array`. Returns `false` without doing anything when the program
    /// does not declare that input.
    pub fn bind_to_shader_input(
        &self,
        device: &mut dyn GpuDevice,
        vertex_array: VertexArrayHandle,
        program: ProgramHandle,
        input_name: &str,
    ) -> bool {
        let (Some(buffer), Some(location)) =
            (self.buffer, device.attribute_location(program, input_name))
        else {
            return false;
        };
        device.bind_vertex_attribute(
            vertex_array,
            location,
            buffer,
            self.data.attribute_type().vertex_format(),
        );
        true
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.release_buffer(buffer);
        }
    }
}

impl Drop for AttributeBuffer {
    fn drop(&mut self) {
        if self.buffer.is_some() && !std::thread::panicking() {
            log::warn!(
                "{} attribute buffer of {} elements dropped without release",
                self.data.attribute_type().name(),
                self.data.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::{HeadlessDevice, ShaderSource};

    #[test]
    fn test_attribute_type_names_are_closed() {
        assert_eq!("vec3".parse::<AttributeType>(), Ok(AttributeType::Vec3));
        assert_eq!(
            "mat4".parse::<AttributeType>(),
            Err(EngineError::InvalidAttributeType("mat4".into()))
        );
    }

    #[test]
    fn test_from_raw_rejects_unknown_type_and_ragged_data() {
        let mut device = HeadlessDevice::default();
        let err = AttributeBuffer::from_raw(&mut device, "bad", "double", &[1.0]).unwrap_err();
        assert_eq!(err, EngineError::InvalidAttributeType("double".into()));

        let err = AttributeBuffer::from_raw(&mut device, "bad", "vec3", &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAttributeLength { len: 2, .. }));
        assert_eq!(device.live_resources().buffers, 0);
    }

    #[test]
    fn test_mutation_needs_explicit_upload() {
        let mut device = HeadlessDevice::default();
        let mut attribute =
            AttributeBuffer::new(&mut device, "position", vec![[0.0f32, 0.0, 0.0]].into());
        let handle = attribute.handle().unwrap();

        attribute.data_mut().as_vec3_mut().unwrap()[0] = [1.0, 2.0, 3.0];
        assert_eq!(device.buffer_floats(handle), vec![0.0, 0.0, 0.0]);

        attribute.upload(&mut device);
        attribute.upload(&mut device);
        assert_eq!(device.buffer_floats(handle), vec![1.0, 2.0, 3.0]);
        attribute.release(&mut device);
    }

    #[test]
    fn test_int_attributes_upload_as_floats() {
        let mut device = HeadlessDevice::default();
        let mut attribute = AttributeBuffer::new(&mut device, "ids", vec![1, 2, 3].into());
        assert_eq!(
            device.buffer_floats(attribute.handle().unwrap()),
            vec![1.0, 2.0, 3.0]
        );
        attribute.release(&mut device);
    }

    #[test]
    fn test_binding_undeclared_input_is_a_no_op() {
        let mut device = HeadlessDevice::default();
        let program = device
            .create_program(
                &ShaderSource::new("p", "fn vs_main() {}")
                    .with_input("position", 0, VertexFormat::Float32x3),
            )
            .unwrap();
        let vao = device.create_vertex_array(program);
        let mut uv = AttributeBuffer::new(&mut device, "uv", vec![[0.0f32, 1.0]].into());

        assert!(!uv.bind_to_shader_input(&mut device, vao, program, "uv"));
        assert!(device.vertex_array_bindings(vao).is_empty());
        uv.release(&mut device);
    }
}
