//! Thin helpers over raw wgpu objects used by the wgpu device backend.

pub mod binding_types;
pub mod texture_resource;
pub mod uniform_buffer;

pub use texture_resource::TextureResource;
pub use uniform_buffer::DynamicUniformBuffer;
