//! Built-in shader programs
//!
//! Input names match geometry attribute names, so a mesh binds every
//! attribute to the same-named program input.

use crate::gfx::device::{ShaderSource, VertexFormat};

const BASIC_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("basic.wgsl"));
const LIT_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("lit.wgsl"));
const DEPTH_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("depth.wgsl"));

/// Unlit color/texture program for point, line, surface and texture materials.
pub fn basic_program() -> ShaderSource {
    ShaderSource::new("basic", BASIC_WGSL)
        .with_input("position", 0, VertexFormat::Float32x3)
        .with_input("color", 1, VertexFormat::Float32x3)
        .with_input("uv", 2, VertexFormat::Float32x2)
}

/// Lambert/Phong program with shadow lookup.
pub fn lit_program() -> ShaderSource {
    ShaderSource::new("lit", LIT_WGSL)
        .with_input("position", 0, VertexFormat::Float32x3)
        .with_input("normal", 1, VertexFormat::Float32x3)
        .with_input("uv", 2, VertexFormat::Float32x2)
        .with_input("color", 3, VertexFormat::Float32x3)
}

/// Vertex-only program for the shadow depth pass.
pub fn depth_program() -> ShaderSource {
    ShaderSource::new("shadow depth", DEPTH_WGSL)
        .with_input("position", 0, VertexFormat::Float32x3)
        .without_fragment()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programs_share_position_location() {
        for source in [basic_program(), lit_program(), depth_program()] {
            assert_eq!(source.input("position").map(|i| i.location), Some(0));
            assert!(source.validate().is_ok());
            assert!(source.wgsl.contains("struct DrawUniforms"));
        }
    }

    #[test]
    fn test_depth_program_has_no_fragment_stage() {
        assert!(depth_program().fragment_entry.is_none());
        assert!(lit_program().wgsl.contains("fn fs_main"));
    }
}
