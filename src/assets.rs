//! Model and texture sources for demos.
//!
//! OBJ files load through `tobj`; textures are procedural RGBA8 images.

use std::path::Path;

use crate::error::{EngineError, Result};
use crate::gfx::device::{GpuDevice, TextureDescriptor, TextureFilter, TextureHandle};

/// One model from an OBJ file, single-indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Empty when the file has none.
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    /// Diffuse color of the model's material, if the MTL file was found.
    pub diffuse: Option<[f32; 3]>,
}

/// Loads every model of an OBJ file, triangulated.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Vec<LoadedMesh>> {
    let path = path.as_ref();
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| EngineError::Asset(format!("{}: {e}", path.display())))?;

    let materials = materials.unwrap_or_else(|e| {
        log::info!("no materials for {}: {e}", path.display());
        Vec::new()
    });

    let meshes = models
        .into_iter()
        .map(|model| {
            let mesh = model.mesh;
            let diffuse = mesh
                .material_id
                .and_then(|id| materials.get(id))
                .and_then(|m| m.diffuse);
            LoadedMesh {
                name: model.name,
                positions: triples(&mesh.positions),
                normals: triples(&mesh.normals),
                uvs: mesh
                    .texcoords
                    .chunks_exact(2)
                    .map(|c| [c[0], c[1]])
                    .collect(),
                indices: mesh.indices,
                diffuse,
            }
        })
        .collect::<Vec<_>>();

    log::debug!("loaded {} model(s) from {}", meshes.len(), path.display());
    Ok(meshes)
}

fn triples(flat: &[f32]) -> Vec<[f32; 3]> {
    flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

/// Square RGBA8 checkerboard of `cells` x `cells` squares.
pub fn checkerboard_rgba(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&color);
        }
    }
    pixels
}

/// Uploads a black-and-white checkerboard that repeats across UVs.
pub fn checkerboard_texture(device: &mut dyn GpuDevice, size: u32, cells: u32) -> TextureHandle {
    let rgba = checkerboard_rgba(size, cells, [255, 255, 255, 255], [32, 32, 32, 255]);
    device.create_texture(&TextureDescriptor {
        label: "checkerboard",
        width: size,
        height: size,
        rgba: &rgba,
        filter: TextureFilter::Nearest,
        repeat: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_alternates() {
        let pixels = checkerboard_rgba(4, 2, [255; 4], [0; 4]);
        assert_eq!(pixels.len(), 64);
        assert_eq!(&pixels[0..4], &[255; 4]);
        assert_eq!(&pixels[8..12], &[0; 4]);
        // Row 2 starts with the second color.
        assert_eq!(&pixels[32..36], &[0; 4]);
    }

    #[test]
    fn test_missing_obj_is_an_asset_error() {
        let err = load_obj("does/not/exist.obj").unwrap_err();
        assert!(matches!(err, EngineError::Asset(_)));
    }
}
