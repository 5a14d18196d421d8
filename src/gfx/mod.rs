//! # Graphics Module
//!
//! Everything between application code and the GPU.
//!
//! ## Architecture Overview
//!
//! - **Device** ([`device`]) - the [`GpuDevice`](device::GpuDevice) seam with
//!   wgpu and in-memory implementations
//! - **Geometry** ([`geometry`]) - attribute buffers, geometries and
//!   procedural primitives
//! - **Materials** ([`material`]) - shader programs with typed settings
//! - **Scene** ([`scene`]) - node hierarchy, cameras, lights and meshes
//! - **Rendering** ([`rendering`]) - shadow and main passes
//!
//! ## Usage
//!
//! ```no_run
//! use lumen::gfx::device::HeadlessDevice;
//! use lumen::gfx::geometry::box_geometry;
//! use lumen::gfx::material::{Material, MaterialKind};
//! use lumen::gfx::rendering::{Renderer, RendererConfig};
//! use lumen::gfx::scene::{Camera, Mesh, Positionable, Scene};
//!
//! let mut device = HeadlessDevice::default();
//! let mut scene = Scene::new();
//! let camera = scene.add_camera("camera", Camera::default());
//! scene.node_mut(camera).unwrap().set_position([0.0, 0.0, 4.0]);
//!
//! let geometry = box_geometry(1.0, 1.0, 1.0).build(&mut device);
//! let material = Material::new(&mut device, MaterialKind::Surface).unwrap();
//! scene.add_mesh("box", Mesh::new(&mut device, geometry, material).unwrap());
//!
//! let mut renderer = Renderer::new(RendererConfig::default());
//! renderer.render(&mut device, &mut scene, camera).unwrap();
//! ```

pub mod device;
pub mod geometry;
pub mod material;
pub mod rendering;
pub mod scene;
pub mod shaders;
pub mod transform;
