//! Lumen 3D engine
//!
//! A retained-mode scene-graph renderer built on wgpu and winit: typed
//! attribute buffers, named-input shader binding, a node hierarchy with
//! cameras and lights, and a renderer with two-pass shadow mapping.

pub mod app;
pub mod assets;
pub mod error;
pub mod gfx;
pub mod input;
pub mod logging;
pub mod prelude;
pub mod time;
pub mod wgpu_utils;

pub use app::{run, AppConfig, Example, FrameContext};
pub use error::{EngineError, Result};
