//! # Lumen Prelude
//!
//! Commonly used types and traits in one import:
//!
//! ```rust
//! use lumen::prelude::*;
//! ```

pub use crate::app::{run, AppConfig, Example, FrameContext};
pub use crate::error::{EngineError, Result};
pub use crate::input::InputSnapshot;
pub use crate::logging::{init_logging, LoggingConfig};

pub use crate::gfx::device::{GpuDevice, HeadlessDevice};
pub use crate::gfx::geometry::{
    AttributeData, AttributeType, Geometry, GeometryData, COLOR, NORMAL, POSITION, UV,
};
pub use crate::gfx::material::{LineType, Material, MaterialKind, SettingValue};
pub use crate::gfx::rendering::{RenderOptions, Renderer, RendererConfig, ShadowConfig};
pub use crate::gfx::scene::{
    helpers, Camera, Drawable, Illuminates, Light, Mesh, MovementRig, NodeId, Positionable, Scene,
    DEFAULT_ATTENUATION,
};
pub use crate::gfx::transform;
