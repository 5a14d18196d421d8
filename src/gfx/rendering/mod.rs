//! Frame rendering
//!
//! [`Renderer`] turns a scene and a camera node into a shadow pass and a main
//! pass on a [`GpuDevice`](crate::gfx::device::GpuDevice). Light gathering
//! lives in [`lights`].

pub mod lights;
mod renderer;

pub use lights::{LightEnvironment, ShadowCaster};
pub use renderer::{
    RenderOptions, RenderPhase, RenderStats, Renderer, RendererConfig, ShadowConfig,
    SHADOW_DEBUG_ENV,
};
