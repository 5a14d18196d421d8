//! Window and frame loop
//!
//! [`run`] opens a window, creates a [`WgpuDevice`] for it and drives an
//! [`Example`]: `initialize` once, then `update` every frame with a
//! [`FrameContext`], and `shutdown` when the loop ends. Everything an example
//! needs per frame arrives through the context; there is no global state.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use crate::gfx::device::{GpuDevice, HeadlessDevice, WgpuDevice};
use crate::input::{InputSnapshot, InputState};
use crate::logging::{init_logging, LoggingConfig};
use crate::time::FrameClock;

/// Per-frame data handed to [`Example::update`].
pub struct FrameContext<'a> {
    /// Clamped seconds since the previous frame.
    pub delta_time: f32,
    /// Seconds since the first frame.
    pub time: f64,
    pub frame_index: u64,
    pub input: &'a InputSnapshot,
    pub device: &'a mut dyn GpuDevice,
    /// Drawable size in physical pixels.
    pub viewport: (u32, u32),
}

/// An application driven by [`run`].
pub trait Example {
    /// Builds scenes and GPU resources.
    fn initialize(&mut self, device: &mut dyn GpuDevice, viewport: (u32, u32)) -> anyhow::Result<()>;

    /// Advances and renders one frame.
    fn update(&mut self, frame: &mut FrameContext<'_>) -> anyhow::Result<()>;

    /// The window was resized; typically adjusts camera aspect ratios.
    fn resize(&mut self, _width: u32, _height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases GPU resources. Called once, after the last frame.
    fn shutdown(&mut self, _device: &mut dyn GpuDevice) {}
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// `None` leaves logger installation to the caller.
    pub logging: Option<LoggingConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            width: 800,
            height: 600,
            vsync: true,
            logging: Some(LoggingConfig::default()),
        }
    }
}

impl AppConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_logging(mut self, logging: Option<LoggingConfig>) -> Self {
        self.logging = logging;
        self
    }
}

/// Runs `example` in a new window until it quits (Escape, window close, or
/// an error from one of its hooks, which is returned).
pub fn run<E: Example>(config: AppConfig, example: E) -> anyhow::Result<()> {
    if let Some(logging) = config.logging.clone() {
        init_logging(logging);
    }
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = AppState {
        config,
        example,
        window: None,
        device: None,
        input: InputState::new(),
        clock: FrameClock::new(),
        initialized: false,
        error: None,
    };
    event_loop.run_app(&mut app)?;
    app.finish();
    match app.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Drives `example` for `frames` frames on an in-memory device with a fixed
/// delta time. Used for tests and offscreen validation.
pub fn run_headless<E: Example>(
    example: &mut E,
    device: &mut HeadlessDevice,
    frames: u32,
    delta_time: f32,
) -> anyhow::Result<()> {
    let viewport = device.viewport_size();
    example.initialize(device, viewport)?;
    let input = InputSnapshot::default();
    let mut time = 0.0;
    let result = (0..frames).try_for_each(|frame_index| {
        time += delta_time as f64;
        let mut frame = FrameContext {
            delta_time,
            time,
            frame_index: frame_index as u64,
            input: &input,
            device: &mut *device,
            viewport,
        };
        example.update(&mut frame)
    });
    example.shutdown(device);
    result
}

struct AppState<E: Example> {
    config: AppConfig,
    example: E,
    window: Option<Arc<Window>>,
    device: Option<WgpuDevice>,
    input: InputState,
    clock: FrameClock,
    initialized: bool,
    error: Option<anyhow::Error>,
}

impl<E: Example> AppState<E> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn create_device(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attributes = WindowAttributes::default()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);
        let PhysicalSize { width, height } = window.inner_size();
        let device = pollster::block_on(WgpuDevice::new(
            window.clone(),
            width.max(1),
            height.max(1),
            self.config.vsync,
        ))?;

        self.window = Some(window);
        let device = self.device.insert(device);
        self.example.initialize(device, (width.max(1), height.max(1)))?;
        self.initialized = true;
        self.clock.reset();
        Ok(())
    }

    fn frame(&mut self) -> anyhow::Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        let time = self.clock.tick();
        let input = self.input.snapshot();
        let viewport = device.viewport_size();

        device.begin_frame();
        let mut frame = FrameContext {
            delta_time: time.delta,
            time: time.elapsed,
            frame_index: time.frame_index,
            input: &input,
            device: &mut *device,
            viewport,
        };
        self.example.update(&mut frame)?;
        device.end_frame()?;
        Ok(())
    }

    fn finish(&mut self) {
        if !self.initialized {
            return;
        }
        if let Some(device) = self.device.as_mut() {
            self.example.shutdown(device);
        }
        self.initialized = false;
    }
}

impl<E: Example> ApplicationHandler for AppState<E> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            self.clock.reset();
            return;
        }
        if let Err(error) = self.create_device(event_loop) {
            self.fail(event_loop, error);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if width == 0 || height == 0 {
                    return;
                }
                if let Some(device) = self.device.as_mut() {
                    device.resize(width, height);
                }
                if let Err(error) = self.example.resize(width, height) {
                    self.fail(event_loop, error);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(error) = self.frame() {
                    self.fail(event_loop, error);
                    return;
                }
            }
            _ => (),
        }

        if self.input.quit_requested() {
            event_loop.exit();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        self.input.handle_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::box_geometry;
    use crate::gfx::material::{Material, MaterialKind};
    use crate::gfx::rendering::{Renderer, RendererConfig};
    use crate::gfx::scene::{Camera, Mesh, NodeId, Positionable, Scene};

    #[derive(Default)]
    struct Spinner {
        scene: Scene,
        renderer: Option<Renderer>,
        camera: Option<NodeId>,
        cube: Option<NodeId>,
        frames: u64,
        last_rotation: f32,
    }

    impl Example for Spinner {
        fn initialize(&mut self, device: &mut dyn GpuDevice, (width, height): (u32, u32)) -> anyhow::Result<()> {
            let camera = Camera::perspective(60.0, width as f32 / height as f32, 0.1, 100.0);
            let camera = self.scene.add_camera("camera", camera);
            self.scene.node_mut(camera)?.set_position([0.0, 0.0, 4.0]);
            let geometry = box_geometry(1.0, 1.0, 1.0).build(device);
            let material = Material::new(device, MaterialKind::Surface)?;
            let cube = self.scene.add_mesh("cube", Mesh::new(device, geometry, material)?);
            self.camera = Some(camera);
            self.cube = Some(cube);
            self.renderer = Some(Renderer::new(RendererConfig::default()));
            Ok(())
        }

        fn update(&mut self, frame: &mut FrameContext<'_>) -> anyhow::Result<()> {
            let (Some(renderer), Some(camera), Some(cube)) = (self.renderer.as_mut(), self.camera, self.cube) else {
                anyhow::bail!("update before initialize");
            };
            let node = self.scene.node_mut(cube)?;
            node.rotate_y(frame.delta_time, true);
            self.last_rotation = node.local_transform().x.x;
            renderer.render(frame.device, &mut self.scene, camera)?;
            self.frames = frame.frame_index + 1;
            Ok(())
        }

        fn shutdown(&mut self, device: &mut dyn GpuDevice) {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.teardown(device);
            }
            self.scene.teardown(device);
        }
    }

    #[test]
    fn test_headless_loop_runs_and_releases() {
        let mut device = HeadlessDevice::new(320, 240);
        let mut example = Spinner::default();
        run_headless(&mut example, &mut device, 3, 0.5).unwrap();

        assert_eq!(example.frames, 3);
        assert_eq!(device.passes().len(), 3);
        assert_eq!(device.live_resources().total(), 0);
        assert!(example.scene.is_empty());
        assert!((example.last_rotation - 1.5f32.cos()).abs() < 1e-5);
    }
}
