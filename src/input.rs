//! Keyboard and mouse state for the frame loop.
//!
//! [`InputState`] accumulates winit events between frames; once per frame
//! the loop takes an [`InputSnapshot`], which is what examples read.

use std::collections::HashSet;

use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Running input state for one window.
#[derive(Debug, Default)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,
    mouse_delta: (f64, f64),
    quit_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the event was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                self.apply_key(*code, *state, *repeat);
                true
            }
            WindowEvent::Focused(false) => {
                // Avoid stuck keys when focus changes mid-press.
                self.keys_down.clear();
                false
            }
            WindowEvent::CloseRequested => {
                self.quit_requested = true;
                true
            }
            _ => false,
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.mouse_delta.0 += delta.0;
            self.mouse_delta.1 += delta.1;
        }
    }

    pub fn apply_key(&mut self, code: KeyCode, state: ElementState, repeat: bool) {
        match state {
            ElementState::Pressed => {
                if self.keys_down.insert(code) && !repeat {
                    self.keys_pressed.insert(code);
                }
                if code == KeyCode::Escape {
                    self.quit_requested = true;
                }
            }
            ElementState::Released => {
                if self.keys_down.remove(&code) {
                    self.keys_released.insert(code);
                }
            }
        }
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Captures this frame's input and clears the per-frame transitions.
    pub fn snapshot(&mut self) -> InputSnapshot {
        InputSnapshot {
            keys_down: self.keys_down.clone(),
            keys_pressed: std::mem::take(&mut self.keys_pressed),
            keys_released: std::mem::take(&mut self.keys_released),
            mouse_delta: std::mem::take(&mut self.mouse_delta),
            quit_requested: self.quit_requested,
        }
    }
}

/// Input as seen by one frame.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    pub keys_down: HashSet<KeyCode>,
    pub keys_pressed: HashSet<KeyCode>,
    pub keys_released: HashSet<KeyCode>,
    pub mouse_delta: (f64, f64),
    pub quit_requested: bool,
}

impl InputSnapshot {
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_last_one_frame() {
        let mut input = InputState::new();
        input.apply_key(KeyCode::KeyW, ElementState::Pressed, false);

        let first = input.snapshot();
        assert!(first.is_key_down(KeyCode::KeyW));
        assert!(first.is_key_pressed(KeyCode::KeyW));

        let second = input.snapshot();
        assert!(second.is_key_down(KeyCode::KeyW));
        assert!(!second.is_key_pressed(KeyCode::KeyW));

        input.apply_key(KeyCode::KeyW, ElementState::Released, false);
        let third = input.snapshot();
        assert!(!third.is_key_down(KeyCode::KeyW));
        assert!(third.is_key_released(KeyCode::KeyW));
    }

    #[test]
    fn test_escape_requests_quit() {
        let mut input = InputState::new();
        assert!(!input.snapshot().quit_requested);
        input.apply_key(KeyCode::Escape, ElementState::Pressed, false);
        assert!(input.snapshot().quit_requested);
    }

    #[test]
    fn test_mouse_motion_accumulates_until_snapshot() {
        let mut input = InputState::new();
        input.handle_device_event(&DeviceEvent::MouseMotion { delta: (1.0, 2.0) });
        input.handle_device_event(&DeviceEvent::MouseMotion { delta: (0.5, -1.0) });
        assert_eq!(input.snapshot().mouse_delta, (1.5, 1.0));
        assert_eq!(input.snapshot().mouse_delta, (0.0, 0.0));
    }
}
