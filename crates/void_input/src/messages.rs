//! Device-state requests answered by platform input plugins

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use void_event::MessageHeader;

use crate::codes::{ControllerAxis, ControllerButton, InputKey, MouseButton, MouseLockMode};

/// Keys held this frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardState {
    pub pressed_keys: HashSet<InputKey>,
}

impl KeyboardState {
    pub fn is_pressed(&self, key: InputKey) -> bool {
        self.pressed_keys.contains(&key)
    }
}

/// Pointer reading for this frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseState {
    pub pressed_buttons: HashSet<MouseButton>,
    pub position: Vec2,
    pub delta: Vec2,
    pub wheel_delta: f32,
}

impl MouseState {
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }
}

/// Gamepad reading for one controller slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub is_connected: bool,
    pub controller_index: u32,
    pub pressed_buttons: HashSet<ControllerButton>,
    pub axis_values: HashMap<ControllerAxis, f32>,
}

impl ControllerState {
    pub fn is_pressed(&self, button: ControllerButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Axis value, zero when the axis was not reported
    pub fn axis(&self, axis: ControllerAxis) -> f32 {
        self.axis_values.get(&axis).copied().unwrap_or(0.0)
    }
}

#[derive(Debug)]
pub struct KeyboardStateRequest {
    pub header: MessageHeader,
    pub response: Option<KeyboardState>,
}

void_event::request!(KeyboardStateRequest => KeyboardState);

impl KeyboardStateRequest {
    pub fn new() -> Self {
        Self {
            header: MessageHeader::request(),
            response: None,
        }
    }
}

impl Default for KeyboardStateRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MouseStateRequest {
    pub header: MessageHeader,
    pub response: Option<MouseState>,
}

void_event::request!(MouseStateRequest => MouseState);

impl MouseStateRequest {
    pub fn new() -> Self {
        Self {
            header: MessageHeader::request(),
            response: None,
        }
    }
}

impl Default for MouseStateRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ControllerStateRequest {
    pub header: MessageHeader,
    pub controller_index: u32,
    pub response: Option<ControllerState>,
}

void_event::request!(ControllerStateRequest => ControllerState);

impl ControllerStateRequest {
    pub fn new(controller_index: u32) -> Self {
        Self {
            header: MessageHeader::request(),
            controller_index,
            response: None,
        }
    }
}

/// Change the cursor capture mode
#[derive(Debug)]
pub struct SetMouseLockRequest {
    pub header: MessageHeader,
    pub mode: MouseLockMode,
    pub response: Option<()>,
}

void_event::request!(SetMouseLockRequest => ());

impl SetMouseLockRequest {
    pub fn new(mode: MouseLockMode) -> Self {
        Self {
            header: MessageHeader::request(),
            mode,
            response: None,
        }
    }
}

/// Query the cursor capture mode
#[derive(Debug)]
pub struct MouseLockModeRequest {
    pub header: MessageHeader,
    pub response: Option<MouseLockMode>,
}

void_event::request!(MouseLockModeRequest => MouseLockMode);

impl MouseLockModeRequest {
    pub fn new() -> Self {
        Self {
            header: MessageHeader::request(),
            response: None,
        }
    }
}

impl Default for MouseLockModeRequest {
    fn default() -> Self {
        Self::new()
    }
}
