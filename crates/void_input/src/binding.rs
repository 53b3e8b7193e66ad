//! Bindings from device controls to actions

use crate::codes::{ControllerAxis, ControllerButton, InputKey, MouseAxisControl, MouseButton, MouseVectorControl};

const SCALE_EPSILON: f32 = 0.0001;

/// A device control an action can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputControl {
    Key(InputKey),
    MouseButton(MouseButton),
    MouseVector(MouseVectorControl),
    MouseAxis(MouseAxisControl),
    /// Four keys read as a 2D vector (right/up positive)
    KeyboardComposite {
        up: InputKey,
        down: InputKey,
        left: InputKey,
        right: InputKey,
    },
    ControllerButton {
        controller_index: u32,
        button: ControllerButton,
    },
    ControllerAxis {
        controller_index: u32,
        axis: ControllerAxis,
    },
    ControllerStick {
        controller_index: u32,
        x_axis: ControllerAxis,
        y_axis: ControllerAxis,
    },
}

impl InputControl {
    /// Controller slot this control reads, if it reads one
    pub fn controller_index(&self) -> Option<u32> {
        match self {
            InputControl::ControllerButton { controller_index, .. }
            | InputControl::ControllerAxis { controller_index, .. }
            | InputControl::ControllerStick { controller_index, .. } => Some(*controller_index),
            _ => None,
        }
    }

    /// WASD composite
    pub fn wasd() -> Self {
        InputControl::KeyboardComposite {
            up: InputKey::W,
            down: InputKey::S,
            left: InputKey::A,
            right: InputKey::D,
        }
    }
}

impl Default for InputControl {
    fn default() -> Self {
        InputControl::Key(InputKey::Unknown)
    }
}

/// A control with a scale applied to its reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputBinding {
    pub control: InputControl,
    pub scale: f32,
}

impl InputBinding {
    pub fn new(control: InputControl) -> Self {
        Self { control, scale: 1.0 }
    }

    pub fn scaled(control: InputControl, scale: f32) -> Self {
        Self { control, scale }
    }

    /// Same control with a scale equal within tolerance
    pub fn matches(&self, other: &InputBinding) -> bool {
        self.control == other.control && (self.scale - other.scale).abs() < SCALE_EPSILON
    }
}

impl Default for InputBinding {
    fn default() -> Self {
        Self::new(InputControl::default())
    }
}

impl From<InputControl> for InputBinding {
    fn from(control: InputControl) -> Self {
        Self::new(control)
    }
}

impl From<InputKey> for InputBinding {
    fn from(key: InputKey) -> Self {
        Self::new(InputControl::Key(key))
    }
}

impl From<MouseButton> for InputBinding {
    fn from(button: MouseButton) -> Self {
        Self::new(InputControl::MouseButton(button))
    }
}
