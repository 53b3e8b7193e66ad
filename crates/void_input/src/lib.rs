//! # void_input - Input Actions
//!
//! Device-independent input for plugins:
//! - Actions bound to keys, mouse controls and gamepads, valued as a
//!   button, an axis or a 2D vector
//! - Schemes grouping actions, one active at a time
//! - Device state read each frame through bus requests answered by a
//!   platform plugin
//!
//! ## Example
//!
//! ```ignore
//! use void_input::prelude::*;
//!
//! let mut jump = InputAction::new("jump", InputActionValueType::Button)
//!     .with_binding(InputKey::Space);
//! jump.on_start(|_| log::info!("jump"));
//!
//! let mut input = InputManager::new();
//! input.add_scheme(InputScheme::with_actions("gameplay", [jump]));
//! input.activate_scheme("gameplay");
//! input.update(&delta_time, dispatcher.as_ref());
//! ```

pub mod action;
pub mod binding;
pub mod codes;
pub mod manager;
pub mod messages;
pub mod scheme;

pub use action::{InputAction, InputActionCallback, InputActionValue, InputActionValueType, PendingActionCallbacks};
pub use binding::{InputBinding, InputControl};
pub use codes::*;
pub use manager::{evaluate_action, InputDeviceSnapshot, InputManager, SnapshotQuery};
pub use messages::*;
pub use scheme::InputScheme;

/// Prelude
pub mod prelude {
    pub use crate::action::{InputAction, InputActionValue, InputActionValueType, PendingActionCallbacks};
    pub use crate::binding::{InputBinding, InputControl};
    pub use crate::codes::*;
    pub use crate::manager::InputManager;
    pub use crate::messages::*;
    pub use crate::scheme::InputScheme;
}
