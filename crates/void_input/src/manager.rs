//! Input manager
//!
//! Each update queries the device state once through the message bus, then
//! evaluates every action of every active scheme against that snapshot.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;
use void_core::{DeltaTime, Outcome};
use void_event::MessageDispatcher;

use crate::action::{InputAction, InputActionValue, InputActionValueType, PendingActionCallbacks};
use crate::binding::InputControl;
use crate::codes::{MouseAxisControl, MouseLockMode, MouseVectorControl};
use crate::messages::{
    ControllerState, ControllerStateRequest, KeyboardState, KeyboardStateRequest, MouseLockModeRequest,
    MouseState, MouseStateRequest, SetMouseLockRequest,
};
use crate::scheme::InputScheme;

/// Device readings for one update
#[derive(Debug, Clone, Default)]
pub struct InputDeviceSnapshot {
    pub keyboard: KeyboardState,
    pub mouse: MouseState,
    pub controllers: HashMap<u32, ControllerState>,
}

impl InputDeviceSnapshot {
    fn connected_controller(&self, index: u32) -> Option<&ControllerState> {
        self.controllers.get(&index).filter(|state| state.is_connected)
    }
}

type WarnedOperations = Arc<Mutex<HashSet<&'static str>>>;

/// The device reads one update needs, detached from the manager so they can
/// run without holding it
#[derive(Debug, Clone)]
pub struct SnapshotQuery {
    controller_indices: Vec<u32>,
    warned: WarnedOperations,
}

impl SnapshotQuery {
    pub fn controller_indices(&self) -> &[u32] {
        &self.controller_indices
    }

    pub fn run(&self, dispatcher: &dyn MessageDispatcher) -> InputDeviceSnapshot {
        let mut snapshot = InputDeviceSnapshot {
            keyboard: read_keyboard(dispatcher, &self.warned),
            mouse: read_mouse(dispatcher, &self.warned),
            controllers: HashMap::new(),
        };
        for &index in &self.controller_indices {
            snapshot.controllers.insert(index, read_controller(dispatcher, &self.warned, index));
        }
        snapshot
    }
}

/// Owns input schemes and drives their actions
#[derive(Debug, Default)]
pub struct InputManager {
    schemes: Vec<InputScheme>,
    warned: WarnedOperations,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// False when a scheme with the same name exists
    pub fn add_scheme(&mut self, scheme: InputScheme) -> bool {
        if self.scheme(scheme.name()).is_some() {
            return false;
        }
        self.schemes.push(scheme);
        true
    }

    pub fn remove_scheme(&mut self, name: &str) -> bool {
        let before = self.schemes.len();
        self.schemes.retain(|scheme| scheme.name() != name);
        self.schemes.len() != before
    }

    /// Make `name` the only active scheme
    pub fn activate_scheme(&mut self, name: &str) -> bool {
        if self.scheme(name).is_none() {
            return false;
        }
        for scheme in &mut self.schemes {
            let active = scheme.name() == name;
            scheme.set_active(active);
        }
        true
    }

    pub fn deactivate_scheme(&mut self, name: &str) -> bool {
        match self.scheme_mut(name) {
            Some(scheme) => {
                scheme.set_active(false);
                true
            }
            None => false,
        }
    }

    pub fn scheme(&self, name: &str) -> Option<&InputScheme> {
        self.schemes.iter().find(|scheme| scheme.name() == name)
    }

    pub fn scheme_mut(&mut self, name: &str) -> Option<&mut InputScheme> {
        self.schemes.iter_mut().find(|scheme| scheme.name() == name)
    }

    pub fn schemes(&self) -> &[InputScheme] {
        &self.schemes
    }

    pub fn keyboard_state(&self, dispatcher: &dyn MessageDispatcher) -> KeyboardState {
        read_keyboard(dispatcher, &self.warned)
    }

    pub fn mouse_state(&self, dispatcher: &dyn MessageDispatcher) -> MouseState {
        read_mouse(dispatcher, &self.warned)
    }

    pub fn controller_state(&self, dispatcher: &dyn MessageDispatcher, controller_index: u32) -> ControllerState {
        read_controller(dispatcher, &self.warned, controller_index)
    }

    pub fn set_mouse_lock_mode(&self, dispatcher: &dyn MessageDispatcher, mode: MouseLockMode) -> bool {
        let mut request = SetMouseLockRequest::new(mode);
        let outcome = dispatcher.send(&mut request);
        self.warn_if_failed("set_mouse_lock_mode", &outcome);
        outcome.succeeded()
    }

    pub fn mouse_lock_mode(&self, dispatcher: &dyn MessageDispatcher) -> MouseLockMode {
        let result = dispatcher.request(MouseLockModeRequest::new());
        self.warn_if_failed("mouse_lock_mode", result.outcome());
        result.into_payload().unwrap_or_default()
    }

    /// Controller slots read by bindings of active schemes, ascending
    pub fn active_controller_indices(&self) -> Vec<u32> {
        let indices: BTreeSet<u32> = self
            .schemes
            .iter()
            .filter(|scheme| scheme.is_active())
            .flat_map(|scheme| scheme.actions())
            .flat_map(|action| action.bindings())
            .filter_map(|binding| binding.control.controller_index())
            .collect();
        indices.into_iter().collect()
    }

    /// Query every device the active schemes need
    pub fn query_snapshot(&self, dispatcher: &dyn MessageDispatcher) -> InputDeviceSnapshot {
        self.snapshot_query().run(dispatcher)
    }

    /// The reads [`InputManager::query_snapshot`] would make, or `None`
    /// when no scheme is active
    pub fn pending_query(&self) -> Option<SnapshotQuery> {
        if self.schemes.iter().any(InputScheme::is_active) {
            Some(self.snapshot_query())
        } else {
            None
        }
    }

    fn snapshot_query(&self) -> SnapshotQuery {
        SnapshotQuery {
            controller_indices: self.active_controller_indices(),
            warned: self.warned.clone(),
        }
    }

    /// Refresh every action of every active scheme. Device handlers and
    /// action callbacks run while `self` is borrowed; see
    /// [`InputManager::pending_query`] and
    /// [`InputManager::apply_snapshot_deferred`] to run them unborrowed.
    pub fn update(&mut self, delta_time: &DeltaTime, dispatcher: &dyn MessageDispatcher) {
        let Some(query) = self.pending_query() else {
            return;
        };
        let snapshot = query.run(dispatcher);
        self.apply_snapshot(delta_time, &snapshot);
    }

    /// Evaluate active schemes against an existing snapshot
    pub fn apply_snapshot(&mut self, delta_time: &DeltaTime, snapshot: &InputDeviceSnapshot) {
        self.apply_snapshot_deferred(delta_time, snapshot).fire();
    }

    /// Evaluate active schemes and hand back the callbacks they owe
    pub fn apply_snapshot_deferred(
        &mut self,
        delta_time: &DeltaTime,
        snapshot: &InputDeviceSnapshot,
    ) -> PendingActionCallbacks {
        let mut pending = PendingActionCallbacks::new();
        for scheme in self.schemes.iter_mut().filter(|scheme| scheme.is_active()) {
            for action in scheme.actions_mut() {
                let value = evaluate_action(action, snapshot);
                action.apply_value_deferred(value, delta_time, &mut pending);
            }
        }
        pending
    }

    fn warn_if_failed(&self, operation: &'static str, outcome: &Outcome) {
        warn_if_failed(&self.warned, operation, outcome);
    }
}

fn read_keyboard(dispatcher: &dyn MessageDispatcher, warned: &WarnedOperations) -> KeyboardState {
    let result = dispatcher.request(KeyboardStateRequest::new());
    warn_if_failed(warned, "keyboard_state", result.outcome());
    result.into_payload().unwrap_or_default()
}

fn read_mouse(dispatcher: &dyn MessageDispatcher, warned: &WarnedOperations) -> MouseState {
    let result = dispatcher.request(MouseStateRequest::new());
    warn_if_failed(warned, "mouse_state", result.outcome());
    result.into_payload().unwrap_or_default()
}

fn read_controller(dispatcher: &dyn MessageDispatcher, warned: &WarnedOperations, controller_index: u32) -> ControllerState {
    let result = dispatcher.request(ControllerStateRequest::new(controller_index));
    warn_if_failed(warned, "controller_state", result.outcome());
    result.into_payload().unwrap_or_else(|| ControllerState {
        controller_index,
        ..ControllerState::default()
    })
}

/// Warn once per operation
fn warn_if_failed(warned: &WarnedOperations, operation: &'static str, outcome: &Outcome) {
    if outcome.succeeded() {
        return;
    }
    if warned.lock().insert(operation) {
        log::warn!("Input operation '{}' failed: {}", operation, outcome.report());
    }
}

/// Fold the bindings of `action` into a value
pub fn evaluate_action(action: &InputAction, snapshot: &InputDeviceSnapshot) -> InputActionValue {
    match action.value_type() {
        InputActionValueType::Button => InputActionValue::Button(evaluate_button(action, snapshot)),
        InputActionValueType::Axis => InputActionValue::Axis(evaluate_axis(action, snapshot).clamp(-1.0, 1.0)),
        InputActionValueType::Vector2 => InputActionValue::Vector2(evaluate_vector(action, snapshot)),
    }
}

fn evaluate_button(action: &InputAction, snapshot: &InputDeviceSnapshot) -> bool {
    action.bindings().iter().any(|binding| match binding.control {
        InputControl::Key(key) => snapshot.keyboard.is_pressed(key),
        InputControl::MouseButton(button) => snapshot.mouse.is_pressed(button),
        InputControl::ControllerButton {
            controller_index,
            button,
        } => snapshot
            .connected_controller(controller_index)
            .map(|controller| controller.is_pressed(button))
            .unwrap_or(false),
        _ => false,
    })
}

fn evaluate_axis(action: &InputAction, snapshot: &InputDeviceSnapshot) -> f32 {
    action
        .bindings()
        .iter()
        .map(|binding| match binding.control {
            InputControl::MouseAxis(MouseAxisControl::Wheel) => snapshot.mouse.wheel_delta * binding.scale,
            InputControl::ControllerAxis { controller_index, axis } => snapshot
                .connected_controller(controller_index)
                .and_then(|controller| controller.axis_values.get(&axis))
                .map(|value| value * binding.scale)
                .unwrap_or(0.0),
            _ => 0.0,
        })
        .sum()
}

fn evaluate_vector(action: &InputAction, snapshot: &InputDeviceSnapshot) -> Vec2 {
    action
        .bindings()
        .iter()
        .map(|binding| {
            let reading = match binding.control {
                InputControl::MouseVector(MouseVectorControl::Position) => snapshot.mouse.position,
                InputControl::MouseVector(MouseVectorControl::Delta) => snapshot.mouse.delta,
                InputControl::KeyboardComposite { up, down, left, right } => {
                    let keyboard = &snapshot.keyboard;
                    let axis = |positive: bool, negative: bool| positive as i32 as f32 - negative as i32 as f32;
                    Vec2::new(
                        axis(keyboard.is_pressed(right), keyboard.is_pressed(left)),
                        axis(keyboard.is_pressed(up), keyboard.is_pressed(down)),
                    )
                }
                InputControl::ControllerStick {
                    controller_index,
                    x_axis,
                    y_axis,
                } => match snapshot.connected_controller(controller_index) {
                    Some(controller) => Vec2::new(controller.axis(x_axis), controller.axis(y_axis)),
                    None => Vec2::ZERO,
                },
                _ => Vec2::ZERO,
            };
            reading * binding.scale
        })
        .fold(Vec2::ZERO, |total, reading| total + reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::InputBinding;
    use crate::codes::{ControllerAxis, ControllerButton, InputKey, MouseButton};

    fn scheme(name: &str, actions: Vec<InputAction>) -> InputScheme {
        InputScheme::with_actions(name, actions)
    }

    #[test]
    fn test_activate_is_exclusive() {
        let mut manager = InputManager::new();
        assert!(manager.add_scheme(InputScheme::new("menu")));
        assert!(manager.add_scheme(InputScheme::new("gameplay")));
        assert!(!manager.add_scheme(InputScheme::new("menu")));

        assert!(manager.activate_scheme("menu"));
        assert!(manager.activate_scheme("gameplay"));
        assert!(!manager.scheme("menu").unwrap().is_active());
        assert!(manager.scheme("gameplay").unwrap().is_active());

        assert!(manager.deactivate_scheme("gameplay"));
        assert!(!manager.activate_scheme("missing"));
        assert!(manager.remove_scheme("menu"));
        assert_eq!(manager.schemes().len(), 1);
    }

    #[test]
    fn test_button_reads_any_binding() {
        let fire = InputAction::new("fire", InputActionValueType::Button)
            .with_binding(MouseButton::Left)
            .with_binding(InputControl::ControllerButton {
                controller_index: 0,
                button: ControllerButton::RightShoulder,
            });

        let mut snapshot = InputDeviceSnapshot::default();
        assert_eq!(evaluate_action(&fire, &snapshot), InputActionValue::Button(false));

        let mut pad = ControllerState {
            is_connected: false,
            ..Default::default()
        };
        pad.pressed_buttons.insert(ControllerButton::RightShoulder);
        snapshot.controllers.insert(0, pad.clone());
        assert_eq!(evaluate_action(&fire, &snapshot), InputActionValue::Button(false));

        pad.is_connected = true;
        snapshot.controllers.insert(0, pad);
        assert_eq!(evaluate_action(&fire, &snapshot), InputActionValue::Button(true));
    }

    #[test]
    fn test_axis_is_clamped() {
        let zoom = InputAction::new("zoom", InputActionValueType::Axis)
            .with_binding(InputBinding::scaled(InputControl::MouseAxis(MouseAxisControl::Wheel), 0.5));

        let mut snapshot = InputDeviceSnapshot::default();
        snapshot.mouse.wheel_delta = 1.0;
        assert_eq!(evaluate_action(&zoom, &snapshot), InputActionValue::Axis(0.5));
        snapshot.mouse.wheel_delta = 8.0;
        assert_eq!(evaluate_action(&zoom, &snapshot), InputActionValue::Axis(1.0));
        snapshot.mouse.wheel_delta = -8.0;
        assert_eq!(evaluate_action(&zoom, &snapshot), InputActionValue::Axis(-1.0));
    }

    #[test]
    fn test_vector_sums_bindings() {
        let movement = InputAction::new("move", InputActionValueType::Vector2)
            .with_binding(InputControl::wasd())
            .with_binding(InputControl::ControllerStick {
                controller_index: 1,
                x_axis: ControllerAxis::LeftX,
                y_axis: ControllerAxis::LeftY,
            });

        let mut snapshot = InputDeviceSnapshot::default();
        snapshot.keyboard.pressed_keys.insert(InputKey::W);
        snapshot.keyboard.pressed_keys.insert(InputKey::A);
        let mut pad = ControllerState {
            is_connected: true,
            controller_index: 1,
            ..Default::default()
        };
        pad.axis_values.insert(ControllerAxis::LeftX, 0.25);
        snapshot.controllers.insert(1, pad);

        assert_eq!(
            evaluate_action(&movement, &snapshot),
            InputActionValue::Vector2(Vec2::new(-0.75, 1.0))
        );
    }

    #[test]
    fn test_controller_indices_from_active_schemes() {
        let mut manager = InputManager::new();
        manager.add_scheme(scheme(
            "pad",
            vec![InputAction::new("jump", InputActionValueType::Button)
                .with_binding(InputControl::ControllerButton {
                    controller_index: 2,
                    button: ControllerButton::South,
                })
                .with_binding(InputControl::ControllerAxis {
                    controller_index: 0,
                    axis: ControllerAxis::LeftTrigger,
                })
                .with_binding(InputControl::ControllerButton {
                    controller_index: 2,
                    button: ControllerButton::East,
                })],
        ));
        assert!(manager.active_controller_indices().is_empty());
        manager.activate_scheme("pad");
        assert_eq!(manager.active_controller_indices(), vec![0, 2]);
    }
}
