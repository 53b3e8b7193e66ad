//! Input actions
//!
//! An action folds the readings of its bindings into one value per frame and
//! reports transitions through callbacks:
//! - inactive → active: `on_start` then `on_performed`
//! - active with a changed value: `on_performed`
//! - active → inactive: `on_cancelled`

use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use void_core::DeltaTime;

use crate::binding::InputBinding;

/// Axis magnitude below which an axis action is idle
pub const AXIS_ACTIVE_EPSILON: f32 = 0.1;
/// Per-component magnitude below which a vector action is idle
pub const VECTOR_ACTIVE_EPSILON: f32 = 0.1;

const CHANGE_EPSILON: f32 = 0.0001;

/// Shape of an action's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputActionValueType {
    Button,
    Axis,
    Vector2,
}

/// Current value of an action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputActionValue {
    Button(bool),
    Axis(f32),
    Vector2(Vec2),
}

impl InputActionValue {
    /// Resting value for `value_type`
    pub fn default_for(value_type: InputActionValueType) -> Self {
        match value_type {
            InputActionValueType::Button => InputActionValue::Button(false),
            InputActionValueType::Axis => InputActionValue::Axis(0.0),
            InputActionValueType::Vector2 => InputActionValue::Vector2(Vec2::ZERO),
        }
    }

    pub fn is_active(&self) -> bool {
        match *self {
            InputActionValue::Button(pressed) => pressed,
            InputActionValue::Axis(value) => value.abs() >= AXIS_ACTIVE_EPSILON,
            InputActionValue::Vector2(value) => {
                value.x.abs() >= VECTOR_ACTIVE_EPSILON || value.y.abs() >= VECTOR_ACTIVE_EPSILON
            }
        }
    }

    pub fn differs_from(&self, other: &InputActionValue) -> bool {
        match (*self, *other) {
            (InputActionValue::Button(a), InputActionValue::Button(b)) => a != b,
            (InputActionValue::Axis(a), InputActionValue::Axis(b)) => (a - b).abs() >= CHANGE_EPSILON,
            (InputActionValue::Vector2(a), InputActionValue::Vector2(b)) => {
                (a.x - b.x).abs() >= CHANGE_EPSILON || (a.y - b.y).abs() >= CHANGE_EPSILON
            }
            _ => true,
        }
    }

    pub fn as_button(&self) -> Option<bool> {
        match *self {
            InputActionValue::Button(pressed) => Some(pressed),
            _ => None,
        }
    }

    pub fn as_axis(&self) -> Option<f32> {
        match *self {
            InputActionValue::Axis(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<Vec2> {
        match *self {
            InputActionValue::Vector2(value) => Some(value),
            _ => None,
        }
    }
}

/// Callback invoked with the action after a transition
pub type InputActionCallback = Arc<dyn Fn(&InputAction) + Send + Sync>;

/// A named, bound input action
#[derive(Clone)]
pub struct InputAction {
    name: String,
    value_type: InputActionValueType,
    bindings: Vec<InputBinding>,
    value: InputActionValue,
    is_active: bool,
    held_seconds: f64,
    on_start: Vec<InputActionCallback>,
    on_performed: Vec<InputActionCallback>,
    on_cancelled: Vec<InputActionCallback>,
}

impl InputAction {
    pub fn new(name: impl Into<String>, value_type: InputActionValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            bindings: Vec::new(),
            value: InputActionValue::default_for(value_type),
            is_active: false,
            held_seconds: 0.0,
            on_start: Vec::new(),
            on_performed: Vec::new(),
            on_cancelled: Vec::new(),
        }
    }

    /// Builder: add a binding
    pub fn with_binding(mut self, binding: impl Into<InputBinding>) -> Self {
        self.bindings.push(binding.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> InputActionValueType {
        self.value_type
    }

    pub fn bindings(&self) -> &[InputBinding] {
        &self.bindings
    }

    pub fn value(&self) -> InputActionValue {
        self.value
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Seconds the current value has been held unchanged
    pub fn held_seconds(&self) -> f64 {
        self.held_seconds
    }

    pub fn add_binding(&mut self, binding: impl Into<InputBinding>) {
        self.bindings.push(binding.into());
    }

    /// Remove the first matching binding
    pub fn remove_binding(&mut self, binding: &InputBinding) -> bool {
        match self.bindings.iter().position(|existing| existing.matches(binding)) {
            Some(index) => {
                self.bindings.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn on_start(&mut self, callback: impl Fn(&InputAction) + Send + Sync + 'static) {
        self.on_start.push(Arc::new(callback));
    }

    pub fn on_performed(&mut self, callback: impl Fn(&InputAction) + Send + Sync + 'static) {
        self.on_performed.push(Arc::new(callback));
    }

    pub fn on_cancelled(&mut self, callback: impl Fn(&InputAction) + Send + Sync + 'static) {
        self.on_cancelled.push(Arc::new(callback));
    }

    /// Store this frame's value and fire the matching callbacks
    pub fn apply_value(&mut self, value: InputActionValue, delta_time: &DeltaTime) {
        let callbacks = self.advance(value, delta_time);
        for callback in &callbacks {
            callback(self);
        }
    }

    /// Store this frame's value and queue the matching callbacks on
    /// `pending` instead of running them
    pub fn apply_value_deferred(
        &mut self,
        value: InputActionValue,
        delta_time: &DeltaTime,
        pending: &mut PendingActionCallbacks,
    ) {
        let callbacks = self.advance(value, delta_time);
        if callbacks.is_empty() {
            return;
        }
        let action = Arc::new(self.clone());
        pending
            .calls
            .extend(callbacks.into_iter().map(|callback| (callback, action.clone())));
    }

    fn advance(&mut self, value: InputActionValue, delta_time: &DeltaTime) -> Vec<InputActionCallback> {
        let was_active = self.is_active;
        let changed = self.value.differs_from(&value);

        self.value = value;
        self.is_active = value.is_active();
        if changed {
            self.held_seconds = 0.0;
        } else {
            self.held_seconds += delta_time.seconds;
        }

        match (was_active, self.is_active) {
            (false, true) => self.on_start.iter().chain(&self.on_performed).cloned().collect(),
            (true, false) => self.on_cancelled.clone(),
            (true, true) if changed => self.on_performed.clone(),
            _ => Vec::new(),
        }
    }
}

/// Action callbacks collected during an update, each paired with the action
/// as it stood after its transition
#[derive(Default)]
pub struct PendingActionCallbacks {
    calls: Vec<(InputActionCallback, Arc<InputAction>)>,
}

impl PendingActionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Run every queued callback in transition order
    pub fn fire(self) {
        for (callback, action) in &self.calls {
            callback(action);
        }
    }
}

impl fmt::Debug for PendingActionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingActionCallbacks")
            .field("len", &self.calls.len())
            .finish()
    }
}

impl fmt::Debug for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputAction")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("bindings", &self.bindings)
            .field("value", &self.value)
            .field("is_active", &self.is_active)
            .finish()
    }
}
