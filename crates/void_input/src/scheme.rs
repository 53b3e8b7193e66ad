//! Named action sets

use crate::action::InputAction;

/// A named set of actions switched on and off as a unit
#[derive(Debug, Clone)]
pub struct InputScheme {
    name: String,
    is_active: bool,
    actions: Vec<InputAction>,
}

impl InputScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: false,
            actions: Vec::new(),
        }
    }

    /// Build from actions; later duplicates of a name are dropped
    pub fn with_actions(name: impl Into<String>, actions: impl IntoIterator<Item = InputAction>) -> Self {
        let mut scheme = Self::new(name);
        for action in actions {
            scheme.add_action(action);
        }
        scheme
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, is_active: bool) {
        self.is_active = is_active;
    }

    /// False when an action with the same name exists
    pub fn add_action(&mut self, action: InputAction) -> bool {
        if self.action(action.name()).is_some() {
            log::warn!("Input scheme '{}' already has action '{}'", self.name, action.name());
            return false;
        }
        self.actions.push(action);
        true
    }

    pub fn remove_action(&mut self, name: &str) -> bool {
        let before = self.actions.len();
        self.actions.retain(|action| action.name() != name);
        self.actions.len() != before
    }

    pub fn action(&self, name: &str) -> Option<&InputAction> {
        self.actions.iter().find(|action| action.name() == name)
    }

    pub fn action_mut(&mut self, name: &str) -> Option<&mut InputAction> {
        self.actions.iter_mut().find(|action| action.name() == name)
    }

    pub fn actions(&self) -> &[InputAction] {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut [InputAction] {
        &mut self.actions
    }
}
