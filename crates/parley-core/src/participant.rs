use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A host-owned object bound to an authored role.
///
/// Conditions read variables and named conditions through this trait; events
/// write variables and invoke callbacks. The engine keeps no copy of
/// participant state.
pub trait Participant: Send {
    /// Class/type name used by `participant_kind` conditions.
    fn kind(&self) -> String;

    /// Current value of a variable, or `None` if the participant has no such variable.
    fn variable(&self, name: &str) -> Option<Value>;

    /// Write a variable. Returns `false` if the participant rejects the write.
    fn set_variable(&mut self, name: &str, value: Value) -> bool;

    /// Evaluate a named condition. `None` means the participant doesn't know it.
    fn check_condition(&self, name: &str) -> Option<bool> {
        let _ = name;
        None
    }

    /// Invoke a named callback. Returns whether the callback succeeded.
    fn invoke(&mut self, callback: &str, args: &[Value]) -> bool;
}

/// Shared participants: the host's lock serializes access across sessions.
impl<P: Participant> Participant for Arc<Mutex<P>> {
    fn kind(&self) -> String {
        self.lock().unwrap_or_else(|e| e.into_inner()).kind()
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.lock().unwrap_or_else(|e| e.into_inner()).variable(name)
    }

    fn set_variable(&mut self, name: &str, value: Value) -> bool {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_variable(name, value)
    }

    fn check_condition(&self, name: &str) -> Option<bool> {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .check_condition(name)
    }

    fn invoke(&mut self, callback: &str, args: &[Value]) -> bool {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .invoke(callback, args)
    }
}

/// Role name → participant, supplied fresh for every session.
#[derive(Default)]
pub struct ParticipantBinding {
    participants: HashMap<String, Box<dyn Participant>>,
}

impl ParticipantBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a participant to a role (builder style).
    pub fn with(mut self, role: impl Into<String>, participant: impl Participant + 'static) -> Self {
        self.bind(role, participant);
        self
    }

    /// Bind a participant to a role, replacing any previous binding.
    pub fn bind(&mut self, role: impl Into<String>, participant: impl Participant + 'static) {
        self.participants.insert(role.into(), Box::new(participant));
    }

    pub fn get(&self, role: &str) -> Option<&dyn Participant> {
        self.participants.get(role).map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, role: &str) -> Option<&mut (dyn Participant + 'static)> {
        self.participants.get_mut(role).map(|p| p.as_mut())
    }

    /// Convenience lookup of a participant variable.
    pub fn variable(&self, role: &str, name: &str) -> Option<Value> {
        self.get(role)?.variable(name)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.participants.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl std::fmt::Debug for ParticipantBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<&str> = self.roles().collect();
        roles.sort_unstable();
        f.debug_struct("ParticipantBinding")
            .field("roles", &roles)
            .finish()
    }
}

/// A participant whose state is a plain variable table.
///
/// Callbacks always succeed unless listed in `failing_callbacks`; every
/// invocation is recorded so hosts and tests can inspect what fired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryParticipant {
    pub kind: String,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub conditions: HashMap<String, bool>,
    /// When true, writes to variables that don't exist yet are rejected.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub failing_callbacks: Vec<String>,
    #[serde(skip)]
    pub invocations: Vec<(String, Vec<Value>)>,
}

impl MemoryParticipant {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_condition(mut self, name: impl Into<String>, value: bool) -> Self {
        self.conditions.insert(name.into(), value);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_failing_callback(mut self, name: impl Into<String>) -> Self {
        self.failing_callbacks.push(name.into());
        self
    }
}

impl Participant for MemoryParticipant {
    fn kind(&self) -> String {
        self.kind.clone()
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: Value) -> bool {
        if self.strict && !self.variables.contains_key(name) {
            return false;
        }
        self.variables.insert(name.to_string(), value);
        true
    }

    fn check_condition(&self, name: &str) -> Option<bool> {
        self.conditions.get(name).copied()
    }

    fn invoke(&mut self, callback: &str, args: &[Value]) -> bool {
        self.invocations.push((callback.to_string(), args.to_vec()));
        !self.failing_callbacks.iter().any(|c| c == callback)
    }
}
