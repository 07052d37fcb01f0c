use serde::{Deserialize, Serialize};

use crate::condition::Operand;
use crate::value::{ModifyOp, Value};

/// A single side effect fired on node enter or exit.
///
/// An event is simply an ordered `Vec<Effect>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Read-modify-write of a participant variable.
    Modify {
        role: String,
        variable: String,
        op: ModifyOp,
        value: Operand,
    },
    /// Named callback on a participant with literal arguments.
    Invoke {
        role: String,
        callback: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Effect {
    pub fn set(role: impl Into<String>, variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Effect::modify(role, variable, ModifyOp::Set, value)
    }

    pub fn modify(
        role: impl Into<String>,
        variable: impl Into<String>,
        op: ModifyOp,
        value: impl Into<Value>,
    ) -> Self {
        Effect::Modify {
            role: role.into(),
            variable: variable.into(),
            op,
            value: Operand::Literal(value.into()),
        }
    }

    pub fn invoke(role: impl Into<String>, callback: impl Into<String>, args: Vec<Value>) -> Self {
        Effect::Invoke {
            role: role.into(),
            callback: callback.into(),
            args,
        }
    }

    /// Role the effect is dispatched to.
    pub fn role(&self) -> &str {
        match self {
            Effect::Modify { role, .. } | Effect::Invoke { role, .. } => role,
        }
    }
}
