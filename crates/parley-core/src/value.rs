use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance used for float equality, matching the authoring tool's notion of "equal".
pub const FLOAT_EPSILON: f64 = 1.0e-8;

/// A participant variable value or an authored literal.
///
/// Serialized untagged so assets can write plain JSON literals:
/// `true`, `3`, `2.5`, `"angry"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Names double as enum values.
    Name(String),
}

impl Value {
    pub fn name(s: impl Into<String>) -> Self {
        Value::Name(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Name(_) => "name",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare two values with the given operator.
    ///
    /// Ints and floats compare numerically, names lexicographically, bools only
    /// support equality. Any other pairing is incomparable and yields `false`.
    pub fn compare(&self, op: CompareOp, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                _ => false,
            },
            (Value::Int(a), Value::Int(b)) => op.holds(a.cmp(b)),
            (Value::Name(a), Value::Name(b)) => op.holds(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => compare_floats(op, a, b),
                _ => false,
            },
        }
    }

    /// Apply a modification, keeping the type of `self`.
    ///
    /// Returns `None` when the types are incompatible or the result overflows.
    pub fn modify(&self, op: ModifyOp, operand: &Value) -> Option<Value> {
        match op {
            ModifyOp::Set => match (self, operand) {
                (Value::Float(_), Value::Int(b)) => Some(Value::Float(*b as f64)),
                _ if self.type_name() == operand.type_name() => Some(operand.clone()),
                _ => None,
            },
            ModifyOp::Add | ModifyOp::Subtract | ModifyOp::Multiply => match (self, operand) {
                (Value::Int(a), Value::Int(b)) => {
                    let result = match op {
                        ModifyOp::Add => a.checked_add(*b),
                        ModifyOp::Subtract => a.checked_sub(*b),
                        _ => a.checked_mul(*b),
                    };
                    result.map(Value::Int)
                }
                (Value::Float(a), rhs) => {
                    let b = rhs.as_f64()?;
                    let result = match op {
                        ModifyOp::Add => a + b,
                        ModifyOp::Subtract => a - b,
                        _ => a * b,
                    };
                    result.is_finite().then_some(Value::Float(result))
                }
                _ => None,
            },
        }
    }
}

fn compare_floats(op: CompareOp, a: f64, b: f64) -> bool {
    let near = (a - b).abs() <= FLOAT_EPSILON;
    match op {
        CompareOp::Eq => near,
        CompareOp::Ne => !near,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Name(n) => write!(f, "{}", n),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Name(v.to_string())
    }
}

/// Comparison operator of a `compare` condition leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Variable mutation operator of a `modify` effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifyOp {
    Set,
    Add,
    Subtract,
    Multiply,
}
