use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use parley_core::condition::Operand;
use parley_core::effect::Effect;
use parley_core::participant::ParticipantBinding;
use parley_core::value::ModifyOp;

/// Why a single effect was not applied.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("no participant bound to role '{role}'")]
    UnknownRole { role: String },

    #[error("participant has no variable '{variable}'")]
    MissingVariable { variable: String },

    #[error("operand {role}.{variable} could not be resolved")]
    UnresolvedOperand { role: String, variable: String },

    #[error("cannot {op:?} {operand} into {target}")]
    TypeMismatch {
        op: ModifyOp,
        target: &'static str,
        operand: &'static str,
    },

    #[error("participant rejected write to '{variable}'")]
    Rejected { variable: String },

    #[error("callback '{callback}' failed")]
    CallbackFailed { callback: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEffect {
    /// Position of the effect in its event list.
    pub index: usize,
    pub reason: SkipReason,
}

/// Outcome of applying one event (an ordered effect list).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: Vec<SkippedEffect>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Fold another report into this one. Skip indices stay relative to the
    /// event they came from.
    pub fn merge(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.skipped.extend(other.skipped);
    }
}

/// Applies node events to bound participants.
///
/// Effects run strictly in order. A failing effect is recorded and skipped;
/// it never aborts the remaining effects or the traversal.
pub struct Dispatcher;

impl Dispatcher {
    pub fn apply(effects: &[Effect], binding: &mut ParticipantBinding) -> ApplyReport {
        let mut report = ApplyReport::default();

        for (index, effect) in effects.iter().enumerate() {
            match Self::apply_one(effect, binding) {
                Ok(()) => report.applied += 1,
                Err(reason) => {
                    warn!(index, role = %effect.role(), %reason, "Skipped dialogue effect");
                    report.skipped.push(SkippedEffect { index, reason });
                }
            }
        }

        report
    }

    fn apply_one(effect: &Effect, binding: &mut ParticipantBinding) -> Result<(), SkipReason> {
        match effect {
            Effect::Modify {
                role,
                variable,
                op,
                value,
            } => {
                // Resolve the operand before borrowing the target mutably.
                let operand = match value {
                    Operand::Literal(v) => v.clone(),
                    Operand::Variable {
                        role: src_role,
                        variable: src_var,
                    } => binding.variable(src_role, src_var).ok_or_else(|| {
                        SkipReason::UnresolvedOperand {
                            role: src_role.clone(),
                            variable: src_var.clone(),
                        }
                    })?,
                };

                let participant = binding
                    .get_mut(role)
                    .ok_or_else(|| SkipReason::UnknownRole { role: role.clone() })?;

                let current = participant.variable(variable).ok_or_else(|| {
                    SkipReason::MissingVariable {
                        variable: variable.clone(),
                    }
                })?;
                // Overflow is reported as a mismatch too.
                let new_value = current
                    .modify(*op, &operand)
                    .ok_or(SkipReason::TypeMismatch {
                        op: *op,
                        target: current.type_name(),
                        operand: operand.type_name(),
                    })?;

                debug!(role = %role, variable = %variable, value = %new_value, "Set participant variable");
                if participant.set_variable(variable, new_value) {
                    Ok(())
                } else {
                    Err(SkipReason::Rejected {
                        variable: variable.clone(),
                    })
                }
            }
            Effect::Invoke {
                role,
                callback,
                args,
            } => {
                let participant = binding
                    .get_mut(role)
                    .ok_or_else(|| SkipReason::UnknownRole { role: role.clone() })?;
                debug!(role = %role, callback = %callback, args = args.len(), "Invoking participant callback");
                if participant.invoke(callback, args) {
                    Ok(())
                } else {
                    Err(SkipReason::CallbackFailed {
                        callback: callback.clone(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use parley_core::participant::MemoryParticipant;
    use parley_core::value::Value;

    fn binding() -> (ParticipantBinding, Arc<Mutex<MemoryParticipant>>) {
        let npc = Arc::new(Mutex::new(
            MemoryParticipant::new("Merchant")
                .with_variable("stock", 3)
                .with_variable("price", 2.5)
                .with_failing_callback("explode"),
        ));
        let b = ParticipantBinding::new()
            .with("npc", npc.clone())
            .with(
                "player",
                MemoryParticipant::new("Hero")
                    .with_variable("gold", 10)
                    .with_variable("mood", "calm"),
            );
        (b, npc)
    }

    #[test]
    fn test_effects_apply_in_order() {
        let (mut b, _) = binding();
        let effects = vec![
            Effect::modify("player", "gold", ModifyOp::Subtract, 4),
            Effect::modify("player", "gold", ModifyOp::Multiply, 2),
            Effect::set("player", "mood", "pleased"),
        ];
        let report = Dispatcher::apply(&effects, &mut b);

        assert!(report.is_clean());
        assert_eq!(report.applied, 3);
        assert_eq!(b.variable("player", "gold"), Some(Value::Int(12)));
        assert_eq!(b.variable("player", "mood"), Some(Value::name("pleased")));
    }

    #[test]
    fn test_failures_are_skipped_not_fatal() {
        let (mut b, npc) = binding();
        let effects = vec![
            Effect::set("ghost", "x", 1),
            Effect::modify("player", "silver", ModifyOp::Add, 1),
            Effect::modify("player", "gold", ModifyOp::Add, 0.5),
            Effect::invoke("npc", "explode", vec![]),
            Effect::invoke("npc", "wave", vec![Value::Int(2)]),
        ];
        let report = Dispatcher::apply(&effects, &mut b);

        assert_eq!(report.applied, 1);
        let indices: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(matches!(report.skipped[0].reason, SkipReason::UnknownRole { .. }));
        assert!(matches!(report.skipped[1].reason, SkipReason::MissingVariable { .. }));
        assert!(matches!(report.skipped[2].reason, SkipReason::TypeMismatch { .. }));
        assert!(matches!(report.skipped[3].reason, SkipReason::CallbackFailed { .. }));

        // The unaffected variable is untouched and the later callback still ran.
        assert_eq!(b.variable("player", "gold"), Some(Value::Int(10)));
        assert_eq!(npc.lock().unwrap().invocations.len(), 2);
    }

    #[test]
    fn test_set_needs_existing_variable_of_same_type() {
        let (mut b, _) = binding();
        let effects = vec![
            Effect::set("player", "title", "knight"),
            Effect::set("player", "gold", "lots"),
            Effect::set("player", "gold", 3),
            Effect::set("npc", "price", 4),
        ];
        let report = Dispatcher::apply(&effects, &mut b);

        assert_eq!(report.applied, 2);
        assert!(matches!(report.skipped[0].reason, SkipReason::MissingVariable { .. }));
        assert!(matches!(report.skipped[1].reason, SkipReason::TypeMismatch { .. }));
        assert_eq!(b.variable("player", "title"), None);
        assert_eq!(b.variable("player", "gold"), Some(Value::Int(3)));
        assert_eq!(b.variable("npc", "price"), Some(Value::Float(4.0)));
    }

    #[test]
    fn test_float_target_accepts_int_operand() {
        let (mut b, _) = binding();
        let report = Dispatcher::apply(&[Effect::modify("npc", "price", ModifyOp::Add, 1)], &mut b);
        assert!(report.is_clean());
        assert_eq!(b.variable("npc", "price"), Some(Value::Float(3.5)));
    }

    #[test]
    fn test_overflow_skipped() {
        let mut b = ParticipantBinding::new()
            .with("npc", MemoryParticipant::new("Npc").with_variable("n", i64::MAX));
        let report = Dispatcher::apply(&[Effect::modify("npc", "n", ModifyOp::Add, 1)], &mut b);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(b.variable("npc", "n"), Some(Value::Int(i64::MAX)));
    }

    #[test]
    fn test_operand_from_other_participant() {
        let (mut b, _) = binding();
        let effect = Effect::Modify {
            role: "player".into(),
            variable: "gold".into(),
            op: ModifyOp::Add,
            value: Operand::variable("npc", "stock"),
        };
        let report = Dispatcher::apply(&[effect], &mut b);
        assert!(report.is_clean());
        assert_eq!(b.variable("player", "gold"), Some(Value::Int(13)));

        let dangling = Effect::Modify {
            role: "player".into(),
            variable: "gold".into(),
            op: ModifyOp::Set,
            value: Operand::variable("npc", "nothing"),
        };
        let report = Dispatcher::apply(&[dangling], &mut b);
        assert!(matches!(
            report.skipped[0].reason,
            SkipReason::UnresolvedOperand { .. }
        ));
    }

    #[test]
    fn test_rejected_write() {
        let mut b = ParticipantBinding::new()
            .with("npc", MemoryParticipant::new("Npc").with_variable("a", 1).strict());
        let report = Dispatcher::apply(&[Effect::set("npc", "b", 2)], &mut b);
        assert!(matches!(report.skipped[0].reason, SkipReason::Rejected { .. }));
    }
}
