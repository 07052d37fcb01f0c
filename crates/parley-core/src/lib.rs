pub mod condition;
pub mod config;
pub mod effect;
pub mod error;
pub mod graph;
pub mod participant;
pub mod value;

pub use condition::{Condition, Operand};
pub use config::{AppConfig, EngineConfig, StepMode};
pub use effect::Effect;
pub use error::{DialogueError, GraphLoadError, Result};
pub use graph::{Edge, EdgeId, Graph, GraphAsset, Node, NodeId, NodeKind, SchemaVersion, SelectionPolicy};
pub use participant::{MemoryParticipant, Participant, ParticipantBinding};
pub use value::{CompareOp, ModifyOp, Value};
