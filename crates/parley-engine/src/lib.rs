//! Runtime for Parley dialogue graphs.
//!
//! [`DialogueEngine`] starts [`Session`]s over a shared, validated graph. A
//! session walks the graph with the [`Evaluator`] deciding which edges are
//! open, the [`Dispatcher`] applying node events to participants, and
//! [`History`] remembering what has already happened.

pub mod dispatcher;
pub mod engine;
pub mod evaluator;
pub mod history;
pub mod session;
pub mod turn;

pub use dispatcher::{ApplyReport, Dispatcher, SkipReason, SkippedEffect};
pub use engine::{DialogueEngine, ResumePoint};
pub use evaluator::Evaluator;
pub use history::{History, TraceEntry};
pub use session::{EndReason, Session, SessionId, SessionState};
pub use turn::{Choice, OptionView, Turn};
