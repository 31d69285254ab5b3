//! Quote intake — the ZIP gate, the step sequence and the answers it
//! collects.
//!
//! A [`QuoteSession`] ties the pieces together: the [`EntryGate`] admits a
//! session, the [`StepEngine`] walks an ordered step list that grows as
//! answers arrive, and the [`rules`] decide what each answer records and
//! where the cursor goes next.

pub mod answers;
pub mod engine;
pub mod events;
pub mod gate;
pub mod registry;
pub mod rules;
pub mod session;
pub mod step;

pub use answers::{AnswerStore, AnswerValue};
pub use engine::{EngineState, StepEngine, StepTicket, Transition};
pub use events::FlowEvent;
pub use gate::EntryGate;
pub use registry::{SessionHandle, SessionRegistry, spawn_sweep_task};
pub use rules::{Outcome, Rejection};
pub use session::{AnswerResult, FlowPhase, LookupOutcome, QuoteSession, SessionDeps, SessionView};
pub use step::{Answer, Prompt, PromptInput, StepKind};
