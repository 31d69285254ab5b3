//! Submission pipeline — runs once the step list is exhausted.
//!
//! The frozen answers go out through the transport while the progress
//! simulation starts at the same moment; neither waits on the other.

pub mod payload;
pub mod simulation;
pub mod transport;

pub use payload::SubmissionPayload;
pub use simulation::{ProgressSimulation, SimulationFrame, spawn_simulation};
pub use transport::{HttpTransport, SubmissionTransport, dispatch};
