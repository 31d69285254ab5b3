//! Events published while a quote flow runs.

use serde::{Deserialize, Serialize};

use super::step::Prompt;

/// Shown once the simulated wait is over.
pub const DONE_MESSAGE: &str =
    "Your quote has been finalized and is on its way to your email inbox.";

/// Default broadcast channel capacity per session.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Messages sent to observers of a session (WebSocket clients, tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// Step engine progress after a transition, in `[0, 1]`.
    Progress { fraction: f64 },
    /// A step was entered or re-entered and should be shown.
    Prompt { prompt: Prompt },
    /// One tick of the "preparing your quote" wait.
    Processing { message: String, fraction: f64 },
    /// The wait is over.
    Done { message: String },
}
