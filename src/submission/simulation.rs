//! "Preparing your quote" — a purely time-based progress simulation.
//!
//! It is not tied to the submission outcome and always runs to completion.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::intake::events::{DONE_MESSAGE, FlowEvent};

/// Snapshot of the simulation at some elapsed time.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationFrame {
    pub fraction: f64,
    pub message_index: usize,
    pub message: String,
    pub done: bool,
}

/// Fixed-duration wait split evenly across status messages.
#[derive(Debug, Clone)]
pub struct ProgressSimulation {
    duration: Duration,
    tick: Duration,
    messages: Vec<String>,
}

impl ProgressSimulation {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            duration: config.duration,
            tick: config.tick,
            messages: config.messages.clone(),
        }
    }

    /// Where the simulation stands after `elapsed`.
    ///
    /// The message index is `floor(elapsed / (duration / messages))`,
    /// clamped to the last message.
    pub fn frame_at(&self, elapsed: Duration) -> SimulationFrame {
        let done = elapsed >= self.duration;
        let fraction = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };

        let last = self.messages.len().saturating_sub(1);
        let message_index = if self.messages.is_empty() || self.duration.is_zero() {
            last
        } else {
            let per_message = self.duration.as_secs_f64() / self.messages.len() as f64;
            ((elapsed.as_secs_f64() / per_message).floor() as usize).min(last)
        };

        SimulationFrame {
            fraction,
            message_index,
            message: self.messages.get(message_index).cloned().unwrap_or_default(),
            done,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Run the simulation in the background, publishing a `Processing` event per
/// tick and a final `Done` event.
pub fn spawn_simulation(
    simulation: ProgressSimulation,
    events: broadcast::Sender<FlowEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(duration_secs = simulation.duration.as_secs(), "Quote simulation started");

        let first = simulation.frame_at(Duration::ZERO);
        let _ = events.send(FlowEvent::Processing {
            message: first.message,
            fraction: first.fraction,
        });

        let mut interval = tokio::time::interval(simulation.tick);
        // First tick completes immediately.
        interval.tick().await;

        let mut elapsed = Duration::ZERO;
        loop {
            if elapsed >= simulation.duration {
                break;
            }
            interval.tick().await;
            elapsed += simulation.tick;

            let frame = simulation.frame_at(elapsed);
            debug!(
                fraction = frame.fraction,
                message_index = frame.message_index,
                "Simulation tick"
            );
            let _ = events.send(FlowEvent::Processing {
                message: frame.message,
                fraction: frame.fraction,
            });
        }

        info!("Quote simulation finished");
        let _ = events.send(FlowEvent::Done {
            message: DONE_MESSAGE.to_string(),
        });
    })
}
