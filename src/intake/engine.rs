//! Step engine — cursor over a step list that grows while it is traversed.
//!
//! Lifecycle: Idle → Active → Completed. Insertions only ever land after
//! the cursor, so steps already visited are never rewritten.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::step::StepKind;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Active,
    Completed,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Result of a cursor transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// The cursor now points at `step`, which should be (re-)rendered.
    Entered {
        position: usize,
        step: StepKind,
        progress: f64,
    },
    /// The cursor ran past the last step.
    Completed { progress: f64 },
    /// Nothing moved (back at the first step, or already completed).
    Unchanged,
}

/// Identifies one execution of one step. Any cursor transition, or renewing
/// the step, invalidates every ticket handed out before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTicket {
    generation: u64,
    position: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    step: StepKind,
    /// Step whose completion inserted this one; `None` for base steps.
    origin: Option<StepKind>,
}

#[derive(Debug, Default)]
pub struct StepEngine {
    steps: Vec<Entry>,
    /// -1 means "before the first step".
    cursor: isize,
    state: EngineState,
    generation: u64,
}

impl StepEngine {
    pub fn new() -> Self {
        Self {
            cursor: -1,
            ..Default::default()
        }
    }

    /// Load the base step list. Only valid once, from Idle.
    pub fn initialize(&mut self, base_steps: Vec<StepKind>) -> Result<(), EngineError> {
        self.expect_state(EngineState::Idle)?;
        if base_steps.is_empty() {
            return Err(EngineError::EmptyStepList);
        }
        self.steps = base_steps
            .into_iter()
            .map(|step| Entry { step, origin: None })
            .collect();
        self.cursor = -1;
        self.state = EngineState::Active;
        Ok(())
    }

    /// Move to the next step, or complete the flow if there is none.
    ///
    /// Calling this after completion has no effect.
    pub fn advance(&mut self) -> Result<Transition, EngineError> {
        self.move_forward(1)
    }

    /// Advance past `n` steps that no longer apply, landing `n + 1`
    /// positions ahead.
    pub fn skip(&mut self, n: usize) -> Result<Transition, EngineError> {
        self.move_forward(n + 1)
    }

    /// Step back one position. No-op at the first step.
    pub fn retreat(&mut self) -> Result<Transition, EngineError> {
        match self.state {
            EngineState::Idle => Err(self.state_error(EngineState::Active)),
            EngineState::Completed => Ok(Transition::Unchanged),
            EngineState::Active => {
                if self.cursor <= 0 {
                    return Ok(Transition::Unchanged);
                }
                self.cursor -= 1;
                self.generation += 1;
                self.entered()
            }
        }
    }

    /// Insert `steps` right after the step currently executing.
    ///
    /// Steps previously inserted by the same step (and anything those
    /// inserted in turn) are dropped first, so re-completing a step after
    /// navigating back rebuilds its block instead of duplicating it.
    /// Returns the number of steps inserted.
    pub fn insert_steps(&mut self, steps: Vec<StepKind>) -> Result<usize, EngineError> {
        let position = self.position()?;
        let origin = self.steps[position].step;

        let mut stale: HashSet<StepKind> = HashSet::from([origin]);
        let mut index = position + 1;
        while index < self.steps.len() {
            match self.steps[index].origin {
                Some(o) if stale.contains(&o) => {
                    stale.insert(self.steps[index].step);
                    self.steps.remove(index);
                }
                _ => index += 1,
            }
        }

        let count = steps.len();
        let at = position + 1;
        self.steps.splice(
            at..at,
            steps.into_iter().map(|step| Entry {
                step,
                origin: Some(origin),
            }),
        );

        tracing::debug!(
            origin = %origin,
            inserted = count,
            len = self.steps.len(),
            "Inserted steps"
        );
        Ok(count)
    }

    /// Fraction of the list traversed, `min(cursor / (len - 1), 1)`.
    ///
    /// Not smooth across insertions: the denominator grows as steps are
    /// inserted.
    pub fn progress(&self) -> f64 {
        match self.state {
            EngineState::Idle => 0.0,
            EngineState::Completed => 1.0,
            EngineState::Active => {
                if self.cursor < 0 {
                    return 0.0;
                }
                let last = self.steps.len().saturating_sub(1);
                if last == 0 {
                    return 1.0;
                }
                (self.cursor as f64 / last as f64).min(1.0)
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The step under the cursor, if the engine is active and has started.
    pub fn current(&self) -> Option<StepKind> {
        self.position().ok().map(|p| self.steps[p].step)
    }

    /// Cursor position while active and in bounds.
    pub fn cursor(&self) -> Option<usize> {
        self.position().ok()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Snapshot of the step list.
    pub fn steps(&self) -> Vec<StepKind> {
        self.steps.iter().map(|e| e.step).collect()
    }

    /// Ticket for the step currently executing.
    pub fn ticket(&self) -> Option<StepTicket> {
        self.position().ok().map(|position| StepTicket {
            generation: self.generation,
            position,
        })
    }

    /// Start a new execution of the current step without moving the cursor.
    /// Tickets handed out for the previous execution stop being current.
    pub fn renew(&mut self) {
        if self.state == EngineState::Active {
            self.generation += 1;
        }
    }

    /// Whether `ticket` still refers to the step currently executing.
    pub fn is_current(&self, ticket: StepTicket) -> bool {
        self.state == EngineState::Active
            && ticket.generation == self.generation
            && self.position().ok() == Some(ticket.position)
    }

    fn move_forward(&mut self, by: usize) -> Result<Transition, EngineError> {
        match self.state {
            EngineState::Idle => Err(self.state_error(EngineState::Active)),
            EngineState::Completed => Ok(Transition::Unchanged),
            EngineState::Active => {
                self.cursor += by as isize;
                self.generation += 1;
                if self.cursor as usize >= self.steps.len() {
                    self.cursor = self.steps.len() as isize;
                    self.state = EngineState::Completed;
                    tracing::info!(len = self.steps.len(), "Step list exhausted, flow complete");
                    return Ok(Transition::Completed { progress: 1.0 });
                }
                self.entered()
            }
        }
    }

    fn entered(&self) -> Result<Transition, EngineError> {
        let position = self.position()?;
        Ok(Transition::Entered {
            position,
            step: self.steps[position].step,
            progress: self.progress(),
        })
    }

    fn position(&self) -> Result<usize, EngineError> {
        if self.state != EngineState::Active {
            return Err(self.state_error(EngineState::Active));
        }
        let len = self.steps.len();
        if self.cursor < 0 || self.cursor as usize >= len {
            return Err(EngineError::CursorOutOfBounds {
                cursor: self.cursor,
                len,
            });
        }
        Ok(self.cursor as usize)
    }

    fn expect_state(&self, expected: EngineState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.state_error(expected))
        }
    }

    fn state_error(&self, expected: EngineState) -> EngineError {
        EngineError::InvalidState {
            state: self.state.to_string(),
            expected: expected.to_string(),
        }
    }
}
