//! QuoteSession — one user's pass through the questionnaire.
//!
//! Owns the step engine and the answer store; every transition runs to
//! completion under the caller's lock. Asynchronous lookups are checked
//! against a [`StepTicket`] before their result is applied, so a response
//! that arrives after the user has moved on is dropped.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use super::answers::{AnswerStore, fields};
use super::engine::{EngineState, StepEngine, StepTicket, Transition};
use super::events::{EVENT_CHANNEL_CAPACITY, FlowEvent};
use super::gate::EntryGate;
use super::rules::{self, Outcome};
use super::step::{Answer, Prompt, PromptContext, StepKind, base_steps};
use crate::config::SimulationConfig;
use crate::error::{EngineError, GateError, Result};
use crate::submission::{
    ProgressSimulation, SubmissionPayload, SubmissionTransport, dispatch, spawn_simulation,
};
use crate::vehicles::{DecodedVehicle, VehicleDataProvider};

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub provider: Arc<VehicleDataProvider>,
    pub transport: Arc<dyn SubmissionTransport>,
    pub simulation: SimulationConfig,
}

/// Coarse position of a session in the overall flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    /// Waiting for a valid ZIP.
    Gate,
    Questionnaire,
    /// Answers submitted, simulated wait running.
    Processing,
    Done,
}

/// Snapshot returned to the presentation layer after every action.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub phase: FlowPhase,
    pub state: EngineState,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub total_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub outcome: Outcome,
    pub view: SessionView,
}

/// Result of a VIN decode as seen by the vehicle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    /// At least part of the vehicle was resolved; shown on the step.
    Resolved { vehicle: DecodedVehicle },
    /// Nothing resolved; the user has to enter the vehicle another way.
    Unresolved,
    /// The user left the step before the response arrived; discarded.
    Stale,
}

pub struct QuoteSession {
    id: Uuid,
    gate: EntryGate,
    engine: StepEngine,
    answers: AnswerStore,
    /// Last VIN decode result for the vehicle step currently shown.
    decoded: Option<DecodedVehicle>,
    deps: SessionDeps,
    events: broadcast::Sender<FlowEvent>,
    /// Simulation task, started once on completion.
    simulation: Option<tokio::task::JoinHandle<()>>,
    current_year: i32,
    last_active: DateTime<Utc>,
}

impl QuoteSession {
    pub fn new(deps: SessionDeps) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            gate: EntryGate::new(),
            engine: StepEngine::new(),
            answers: AnswerStore::new(),
            decoded: None,
            deps,
            events,
            simulation: None,
            current_year: Utc::now().year(),
            last_active: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe to progress, prompt and processing events.
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn engine(&self) -> &StepEngine {
        &self.engine
    }

    /// When the user last acted on this session.
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn phase(&self) -> FlowPhase {
        match self.engine.state() {
            EngineState::Idle => FlowPhase::Gate,
            EngineState::Active => FlowPhase::Questionnaire,
            EngineState::Completed => match &self.simulation {
                Some(task) if !task.is_finished() => FlowPhase::Processing,
                _ => FlowPhase::Done,
            },
        }
    }

    /// Pass the ZIP gate and show the first step. A rejected ZIP leaves the
    /// session Idle.
    pub async fn enter(&mut self, zip: &str) -> Result<SessionView> {
        if self.engine.state() != EngineState::Idle {
            return Err(GateError::AlreadyStarted.into());
        }
        self.touch();
        let zip = self.gate.check(zip)?;
        self.answers.set(fields::ZIP, zip);
        self.engine.initialize(base_steps())?;
        info!(session_id = %self.id, "Quote flow started");

        let transition = self.engine.advance()?;
        self.on_transition(transition).await;
        Ok(self.view().await)
    }

    /// Complete (or act on) the current step.
    pub async fn answer(&mut self, answer: Answer) -> Result<AnswerResult> {
        self.touch();
        let step = self.current_step()?;
        let outcome = rules::complete(step, answer, &mut self.answers, &mut self.engine)?;

        match &outcome {
            Outcome::Moved { transition } => {
                debug!(session_id = %self.id, step = %step, "Step completed");
                self.on_transition(*transition).await;
            }
            Outcome::VehicleAdded { .. } => {
                self.decoded = None;
                self.publish_prompt().await;
            }
            Outcome::Rejected { .. } => {}
        }

        Ok(AnswerResult {
            outcome,
            view: self.view().await,
        })
    }

    /// Go back one step and show it again from its defaults.
    pub async fn back(&mut self) -> Result<SessionView> {
        self.touch();
        let transition = self.engine.retreat()?;
        self.on_transition(transition).await;
        Ok(self.view().await)
    }

    /// Ticket for a VIN lookup started on the current vehicle step.
    pub fn vin_ticket(&self) -> Result<StepTicket> {
        let step = self.current_step()?;
        if step != StepKind::Vehicles {
            return Err(EngineError::WrongStep {
                current: step.to_string(),
                expected: StepKind::Vehicles.to_string(),
            }
            .into());
        }
        self.engine
            .ticket()
            .ok_or_else(|| self.not_active().into())
    }

    /// Apply a decode result, unless the step it was issued for is gone.
    pub async fn apply_decoded(
        &mut self,
        ticket: StepTicket,
        decoded: DecodedVehicle,
    ) -> LookupOutcome {
        self.touch();
        if !self.engine.is_current(ticket) {
            debug!(session_id = %self.id, "Discarding VIN decode for a step no longer shown");
            return LookupOutcome::Stale;
        }
        if decoded.is_unresolved() {
            self.decoded = None;
            return LookupOutcome::Unresolved;
        }
        self.decoded = Some(decoded.clone());
        self.publish_prompt().await;
        LookupOutcome::Resolved { vehicle: decoded }
    }

    /// Decode a VIN for a shared session without holding its lock across the
    /// network call.
    pub async fn decode_vin(session: &Mutex<QuoteSession>, vin: &str) -> Result<LookupOutcome> {
        let (ticket, provider) = {
            let s = session.lock().await;
            (s.vin_ticket()?, Arc::clone(&s.deps.provider))
        };
        let decoded = provider.decode_vin(vin).await;
        let mut s = session.lock().await;
        Ok(s.apply_decoded(ticket, decoded).await)
    }

    /// Prompt for the current step, if any.
    pub async fn prompt(&self) -> Option<Prompt> {
        let step = self.engine.current()?;
        let position = self.engine.cursor()?;
        let years = if step.needs_catalog() {
            self.deps.provider.catalog_years().await
        } else {
            Vec::new()
        };
        let ctx = PromptContext {
            answers: &self.answers,
            catalog_years: &years,
            decoded: self.decoded.as_ref(),
            position,
            current_year: self.current_year,
        };
        Some(step.prompt(&ctx))
    }

    pub async fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            phase: self.phase(),
            state: self.engine.state(),
            progress: self.engine.progress(),
            position: self.engine.cursor(),
            total_steps: self.engine.len(),
            prompt: self.prompt().await,
        }
    }

    async fn on_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Entered { progress, .. } => {
                self.decoded = None;
                let _ = self.events.send(FlowEvent::Progress { fraction: progress });
                self.publish_prompt().await;
            }
            Transition::Completed { progress } => {
                self.decoded = None;
                let _ = self.events.send(FlowEvent::Progress { fraction: progress });
                self.submit();
            }
            Transition::Unchanged => {}
        }
    }

    /// Freeze the answers, send them, and start the simulated wait.
    fn submit(&mut self) {
        if self.simulation.is_some() {
            return;
        }
        let payload = SubmissionPayload::from_answers(&self.answers);
        info!(session_id = %self.id, fields = payload.len(), "Submitting quote request");

        let _transport = dispatch(Arc::clone(&self.deps.transport), payload);
        self.simulation = Some(spawn_simulation(
            ProgressSimulation::new(&self.deps.simulation),
            self.events.clone(),
        ));
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    async fn publish_prompt(&self) {
        if let Some(prompt) = self.prompt().await {
            let _ = self.events.send(FlowEvent::Prompt { prompt });
        }
    }

    fn current_step(&self) -> std::result::Result<StepKind, EngineError> {
        self.engine.current().ok_or_else(|| self.not_active())
    }

    fn not_active(&self) -> EngineError {
        EngineError::InvalidState {
            state: self.engine.state().to_string(),
            expected: EngineState::Active.to_string(),
        }
    }
}
