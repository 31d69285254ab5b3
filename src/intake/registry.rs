//! In-memory session registry keyed by session id.
//!
//! Sessions live until their simulated wait is over or until nobody has
//! touched them for the idle TTL; a periodic sweep drops both.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::session::{FlowPhase, QuoteSession, SessionDeps, SessionView};
use crate::error::{Error, Result};

/// Shared handle to one session. Every action takes the lock, so steps of a
/// single session never interleave.
pub type SessionHandle = Arc<Mutex<QuoteSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    deps: SessionDeps,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps, idle_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            deps,
            idle_ttl,
        })
    }

    /// Pass the ZIP gate on a new session and register it. A rejected ZIP
    /// registers nothing.
    pub async fn start(&self, zip: &str) -> Result<(SessionHandle, SessionView)> {
        let mut session = QuoteSession::new(self.deps.clone());
        let view = session.enter(zip).await?;
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        info!(session_id = %id, "Quote session started");
        Ok((handle, view))
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound { id })
    }

    /// Drop finished sessions and sessions idle past the TTL. Returns how
    /// many were dropped.
    ///
    /// A session whose lock is held is mid-action and is kept. Background
    /// submission work of a dropped session keeps running.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, handle| {
            let Ok(session) = handle.try_lock() else {
                return true;
            };
            let evict = is_expired(&session, now, self.idle_ttl);
            if evict {
                debug!(session_id = %id, phase = ?session.phase(), "Quote session expired");
            }
            !evict
        });

        let expired = before - sessions.len();
        if expired > 0 {
            info!(count = expired, remaining = sessions.len(), "Expired quote sessions");
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn is_expired(session: &QuoteSession, now: DateTime<Utc>, idle_ttl: Duration) -> bool {
    match session.phase() {
        FlowPhase::Done => true,
        FlowPhase::Processing => false,
        FlowPhase::Gate | FlowPhase::Questionnaire => {
            let idle = (now - session.last_active()).to_std().unwrap_or_default();
            idle >= idle_ttl
        }
    }
}

/// Spawn a background task that periodically sweeps the registry.
pub fn spawn_sweep_task(
    registry: Arc<SessionRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            registry.sweep().await;
        }
    })
}
