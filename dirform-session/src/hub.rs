//! Many edit sessions over one call queue and one push stream.

use crate::error::{SessionError, SessionResult};
use crate::session::{EditSession, EventGuard, EventOutcome, SessionEnv};
use dirform_types::{ObjectId, PushEvent};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Owns every open [`EditSession`] of one client, keyed by object.
#[derive(Debug)]
pub struct SessionHub {
    env: SessionEnv,
    sessions: IndexMap<ObjectId, EditSession>,
}

impl SessionHub {
    pub fn new(env: SessionEnv) -> Self {
        Self {
            env,
            sessions: IndexMap::new(),
        }
    }

    /// Opens `dn`. An object that is already open keeps its session.
    pub async fn open(&mut self, dn: &str) -> SessionResult<ObjectId> {
        if let Some((id, _)) = self.sessions.iter().find(|(_, s)| s.object().dn == dn) {
            return Ok(*id);
        }
        let session = EditSession::open(self.env.clone(), dn).await?;
        let id = session.object_id();
        if self.sessions.contains_key(&id) {
            debug!(object = %id, "object already open; keeping existing session");
        } else {
            self.sessions.insert(id, session);
        }
        Ok(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&EditSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut EditSession> {
        self.sessions.get_mut(id)
    }

    /// Guards of every open session, for a push listener that runs while
    /// the hub is busy with a call.
    pub fn event_guards(&self) -> Vec<(ObjectId, EventGuard)> {
        self.sessions
            .iter()
            .map(|(id, s)| (*id, s.event_guard()))
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.sessions.keys()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes and drops the session of `id`.
    pub async fn close(&mut self, id: &ObjectId) -> SessionResult<()> {
        let mut session = self
            .sessions
            .shift_remove(id)
            .ok_or(SessionError::Closed)?;
        session.close().await
    }

    /// Delivers `event` to every session it targets and drops sessions
    /// that ended up closed.
    pub async fn dispatch(&mut self, event: &PushEvent) -> Vec<(ObjectId, EventOutcome)> {
        let mut outcomes = Vec::new();
        for (id, session) in self.sessions.iter_mut() {
            if !event.targets(id) {
                continue;
            }
            let outcome = match session.handle_event(event).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(object = %id, kind = ?event.kind, error = %e, "event handling failed");
                    EventOutcome::Ignored
                }
            };
            outcomes.push((*id, outcome));
        }
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_closed());
        if self.sessions.len() < before {
            info!(dropped = before - self.sessions.len(), "dropped closed sessions");
        }
        outcomes
    }

    /// Parses a raw push payload and dispatches it.
    pub async fn dispatch_json(&mut self, payload: &str) -> SessionResult<Vec<(ObjectId, EventOutcome)>> {
        let event = PushEvent::from_json(payload)?;
        Ok(self.dispatch(&event).await)
    }
}
