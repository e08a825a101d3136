//! Push events delivered by the backend.
//!
//! Events are keyed by the object identifier carried in the payload. Delivery
//! and reconnect belong to the transport; this module only describes what
//! arrives.

use crate::{Error, ObjectId};
use serde::{Deserialize, Serialize};

/// The named event kinds the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushEventKind {
    /// The object was changed by someone else while open here.
    ObjectModified,
    /// The object was removed from the directory.
    ObjectRemoved,
    /// The backend is closing (or has closed) an inactive object.
    ObjectClosing,
    /// Schema or plugin metadata changed; descriptors should be refreshed.
    PluginUpdate,
}

/// Lifecycle stage announced by an `objectClosing` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosingState {
    /// Advance warning; the object is still usable.
    Closing,
    /// The backend has dropped the object.
    Closed,
}

/// One event from the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub kind: PushEventKind,
    /// Target object. `pluginUpdate` events are not object-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ClosingState>,
}

impl PushEvent {
    /// Creates an `objectModified` event for the given object.
    pub fn modified(uuid: ObjectId) -> Self {
        Self::scoped(PushEventKind::ObjectModified, uuid)
    }

    /// Creates an `objectRemoved` event for the given object.
    pub fn removed(uuid: ObjectId) -> Self {
        Self::scoped(PushEventKind::ObjectRemoved, uuid)
    }

    /// Creates an `objectClosing` event with the given stage.
    pub fn closing(uuid: ObjectId, state: ClosingState) -> Self {
        Self {
            state: Some(state),
            ..Self::scoped(PushEventKind::ObjectClosing, uuid)
        }
    }

    /// Creates a broadcast `pluginUpdate` event.
    pub fn plugin_update() -> Self {
        Self {
            kind: PushEventKind::PluginUpdate,
            uuid: None,
            dn: None,
            state: None,
        }
    }

    fn scoped(kind: PushEventKind, uuid: ObjectId) -> Self {
        Self {
            kind,
            uuid: Some(uuid),
            dn: None,
            state: None,
        }
    }

    /// Parses an event from its JSON payload.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let event: Self = serde_json::from_str(json)?;
        if event.kind != PushEventKind::PluginUpdate && event.uuid.is_none() {
            return Err(Error::InvalidEvent(format!(
                "{:?} event without object uuid",
                event.kind
            )));
        }
        Ok(event)
    }

    /// Returns true if this event concerns the given object.
    /// Broadcast events match every object.
    pub fn targets(&self, object: &ObjectId) -> bool {
        match self.uuid {
            Some(uuid) => uuid == *object,
            None => self.kind == PushEventKind::PluginUpdate,
        }
    }

    /// Returns true if the event forces the object closed.
    pub fn forces_close(&self) -> bool {
        match self.kind {
            PushEventKind::ObjectRemoved => true,
            PushEventKind::ObjectClosing => self.state == Some(ClosingState::Closed),
            _ => false,
        }
    }
}
