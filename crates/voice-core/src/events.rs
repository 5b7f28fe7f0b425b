use crate::generic_types::RemoteEvent;
use crate::playback::UnitId;
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Generation token of one started session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    /// A full capture block of mono samples at the input rate.
    Capture(Vec<f32>),
    Remote(RemoteEvent),
    PlaybackEnded(UnitId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub kind: SessionEventKind,
}

/// Cloneable handle used by device callbacks and provider tasks to feed the
/// controller's queue. Every event is tagged with the session it belongs to.
#[derive(Debug, Clone)]
pub struct SessionSink {
    session: SessionId,
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionSink {
    pub fn new(session: SessionId, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    fn event(&self, kind: SessionEventKind) -> SessionEvent {
        SessionEvent {
            session: self.session,
            kind,
        }
    }

    /// Queues a remote event, waiting for room. Returns false once the controller is gone.
    pub async fn remote(&self, event: RemoteEvent) -> bool {
        self.tx.send(self.event(SessionEventKind::Remote(event))).await.is_ok()
    }

    pub fn try_capture(&self, samples: Vec<f32>) -> bool {
        self.offer(SessionEventKind::Capture(samples), "capture block")
    }

    pub fn try_playback_ended(&self, unit: UnitId) -> bool {
        self.offer(SessionEventKind::PlaybackEnded(unit), "playback completion")
    }

    fn offer(&self, kind: SessionEventKind, what: &str) -> bool {
        match self.tx.try_send(self.event(kind)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session = %self.session, "event queue full, dropping {}", what);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
