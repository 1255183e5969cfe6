//! Lifecycle of the single active call.
//!
//! The bridge serves one call at a time. [`SessionManager`] owns that slot:
//! the webhook opens the assistant channel via [`SessionManager::accept_call`],
//! the media stream handler hands over the caller's socket via
//! [`SessionManager::serve_caller`], and the slot is freed when the bridge
//! finishes.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::assistant::AssistantConnector;
use super::bridge::{BridgeSettings, SessionBridge};
use super::caller::BoxedCaller;
use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Lifecycle states of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        self != SessionState::Closed && next > self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub call_id: String,
    pub state: SessionState,
}

struct ActiveSession {
    id: Uuid,
    call_id: String,
    state: SessionState,
    created_at: Instant,
    cancel: CancellationToken,
    /// Present between a successful connect and the caller attaching.
    bridge: Option<SessionBridge>,
}

impl ActiveSession {
    fn new(call_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            call_id: call_id.to_string(),
            state: SessionState::Idle,
            created_at: Instant::now(),
            cancel: CancellationToken::new(),
            bridge: None,
        }
    }

    fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                session_id = %self.id,
                from = %self.state,
                to = %next,
                "Ignoring invalid session transition"
            );
            return false;
        }
        debug!(session_id = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            call_id: self.call_id.clone(),
            state: self.state,
        }
    }
}

/// Owns the one-call slot and drives each call's bridge.
pub struct SessionManager {
    connector: Arc<dyn AssistantConnector>,
    settings: BridgeSettings,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn AssistantConnector>, settings: BridgeSettings) -> Self {
        Self {
            connector,
            settings,
            active: Mutex::new(None),
        }
    }

    /// State of the current session, `Idle` when there is none.
    pub fn state(&self) -> SessionState {
        self.active
            .lock()
            .as_ref()
            .map(|session| session.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn active(&self) -> Option<SessionSnapshot> {
        self.active.lock().as_ref().map(ActiveSession::snapshot)
    }

    /// Reserve the slot for `call_id` and open the assistant channel.
    ///
    /// Resolves once the channel is open. Fails with `SessionBusy` while
    /// another call holds the slot and with `Connect` if the assistant could
    /// not be reached; either way no session is left behind.
    pub async fn accept_call(&self, call_id: &str) -> BridgeResult<Uuid> {
        let id = {
            let mut active = self.active.lock();
            if let Some(existing) = active.as_ref() {
                warn!(
                    call_id = %call_id,
                    active_call_id = %existing.call_id,
                    state = %existing.state,
                    "Rejecting call, another session is in progress"
                );
                return Err(BridgeError::SessionBusy);
            }

            let mut session = ActiveSession::new(call_id);
            session.transition(SessionState::Connecting);
            let id = session.id;
            *active = Some(session);
            id
        };
        // Frees the slot on every early return, and when this future is
        // dropped mid-connect (the webhook request went away).
        let reservation = Reservation::new(self, id);
        info!(session_id = %id, call_id = %call_id, "Accepted call, connecting assistant");

        let bridge =
            match SessionBridge::start(call_id, self.connector.create(), self.settings.clone())
                .await
            {
                Ok(bridge) => bridge,
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Assistant connection failed");
                    return Err(e);
                }
            };

        // The call may have been torn down while we were connecting.
        let leftover = {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(session) if session.id == id => {
                    if session.transition(SessionState::Active) {
                        session.bridge = Some(bridge);
                        None
                    } else {
                        Some(bridge)
                    }
                }
                _ => Some(bridge),
            }
        };

        if let Some(mut bridge) = leftover {
            if let Err(e) = bridge.close().await {
                warn!(session_id = %id, error = %e, "Failed to close abandoned bridge");
            }
            return Err(BridgeError::Connect(
                "session was closed while connecting".to_string(),
            ));
        }

        reservation.disarm();
        info!(session_id = %id, call_id = %call_id, "Session active, awaiting media stream");
        Ok(id)
    }

    /// Attach the caller's media stream to the session for `call_id` and run
    /// the bridge until the call ends. The slot is released on return.
    pub async fn serve_caller(&self, call_id: &str, mut caller: BoxedCaller) -> BridgeResult<()> {
        let claimed = {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(session)
                    if session.call_id == call_id && session.state == SessionState::Active =>
                {
                    session
                        .bridge
                        .take()
                        .map(|bridge| (session.id, session.cancel.clone(), bridge))
                }
                _ => None,
            }
        };

        let Some((id, cancel, mut bridge)) = claimed else {
            warn!(call_id = %call_id, "Media stream has no session waiting for it");
            if let Err(e) = caller.close().await {
                warn!(call_id = %call_id, error = %e, "Failed to close rejected media stream");
            }
            return Err(BridgeError::SessionNotReady);
        };

        let _reservation = Reservation::new(self, id);
        if let Err(e) = bridge.attach_caller(caller) {
            if let Err(close_err) = bridge.close().await {
                warn!(session_id = %id, error = %close_err, "Failed to close bridge");
            }
            return Err(e);
        }

        bridge.run(cancel).await
    }

    /// Ask the active session to shut down. Returns `false` when there was
    /// nothing left to close.
    pub async fn close_active(&self) -> bool {
        let pending = {
            let mut active = self.active.lock();
            let Some(session) = active.as_mut() else {
                return false;
            };
            if !session.transition(SessionState::Closing) {
                return false;
            }
            session.cancel.cancel();
            session.bridge.take().map(|bridge| (session.id, bridge))
        };

        // A bridge still parked here has no run loop to observe the token.
        if let Some((id, mut bridge)) = pending {
            if let Err(e) = bridge.close().await {
                warn!(session_id = %id, error = %e, "Failed to close pending bridge");
            }
            self.finish(id);
        }
        true
    }

    fn finish(&self, id: Uuid) {
        let mut active = self.active.lock();
        if let Some(session) = active.as_mut()
            && session.id == id
        {
            session.transition(SessionState::Closed);
            info!(
                session_id = %id,
                call_id = %session.call_id,
                duration_ms = session.created_at.elapsed().as_millis() as u64,
                "Session closed"
            );
            *active = None;
        }
    }
}

/// Releases the slot held by session `id` when dropped, unless disarmed.
struct Reservation<'a> {
    manager: &'a SessionManager,
    id: Uuid,
    armed: bool,
}

impl<'a> Reservation<'a> {
    fn new(manager: &'a SessionManager, id: Uuid) -> Self {
        Self {
            manager,
            id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.finish(self.id);
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}
