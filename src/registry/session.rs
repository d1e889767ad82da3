//! Setup handshake tracking

use std::time::{Duration, Instant};

/// Where the host stands in the setup exchange with its peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    /// Nothing requested, nothing registered
    #[default]
    Idle,
    /// Force-setup sent, no setup packet seen since
    AwaitingSetup,
    /// At least one remote object registered
    Populated,
}

#[derive(Debug, Default)]
pub(crate) struct Session {
    state: SessionState,
    requested_at: Option<Instant>,
    resends: u32,
}

impl Session {
    pub(crate) const fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn request_setup(&mut self, now: Instant) {
        self.state = SessionState::AwaitingSetup;
        self.requested_at = Some(now);
        self.resends = 0;
    }

    /// Back to `Idle`, forgetting any pending request.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn record_setup(&mut self) {
        self.state = SessionState::Populated;
        self.requested_at = None;
    }

    /// Claim a resend slot if the pending request has gone unanswered for `timeout`.
    pub(crate) fn claim_resend(&mut self, now: Instant, timeout: Duration, max: u32) -> bool {
        if self.state != SessionState::AwaitingSetup || self.resends >= max {
            return false;
        }
        match self.requested_at {
            Some(at) if now.saturating_duration_since(at) >= timeout => {
                self.resends += 1;
                self.requested_at = Some(now);
                true
            }
            _ => false,
        }
    }

    pub(crate) const fn resends(&self) -> u32 {
        self.resends
    }
}
