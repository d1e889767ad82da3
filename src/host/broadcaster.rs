//! Periodic discovery beacon.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::protocol::{HostCommand, Metrics, PacketDirection};
use crate::registry::SharedRegistry;
use crate::transport::DatagramSink;

use super::config::{BroadcastPolicy, SetupRetry};
use super::shutdown::StopToken;

/// Beacon loop. Each tick also resends an unanswered force-setup when a
/// [`SetupRetry`] policy is configured.
pub(crate) struct Broadcaster {
    sink: Arc<dyn DatagramSink>,
    registry: SharedRegistry,
    target: SocketAddr,
    interval: Duration,
    policy: BroadcastPolicy,
    retry: Option<SetupRetry>,
}

/// What a single tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TickOutcome {
    pub(crate) beacon: bool,
    pub(crate) setup_resent: bool,
}

impl Broadcaster {
    pub(crate) fn new(
        sink: Arc<dyn DatagramSink>,
        registry: SharedRegistry,
        target: SocketAddr,
        interval: Duration,
        policy: BroadcastPolicy,
        retry: Option<SetupRetry>,
    ) -> Self {
        Self {
            sink,
            registry,
            target,
            interval,
            policy,
            retry,
        }
    }

    pub(crate) fn run(self, stop: StopToken) {
        info!(
            broadcast = %self.target,
            interval = ?self.interval,
            policy = ?self.policy,
            "broadcaster started"
        );
        loop {
            let outcome = self.tick(Instant::now());
            trace!(beacon = outcome.beacon, setup_resent = outcome.setup_resent, "tick");
            if stop.wait(self.interval) {
                break;
            }
        }
        info!("broadcaster stopped");
    }

    pub(crate) fn tick(&self, now: Instant) -> TickOutcome {
        let (peer, resend) = {
            let mut registry = self.registry.lock();
            let peer = registry.peer();
            let session = registry.session_mut();
            let resend = match self.retry {
                Some(retry) if peer.is_some() => session
                    .claim_resend(now, retry.timeout, retry.max_attempts)
                    .then(|| session.resends()),
                _ => None,
            };
            (peer, resend)
        };

        let mut outcome = TickOutcome::default();
        let beacon_due = match self.policy {
            BroadcastPolicy::Continuous => true,
            BroadcastPolicy::UntilPeer => peer.is_none(),
        };
        if beacon_due {
            outcome.beacon = self.emit(HostCommand::Beacon, self.target);
        }
        if let (Some(attempt), Some(peer)) = (resend, peer) {
            debug!(%peer, attempt, "force-setup unanswered, resending");
            outcome.setup_resent = self.emit(HostCommand::ForceSetup, peer);
        }
        outcome
    }

    fn emit(&self, command: HostCommand, addr: SocketAddr) -> bool {
        match self.sink.send_datagram(&command.encode(), addr) {
            Ok(()) => {
                Metrics::record_packet(PacketDirection::Sent, command.opcode());
                true
            }
            Err(err) => {
                warn!(error = %err, opcode = %command.opcode(), "broadcaster send failed");
                false
            }
        }
    }
}
