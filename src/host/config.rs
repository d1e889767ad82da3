//! Host configuration.

use std::time::Duration;

use crate::transport::TransportConfig;

/// When the broadcaster emits beacons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BroadcastPolicy {
    /// Beacon for the lifetime of the host
    #[default]
    Continuous,
    /// Beacon only while no peer is known
    UntilPeer,
}

/// Resend policy for an unanswered force-setup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetupRetry {
    /// How long to wait for the first setup packet before resending
    pub timeout: Duration,
    /// Resends per force-setup
    pub max_attempts: u32,
}

impl Default for SetupRetry {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_attempts: 3,
        }
    }
}

/// Host configuration options.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostConfig {
    /// Socket and address settings.
    pub transport: TransportConfig,
    /// Delay between beacons; also the broadcaster's shutdown latency.
    pub beacon_interval: Duration,
    /// Beacon policy.
    pub broadcast_policy: BroadcastPolicy,
    /// Force-setup resend policy. `None` sends once and never retries.
    pub setup_retry: Option<SetupRetry>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            beacon_interval: Duration::from_secs(1),
            broadcast_policy: BroadcastPolicy::default(),
            setup_retry: None,
        }
    }
}
