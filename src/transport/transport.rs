//! High-level transport facade: one broadcast-capable UDP socket plus the addresses
//! derived for it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::protocol::{DEFAULT_PORT, MAX_DATAGRAM_SIZE, Metrics};

use super::error::TransportError;
use super::net::{class_c_broadcast, probe_local_ipv4};
use super::socket::{SocketBinding, SocketError};

/// Transport configuration options.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig {
    /// UDP port bound on all interfaces.
    pub port: u16,
    /// Local IPv4 address. Probed from the routing table when unset.
    pub local_ip: Option<Ipv4Addr>,
    /// Broadcast address. Derived from `local_ip` (/24) when unset.
    pub broadcast_ip: Option<Ipv4Addr>,
    /// Port beacons are sent to. Defaults to `port`, which peripherals also listen on.
    pub broadcast_port: Option<u16>,
    /// How long a receive may block before reporting nothing available.
    pub read_timeout: Duration,
    /// Optional write timeout for sockets.
    pub write_timeout: Option<Duration>,
    /// Receive buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            local_ip: None,
            broadcast_ip: None,
            broadcast_port: None,
            read_timeout: Duration::from_millis(50),
            write_timeout: None,
            buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

/// Outbound half of the transport.
///
/// The broadcaster and command encoder only need to send, so they depend on this rather
/// than on a socket.
pub trait DatagramSink: Send + Sync {
    /// Send one datagram. Failures are recoverable.
    fn send_datagram(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError>;
}

/// Handle used by callers to interact with the transport.
#[derive(Clone, Debug)]
pub struct TransportHandle {
    inner: Arc<TransportInner>,
}

#[derive(Debug)]
struct TransportInner {
    socket: SocketBinding,
    local: SocketAddr,
    broadcast: SocketAddr,
    buffer_size: usize,
}

impl TransportHandle {
    /// Send data to the specified remote address. Failures are logged and returned.
    #[instrument(level = "trace", skip(self, buffer))]
    pub fn send(&self, buffer: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        match self.inner.socket.send_to(buffer, addr) {
            Ok(_) => Ok(()),
            Err(source) => {
                warn!(%addr, error = %source, "send failed");
                Metrics::record_send_failure();
                Err(TransportError::Send { addr, source })
            }
        }
    }

    /// Receive one datagram, blocking for at most the configured read timeout.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing to read.
    pub fn receive(&self, buffer: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        match self.inner.socket.recv_from(buffer) {
            Ok(received) => Ok(Some(received)),
            Err(err) if err.is_timeout() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Endpoint our own datagrams arrive from, used to filter broadcast loopback.
    #[must_use]
    pub fn local_endpoint(&self) -> SocketAddr {
        self.inner.local
    }

    /// Destination for discovery beacons.
    #[must_use]
    pub fn broadcast_endpoint(&self) -> SocketAddr {
        self.inner.broadcast
    }

    /// Receive buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Expose the bound socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner.socket.local_addr()
    }
}

impl DatagramSink for TransportHandle {
    fn send_datagram(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        self.send(bytes, addr)
    }
}

/// Transport builder responsible for binding sockets and configuring resources.
#[derive(Debug)]
pub struct Transport {
    config: TransportConfig,
}

impl Transport {
    /// Create a new transport with the given configuration.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Bind `0.0.0.0:port` and resolve the local and broadcast addresses.
    #[instrument(level = "info", skip(self), fields(port = self.config.port))]
    pub fn bind(&self) -> Result<TransportHandle, TransportError> {
        let local_ip = match self.config.local_ip {
            Some(ip) => ip,
            None => probe_local_ipv4().ok_or(TransportError::NoLocalAddress)?,
        };
        let broadcast_ip = self
            .config
            .broadcast_ip
            .unwrap_or_else(|| class_c_broadcast(local_ip));

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.config.port);
        let socket =
            SocketBinding::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(self.config.read_timeout))?;
        if let Some(timeout) = self.config.write_timeout {
            socket.set_write_timeout(Some(timeout))?;
        }

        // Port 0 asks the OS to pick; use whatever it chose.
        let port = socket.local_addr()?.port();
        let local = SocketAddr::new(IpAddr::V4(local_ip), port);
        let broadcast = SocketAddr::new(
            IpAddr::V4(broadcast_ip),
            self.config.broadcast_port.unwrap_or(self.config.port),
        );
        info!(%local, %broadcast, "transport bound");

        Ok(TransportHandle {
            inner: Arc::new(TransportInner {
                socket,
                local,
                broadcast,
                buffer_size: self.config.buffer_size,
            }),
        })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Drop for TransportInner {
    fn drop(&mut self) {
        debug!(local = %self.local, "transport handle dropped");
    }
}
