//! Host → peripheral control packets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::protocol::{HostCommand, Metrics, PacketDirection};
use crate::registry::SharedRegistry;
use crate::transport::DatagramSink;

use super::error::CommandError;

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the socket for this peer. UDP gives no further guarantee.
    Sent(SocketAddr),
    /// No peer known yet; nothing was sent.
    NoPeer,
}

/// Encodes commands and sends them to the current peer.
#[derive(Clone)]
pub struct CommandEncoder {
    sink: Arc<dyn DatagramSink>,
    registry: SharedRegistry,
}

impl std::fmt::Debug for CommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder").finish_non_exhaustive()
    }
}

impl CommandEncoder {
    /// Build an encoder over any datagram sink.
    pub fn new(sink: Arc<dyn DatagramSink>, registry: SharedRegistry) -> Self {
        Self { sink, registry }
    }

    /// Clear the registry and ask the peer to register everything again.
    ///
    /// The reset completes before the request is sent, so setup packets that answer it
    /// always land in an empty registry.
    pub fn force_setup(&self) -> Result<Delivery, CommandError> {
        let peer = {
            let mut registry = self.registry.lock();
            registry.reset();
            registry.session_mut().request_setup(Instant::now());
            registry.peer()
        };
        info!(?peer, "registry cleared, requesting setup");
        self.send(HostCommand::ForceSetup, peer)
    }

    /// Invoke function `index` on the peer.
    pub fn call_function(&self, index: u8) -> Result<Delivery, CommandError> {
        self.send(HostCommand::CallFunction { index }, self.registry.peer())
    }

    /// Parse `text` as an `i32` and write it to variable `index`.
    ///
    /// The local value is not touched; it changes when the peer reports it back.
    pub fn set_variable(&self, index: u8, text: &str) -> Result<Delivery, CommandError> {
        let trimmed = text.trim();
        let value = trimmed.parse::<i32>().map_err(|source| CommandError::Parse {
            text: text.to_owned(),
            source,
        })?;
        self.send(HostCommand::SetVariable { index, value }, self.registry.peer())
    }

    /// Ask the peer for a bulk value update.
    pub fn request_update(&self) -> Result<Delivery, CommandError> {
        self.send(HostCommand::RequestUpdate, self.registry.peer())
    }

    fn send(
        &self,
        command: HostCommand,
        peer: Option<SocketAddr>,
    ) -> Result<Delivery, CommandError> {
        let Some(peer) = peer else {
            debug!(opcode = %command.opcode(), "no peer, command skipped");
            return Ok(Delivery::NoPeer);
        };
        self.sink.send_datagram(&command.encode(), peer)?;
        Metrics::record_packet(PacketDirection::Sent, command.opcode());
        debug!(opcode = %command.opcode(), %peer, "command sent");
        Ok(Delivery::Sent(peer))
    }
}
