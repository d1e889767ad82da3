//! Host runtime: discovery broadcaster, packet dispatcher and command encoder
//!
//! [`Host::start`] binds the socket and spawns two worker threads. The presentation layer
//! reads [`Host::snapshot`] and drives the peer through [`Host::commands`].

mod broadcaster;
mod commands;
mod config;
mod dispatcher;
mod error;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::registry::{RegistrySnapshot, SessionState, SharedRegistry};
use crate::transport::{DatagramSink, Transport, TransportHandle};

pub use commands::{CommandEncoder, Delivery};
pub use config::{BroadcastPolicy, HostConfig, SetupRetry};
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::CommandError;

use broadcaster::Broadcaster;
use shutdown::{StopHandle, stop_channel};

/// Running host session bound to one UDP socket.
#[derive(Debug)]
pub struct Host {
    registry: SharedRegistry,
    transport: TransportHandle,
    commands: CommandEncoder,
    stop: StopHandle,
    workers: Vec<JoinHandle<()>>,
}

impl Host {
    /// Bind the socket and start broadcasting and dispatching.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be bound or a worker thread cannot be spawned.
    pub fn start(config: HostConfig) -> crate::Result<Self> {
        let transport = Transport::new(config.transport.clone()).bind()?;
        let registry = SharedRegistry::new();
        let sink: Arc<dyn DatagramSink> = Arc::new(transport.clone());
        let commands = CommandEncoder::new(Arc::clone(&sink), registry.clone());
        let (stop, token) = stop_channel();

        let broadcaster = Broadcaster::new(
            sink,
            registry.clone(),
            transport.broadcast_endpoint(),
            config.beacon_interval,
            config.broadcast_policy,
            config.setup_retry,
        );
        let dispatcher = Dispatcher::new(registry.clone(), transport.local_endpoint());

        let mut workers = Vec::with_capacity(2);
        let broadcaster_token = token.clone();
        workers.push(
            thread::Builder::new()
                .name("mcu-broadcaster".into())
                .spawn(move || broadcaster.run(broadcaster_token))?,
        );
        let dispatcher_transport = transport.clone();
        workers.push(
            thread::Builder::new()
                .name("mcu-dispatcher".into())
                .spawn(move || dispatcher.run(&dispatcher_transport, &token))?,
        );

        info!(local = %transport.local_endpoint(), "host started");
        Ok(Self {
            registry,
            transport,
            commands,
            stop,
            workers,
        })
    }

    /// Copy of the registry for rendering.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Shared registry, for callers that need to hold the lock across several reads.
    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Command encoder bound to this host's socket.
    #[must_use]
    pub fn commands(&self) -> &CommandEncoder {
        &self.commands
    }

    /// Most recent peer, if any.
    #[must_use]
    pub fn current_peer(&self) -> Option<SocketAddr> {
        self.registry.peer()
    }

    /// Setup handshake state.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.registry.session_state()
    }

    /// Local endpoint as seen by peers.
    #[must_use]
    pub fn local_endpoint(&self) -> SocketAddr {
        self.transport.local_endpoint()
    }

    /// Where beacons are sent.
    #[must_use]
    pub fn broadcast_endpoint(&self) -> SocketAddr {
        self.transport.broadcast_endpoint()
    }

    /// Stop both workers and wait for them. Returns within one beacon interval or one
    /// receive timeout, whichever is longer. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.stop.trigger();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_owned();
            if worker.join().is_err() {
                warn!(worker = %name, "worker panicked");
            }
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}
