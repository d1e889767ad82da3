//! Inbound datagram classification and registry updates.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::protocol::{DecodeError, DevicePacket, Metrics, Opcode, PacketDirection};
use crate::registry::{Registry, RegistryError, SharedRegistry};
use crate::transport::TransportHandle;

use super::shutdown::StopToken;

/// Pause after a socket error before receiving again.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Result of handling one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Our own broadcast, looped back
    Loopback,
    /// Decoded and applied to the registry
    Applied(Opcode),
    /// Opcode is not something a device sends
    Ignored,
    /// Malformed packet
    Malformed(DecodeError),
    /// Decoded but refused by the registry
    Rejected(RegistryError),
}

/// Applies device packets to the registry and tracks the current peer.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
    local: SocketAddr,
}

impl Dispatcher {
    /// `local` is the endpoint our own broadcasts arrive from.
    #[must_use]
    pub fn new(registry: SharedRegistry, local: SocketAddr) -> Self {
        Self { registry, local }
    }

    /// Handle one datagram from `src`.
    ///
    /// Never panics, whatever the bytes. A sender becomes the current peer once it sends
    /// anything carrying a device opcode, even if the rest of the packet is malformed.
    pub fn handle_datagram(&self, bytes: &[u8], src: SocketAddr) -> Dispatch {
        if src == self.local {
            trace!("own datagram looped back");
            return Dispatch::Loopback;
        }

        let Some(opcode) = bytes.first().copied().and_then(Opcode::from_device_byte) else {
            trace!(%src, len = bytes.len(), "ignoring datagram without a device opcode");
            return Dispatch::Ignored;
        };
        Metrics::record_packet(PacketDirection::Received, opcode);
        let decoded = DevicePacket::decode(bytes);

        let mut registry = self.registry.lock();
        note_peer(&mut registry, src);
        let outcome = match decoded {
            Ok(packet) => match apply(&mut registry, packet) {
                Ok(()) => return Dispatch::Applied(opcode),
                Err(err) => {
                    warn!(%src, %opcode, error = %err, "registry rejected packet");
                    Dispatch::Rejected(err)
                }
            },
            Err(err) => {
                debug!(%src, %opcode, error = %err, "dropping malformed packet");
                Dispatch::Malformed(err)
            }
        };
        Metrics::record_dropped();
        outcome
    }

    /// Receive and dispatch until `stop` fires.
    pub(crate) fn run(self, transport: &TransportHandle, stop: &StopToken) {
        info!(local = %self.local, "dispatcher started");
        let mut buffer = vec![0u8; transport.buffer_size()];
        while !stop.is_stopped() {
            match transport.receive(&mut buffer) {
                Ok(Some((len, src))) => {
                    self.handle_datagram(&buffer[..len], src);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "receive failed");
                    if stop.wait(ERROR_BACKOFF) {
                        break;
                    }
                }
            }
        }
        info!("dispatcher stopped");
    }
}

fn note_peer(registry: &mut Registry, src: SocketAddr) {
    if registry.peer() != Some(src) {
        info!(peer = %src, "peer discovered");
    }
    registry.set_peer(src);
}

fn apply(registry: &mut Registry, packet: DevicePacket) -> Result<(), RegistryError> {
    match packet {
        DevicePacket::SetupFunction(setup) => {
            let slot = registry.register_function(setup.name, 0)?;
            log_slot_mismatch(setup.index, slot);
        }
        DevicePacket::SetupInt(setup) => {
            let slot = registry.register_int_variable(
                setup.value,
                setup.min,
                setup.max,
                setup.flags,
                setup.name,
            )?;
            log_slot_mismatch(setup.index, slot);
        }
        DevicePacket::UpdateInt(update) => {
            registry.update_int(usize::from(update.start), &update.values)?;
        }
    }
    Ok(())
}

// Slots follow arrival order; the transmitted index is informational only.
fn log_slot_mismatch(declared: u8, slot: u8) {
    if declared != slot {
        debug!(declared, slot, "declared index differs from arrival slot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HostCommand, IntSetup, metrics, received_count};
    use crate::registry::{FirmwareFunction, SessionState, TileKind};
    use proptest::prelude::*;

    fn local() -> SocketAddr {
        "192.168.1.10:55555".parse().unwrap()
    }

    fn device() -> SocketAddr {
        "192.168.1.42:55555".parse().unwrap()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(SharedRegistry::new(), local())
    }

    fn speed_setup() -> Vec<u8> {
        DevicePacket::SetupInt(IntSetup {
            index: 0,
            value: 10,
            min: 0,
            max: 100,
            flags: 0,
            name: "Speed".to_owned(),
        })
        .encode()
    }

    #[test]
    fn test_function_setup_scenario() {
        let dispatcher = dispatcher();
        let outcome = dispatcher.handle_datagram(&[0x00, 0x00, b'P', b'i', b'n', b'g'], device());
        assert_eq!(outcome, Dispatch::Applied(Opcode::SetupFunction));

        let registry = dispatcher.registry.lock();
        assert_eq!(
            registry.function(0),
            Some(&FirmwareFunction {
                index: 0,
                name: "Ping".to_owned(),
                flags: 0,
            })
        );
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.tiles[1].kind, TileKind::Function);
        assert_eq!(snapshot.tiles[1].ref_index, 0);
        assert_eq!(registry.tile_count(), 2);
        assert_eq!(registry.peer(), Some(device()));
        assert_eq!(registry.session_state(), SessionState::Populated);
    }

    #[test]
    fn test_setup_then_update_scenario() {
        let dispatcher = dispatcher();
        dispatcher.handle_datagram(&speed_setup(), device());
        {
            let registry = dispatcher.registry.lock();
            let var = registry.int_variable(0).unwrap();
            assert_eq!((var.value, var.min, var.max), (10, 0, 100));
            assert_eq!(var.name, "Speed");
        }

        let outcome =
            dispatcher.handle_datagram(&[0x06, 0x00, 0x00, 0x00, 0x00, 0x2A], device());
        assert_eq!(outcome, Dispatch::Applied(Opcode::UpdateInt));
        assert_eq!(dispatcher.registry.lock().int_variable(0).unwrap().value, 42);
    }

    #[test]
    fn test_unknown_opcode_is_ignored() {
        let dispatcher = dispatcher();
        let before = dispatcher.registry.snapshot();
        assert_eq!(
            dispatcher.handle_datagram(&[0xFF, 0x01, 0x02], device()),
            Dispatch::Ignored
        );
        assert_eq!(dispatcher.handle_datagram(&[], device()), Dispatch::Ignored);
        assert_eq!(dispatcher.registry.snapshot(), before);
    }

    #[test]
    fn test_own_beacon_is_filtered() {
        let dispatcher = dispatcher();
        let beacon = HostCommand::Beacon.encode();
        assert_eq!(dispatcher.handle_datagram(&beacon, local()), Dispatch::Loopback);
        assert_eq!(dispatcher.registry.peer(), None);
    }

    #[test]
    fn test_truncated_setup_is_dropped() {
        let dispatcher = dispatcher();
        let outcome = dispatcher.handle_datagram(&[0x04, 0x00, 0x01], device());
        assert!(matches!(
            outcome,
            Dispatch::Malformed(DecodeError::TooShort { .. })
        ));
        let registry = dispatcher.registry.lock();
        assert_eq!(registry.int_count(), 0);
        assert_eq!(registry.peer(), Some(device()));
    }

    #[test]
    fn test_update_past_registered_is_rejected() {
        let dispatcher = dispatcher();
        dispatcher.handle_datagram(&speed_setup(), device());
        let before = dispatcher.registry.snapshot();

        let outcome = dispatcher.handle_datagram(&[0x06, 0x00, 0, 0, 0, 1, 0, 0, 0, 2], device());
        assert!(matches!(outcome, Dispatch::Rejected(RegistryError::Range { .. })));
        assert_eq!(dispatcher.registry.snapshot(), before);
    }

    #[test]
    fn test_last_sender_wins() {
        let dispatcher = dispatcher();
        let other: SocketAddr = "192.168.1.43:4000".parse().unwrap();
        dispatcher.handle_datagram(&[0x00, 0x00, b'a'], device());
        dispatcher.handle_datagram(&[0x00, 0x00, b'b'], other);
        assert_eq!(dispatcher.registry.peer(), Some(other));
        assert_eq!(dispatcher.registry.lock().function_count(), 2);
    }

    #[test]
    fn test_every_device_datagram_is_counted() {
        let dispatcher = dispatcher();
        let before = metrics();
        let setups_before = received_count(Opcode::SetupInt);

        dispatcher.handle_datagram(&speed_setup(), device());
        for _ in 0..5 {
            assert!(matches!(
                dispatcher.handle_datagram(&[0x04, 0x00], device()),
                Dispatch::Malformed(_)
            ));
        }
        assert!(matches!(
            dispatcher.handle_datagram(&[0x06, 0x03, 0, 0, 0, 1], device()),
            Dispatch::Rejected(_)
        ));
        dispatcher.handle_datagram(&[0xFF], device());
        dispatcher.handle_datagram(&HostCommand::Beacon.encode(), local());

        // Counters are process-wide and other tests run concurrently.
        let after = metrics();
        assert!(after.received_packets - before.received_packets >= 7);
        assert!(after.dropped_packets - before.dropped_packets >= 6);
        assert!(received_count(Opcode::SetupInt) - setups_before >= 6);
        assert!(after.dropped_packets <= after.received_packets);
        let ratio = after.drop_ratio().unwrap();
        assert!(ratio > 0.0 && ratio <= 1.0);
    }

    proptest! {
        /// Property: arbitrary datagrams never panic and keep the tile invariant
        #[test]
        fn prop_arbitrary_datagrams_keep_invariant(
            datagrams in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 0..40),
        ) {
            let dispatcher = dispatcher();
            for bytes in &datagrams {
                let _ = dispatcher.handle_datagram(bytes, device());
            }
            let registry = dispatcher.registry.lock();
            prop_assert_eq!(
                registry.tile_count(),
                registry.int_count() + registry.function_count() + 1
            );
        }
    }
}
