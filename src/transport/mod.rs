//! UDP transport: socket binding, address derivation, raw send/receive.

mod error;
mod net;
mod socket;
mod transport;

pub use error::TransportError;
pub use net::{class_c_broadcast, probe_local_ipv4};
pub use socket::{SocketBinding, SocketError};
pub use transport::{DatagramSink, Transport, TransportConfig, TransportHandle};
