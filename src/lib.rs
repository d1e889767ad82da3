//! Discover and remotely control microcontroller peripherals over a small UDP protocol
//!
//! The host broadcasts a one-byte beacon. A peripheral that hears it replies by registering
//! remote objects: named integer variables and callable functions, each with a layout tile.
//! The host mirrors them in a [`registry::Registry`], and can then write variables, call
//! functions, request value updates, or force a full re-registration.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mcu_remote::{Host, HostConfig};
//!
//! let host = Host::start(HostConfig::default())?;
//!
//! // ...once a peripheral has answered:
//! host.commands().force_setup()?;
//! for var in host.snapshot().ints {
//!     println!("{} = {}", var.name, var.value);
//! }
//! host.commands().set_variable(0, "42")?;
//! # Ok::<(), mcu_remote::Error>(())
//! ```
//!
//! # Layout
//!
//! - [`protocol`] - opcodes, tile layout word, pure packet codec
//! - [`registry`] - bounded stores of remote objects, guarded by one mutex
//! - [`transport`] - UDP socket and address derivation
//! - [`host`] - broadcaster and dispatcher threads, command encoder

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod error;
pub mod host;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use error::{Error, Result};
pub use host::{
    BroadcastPolicy, CommandEncoder, CommandError, Delivery, Host, HostConfig, SetupRetry,
};
pub use protocol::{DEFAULT_PORT, DecodeError, DevicePacket, HostCommand, Opcode, TileLayout};
pub use registry::{Registry, RegistryError, RegistrySnapshot, SessionState, SharedRegistry};
pub use transport::{TransportConfig, TransportError};
