//! Remote object registry
//!
//! Bounded, arrival-ordered stores of the variables, functions and layout tiles a peripheral
//! has registered, plus the current peer and setup session.

mod error;
mod session;
mod store;

pub use error::{RegistryError, StoreKind};
pub use session::SessionState;
pub use store::{
    FUNCTION_CAPACITY, FirmwareFunction, GuiTile, INT_CAPACITY, IntVariable, Registry,
    RegistrySnapshot, SharedRegistry, TILE_CAPACITY, TileKind, TileTarget,
};
