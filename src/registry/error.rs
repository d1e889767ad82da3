//! Registry error types

use thiserror::Error;

/// Which bounded store rejected a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Integer variables
    IntVariables,
    /// Firmware functions
    Functions,
    /// Layout tiles
    Tiles,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IntVariables => "int variable",
            Self::Functions => "function",
            Self::Tiles => "tile",
        };
        write!(f, "{name}")
    }
}

/// Registry mutation failures. The registry is left unchanged in every case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Store already holds its maximum number of entries
    #[error("{store} store full ({capacity} entries)")]
    Capacity {
        /// Store that is full
        store: StoreKind,
        /// Its capacity
        capacity: usize,
    },

    /// Update references variables that have not been registered
    #[error("update of {len} values at index {start} exceeds {count} registered variables")]
    Range {
        /// First index written
        start: usize,
        /// Number of values
        len: usize,
        /// Registered variables
        count: usize,
    },
}
