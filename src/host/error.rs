//! Command error types

use std::num::ParseIntError;

use thiserror::Error;

use crate::transport::TransportError;

/// Failures reported to the caller of a command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Variable text is not a 32-bit integer; nothing was sent.
    #[error("invalid integer {text:?}: {source}")]
    Parse {
        /// Text as supplied
        text: String,
        /// Cause
        #[source]
        source: ParseIntError,
    },

    /// Datagram could not be sent.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
