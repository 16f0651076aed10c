//! Player error taxonomy.
//!
//! Most failures in the core are absorbed by fallback chains; what remains
//! here is what callers can actually observe. Source-resolution failure is
//! deliberately *not* an error; see [`crate::resolver::Resolution`].

use host_bridge::BridgeError;
use thiserror::Error;

/// Errors surfaced by the playback core.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The output device could not be opened or driven.
    #[error("Output device failure: {0}")]
    Output(String),

    /// The personal-FM feed stayed empty through its whole retry budget.
    #[error("Personal FM feed exhausted after {attempts} attempts")]
    FmExhausted { attempts: u32 },

    /// A bridge collaborator failed in a way the core does not absorb.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl PlayerError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlayerError::Bridge(BridgeError::Remote(_))
                | PlayerError::Bridge(BridgeError::Timeout(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
