use thiserror::Error;

/// Errors surfaced by host bridge implementations.
///
/// Bridges should map platform failures into the closest variant; the core
/// treats most of these as transient and recovers through its own fallback
/// chains rather than propagating them to the host.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Remote endpoint rejected or failed the request.
    #[error("Remote call failed: {0}")]
    Remote(String),

    /// Request did not complete within the bridge's own deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Durable storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Audio device could not be opened or driven.
    #[error("Output device error: {0}")]
    Device(String),

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The host does not provide this capability.
    #[error("Capability not supported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
