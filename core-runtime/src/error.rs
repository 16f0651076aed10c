use thiserror::Error;

/// Failures raised while assembling or bootstrapping the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is missing or out of range.
    #[error("Invalid engine configuration: {0}")]
    Config(String),

    /// A required collaborator was not injected. The hint names what to
    /// provide and how.
    #[error("Missing capability {capability}: {hint}")]
    CapabilityMissing { capability: String, hint: String },

    /// Logging or runtime bootstrap failed.
    #[error("Runtime bootstrap error: {0}")]
    Bootstrap(String),
}

pub type Result<T> = std::result::Result<T, Error>;
