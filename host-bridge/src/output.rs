//! Audio output device seam.
//!
//! The playback core delegates decoding and device handling to an external
//! playback primitive behind these traits. The controller owns at most one
//! [`OutputHandle`] at a time; dropping a handle must release the device
//! and any transient decoded-data buffers it holds.

use crate::error::Result;
use crate::model::MediaSource;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Runtime failures reported by an open output.
///
/// The classification drives the controller's recovery policy, so
/// implementations should map device errors as precisely as they can.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// The stream's audio data could not be decoded.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// The container or codec is not supported by this device.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Anything else: device lost, stream aborted mid-flight, etc.
    #[error("Output failure: {0}")]
    Other(String),
}

/// Asynchronous events emitted by an open output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The track played to its natural end.
    Ended,
    /// Playback failed after the output was opened.
    Failed(OutputError),
}

/// Factory for output instances.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Opens a new output bound to `source`. Runtime events are delivered
    /// through `events`; the sender may be dropped by the device once the
    /// handle is released.
    async fn open(
        &self,
        source: MediaSource,
        events: UnboundedSender<OutputEvent>,
    ) -> Result<Box<dyn OutputHandle>>;
}

/// A single open output instance.
///
/// Control calls are expected to return quickly; `fade` resolves only once
/// the ramp has completed so callers can order state flips after it.
#[async_trait]
pub trait OutputHandle: Send + Sync {
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position: Duration) -> Result<()>;

    /// Current playback position from the start of the track.
    async fn position(&self) -> Result<Duration>;

    /// Volume in `[0.0, 1.0]`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Ramps volume from `from` to `to` over `duration`, resolving when
    /// the ramp finishes.
    async fn fade(&self, from: f32, to: f32, duration: Duration) -> Result<()>;
}
