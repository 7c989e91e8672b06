//! Microphone capture for the listening activity.

pub mod capture;

pub use capture::CpalMicrophone;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// One captured utterance: mono f32 samples at a known rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono samples in \[-1, 1\].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioClip {
    /// Clip duration in seconds.
    pub fn duration_s(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Source of utterances for the listening activity.
///
/// The listener owns the microphone exclusively; implementations block
/// their own thread of control only, never the orchestrator's.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Capture one utterance.
    ///
    /// Waits up to `timeout` for speech to start; returns `Ok(None)` if
    /// nothing was heard in time (a non-error, the loop just continues).
    ///
    /// # Errors
    ///
    /// Returns an error if the audio device or stream fails.
    async fn capture_utterance(&self, timeout: Duration) -> Result<Option<AudioClip>>;
}
