//! Text-to-speech backend.
//!
//! Rendering is a blocking call that returns only when audio playback has
//! finished; the speech output activity layers its queue on top of that
//! contract.

use std::process::{Child, Command};
use std::sync::Mutex;

use tracing::debug;

use crate::config::SpeechConfig;
use crate::error::{AssistantError, Result};

/// Blocking speech synthesis contract.
pub trait SpeechSynth: Send + Sync {
    /// Render text to audio, returning once playback completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the synthesis backend fails; the speech queue
    /// consumer logs this and moves on to the next utterance.
    fn render(&self, text: &str) -> Result<()>;

    /// Halt in-progress playback immediately, if any.
    fn halt(&self);
}

/// System TTS via the macOS `say` command.
///
/// Keeps a handle to the in-flight child process so [`halt`](SpeechSynth::halt)
/// can kill playback mid-utterance.
pub struct SayTts {
    config: SpeechConfig,
    current: Mutex<Option<Child>>,
}

impl SayTts {
    /// Create a renderer with the given voice settings.
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }
}

impl SpeechSynth for SayTts {
    fn render(&self, text: &str) -> Result<()> {
        let mut cmd = Command::new("say");
        cmd.arg("-r").arg(self.config.rate_wpm.to_string());
        if let Some(ref voice) = self.config.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg(text);

        let child = cmd
            .spawn()
            .map_err(|e| AssistantError::SpeechRender(format!("failed to spawn say: {e}")))?;

        {
            let mut current = self
                .current
                .lock()
                .map_err(|_| AssistantError::SpeechRender("renderer lock poisoned".into()))?;
            *current = Some(child);
        }

        // Wait without holding the lock so halt() can reach the child.
        loop {
            let mut current = self
                .current
                .lock()
                .map_err(|_| AssistantError::SpeechRender("renderer lock poisoned".into()))?;
            let Some(child) = current.as_mut() else {
                // halt() took the child and killed it.
                debug!("playback halted mid-utterance");
                return Ok(());
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    *current = None;
                    if status.success() {
                        return Ok(());
                    }
                    return Err(AssistantError::SpeechRender(format!(
                        "say exited with {status}"
                    )));
                }
                Ok(None) => {}
                Err(e) => {
                    *current = None;
                    return Err(AssistantError::SpeechRender(format!(
                        "failed to wait for say: {e}"
                    )));
                }
            }
            drop(current);
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }

    fn halt(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(mut child) = current.take()
        {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
