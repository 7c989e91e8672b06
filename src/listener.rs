//! Wake-phrase listening activity.
//!
//! Runs as a background actor: capture an utterance, transcribe it, and
//! if it contains the wake phrase, emit the remainder as a command on a
//! bounded channel. A bare wake phrase ("hey assistant" and nothing
//! else) triggers a short follow-up capture so the user can speak the
//! command after being acknowledged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::Microphone;
use crate::config::ListenerConfig;
use crate::error::{AssistantError, Result};
use crate::stt::SpeechToText;

/// Capacity of the command channel between listener and orchestrator.
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Events a running listener reports back to its owner.
pub trait ListenerEvents: Send + Sync {
    /// The wake phrase was heard with no command attached; the listener
    /// is about to capture a follow-up utterance.
    fn on_wake(&self) {}

    /// A capture or recognition cycle failed. The listener backs off
    /// and keeps running.
    fn on_error(&self, _error: &AssistantError) {}
}

/// No-op event sink.
pub struct SilentEvents;

impl ListenerEvents for SilentEvents {}

/// Handle to a spawned listening activity.
pub struct Listener {
    commands: mpsc::Receiver<String>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl Listener {
    /// Spawn the listening loop over the given capture and recognition
    /// backends. Commands arrive on [`recv_command`](Self::recv_command)
    /// in the order they were spoken.
    pub fn spawn(
        config: ListenerConfig,
        microphone: Arc<dyn Microphone>,
        recognizer: Arc<dyn SpeechToText>,
        events: Arc<dyn ListenerEvents>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            listen_loop(config, microphone, recognizer, events, tx, loop_cancel).await;
        });
        Self {
            commands: rx,
            cancel,
            task,
        }
    }

    /// Receive the next spoken command. Returns `None` once the
    /// listener has shut down and the queue is drained.
    pub async fn recv_command(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// Stop the listening loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("listener task join failed: {e}");
        }
    }
}

async fn listen_loop(
    config: ListenerConfig,
    microphone: Arc<dyn Microphone>,
    recognizer: Arc<dyn SpeechToText>,
    events: Arc<dyn ListenerEvents>,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    info!(wake_phrase = %config.wake_phrase, "listening for wake phrase");
    let backoff = Duration::from_millis(config.error_backoff_ms);

    while !cancel.is_cancelled() {
        let cycle = listen_cycle(
            &config,
            microphone.as_ref(),
            recognizer.as_ref(),
            events.as_ref(),
        );
        let command = tokio::select! {
            () = cancel.cancelled() => break,
            result = cycle => match result {
                Ok(command) => command,
                Err(e) => {
                    warn!("listen cycle failed: {e}");
                    events.on_error(&e);
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
            },
        };

        if let Some(command) = command {
            info!(%command, "heard command");
            if tx.send(command).await.is_err() {
                // Orchestrator went away.
                break;
            }
        }
    }
    debug!("listener loop exited");
}

/// One capture-and-recognize cycle. Returns a command when the wake
/// phrase was heard, `None` when the utterance was uninteresting.
async fn listen_cycle(
    config: &ListenerConfig,
    microphone: &dyn Microphone,
    recognizer: &dyn SpeechToText,
    events: &dyn ListenerEvents,
) -> Result<Option<String>> {
    let listen_timeout = Duration::from_secs(config.listen_timeout_s);
    let Some(clip) = microphone.capture_utterance(listen_timeout).await? else {
        return Ok(None);
    };
    let Some(text) = recognizer.transcribe(&clip).await? else {
        return Ok(None);
    };
    debug!(%text, "transcribed utterance");

    let Some(remainder) = strip_wake_phrase(&text, &config.wake_phrase) else {
        return Ok(None);
    };
    if !remainder.is_empty() {
        return Ok(Some(remainder));
    }

    // Bare wake phrase: acknowledge and capture a follow-up command.
    events.on_wake();
    let follow_up = Duration::from_secs(config.follow_up_timeout_s);
    let Some(clip) = microphone.capture_utterance(follow_up).await? else {
        return Ok(None);
    };
    let Some(text) = recognizer.transcribe(&clip).await? else {
        return Ok(None);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_owned()))
    }
}

/// Case-insensitively locate `wake_phrase` in `text` and return
/// whatever follows it, trimmed of whitespace and leading punctuation.
/// Returns `None` when the phrase is absent.
pub fn strip_wake_phrase(text: &str, wake_phrase: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let phrase = wake_phrase.to_lowercase();
    let start = lower.find(&phrase)?;
    let after = &text[start + phrase.len()..];
    let command = after.trim_start_matches([',', '.', '!', '?']).trim();
    Some(command.to_owned())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::audio::AudioClip;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn strips_wake_phrase_and_returns_command() {
        assert_eq!(
            strip_wake_phrase("hey assistant open safari", "hey assistant"),
            Some("open safari".to_owned())
        );
    }

    #[test]
    fn wake_phrase_match_is_case_insensitive() {
        assert_eq!(
            strip_wake_phrase("Hey Assistant, what time is it", "hey assistant"),
            Some("what time is it".to_owned())
        );
    }

    #[test]
    fn bare_wake_phrase_yields_empty_command() {
        assert_eq!(
            strip_wake_phrase("hey assistant", "hey assistant"),
            Some(String::new())
        );
        assert_eq!(
            strip_wake_phrase("hey assistant!", "hey assistant"),
            Some(String::new())
        );
    }

    #[test]
    fn missing_wake_phrase_is_ignored() {
        assert_eq!(strip_wake_phrase("open safari please", "hey assistant"), None);
    }

    #[test]
    fn wake_phrase_mid_sentence_keeps_only_the_tail() {
        assert_eq!(
            strip_wake_phrase("um hey assistant close mail", "hey assistant"),
            Some("close mail".to_owned())
        );
    }

    /// Scripted microphone returning a fixed sequence of clips.
    struct ScriptedMic {
        clips: Mutex<Vec<Option<AudioClip>>>,
    }

    impl ScriptedMic {
        fn new(count: usize) -> Self {
            let clip = AudioClip {
                samples: vec![0.5; 160],
                sample_rate: 16_000,
            };
            Self {
                clips: Mutex::new(vec![Some(clip); count]),
            }
        }
    }

    #[async_trait]
    impl Microphone for ScriptedMic {
        async fn capture_utterance(&self, _timeout: Duration) -> Result<Option<AudioClip>> {
            let next = {
                let mut clips = self.clips.lock().unwrap();
                if clips.is_empty() { None } else { Some(clips.remove(0)) }
            };
            match next {
                Some(clip) => Ok(clip),
                None => {
                    // Starve the loop once the script runs out.
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    /// Scripted recognizer returning fixed transcripts in order.
    struct ScriptedStt {
        texts: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl SpeechToText for ScriptedStt {
        async fn transcribe(&self, _clip: &AudioClip) -> Result<Option<String>> {
            let mut texts = self.texts.lock().unwrap();
            if texts.is_empty() {
                Ok(None)
            } else {
                Ok(texts.remove(0))
            }
        }
    }

    struct CountingEvents {
        wakes: AtomicUsize,
    }

    impl ListenerEvents for CountingEvents {
        fn on_wake(&self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config() -> ListenerConfig {
        ListenerConfig {
            wake_phrase: "hey assistant".to_owned(),
            listen_timeout_s: 1,
            follow_up_timeout_s: 1,
            error_backoff_ms: 10,
        }
    }

    #[tokio::test]
    async fn inline_command_is_emitted() {
        let mut listener = Listener::spawn(
            test_config(),
            Arc::new(ScriptedMic::new(1)),
            Arc::new(ScriptedStt {
                texts: Mutex::new(vec![Some("hey assistant open notes".to_owned())]),
            }),
            Arc::new(SilentEvents),
        );
        let command = listener.recv_command().await;
        assert_eq!(command.as_deref(), Some("open notes"));
        listener.shutdown().await;
    }

    #[tokio::test]
    async fn bare_wake_phrase_triggers_follow_up_capture() {
        let events = Arc::new(CountingEvents {
            wakes: AtomicUsize::new(0),
        });
        let mut listener = Listener::spawn(
            test_config(),
            Arc::new(ScriptedMic::new(2)),
            Arc::new(ScriptedStt {
                texts: Mutex::new(vec![
                    Some("hey assistant".to_owned()),
                    Some("close safari".to_owned()),
                ]),
            }),
            events.clone(),
        );
        let command = listener.recv_command().await;
        assert_eq!(command.as_deref(), Some("close safari"));
        assert_eq!(events.wakes.load(Ordering::SeqCst), 1);
        listener.shutdown().await;
    }

    #[tokio::test]
    async fn unrelated_speech_is_not_emitted() {
        let mut listener = Listener::spawn(
            test_config(),
            Arc::new(ScriptedMic::new(2)),
            Arc::new(ScriptedStt {
                texts: Mutex::new(vec![
                    Some("just talking to myself".to_owned()),
                    Some("hey assistant lock the screen".to_owned()),
                ]),
            }),
            Arc::new(SilentEvents),
        );
        // Only the wake-phrase utterance comes through.
        let command = listener.recv_command().await;
        assert_eq!(command.as_deref(), Some("lock the screen"));
        listener.shutdown().await;
    }
}
