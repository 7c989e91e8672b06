//! Speech output activity.
//!
//! A [`Speaker`] owns a FIFO of pending utterances and a single dedicated
//! consumer that renders them one at a time, so two utterances never play
//! concurrently no matter how many producers call
//! [`speak_async`](Speaker::speak_async). The consumer starts on first
//! enqueue and exits once the queue drains; there is no busy-waiting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::Result;
use crate::tts::SpeechSynth;

struct SpeakerState {
    queue: VecDeque<String>,
    consumer_active: bool,
    // Bumped by stop() so an utterance popped before the stop is
    // discarded instead of rendered after it.
    generation: u64,
}

/// Queued text-to-speech output with blocking and async entry points.
#[derive(Clone)]
pub struct Speaker {
    synth: Arc<dyn SpeechSynth>,
    state: Arc<Mutex<SpeakerState>>,
}

impl Speaker {
    /// Create a speaker over the given synthesis backend.
    pub fn new(synth: Arc<dyn SpeechSynth>) -> Self {
        Self {
            synth,
            state: Arc::new(Mutex::new(SpeakerState {
                queue: VecDeque::new(),
                consumer_active: false,
                generation: 0,
            })),
        }
    }

    /// Render `text` immediately, returning only when playback finishes.
    ///
    /// Blocks the calling thread; intended for startup/shutdown
    /// announcements, not for use inside async tasks.
    ///
    /// # Errors
    ///
    /// Propagates the synthesis backend's failure.
    pub fn speak_blocking(&self, text: &str) -> Result<()> {
        self.synth.render(text)
    }

    /// Enqueue `text` for playback and return immediately.
    ///
    /// Starts the consumer if it is not already running. The
    /// consumer-active flag lives inside the queue lock, so concurrent
    /// producers can never start a second consumer.
    pub fn speak_async(&self, text: impl Into<String>) {
        let text = text.into();
        debug!("queueing utterance: {text}");

        let start_consumer = {
            let mut state = match self.state.lock() {
                Ok(s) => s,
                Err(_) => {
                    warn!("speaker state poisoned, dropping utterance");
                    return;
                }
            };
            state.queue.push_back(text);
            if state.consumer_active {
                false
            } else {
                state.consumer_active = true;
                true
            }
        };

        if start_consumer {
            let synth = Arc::clone(&self.synth);
            let state = Arc::clone(&self.state);
            tokio::task::spawn_blocking(move || consume_queue(&synth, &state));
        }
    }

    /// Speak an error message asynchronously.
    pub fn speak_error(&self, error: Option<&str>) {
        match error {
            Some(msg) => self.speak_async(format!("Error: {msg}")),
            None => self.speak_async("Sorry, I encountered an error"),
        }
    }

    /// Announce that a task finished.
    pub fn speak_task_complete(&self, description: Option<&str>) {
        match description {
            Some(desc) => self.speak_async(format!("Done. {desc}")),
            None => self.speak_async("Task completed"),
        }
    }

    /// Clear any pending queued text and halt in-progress playback.
    ///
    /// Clearing the queue and bumping the generation happen under one
    /// lock, so an utterance the consumer popped but has not yet
    /// rendered is discarded rather than played after the stop. The
    /// next [`speak_async`](Self::speak_async) call restarts the
    /// consumer fresh.
    pub fn stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.queue.clear();
            state.generation = state.generation.wrapping_add(1);
        }
        self.synth.halt();
    }

    /// Number of utterances still queued (not counting one mid-render).
    pub fn pending(&self) -> usize {
        self.state.lock().map(|s| s.queue.len()).unwrap_or(0)
    }
}

/// Drain the queue FIFO, rendering one utterance fully before dequeuing
/// the next. Exits (clearing the active flag) when the queue is empty.
fn consume_queue(synth: &Arc<dyn SpeechSynth>, state: &Arc<Mutex<SpeakerState>>) {
    loop {
        let Some((next, generation)) = pop_next(state) else {
            return;
        };

        // A stop() between the pop and here invalidates the utterance.
        if !still_current(state, generation) {
            continue;
        }

        if let Err(e) = synth.render(&next) {
            // Render failures skip to the next queued item.
            warn!("speech render failed: {e}");
        }
    }
}

/// Pop the next utterance with the generation it belongs to, or clear
/// the active flag and return `None` when the queue is empty.
fn pop_next(state: &Arc<Mutex<SpeakerState>>) -> Option<(String, u64)> {
    let mut state = state.lock().ok()?;
    match state.queue.pop_front() {
        Some(text) => Some((text, state.generation)),
        None => {
            state.consumer_active = false;
            None
        }
    }
}

fn still_current(state: &Arc<Mutex<SpeakerState>>, generation: u64) -> bool {
    state
        .lock()
        .map(|s| s.generation == generation)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::error::AssistantError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records utterances and asserts no two renders ever overlap.
    struct RecordingSynth {
        rendered: Mutex<Vec<String>>,
        rendering: AtomicBool,
        overlap_seen: AtomicBool,
        fail_on: Option<String>,
    }

    impl RecordingSynth {
        fn new() -> Self {
            Self {
                rendered: Mutex::new(Vec::new()),
                rendering: AtomicBool::new(false),
                overlap_seen: AtomicBool::new(false),
                fail_on: None,
            }
        }

        fn failing_on(text: &str) -> Self {
            Self {
                fail_on: Some(text.to_owned()),
                ..Self::new()
            }
        }
    }

    impl SpeechSynth for RecordingSynth {
        fn render(&self, text: &str) -> Result<()> {
            if self.rendering.swap(true, Ordering::SeqCst) {
                self.overlap_seen.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(10));
            self.rendered.lock().unwrap().push(text.to_owned());
            self.rendering.store(false, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(text) {
                return Err(AssistantError::SpeechRender("scripted failure".into()));
            }
            Ok(())
        }

        fn halt(&self) {}
    }

    async fn wait_for_drain(speaker: &Speaker) {
        for _ in 0..200 {
            let idle = {
                let state = speaker.state.lock().unwrap();
                state.queue.is_empty() && !state.consumer_active
            };
            if idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("speaker did not drain in time");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn utterances_render_in_fifo_order_without_overlap() {
        let synth = Arc::new(RecordingSynth::new());
        let speaker = Speaker::new(synth.clone());

        speaker.speak_async("one");
        speaker.speak_async("two");
        speaker.speak_async("three");
        wait_for_drain(&speaker).await;

        assert_eq!(
            *synth.rendered.lock().unwrap(),
            vec!["one".to_owned(), "two".to_owned(), "three".to_owned()]
        );
        assert!(!synth.overlap_seen.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_producers_never_start_two_consumers() {
        struct CountingSynth {
            concurrent: AtomicUsize,
            max_concurrent: AtomicUsize,
        }
        impl SpeechSynth for CountingSynth {
            fn render(&self, _text: &str) -> Result<()> {
                let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_concurrent.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
            fn halt(&self) {}
        }

        let synth = Arc::new(CountingSynth {
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        });
        let speaker = Speaker::new(synth.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let speaker = speaker.clone();
            handles.push(tokio::spawn(async move {
                speaker.speak_async(format!("utterance {i}"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        wait_for_drain(&speaker).await;

        assert_eq!(synth.max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn render_failure_continues_to_next_item() {
        let synth = Arc::new(RecordingSynth::failing_on("bad"));
        let speaker = Speaker::new(synth.clone());

        speaker.speak_async("bad");
        speaker.speak_async("good");
        wait_for_drain(&speaker).await;

        let rendered = synth.rendered.lock().unwrap();
        assert_eq!(*rendered, vec!["bad".to_owned(), "good".to_owned()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_clears_pending_queue() {
        let synth = Arc::new(RecordingSynth::new());
        let speaker = Speaker::new(synth.clone());

        speaker.speak_async("first");
        for i in 0..20 {
            speaker.speak_async(format!("queued {i}"));
        }
        speaker.stop();
        assert_eq!(speaker.pending(), 0);

        wait_for_drain(&speaker).await;

        // The consumer restarts fresh after a stop.
        speaker.speak_async("after stop");
        wait_for_drain(&speaker).await;
        assert_eq!(
            synth.rendered.lock().unwrap().last().map(String::as_str),
            Some("after stop")
        );
    }

    #[test]
    fn stop_discards_an_utterance_popped_before_it_ran() {
        let synth = Arc::new(RecordingSynth::new());
        let speaker = Speaker::new(synth);

        // Stage the queue as the consumer would see it mid-loop: one
        // utterance pending, consumer marked active, then pop it the
        // way the consumer does.
        {
            let mut state = speaker.state.lock().unwrap();
            state.queue.push_back("stale".to_owned());
            state.consumer_active = true;
        }
        let (text, generation) = pop_next(&speaker.state).unwrap();
        assert_eq!(text, "stale");
        assert!(still_current(&speaker.state, generation));

        // A stop landing between the pop and the render invalidates it.
        speaker.stop();
        assert!(!still_current(&speaker.state, generation));
    }

    #[test]
    fn speak_blocking_renders_synchronously() {
        let synth = Arc::new(RecordingSynth::new());
        let speaker = Speaker::new(synth.clone());
        speaker.speak_blocking("hello").unwrap();
        assert_eq!(*synth.rendered.lock().unwrap(), vec!["hello".to_owned()]);
    }
}
