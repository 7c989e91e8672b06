//! Configuration types for the voice assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// Listening activity settings (wake phrase, timeouts).
    pub listener: ListenerConfig,
    /// Planning service settings.
    pub planner: PlannerConfig,
    /// Speech-to-text settings.
    pub stt: SttConfig,
    /// Speech output settings.
    pub speech: SpeechConfig,
    /// Browser session settings.
    pub browser: BrowserConfig,
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate the pipeline works at, in Hz.
    pub sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// RMS energy threshold for speech detection.
    ///
    /// Chunks with RMS above this value are classified as speech.
    /// Typical values for f32 samples in \[-1, 1\]:
    ///   - 0.005: very sensitive (picks up quiet speech and some noise)
    ///   - 0.01:  normal sensitivity (default)
    ///   - 0.02:  reduced sensitivity (noisy environments)
    pub energy_threshold: f32,
    /// Trailing silence in ms that ends an utterance.
    pub end_silence_ms: u32,
    /// Maximum length of a single utterance, in seconds.
    pub phrase_limit_s: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            input_device: None,
            energy_threshold: 0.01,
            end_silence_ms: 800,
            phrase_limit_s: 10,
        }
    }
}

/// Listening activity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Wake phrase that activates command capture (case-insensitive).
    pub wake_phrase: String,
    /// Maximum time to wait for speech to start on each listen cycle,
    /// in seconds.
    pub listen_timeout_s: u64,
    /// Seconds to wait for a follow-up command after a bare wake phrase.
    pub follow_up_timeout_s: u64,
    /// Pause in ms before retrying the loop after a backend error.
    pub error_backoff_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "hey assistant".to_owned(),
            listen_timeout_s: 5,
            follow_up_timeout_s: 5,
            error_backoff_ms: 1000,
        }
    }
}

/// Planning service configuration.
///
/// The API key is read from the `OPENAI_API_KEY` environment variable and
/// never stored in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Base URL of the planning service (OpenAI-compatible).
    pub api_url: String,
    /// Model to use for planning.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum user/assistant turns kept in the conversation history.
    ///
    /// Older turns are evicted; the system instruction is always kept.
    pub max_history_turns: usize,
    /// Override for the system instruction (None = built-in default).
    pub system_prompt: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "gpt-4-turbo-preview".to_owned(),
            temperature: 0.2,
            max_history_turns: 20,
            system_prompt: None,
        }
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL of the transcription service.
    pub api_url: String,
    /// Transcription model.
    pub model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "whisper-1".to_owned(),
        }
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// System voice name (None = system default).
    pub voice: Option<String>,
    /// Speech rate in words per minute.
    pub rate_wpm: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: None,
            rate_wpm: 175,
        }
    }
}

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to a Chrome/Chromium executable (None = auto-detect).
    pub chrome_path: Option<PathBuf>,
    /// Run the browser headless. The assistant drives a visible session
    /// by default so the user can watch it work.
    pub headless: bool,
    /// Navigation timeout in seconds.
    pub nav_timeout_s: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            nav_timeout_s: 30,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/beckon/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("beckon")
            .join("config.toml")
    }
}
