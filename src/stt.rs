//! Speech-to-text backend.
//!
//! The listening activity treats STT as a narrow external collaborator:
//! it hands over one [`AudioClip`] and gets back `Some(text)`, or `None`
//! when no speech was detected (a normal outcome, not an error).

use async_trait::async_trait;
use reqwest::multipart;
use tracing::debug;

use crate::audio::AudioClip;
use crate::config::SttConfig;
use crate::error::{AssistantError, Result};

/// Speech-to-text contract used by the listener.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one utterance.
    ///
    /// Returns `Ok(None)` when the clip contains no recognizable speech.
    ///
    /// # Errors
    ///
    /// Transport or service failures; the listener logs these and retries
    /// after a brief pause rather than surfacing them to the user.
    async fn transcribe(&self, clip: &AudioClip) -> Result<Option<String>>;
}

/// Whisper-compatible transcription endpoint over HTTP.
pub struct WhisperApi {
    client: reqwest::Client,
    config: SttConfig,
    api_key: String,
}

impl WhisperApi {
    /// Create a transcriber for the configured endpoint.
    pub fn new(config: SttConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperApi {
    async fn transcribe(&self, clip: &AudioClip) -> Result<Option<String>> {
        let wav = encode_wav(&clip.samples, clip.sample_rate);
        debug!(bytes = wav.len(), "sending audio for transcription");

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| AssistantError::Recognition(format!("invalid mime: {e}")))?;

        let form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .part("file", file_part);

        let url = format!(
            "{}/v1/audio/transcriptions",
            self.config.api_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AssistantError::Recognition(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AssistantError::Recognition(format!(
                "service returned {status}: {detail}"
            )));
        }

        #[derive(serde::Deserialize)]
        struct Transcription {
            text: String,
        }

        let body: Transcription = response
            .json()
            .await
            .map_err(|e| AssistantError::Recognition(format!("unparseable response: {e}")))?;

        let text = body.text.trim().to_owned();
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

/// Encode f32 mono samples as 16-bit PCM WAV bytes.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let num_samples = samples.len() as u32;
    let bytes_per_sample: u16 = 2;
    let num_channels: u16 = 1;
    let data_size = num_samples * u32::from(bytes_per_sample);
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&num_channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * u32::from(num_channels) * u32::from(bytes_per_sample);
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    let block_align = num_channels * bytes_per_sample;
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&(bytes_per_sample * 8).to_le_bytes());

    // data sub-chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let pcm = (clamped * 32767.0) as i16;
        buf.extend_from_slice(&pcm.to_le_bytes());
    }

    buf
}
