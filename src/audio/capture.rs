//! Microphone audio capture using cpal.
//!
//! Captures at the device's native sample rate, downsamples to the
//! configured pipeline rate, and segments one utterance per call using
//! RMS-energy endpointing: capture starts when energy crosses the
//! threshold and ends after a run of trailing silence (or the phrase
//! limit).

use std::sync::mpsc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, info};

use super::{AudioClip, Microphone};
use crate::config::AudioConfig;
use crate::error::{AssistantError, Result};

/// Utterance capture from the system microphone via cpal.
///
/// Each call opens a fresh input stream on a blocking thread, so the
/// async caller (the listener task) is never pinned to the audio thread.
pub struct CpalMicrophone {
    config: AudioConfig,
}

impl CpalMicrophone {
    /// Create a capture instance; the device itself is opened per call.
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn capture_utterance(&self, timeout: Duration) -> Result<Option<AudioClip>> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || capture_blocking(&config, timeout))
            .await
            .map_err(|e| AssistantError::Audio(format!("capture task panicked: {e}")))?
    }
}

/// Opens the input stream and runs the endpointing loop on the calling
/// (blocking) thread. The cpal stream never leaves this function, so its
/// non-`Send` handle never crosses an await point.
fn capture_blocking(config: &AudioConfig, timeout: Duration) -> Result<Option<AudioClip>> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = config.input_device {
        host.input_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| AssistantError::Audio(format!("input device '{name}' not found")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AssistantError::Audio("no default input device".into()))?
    };

    // Use the device's default config for best compatibility.
    let default_config = device
        .default_input_config()
        .map_err(|e| AssistantError::Audio(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let target_rate = config.sample_rate;

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let (tx, rx) = mpsc::channel::<Vec<f32>>();
    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if native_channels > 1 {
                    to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                let samples = if native_rate != target_rate {
                    downsample(&mono, native_rate, target_rate)
                } else {
                    mono
                };
                // Never block the audio thread; a dropped chunk only
                // shortens the utterance slightly.
                let _ = tx.send(samples);
            },
            move |err| {
                tracing::error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| AssistantError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AssistantError::Audio(format!("failed to start input stream: {e}")))?;
    debug!("utterance capture started: native {native_rate}Hz -> target {target_rate}Hz");

    let clip = endpoint_utterance(
        &rx,
        &Endpointing {
            sample_rate: target_rate,
            energy_threshold: config.energy_threshold,
            end_silence: Duration::from_millis(u64::from(config.end_silence_ms)),
            start_timeout: timeout,
            phrase_limit: Duration::from_secs(u64::from(config.phrase_limit_s)),
        },
    );

    drop(stream);
    if let Some(ref c) = clip {
        info!("captured {:.1}s utterance", c.duration_s());
    }
    Ok(clip)
}

struct Endpointing {
    sample_rate: u32,
    energy_threshold: f32,
    end_silence: Duration,
    start_timeout: Duration,
    phrase_limit: Duration,
}

/// Drain chunks from the capture channel, waiting for speech to start and
/// accumulating until trailing silence or the phrase limit.
fn endpoint_utterance(rx: &mpsc::Receiver<Vec<f32>>, params: &Endpointing) -> Option<AudioClip> {
    let started = Instant::now();
    let mut speech: Vec<f32> = Vec::new();
    let mut in_speech = false;
    let mut silent_samples: usize = 0;
    let end_silence_samples =
        (params.end_silence.as_secs_f64() * f64::from(params.sample_rate)) as usize;
    let phrase_limit_samples =
        (params.phrase_limit.as_secs_f64() * f64::from(params.sample_rate)) as usize;

    loop {
        let chunk = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(c) => c,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !in_speech && started.elapsed() >= params.start_timeout {
                    return None;
                }
                continue;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let is_speech = rms_energy(&chunk) > params.energy_threshold;

        if is_speech {
            in_speech = true;
            silent_samples = 0;
            speech.extend_from_slice(&chunk);
        } else if in_speech {
            // Keep the trailing silence inside the clip; STT handles it.
            silent_samples += chunk.len();
            speech.extend_from_slice(&chunk);
            if silent_samples >= end_silence_samples {
                break;
            }
        } else if started.elapsed() >= params.start_timeout {
            return None;
        }

        if speech.len() >= phrase_limit_samples {
            break;
        }
    }

    if speech.is_empty() {
        return None;
    }

    Some(AudioClip {
        samples: speech,
        sample_rate: params.sample_rate,
    })
}

/// Compute RMS energy of audio samples.
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Simple linear-interpolation downsampler.
///
/// Converts audio from `src_rate` to `dst_rate`. For speech (48kHz →
/// 16kHz) this is sufficient quality; human speech energy is below 8kHz,
/// so no anti-alias filter is needed.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            f64::from(samples[idx]) * (1.0 - frac) + f64::from(samples[idx + 1]) * frac
        } else {
            f64::from(samples[idx.min(samples.len() - 1)])
        };

        output.push(sample as f32);
    }

    output
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn params(sample_rate: u32) -> Endpointing {
        Endpointing {
            sample_rate,
            energy_threshold: 0.01,
            end_silence: Duration::from_millis(100),
            start_timeout: Duration::from_millis(200),
            phrase_limit: Duration::from_secs(10),
        }
    }

    #[test]
    fn silence_only_times_out_to_none() {
        let (tx, rx) = mpsc::channel();
        // A few silent chunks, then the sender hangs up.
        for _ in 0..3 {
            tx.send(vec![0.0f32; 160]).unwrap();
        }
        drop(tx);
        let clip = endpoint_utterance(&rx, &params(16_000));
        assert!(clip.is_none());
    }

    #[test]
    fn speech_then_silence_yields_clip() {
        let (tx, rx) = mpsc::channel();
        // 0.1s of loud speech then 0.2s of silence at 16kHz.
        for _ in 0..10 {
            tx.send(vec![0.5f32; 160]).unwrap();
        }
        for _ in 0..20 {
            tx.send(vec![0.0f32; 160]).unwrap();
        }
        drop(tx);
        let clip = endpoint_utterance(&rx, &params(16_000)).expect("clip expected");
        assert!(clip.samples.len() >= 1600);
        assert_eq!(clip.sample_rate, 16_000);
    }

    #[test]
    fn phrase_limit_caps_clip_length() {
        let (tx, rx) = mpsc::channel();
        let mut p = params(16_000);
        p.phrase_limit = Duration::from_millis(100);
        // Continuous speech well beyond the limit.
        for _ in 0..100 {
            tx.send(vec![0.5f32; 160]).unwrap();
        }
        drop(tx);
        let clip = endpoint_utterance(&rx, &p).expect("clip expected");
        assert!(clip.samples.len() <= 1600 + 160);
    }

    #[test]
    fn to_mono_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn downsample_halves_length() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32).sin()).collect();
        let out = downsample(&samples, 32_000, 16_000);
        assert!((out.len() as i64 - 500).abs() <= 1);
    }

    #[test]
    fn rms_energy_of_silence_is_zero() {
        assert_eq!(rms_energy(&[0.0; 64]), 0.0);
        assert_eq!(rms_energy(&[]), 0.0);
    }
}
