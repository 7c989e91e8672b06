//! Beckon: a hands-free voice assistant for the desktop.
//!
//! This crate provides a wake-phrase-driven automation pipeline:
//! Microphone → wake phrase → STT → planner → executor → TTS
//!
//! # Architecture
//!
//! The pipeline is built from independent stages connected by async channels:
//! - **Audio capture**: Records from the microphone via `cpal`
//! - **Listener**: Detects the wake phrase and extracts the spoken command
//! - **STT**: Transcribes speech through the Whisper API
//! - **Planner**: Turns a command into a typed tool plan via chat completions
//! - **Executor**: Runs plan steps in order against the desktop and browser
//! - **Speaker**: Queued text-to-speech feedback via the system voice

pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod listener;
pub mod orchestrator;
pub mod planner;
pub mod speaker;
pub mod stt;
pub mod task;
pub mod tts;

pub use catalog::{ToolCall, ToolDefinition, catalog_schemas};
pub use config::AssistantConfig;
pub use error::{AssistantError, Result};
pub use executor::{ExecutionOutcome, Executor};
pub use listener::Listener;
pub use orchestrator::Orchestrator;
pub use planner::Planner;
pub use speaker::Speaker;
pub use task::{Plan, Task, TaskStatus, ToolResult};
