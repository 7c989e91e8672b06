//! Error types for the assistant pipeline.

/// Top-level error type for the voice assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text backend failure (transport or service).
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Planning service failure (transport, auth, or response parse).
    #[error("planning error: {0}")]
    Planning(String),

    /// The planning service named a tool outside the catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A tool handler's backend call failed.
    #[error("tool execution error: {0}")]
    ToolExecution(String),

    /// Text-to-speech rendering failure.
    #[error("speech render error: {0}")]
    SpeechRender(String),

    /// Browser session error.
    #[error("browser error: {0}")]
    Browser(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
