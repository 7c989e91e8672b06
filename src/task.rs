//! Plan and task data model.
//!
//! A [`Plan`] is what the planner produces for one command: an ordered
//! tool-call sequence, or a direct textual answer when no tools are
//! needed. A [`Task`] is the session-visible lifecycle of that command.

use crate::catalog::ToolCall;

/// Outcome of one tool invocation.
///
/// Success carries `message`, failure carries `error`; never both.
/// `payload` optionally carries structured data (e.g. the resolved URL
/// after navigation).
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the invocation succeeded.
    pub succeeded: bool,
    /// Human-readable summary, present on success.
    pub message: Option<String>,
    /// Human-readable cause, present on failure.
    pub error: Option<String>,
    /// Optional structured payload.
    pub payload: Option<serde_json::Value>,
}

impl ToolResult {
    /// Create a successful result.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: Some(message.into()),
            error: None,
            payload: None,
        }
    }

    /// Create a successful result carrying a structured payload.
    pub fn success_with_payload(message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            succeeded: true,
            message: Some(message.into()),
            error: None,
            payload: Some(payload),
        }
    }

    /// Create a failed result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: None,
            error: Some(error.into()),
            payload: None,
        }
    }
}

/// An ordered sequence of tool invocations derived from one command,
/// or a direct textual answer when no tools are needed.
///
/// Created once per command, immutable, owned by the orchestrator for
/// the lifetime of one processing cycle.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Tool invocations, in execution order.
    pub steps: Vec<ToolCall>,
    /// Free-text reply when the plan has no steps.
    pub direct_answer: Option<String>,
}

impl Plan {
    /// A plan that answers directly without touching any tool backend.
    pub fn direct(answer: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            direct_answer: Some(answer.into()),
        }
    }

    /// A plan of ordered tool invocations.
    pub fn with_steps(steps: Vec<ToolCall>) -> Self {
        Self {
            steps,
            direct_answer: None,
        }
    }

    /// Whether there is nothing to do (no steps, no answer).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.direct_answer.is_none()
    }
}

/// Lifecycle state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Accepted but not yet planned/executed.
    Pending,
    /// Currently being executed.
    InProgress,
    /// All steps completed (or direct answer delivered).
    Completed,
    /// Planning or a step failed.
    Failed,
}

impl TaskStatus {
    /// Whether the task has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Session-visible view of one command's lifecycle.
///
/// At most one task is current at a time; a new command queues behind
/// the in-flight one and is never interleaved with it.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// The original command text.
    pub description: String,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// The plan's tool sequence.
    pub steps: Vec<ToolCall>,
    /// Final textual summary once terminal.
    pub result: Option<String>,
}

impl Task {
    /// Create a pending task for a freshly accepted command.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4()),
            description: description.into(),
            status: TaskStatus::Pending,
            steps: Vec::new(),
            result: None,
        }
    }
}
