//! Planning-service adapter.
//!
//! Converts a recognized command plus conversation context into a [`Plan`]
//! by issuing one chat-completions request with the tool catalog attached.
//! The response either names tool calls (parsed into typed [`ToolCall`]s,
//! order preserved) or carries a free-text reply (a direct answer).
//!
//! The planner owns the conversation history for the session. History is
//! bounded: turns beyond `max_history_turns` are evicted oldest-first, so
//! memory use stays flat over a long session.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{ToolCall, catalog_schemas};
use crate::config::PlannerConfig;
use crate::error::{AssistantError, Result};
use crate::task::Plan;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a voice-controlled desktop assistant that executes tasks.

Your capabilities:
- Open and control desktop applications
- Navigate websites and interact with them
- Type text and send messages
- Execute multi-step workflows

When given a command, break it down into specific tool calls.
Think step-by-step and use the available tools to accomplish the task.
Be proactive and handle common scenarios intelligently.

Examples:
- \"Open Chrome and go to TikTok\" -> open_app(Chrome) + browser_navigate(tiktok.com)
- \"Send 'hey' to John on WhatsApp\" -> open_app(WhatsApp) + send_message(...)
- \"Type my email address\" -> type_text(user@email.com)";

/// One conversation turn sent to the planning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

// Response shapes for the chat-completions endpoint (non-streaming).

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    function: RawFunction,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    /// JSON-encoded argument object, as the API delivers it.
    arguments: String,
}

/// Adapter over the external planning service.
pub struct Planner {
    client: reqwest::Client,
    config: PlannerConfig,
    api_key: String,
    history: Vec<ChatMessage>,
}

impl Planner {
    /// Create a planner for the given service config and API key.
    pub fn new(config: PlannerConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
            history: Vec::new(),
        }
    }

    /// Decompose one command into a [`Plan`], in the context of the
    /// session's conversation history.
    ///
    /// Side effect: the command and the plan's textual trace are appended
    /// to the (bounded) history for subsequent calls.
    ///
    /// # Errors
    ///
    /// [`AssistantError::Planning`] on transport, auth, or parse failures;
    /// [`AssistantError::UnknownTool`] when the service names a tool
    /// outside the catalog. Neither is fatal to the process.
    pub async fn plan(&mut self, command: &str) -> Result<Plan> {
        info!("planning command: {command}");
        self.history.push(ChatMessage::user(command));
        self.trim_history();

        let response = self.request_completion().await?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AssistantError::Planning("response had no choices".into()))?;

        if message.tool_calls.is_empty() {
            let answer = message.content.unwrap_or_default();
            self.history.push(ChatMessage::assistant(answer.clone()));
            debug!("no tools needed for this command");
            let trimmed = answer.trim();
            return Ok(if trimmed.is_empty() {
                Plan::default()
            } else {
                Plan::direct(trimmed)
            });
        }

        let mut steps = Vec::with_capacity(message.tool_calls.len());
        for raw in message.tool_calls {
            let args: serde_json::Value = serde_json::from_str(&raw.function.arguments)
                .map_err(|e| {
                    AssistantError::Planning(format!(
                        "unparseable arguments for {}: {e}",
                        raw.function.name
                    ))
                })?;
            steps.push(ToolCall::parse(&raw.function.name, args)?);
        }

        let trace = steps
            .iter()
            .map(ToolCall::describe)
            .collect::<Vec<_>>()
            .join("; ");
        self.history
            .push(ChatMessage::assistant(format!("Planned steps: {trace}")));

        info!("created plan with {} steps", steps.len());
        Ok(Plan::with_steps(steps))
    }

    /// Number of turns currently retained.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    async fn request_completion(&self) -> Result<ChatResponse> {
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": system_prompt,
        })];
        messages.extend(
            self.history
                .iter()
                .map(|m| serde_json::json!({"role": m.role, "content": m.content})),
        );

        let tools: Vec<serde_json::Value> = catalog_schemas()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "tools": tools,
            "tool_choice": "auto",
        });

        let url = format!(
            "{}/v1/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Planning(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AssistantError::Planning(format!(
                "service returned {status}: {detail}"
            )));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| AssistantError::Planning(format!("unparseable response: {e}")))
    }

    /// Evict the oldest turns beyond the configured cap. The system
    /// instruction is not stored in history, so everything here is
    /// evictable.
    fn trim_history(&mut self) {
        let max_messages = self.config.max_history_turns.saturating_mul(2);
        if max_messages == 0 {
            self.history.clear();
            return;
        }
        if self.history.len() > max_messages {
            let drain_end = self.history.len() - max_messages;
            self.history.drain(..drain_end);
        }
    }
}
