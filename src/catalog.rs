//! The tool catalog: the closed set of automation actions advertised to the
//! planning service.
//!
//! Every action the assistant can perform is one [`ToolCall`] variant.
//! The planning service sees the catalog as JSON Schema function
//! definitions via [`catalog_schemas`]; its responses are parsed back into
//! typed variants with [`ToolCall::parse`], so a tool name outside the
//! catalog is rejected exactly once, at plan time.

use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// A tool definition shown to the planning service for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (e.g. `"open_app"`).
    pub name: String,
    /// Human-readable description of the tool's purpose.
    pub description: String,
    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// One typed tool invocation from a plan.
///
/// Immutable once constructed; created by the planner, consumed exactly
/// once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolCall {
    /// Navigate the browser session to a URL.
    BrowserNavigate {
        /// The URL to navigate to (scheme added if missing).
        url: String,
    },
    /// Click an element on the current page.
    BrowserClick {
        /// CSS selector of the element.
        selector: String,
    },
    /// Type text into a page input field.
    BrowserType {
        /// CSS selector of the input field.
        selector: String,
        /// Text to type.
        text: String,
    },
    /// Open (or activate) a desktop application by name.
    OpenApp {
        /// Application name, e.g. "Chrome".
        app_name: String,
    },
    /// Quit a desktop application by name.
    CloseApp {
        /// Application name.
        app_name: String,
    },
    /// Type text into the currently focused application.
    TypeText {
        /// Text to type.
        text: String,
    },
    /// Press a single keyboard key in the focused application.
    PressKey {
        /// Key name, e.g. "return", "tab", "escape".
        key: String,
    },
    /// Send a message via a named messaging app.
    SendMessage {
        /// Messaging app ("iMessage", "WhatsApp").
        app: String,
        /// Recipient name or number.
        recipient: String,
        /// Message body.
        message: String,
    },
    /// Pause between steps.
    Wait {
        /// Seconds to wait (fractional allowed).
        seconds: f64,
    },
}

#[derive(Deserialize)]
struct NavigateArgs {
    url: String,
}

#[derive(Deserialize)]
struct ClickArgs {
    selector: String,
}

#[derive(Deserialize)]
struct BrowserTypeArgs {
    selector: String,
    text: String,
}

#[derive(Deserialize)]
struct AppArgs {
    app_name: String,
}

#[derive(Deserialize)]
struct TextArgs {
    text: String,
}

#[derive(Deserialize)]
struct KeyArgs {
    key: String,
}

#[derive(Deserialize)]
struct MessageArgs {
    app: String,
    recipient: String,
    message: String,
}

#[derive(Deserialize)]
struct WaitArgs {
    seconds: f64,
}

impl ToolCall {
    /// Parse a named tool call with a JSON argument object into a typed
    /// variant.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::UnknownTool`] when the name is not in the
    /// catalog, and [`AssistantError::Planning`] when a known tool's
    /// arguments do not match its schema.
    pub fn parse(name: &str, args: serde_json::Value) -> Result<Self> {
        fn args_of<T: serde::de::DeserializeOwned>(
            name: &str,
            args: serde_json::Value,
        ) -> Result<T> {
            serde_json::from_value(args).map_err(|e| {
                AssistantError::Planning(format!("malformed arguments for {name}: {e}"))
            })
        }

        match name {
            "browser_navigate" => {
                let a: NavigateArgs = args_of(name, args)?;
                Ok(Self::BrowserNavigate { url: a.url })
            }
            "browser_click" => {
                let a: ClickArgs = args_of(name, args)?;
                Ok(Self::BrowserClick {
                    selector: a.selector,
                })
            }
            "browser_type" => {
                let a: BrowserTypeArgs = args_of(name, args)?;
                Ok(Self::BrowserType {
                    selector: a.selector,
                    text: a.text,
                })
            }
            "open_app" => {
                let a: AppArgs = args_of(name, args)?;
                Ok(Self::OpenApp {
                    app_name: a.app_name,
                })
            }
            "close_app" => {
                let a: AppArgs = args_of(name, args)?;
                Ok(Self::CloseApp {
                    app_name: a.app_name,
                })
            }
            "type_text" => {
                let a: TextArgs = args_of(name, args)?;
                Ok(Self::TypeText { text: a.text })
            }
            "press_key" => {
                let a: KeyArgs = args_of(name, args)?;
                Ok(Self::PressKey { key: a.key })
            }
            "send_message" => {
                let a: MessageArgs = args_of(name, args)?;
                Ok(Self::SendMessage {
                    app: a.app,
                    recipient: a.recipient,
                    message: a.message,
                })
            }
            "wait" => {
                let a: WaitArgs = args_of(name, args)?;
                Ok(Self::Wait { seconds: a.seconds })
            }
            other => Err(AssistantError::UnknownTool(other.to_owned())),
        }
    }

    /// The catalog name of this tool call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BrowserNavigate { .. } => "browser_navigate",
            Self::BrowserClick { .. } => "browser_click",
            Self::BrowserType { .. } => "browser_type",
            Self::OpenApp { .. } => "open_app",
            Self::CloseApp { .. } => "close_app",
            Self::TypeText { .. } => "type_text",
            Self::PressKey { .. } => "press_key",
            Self::SendMessage { .. } => "send_message",
            Self::Wait { .. } => "wait",
        }
    }

    /// A short human-readable description of this invocation, used in
    /// conversation history and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::BrowserNavigate { url } => format!("navigate to {url}"),
            Self::BrowserClick { selector } => format!("click {selector}"),
            Self::BrowserType { selector, .. } => format!("type into {selector}"),
            Self::OpenApp { app_name } => format!("open {app_name}"),
            Self::CloseApp { app_name } => format!("close {app_name}"),
            Self::TypeText { text } => format!("type {} characters", text.chars().count()),
            Self::PressKey { key } => format!("press {key}"),
            Self::SendMessage { app, recipient, .. } => {
                format!("send a {app} message to {recipient}")
            }
            Self::Wait { seconds } => format!("wait {seconds}s"),
        }
    }
}

/// Export the full catalog as function definitions for the planning
/// service.
///
/// Order is stable (alphabetical by name) so requests are reproducible.
pub fn catalog_schemas() -> Vec<ToolDefinition> {
    fn def(name: &str, description: &str, parameters: serde_json::Value) -> ToolDefinition {
        ToolDefinition {
            name: name.to_owned(),
            description: description.to_owned(),
            parameters,
        }
    }

    let mut defs = vec![
        def(
            "browser_navigate",
            "Navigate to a URL in the browser",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "The URL to navigate to"}
                },
                "required": ["url"]
            }),
        ),
        def(
            "browser_click",
            "Click an element on the current page",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "CSS selector of the element"}
                },
                "required": ["selector"]
            }),
        ),
        def(
            "browser_type",
            "Type text into an input field on the current page",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "CSS selector of the input field"},
                    "text": {"type": "string", "description": "Text to type"}
                },
                "required": ["selector", "text"]
            }),
        ),
        def(
            "open_app",
            "Open or activate a desktop application",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "app_name": {"type": "string", "description": "Name of the app (e.g. 'Chrome', 'WhatsApp')"}
                },
                "required": ["app_name"]
            }),
        ),
        def(
            "close_app",
            "Quit a desktop application",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "app_name": {"type": "string", "description": "Name of the app to quit"}
                },
                "required": ["app_name"]
            }),
        ),
        def(
            "type_text",
            "Type text in the currently focused application",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to type"}
                },
                "required": ["text"]
            }),
        ),
        def(
            "press_key",
            "Press a keyboard key in the focused application",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string", "description": "Key name, e.g. 'return', 'tab'"}
                },
                "required": ["key"]
            }),
        ),
        def(
            "send_message",
            "Send a message via a messaging app",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "app": {"type": "string", "description": "Messaging app (iMessage, WhatsApp)"},
                    "recipient": {"type": "string", "description": "Name or number of the recipient"},
                    "message": {"type": "string", "description": "Message content"}
                },
                "required": ["app", "recipient", "message"]
            }),
        ),
        def(
            "wait",
            "Pause before the next step",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "seconds": {"type": "number", "description": "Seconds to wait"}
                },
                "required": ["seconds"]
            }),
        ),
    ];
    defs.sort_by(|a, b| a.name.cmp(&b.name));
    defs
}
