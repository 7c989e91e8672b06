//! Sequential plan execution against the desktop and browser.
//!
//! The executor runs a plan's steps strictly in order and stops at the
//! first failure. No retries, no compensation: a half-done plan is
//! reported as-is so the user can course-correct by voice.

pub mod browser;
pub mod desktop;
pub mod messaging;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::catalog::ToolCall;
use crate::task::{Plan, ToolResult};

pub use browser::{BrowserControl, ChromiumBrowser};
pub use desktop::{DesktopControl, MacDesktop};
pub use messaging::{MacMessenger, Messenger};

/// Outcome of executing one plan.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// One result per attempted step, in execution order. Shorter than
    /// the plan when a step failed (nothing after it ran).
    pub results: Vec<ToolResult>,
    /// Index of the failing step, if any.
    pub failed_step: Option<usize>,
}

impl ExecutionOutcome {
    /// Whether every step ran and succeeded.
    pub fn succeeded(&self) -> bool {
        self.failed_step.is_none()
    }

    /// The failure message of the failing step, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failed_step
            .and_then(|i| self.results.get(i))
            .and_then(|r| r.error.as_deref())
    }
}

/// Runs plans against the tool backends.
pub struct Executor {
    desktop: Arc<dyn DesktopControl>,
    browser: Arc<dyn BrowserControl>,
    messenger: Arc<dyn Messenger>,
}

impl Executor {
    pub fn new(
        desktop: Arc<dyn DesktopControl>,
        browser: Arc<dyn BrowserControl>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            desktop,
            browser,
            messenger,
        }
    }

    /// Build the standard macOS executor.
    pub fn for_macos(browser_config: crate::config::BrowserConfig) -> Self {
        let desktop: Arc<dyn DesktopControl> = Arc::new(MacDesktop);
        let messenger: Arc<dyn Messenger> = Arc::new(MacMessenger::new(Arc::clone(&desktop)));
        let browser: Arc<dyn BrowserControl> = Arc::new(ChromiumBrowser::new(browser_config));
        Self::new(desktop, browser, messenger)
    }

    /// Execute a plan's steps in order, stopping at the first failure.
    pub async fn execute(&self, plan: &Plan) -> ExecutionOutcome {
        let mut results = Vec::with_capacity(plan.steps.len());
        for (index, step) in plan.steps.iter().enumerate() {
            info!(step = index + 1, total = plan.steps.len(), tool = step.name(), "executing step");
            let result = self.execute_step(step).await;
            let failed = !result.succeeded;
            if failed {
                warn!(
                    step = index + 1,
                    tool = step.name(),
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "step failed, aborting plan"
                );
            }
            results.push(result);
            if failed {
                return ExecutionOutcome {
                    results,
                    failed_step: Some(index),
                };
            }
        }
        ExecutionOutcome {
            results,
            failed_step: None,
        }
    }

    /// Run one step. Backend errors become failed results rather than
    /// propagating, so the caller always gets a per-step record.
    async fn execute_step(&self, step: &ToolCall) -> ToolResult {
        let outcome = match step {
            ToolCall::BrowserNavigate { url } => self
                .browser
                .navigate(url)
                .await
                .map(|resolved| {
                    ToolResult::success_with_payload(
                        format!("Opened {resolved}"),
                        serde_json::json!({ "url": resolved }),
                    )
                }),
            ToolCall::BrowserClick { selector } => self
                .browser
                .click(selector)
                .await
                .map(|()| ToolResult::success(format!("Clicked {selector}"))),
            ToolCall::BrowserType { selector, text } => self
                .browser
                .type_into(selector, text)
                .await
                .map(|()| ToolResult::success(format!("Typed into {selector}"))),
            ToolCall::OpenApp { app_name } => self
                .desktop
                .open_app(app_name)
                .await
                .map(|()| ToolResult::success(format!("Opened {app_name}"))),
            ToolCall::CloseApp { app_name } => self
                .desktop
                .close_app(app_name)
                .await
                .map(|()| ToolResult::success(format!("Closed {app_name}"))),
            ToolCall::TypeText { text } => self
                .desktop
                .type_text(text)
                .await
                .map(|()| ToolResult::success(format!("Typed {} characters", text.chars().count()))),
            ToolCall::PressKey { key } => self
                .desktop
                .press_key(key)
                .await
                .map(|()| ToolResult::success(format!("Pressed {key}"))),
            ToolCall::SendMessage {
                app,
                recipient,
                message,
            } => self
                .messenger
                .send_message(app, recipient, message)
                .await
                .map(|()| ToolResult::success(format!("Sent message to {recipient} via {app}"))),
            ToolCall::Wait { seconds } => {
                let clamped = seconds.clamp(0.0, 60.0);
                tokio::time::sleep(Duration::from_secs_f64(clamped)).await;
                Ok(ToolResult::success(format!("Waited {clamped} seconds")))
            }
        };
        outcome.unwrap_or_else(|e| ToolResult::failure(e.to_string()))
    }

    /// Release held resources (currently just the browser).
    pub async fn shutdown(&self) {
        self.browser.close().await;
    }
}
