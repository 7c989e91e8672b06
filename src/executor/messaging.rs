//! Message sending through desktop chat applications.
//!
//! iMessage has a scriptable send command, so it goes straight through
//! AppleScript. WhatsApp does not, so the desktop app is driven by
//! keystrokes: open, search for the recipient, type, send. Either path
//! reports one aggregate outcome for the whole send.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{AssistantError, Result};
use crate::executor::desktop::{DesktopControl, escape_applescript};

/// How long to let an app settle between scripted keystrokes.
const UI_SETTLE: Duration = Duration::from_millis(1500);

/// Message delivery backends keyed by app name.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `message` to `recipient` through the named app.
    async fn send_message(&self, app: &str, recipient: &str, message: &str) -> Result<()>;
}

/// macOS messenger routing between Messages.app and WhatsApp.
pub struct MacMessenger {
    desktop: Arc<dyn DesktopControl>,
}

impl MacMessenger {
    pub fn new(desktop: Arc<dyn DesktopControl>) -> Self {
        Self { desktop }
    }

    /// Send an iMessage through Messages.app scripting.
    async fn send_imessage(&self, recipient: &str, message: &str) -> Result<()> {
        info!(%recipient, "sending iMessage");
        let script = format!(
            "tell application \"Messages\"\n\
             set targetService to 1st account whose service type = iMessage\n\
             set targetBuddy to participant \"{}\" of targetService\n\
             send \"{}\" to targetBuddy\n\
             end tell",
            escape_applescript(recipient),
            escape_applescript(message),
        );
        let output = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .await
            .map_err(|e| AssistantError::ToolExecution(format!("osascript spawn failed: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AssistantError::ToolExecution(format!(
                "iMessage send failed: {}",
                stderr.trim()
            )))
        }
    }

    /// Drive the WhatsApp desktop app by keystrokes. Timing-sensitive:
    /// each step waits for the UI to settle before the next keypress.
    async fn send_whatsapp(&self, recipient: &str, message: &str) -> Result<()> {
        info!(%recipient, "sending WhatsApp message");
        self.desktop.open_app("WhatsApp").await?;
        tokio::time::sleep(UI_SETTLE * 2).await;

        // Jump to the chat search field and pick the top match.
        self.desktop.press_key("cmd+f").await?;
        tokio::time::sleep(UI_SETTLE).await;
        self.desktop.type_text(recipient).await?;
        tokio::time::sleep(UI_SETTLE).await;
        self.desktop.press_key("enter").await?;
        tokio::time::sleep(UI_SETTLE).await;

        self.desktop.type_text(message).await?;
        self.desktop.press_key("enter").await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for MacMessenger {
    async fn send_message(&self, app: &str, recipient: &str, message: &str) -> Result<()> {
        match app.to_lowercase().as_str() {
            "imessage" | "messages" => self.send_imessage(recipient, message).await,
            "whatsapp" => self.send_whatsapp(recipient, message).await,
            other => {
                warn!(app = %other, "unsupported messaging app");
                Err(AssistantError::ToolExecution(format!(
                    "unsupported messaging app: {other:?}"
                )))
            }
        }
    }
}
