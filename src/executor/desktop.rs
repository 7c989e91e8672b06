//! Desktop application and input control.
//!
//! Application lifecycle goes through AppleScript (`osascript`);
//! keyboard injection goes through `enigo` so typed text lands in
//! whichever window holds focus.

use async_trait::async_trait;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{AssistantError, Result};

/// Operating-system level actions the executor depends on.
#[async_trait]
pub trait DesktopControl: Send + Sync {
    /// Bring an application to the foreground, launching it if needed.
    async fn open_app(&self, app_name: &str) -> Result<()>;

    /// Quit an application.
    async fn close_app(&self, app_name: &str) -> Result<()>;

    /// Type text into the focused window.
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press a key or modifier combination (e.g. `enter`, `cmd+a`).
    async fn press_key(&self, key: &str) -> Result<()>;
}

/// macOS desktop backend.
pub struct MacDesktop;

impl MacDesktop {
    async fn run_applescript(&self, script: &str) -> Result<()> {
        debug!(%script, "running applescript");
        let output = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output()
            .await
            .map_err(|e| AssistantError::ToolExecution(format!("osascript spawn failed: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AssistantError::ToolExecution(format!(
                "osascript failed: {}",
                stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl DesktopControl for MacDesktop {
    async fn open_app(&self, app_name: &str) -> Result<()> {
        info!(app = %app_name, "opening application");
        let escaped = escape_applescript(app_name);
        self.run_applescript(&format!("tell application \"{escaped}\" to activate"))
            .await
    }

    async fn close_app(&self, app_name: &str) -> Result<()> {
        info!(app = %app_name, "closing application");
        let escaped = escape_applescript(app_name);
        self.run_applescript(&format!("tell application \"{escaped}\" to quit"))
            .await
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        debug!(len = text.len(), "typing text");
        let text = text.to_owned();
        // Enigo holds platform handles that are not Send.
        tokio::task::spawn_blocking(move || {
            let mut enigo = Enigo::new(&Settings::default())
                .map_err(|e| AssistantError::ToolExecution(format!("input init failed: {e}")))?;
            enigo
                .text(&text)
                .map_err(|e| AssistantError::ToolExecution(format!("typing failed: {e}")))
        })
        .await
        .map_err(|e| AssistantError::ToolExecution(format!("input task failed: {e}")))?
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        debug!(%key, "pressing key");
        let combo = parse_key_combo(key)?;
        tokio::task::spawn_blocking(move || {
            let mut enigo = Enigo::new(&Settings::default())
                .map_err(|e| AssistantError::ToolExecution(format!("input init failed: {e}")))?;
            let press = |enigo: &mut Enigo, key: Key, dir: Direction| {
                enigo
                    .key(key, dir)
                    .map_err(|e| AssistantError::ToolExecution(format!("key press failed: {e}")))
            };
            for modifier in &combo.modifiers {
                press(&mut enigo, *modifier, Direction::Press)?;
            }
            press(&mut enigo, combo.key, Direction::Click)?;
            for modifier in combo.modifiers.iter().rev() {
                press(&mut enigo, *modifier, Direction::Release)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| AssistantError::ToolExecution(format!("input task failed: {e}")))?
    }
}

struct KeyCombo {
    modifiers: Vec<Key>,
    key: Key,
}

/// Parse a spoken key name like `enter` or `cmd+shift+t` into modifier
/// presses plus a final key.
fn parse_key_combo(spec: &str) -> Result<KeyCombo> {
    let parts: Vec<&str> = spec.split('+').map(str::trim).collect();
    let (last, modifiers) = parts
        .split_last()
        .ok_or_else(|| AssistantError::ToolExecution(format!("empty key spec: {spec:?}")))?;

    let mut mods = Vec::with_capacity(modifiers.len());
    for m in modifiers {
        mods.push(match m.to_lowercase().as_str() {
            "cmd" | "command" | "meta" => Key::Meta,
            "ctrl" | "control" => Key::Control,
            "alt" | "option" => Key::Alt,
            "shift" => Key::Shift,
            other => {
                return Err(AssistantError::ToolExecution(format!(
                    "unknown modifier: {other:?}"
                )));
            }
        });
    }

    let key = match last.to_lowercase().as_str() {
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "escape" | "esc" => Key::Escape,
        "backspace" | "delete" => Key::Backspace,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        single => {
            let mut chars = single.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(AssistantError::ToolExecution(format!(
                        "unknown key: {last:?}"
                    )));
                }
            }
        }
    };

    Ok(KeyCombo {
        modifiers: mods,
        key,
    })
}

/// Escape a string for interpolation into a double-quoted AppleScript
/// literal.
pub(crate) fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
