//! End-to-end flow tests over the orchestrator with fake tool backends
//! and a mock planning service. No audio hardware, no real browser.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beckon::config::PlannerConfig;
use beckon::error::{AssistantError, Result};
use beckon::executor::{BrowserControl, DesktopControl, Executor, Messenger};
use beckon::orchestrator::Orchestrator;
use beckon::planner::Planner;
use beckon::speaker::Speaker;
use beckon::task::TaskStatus;
use beckon::tts::SpeechSynth;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records every rendered utterance.
struct RecordingSynth {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSynth {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
        })
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Poll until an utterance containing `needle` has been rendered.
    async fn wait_for(&self, needle: &str) {
        for _ in 0..100 {
            if self.spoken().iter().any(|s| s.contains(needle)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("never spoke {needle:?}; spoke {:?}", self.spoken());
    }
}

impl SpeechSynth for RecordingSynth {
    fn render(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn halt(&self) {}
}

/// Records tool invocations; fails any whose log entry contains `fail_on`.
struct FakeTools {
    log: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl FakeTools {
    fn new(fail_on: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
            fail_on: fail_on.map(str::to_owned),
        })
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) -> Result<()> {
        self.log.lock().unwrap().push(entry.clone());
        if let Some(needle) = &self.fail_on {
            if entry.contains(needle.as_str()) {
                return Err(AssistantError::ToolExecution(format!(
                    "backend refused {entry}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DesktopControl for FakeTools {
    async fn open_app(&self, app_name: &str) -> Result<()> {
        self.record(format!("open:{app_name}"))
    }
    async fn close_app(&self, app_name: &str) -> Result<()> {
        self.record(format!("close:{app_name}"))
    }
    async fn type_text(&self, text: &str) -> Result<()> {
        self.record(format!("type:{text}"))
    }
    async fn press_key(&self, key: &str) -> Result<()> {
        self.record(format!("press:{key}"))
    }
}

#[async_trait]
impl BrowserControl for FakeTools {
    async fn navigate(&self, url: &str) -> Result<String> {
        self.record(format!("navigate:{url}"))?;
        Ok(url.to_owned())
    }
    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click:{selector}"))
    }
    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        self.record(format!("type_into:{selector}:{text}"))
    }
    async fn close(&self) {
        let _ = self.record("browser_close".to_owned());
    }
}

#[async_trait]
impl Messenger for FakeTools {
    async fn send_message(&self, app: &str, recipient: &str, message: &str) -> Result<()> {
        self.record(format!("send:{app}:{recipient}:{message}"))
    }
}

fn tool_call_response(calls: &[(&str, serde_json::Value)]) -> serde_json::Value {
    let tool_calls: Vec<_> = calls
        .iter()
        .enumerate()
        .map(|(i, (name, args))| {
            json!({
                "id": format!("call_{i}"),
                "type": "function",
                "function": { "name": name, "arguments": args.to_string() }
            })
        })
        .collect();
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": null, "tool_calls": tool_calls }
        }]
    })
}

async fn mock_planner(server: &MockServer) -> Planner {
    let config = PlannerConfig {
        api_url: server.uri(),
        ..PlannerConfig::default()
    };
    Planner::new(config, "test-key")
}

fn harness(
    server_planner: Planner,
    tools: &Arc<FakeTools>,
    synth: &Arc<RecordingSynth>,
) -> Orchestrator {
    let executor = Executor::new(tools.clone(), tools.clone(), tools.clone());
    let speaker = Speaker::new(synth.clone());
    Orchestrator::new(server_planner, executor, speaker)
}

#[tokio::test(flavor = "multi_thread")]
async fn planned_steps_run_in_order_and_completion_is_spoken() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response(&[
            ("open_app", json!({"app_name": "Chrome"})),
            ("browser_navigate", json!({"url": "https://example.com"})),
        ])))
        .mount(&server)
        .await;

    let tools = FakeTools::new(None);
    let synth = RecordingSynth::new();
    let mut orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    let task = orchestrator.handle_command("open chrome and go to example").await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.steps.len(), 2);
    assert_eq!(
        tools.log(),
        vec!["open:Chrome", "navigate:https://example.com"]
    );
    synth.wait_for("Working on it").await;
    // The completion announcement echoes what was asked for.
    synth.wait_for("Done. open chrome and go to example").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_step_stops_the_plan_and_reports_the_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response(&[
            ("open_app", json!({"app_name": "Chrome"})),
            ("browser_click", json!({"selector": "#missing"})),
            ("type_text", json!({"text": "never typed"})),
        ])))
        .mount(&server)
        .await;

    let tools = FakeTools::new(Some("click:#missing"));
    let synth = RecordingSynth::new();
    let mut orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    let task = orchestrator.handle_command("click the thing").await;

    assert_eq!(task.status, TaskStatus::Failed);
    // Nothing after the failing step ran.
    assert_eq!(tools.log(), vec!["open:Chrome", "click:#missing"]);
    // The task records the step's own error; the spoken report adds
    // where execution stopped.
    assert!(task.result.unwrap().contains("backend refused"));
    synth.wait_for("Error: stopped at step 2 of 3").await;
    synth.wait_for("backend refused").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn direct_answer_skips_the_executor_entirely() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "You're welcome!"}}]
        })))
        .mount(&server)
        .await;

    let tools = FakeTools::new(None);
    let synth = RecordingSynth::new();
    let mut orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    let task = orchestrator.handle_command("thanks").await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.steps.is_empty());
    assert!(tools.log().is_empty());
    synth.wait_for("You're welcome!").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn planning_failure_yields_a_failed_task_and_spoken_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let tools = FakeTools::new(None);
    let synth = RecordingSynth::new();
    let mut orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    let task = orchestrator.handle_command("do something").await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(tools.log().is_empty());
    synth.wait_for("couldn't plan").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_tool_is_caught_before_any_step_runs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response(&[
            ("open_app", json!({"app_name": "Chrome"})),
            ("format_disk", json!({})),
        ])))
        .mount(&server)
        .await;

    let tools = FakeTools::new(None);
    let synth = RecordingSynth::new();
    let mut orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    let task = orchestrator.handle_command("open chrome then format").await;

    assert_eq!(task.status, TaskStatus::Failed);
    // The whole plan is rejected; even the valid first step never ran.
    assert!(tools.log().is_empty());
    synth.wait_for("format_disk").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_are_processed_sequentially() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response(&[(
            "open_app",
            json!({"app_name": "Notes"}),
        )])))
        .mount(&server)
        .await;

    let tools = FakeTools::new(None);
    let synth = RecordingSynth::new();
    let mut orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    let first = orchestrator.handle_command("open notes").await;
    let second = orchestrator.handle_command("open notes again").await;

    assert_eq!(first.status, TaskStatus::Completed);
    assert_eq!(second.status, TaskStatus::Completed);
    assert_ne!(first.id, second.id);
    assert_eq!(tools.log(), vec!["open:Notes", "open:Notes"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_releases_the_browser() {
    let server = MockServer::start().await;
    let tools = FakeTools::new(None);
    let synth = RecordingSynth::new();
    let orchestrator = harness(mock_planner(&server).await, &tools, &synth);

    orchestrator.shutdown().await;

    assert!(tools.log().contains(&"browser_close".to_owned()));
    // The farewell is spoken synchronously, after everything stopped.
    assert_eq!(synth.spoken().last().map(String::as_str), Some("Goodbye"));
}
