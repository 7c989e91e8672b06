//! Session orchestration.
//!
//! Single consumer of the listener's command queue. Each command runs
//! end to end (acknowledge, plan, execute, report) before the next one
//! is dequeued, so tasks never interleave.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::AssistantError;
use crate::executor::Executor;
use crate::listener::Listener;
use crate::planner::Planner;
use crate::speaker::Speaker;
use crate::task::{Task, TaskStatus};

/// Drives the plan-execute-report cycle for spoken commands.
pub struct Orchestrator {
    planner: Planner,
    executor: Executor,
    speaker: Speaker,
}

impl Orchestrator {
    pub fn new(planner: Planner, executor: Executor, speaker: Speaker) -> Self {
        Self {
            planner,
            executor,
            speaker,
        }
    }

    /// Process commands until cancelled or the listener goes away.
    ///
    /// Commands that arrive while one is in flight wait in the queue;
    /// they are processed one at a time, in arrival order.
    pub async fn run(&mut self, listener: &mut Listener, cancel: CancellationToken) {
        self.speaker.speak_async("Ready when you are");
        loop {
            let command = tokio::select! {
                () = cancel.cancelled() => break,
                command = listener.recv_command() => match command {
                    Some(c) => c,
                    None => break,
                },
            };
            let task = self.handle_command(&command).await;
            info!(task_id = %task.id, status = ?task.status, "task finished");
        }
        info!("orchestrator loop exited");
    }

    /// Run one command through planning and execution, speaking
    /// progress and the final outcome. Always returns a terminal task.
    pub async fn handle_command(&mut self, command: &str) -> Task {
        let mut task = Task::new(command);
        info!(task_id = %task.id, %command, "handling command");
        self.speaker.speak_async("Working on it");

        let plan = match self.planner.plan(command).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(task_id = %task.id, "planning failed: {e}");
                match &e {
                    AssistantError::UnknownTool(name) => {
                        self.speaker
                            .speak_error(Some(&format!("I don't have a tool called {name}")));
                    }
                    _ => self.speaker.speak_error(Some("I couldn't plan that")),
                }
                task.status = TaskStatus::Failed;
                task.result = Some(e.to_string());
                return task;
            }
        };

        if let Some(answer) = &plan.direct_answer {
            self.speaker.speak_async(answer.clone());
            task.status = TaskStatus::Completed;
            task.result = Some(answer.clone());
            return task;
        }
        if plan.is_empty() {
            self.speaker
                .speak_async("I'm not sure how to help with that");
            task.status = TaskStatus::Completed;
            return task;
        }

        task.steps = plan.steps.clone();
        task.status = TaskStatus::InProgress;
        let outcome = self.executor.execute(&plan).await;
        if outcome.succeeded() {
            task.status = TaskStatus::Completed;
            task.result = outcome
                .results
                .last()
                .and_then(|r| r.message.clone());
            self.speaker.speak_task_complete(Some(&task.description));
        } else {
            task.status = TaskStatus::Failed;
            let failure = outcome.failure().unwrap_or("a step failed").to_owned();
            // The spoken report says where execution stopped; the task
            // records the step's own error.
            let step = outcome.failed_step.map_or(0, |i| i + 1);
            self.speaker.speak_error(Some(&format!(
                "stopped at step {step} of {}: {failure}",
                plan.steps.len()
            )));
            task.result = Some(failure);
        }
        task
    }

    /// Shut down in dependency order: stop speech first so nothing
    /// keeps talking, then release the executor's browser, then say
    /// goodbye. The farewell render blocks, so it runs on the blocking
    /// pool rather than parking a runtime worker.
    pub async fn shutdown(&self) {
        self.speaker.stop();
        self.executor.shutdown().await;
        let speaker = self.speaker.clone();
        match tokio::task::spawn_blocking(move || speaker.speak_blocking("Goodbye")).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("farewell failed: {e}"),
            Err(e) => error!("farewell task failed: {e}"),
        }
    }
}
