use std::time::{Duration, Instant};

use flowsmith_core::event::GatewayEvent;
use flowsmith_core::types::{ExecutionResult, NodeId};
use tracing::debug;

use crate::state::{ExecutionEvent, ExecutionSnapshot, ExecutionState};
use crate::transcript::{CompletionEntry, Transcript};

/// Reduces a gateway event stream into execution state plus transcript.
#[derive(Debug, Clone)]
pub struct ExecutionMachine {
    state: ExecutionState,
    transcript: Transcript,
}

impl ExecutionMachine {
    pub fn new(order: Vec<NodeId>, dedupe_window: Duration) -> Self {
        Self {
            state: ExecutionState::new(order),
            transcript: Transcript::new(dedupe_window),
        }
    }

    /// Apply a gateway event received at `at`.
    ///
    /// Returns `false` when the event was dropped because the execution is
    /// already terminal or the reducer ignored it.
    pub fn apply(&mut self, event: GatewayEvent, at: Instant) -> bool {
        if self.state.is_terminal() {
            debug!(kind = event.kind(), "Dropping event after terminal phase");
            return false;
        }
        debug!(kind = event.kind(), "Applying gateway event");

        match event {
            GatewayEvent::Token { content } => {
                self.transcript.push_token(&content);
                true
            }
            GatewayEvent::Thinking { content } => {
                self.transcript.push_thinking(&content);
                true
            }
            GatewayEvent::ToolCall { name, args } => {
                self.transcript.record_tool_call(name, args);
                true
            }
            GatewayEvent::ToolResult { name, result } => {
                self.transcript.record_tool_result(&name, result);
                true
            }
            GatewayEvent::Phase { phase } => self.state.reduce(ExecutionEvent::EnterPhase(phase)),
            GatewayEvent::NodeStart { node_id } => {
                self.state.reduce(ExecutionEvent::NodeExecuting(node_id))
            }
            GatewayEvent::NodeComplete { node_id, data } => {
                if let Some(text) = completion_text(&data) {
                    self.transcript.record_completion(CompletionEntry::new(text, at));
                }
                self.state
                    .reduce(ExecutionEvent::NodeCompleted { node_id, data })
            }
            GatewayEvent::Done {
                final_output,
                conversation_id,
                title,
                links,
            } => {
                let mut result = ExecutionResult::from_final_output(&final_output);
                if result == ExecutionResult::default() && !self.transcript.text().is_empty() {
                    result = ExecutionResult::markdown(self.transcript.text());
                }
                if let Some(text) = result.markdown_text() {
                    self.transcript.record_completion(CompletionEntry {
                        text: text.to_string(),
                        conversation_id,
                        title,
                        links,
                        at,
                    });
                }
                self.state.reduce(ExecutionEvent::Finished(result))
            }
            GatewayEvent::Error { message } => self.state.reduce(ExecutionEvent::Failed(message)),
        }
    }

    /// Fail the execution from outside the event stream.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        self.state.reduce(ExecutionEvent::Failed(message.into()))
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.state.snapshot()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Output text carried by a node completion payload, if any.
fn completion_text(data: &serde_json::Value) -> Option<String> {
    match data {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("markdown")
            .or_else(|| map.get("data")?.get("markdown"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}
