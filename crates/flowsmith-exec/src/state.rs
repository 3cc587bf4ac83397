use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use flowsmith_core::types::{ExecutionResult, NodeId, Phase};
use serde::Serialize;
use tracing::{debug, warn};

/// Progress ceiling while nodes are still running.
const RUNNING_CAP: f64 = 90.0;

/// Inputs to the execution reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// The service entered a generic pipeline stage.
    EnterPhase(Phase),
    /// A node is now executing.
    NodeExecuting(NodeId),
    NodeCompleted {
        node_id: NodeId,
        data: serde_json::Value,
    },
    Finished(ExecutionResult),
    Failed(String),
}

/// Progress for `node` given the static execution order.
///
/// Returns `None` when the node is not part of the order.
pub fn progress_for(order: &[NodeId], node: &NodeId) -> Option<f64> {
    let idx = order.iter().position(|id| id == node)?;
    let total = order.len() as f64;
    Some((((idx + 1) as f64 / total) * 100.0).min(RUNNING_CAP))
}

/// State of one execution attempt.
///
/// Built fresh for every attempt and never reused. Once the phase is
/// `Complete` or `Error` every further event is ignored.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    order: Vec<NodeId>,
    phase: Phase,
    progress: f64,
    completed_nodes: BTreeSet<NodeId>,
    current_node_id: Option<NodeId>,
    result: Option<ExecutionResult>,
    error: Option<String>,
    node_outputs: HashMap<NodeId, serde_json::Value>,
    started_at: DateTime<Utc>,
}

impl ExecutionState {
    pub fn new(order: Vec<NodeId>) -> Self {
        Self {
            order,
            phase: Phase::Reading,
            progress: 0.0,
            completed_nodes: BTreeSet::new(),
            current_node_id: None,
            result: None,
            error: None,
            node_outputs: HashMap::new(),
            started_at: Utc::now(),
        }
    }

    /// A state that failed before any event arrived.
    pub fn failed(order: Vec<NodeId>, message: impl Into<String>) -> Self {
        let mut state = Self::new(order);
        state.reduce(ExecutionEvent::Failed(message.into()));
        state
    }

    /// Apply one event. Returns `false` when the event was ignored.
    pub fn reduce(&mut self, event: ExecutionEvent) -> bool {
        if self.is_terminal() {
            debug!(phase = %self.phase, "Ignoring event after terminal phase");
            return false;
        }

        match event {
            ExecutionEvent::EnterPhase(phase) => {
                if phase.is_terminal() {
                    warn!(phase = %phase, "Ignoring terminal phase without a result");
                    return false;
                }
                self.phase = phase;
                if self.current_node_id.is_none() && self.completed_nodes.is_empty() {
                    self.raise_progress(phase.stage_progress().min(RUNNING_CAP));
                }
            }
            ExecutionEvent::NodeExecuting(node_id) => {
                match progress_for(&self.order, &node_id) {
                    Some(p) => self.raise_progress(p),
                    None => warn!(node_id = %node_id, "Executing node is not in the execution order"),
                }
                self.current_node_id = Some(node_id);
            }
            ExecutionEvent::NodeCompleted { node_id, data } => {
                if let Some(p) = progress_for(&self.order, &node_id) {
                    self.raise_progress(p);
                }
                if self.current_node_id.as_ref() == Some(&node_id) {
                    self.current_node_id = None;
                }
                self.node_outputs.insert(node_id.clone(), data);
                if !self.completed_nodes.insert(node_id) {
                    debug!("Node completed more than once");
                }
            }
            ExecutionEvent::Finished(result) => {
                self.phase = Phase::Complete;
                self.progress = 100.0;
                self.current_node_id = None;
                self.result = Some(result);
            }
            ExecutionEvent::Failed(message) => {
                self.phase = Phase::Error;
                self.current_node_id = None;
                self.error = Some(message);
            }
        }
        true
    }

    fn raise_progress(&mut self, value: f64) {
        if value > self.progress {
            self.progress = value;
        }
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn completed_nodes(&self) -> &BTreeSet<NodeId> {
        &self.completed_nodes
    }

    pub fn current_node_id(&self) -> Option<&NodeId> {
        self.current_node_id.as_ref()
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Completion payloads keyed by node.
    pub fn node_outputs(&self) -> &HashMap<NodeId, serde_json::Value> {
        &self.node_outputs
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            phase: self.phase,
            progress: self.progress,
            completed_nodes: self.completed_nodes.iter().cloned().collect(),
            current_node_id: self.current_node_id.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            started_at: self.started_at,
        }
    }
}

/// What the presentation layer sees of an execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub phase: Phase,
    pub progress: f64,
    pub completed_nodes: Vec<NodeId>,
    pub current_node_id: Option<NodeId>,
    pub result: Option<ExecutionResult>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionSnapshot {
    /// Snapshot shown before any execution has started.
    pub fn idle() -> Self {
        ExecutionState::new(Vec::new()).snapshot()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
