use std::sync::Arc;

use flowsmith_core::config::ExecutionConfig;
use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::event::{SessionBus, SessionNotice};
use flowsmith_core::graph::WorkflowGraph;
use flowsmith_core::template::Template;
use flowsmith_core::traits::{ExecutionGateway, ExecutionRequest};
use flowsmith_graph::{check_acyclic, execution_order, layout};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::machine::ExecutionMachine;
use crate::params::ParamStore;
use crate::runner::run_channel;
use crate::state::ExecutionSnapshot;
use crate::validate::validate_inputs;

struct ActiveExecution {
    execution_id: Option<String>,
    cancel: CancellationToken,
    handle: JoinHandle<ExecutionMachine>,
}

/// One builder session: the graph being edited, its run-time parameters and
/// at most one execution in flight.
pub struct BuilderSession {
    graph: WorkflowGraph,
    params: ParamStore,
    bus: SessionBus,
    gateway: Arc<dyn ExecutionGateway>,
    config: ExecutionConfig,
    snapshots: Arc<watch::Sender<ExecutionSnapshot>>,
    active: Option<ActiveExecution>,
    last: Option<ExecutionMachine>,
}

impl BuilderSession {
    pub fn new(gateway: Arc<dyn ExecutionGateway>, config: ExecutionConfig) -> Self {
        let (snapshots, _) = watch::channel(ExecutionSnapshot::idle());
        Self {
            graph: WorkflowGraph::new(),
            params: ParamStore::new(),
            bus: SessionBus::new(config.event_buffer),
            gateway,
            config,
            snapshots: Arc::new(snapshots),
            active: None,
            last: None,
        }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut WorkflowGraph {
        &mut self.graph
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    /// Subscribe to session notices.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionNotice> {
        self.bus.subscribe()
    }

    /// Watch execution snapshots. Survives across executions.
    pub fn watch(&self) -> watch::Receiver<ExecutionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Replace the graph with a template's and seed parameters from its
    /// node config, underneath values already entered. Parameters of nodes
    /// the new graph lacks are dropped.
    pub fn load_template(&mut self, template: &Template) {
        self.graph = template.to_graph();
        self.params.retain_graph(&self.graph);
        self.params.seed_from_graph(&self.graph);
        info!(
            template = %template.id,
            nodes = self.graph.nodes().len(),
            edges = self.graph.edges().len(),
            "Loaded template"
        );
    }

    /// Recompute every node position.
    pub fn apply_layout(&mut self) {
        let laid_out = layout(self.graph.nodes(), self.graph.edges());
        self.graph.apply_positions(&laid_out);
    }

    /// True while an execution has not reached a terminal phase.
    pub fn is_executing(&self) -> bool {
        self.active.is_some() && !self.snapshots.borrow().is_terminal()
    }

    /// The execution view may only close when nothing is running.
    pub fn close_view(&self) -> Result<()> {
        if self.is_executing() {
            return Err(FlowsmithError::ExecutionInFlight);
        }
        Ok(())
    }

    /// Validate, order and start a new execution.
    ///
    /// Validation and cycle failures return before anything changes. Any
    /// previous subscription is torn down before the new channel opens. A
    /// gateway that fails to start yields a fresh state in `Error`, returned
    /// as the snapshot.
    pub async fn start_execution(&mut self) -> Result<ExecutionSnapshot> {
        validate_inputs(&self.graph, &self.params)?;
        check_acyclic(&self.graph)?;
        let order = execution_order(&self.graph);

        self.teardown().await;

        let mut machine = ExecutionMachine::new(order.clone(), self.config.dedupe_window());
        let request = ExecutionRequest {
            nodes: self.graph.nodes().to_vec(),
            edges: self.graph.edges().to_vec(),
            order,
            params: self.params.to_request_params(&self.graph),
        };
        let node_count = request.nodes.len();
        self.snapshots.send_replace(machine.snapshot());

        match self.gateway.start_execution(request).await {
            Ok(channel) => {
                info!(execution_id = ?channel.execution_id, node_count, "Execution started");
                self.bus.publish(SessionNotice::ExecutionStarted { node_count });
                let cancel = CancellationToken::new();
                let execution_id = channel.execution_id.clone();
                let handle = tokio::spawn(run_channel(
                    channel,
                    machine,
                    self.snapshots.clone(),
                    self.bus.clone(),
                    cancel.clone(),
                ));
                self.active = Some(ActiveExecution {
                    execution_id,
                    cancel,
                    handle,
                });
            }
            Err(e) => {
                warn!(error = %e, "Execution failed to start");
                machine.fail(e.to_string());
                self.snapshots.send_replace(machine.snapshot());
                self.bus.publish(SessionNotice::ExecutionFinished {
                    phase: machine.state().phase(),
                });
                self.last = Some(machine);
            }
        }
        Ok(self.snapshot())
    }

    /// Wait for the active execution to finish and return its final snapshot.
    ///
    /// The execution stays registered until its task has joined, so dropping
    /// this future part way leaves it for [`teardown`](Self::teardown).
    pub async fn wait(&mut self) -> Result<ExecutionSnapshot> {
        if let Some(active) = &mut self.active {
            let joined = (&mut active.handle).await;
            self.active = None;
            let machine = joined.map_err(|e| FlowsmithError::Channel(e.to_string()))?;
            self.last = Some(machine);
        }
        Ok(self.snapshot())
    }

    /// State and transcript of the last execution that stopped.
    pub fn last_execution(&self) -> Option<&ExecutionMachine> {
        self.last.as_ref()
    }

    /// Close the live subscription, if any, and ask the service to stop it.
    pub async fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if active.handle.is_finished() {
            if let Ok(machine) = active.handle.await {
                self.last = Some(machine);
            }
            return;
        }

        active.cancel.cancel();
        if let Some(id) = &active.execution_id {
            if let Err(e) = self.gateway.cancel(id).await {
                warn!(execution_id = %id, error = %e, "Failed to cancel execution");
            }
        }
        match active.handle.await {
            Ok(machine) => self.last = Some(machine),
            Err(e) => warn!(error = %e, "Execution task did not shut down cleanly"),
        }
    }
}

impl Drop for BuilderSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamKey;
    use flowsmith_core::event::GatewayEvent;
    use flowsmith_core::graph::Edge;
    use flowsmith_core::types::{NodeId, Phase};
    use flowsmith_test_utils::{fixtures, MockGateway};
    use serde_json::json;
    use std::time::Duration;

    fn session_with(gateway: Arc<MockGateway>, graph: WorkflowGraph) -> BuilderSession {
        let mut session = BuilderSession::new(gateway, ExecutionConfig::default());
        *session.graph_mut() = graph;
        session
    }

    fn fill(session: &mut BuilderSession, id: &str) {
        session
            .params_mut()
            .set(&NodeId::from(id), ParamKey::Data, json!("input"))
            .unwrap();
    }

    fn done(text: &str) -> GatewayEvent {
        GatewayEvent::Done {
            final_output: json!(text),
            conversation_id: None,
            title: None,
            links: vec![],
        }
    }

    #[tokio::test]
    async fn test_validation_failure_sends_nothing() {
        let gateway = Arc::new(MockGateway::new());
        let mut session = session_with(gateway.clone(), fixtures::fan_in());
        fill(&mut session, "a");
        let before = session.snapshot();

        let err = session.start_execution().await.unwrap_err();
        match err {
            FlowsmithError::Validation(failure) => {
                assert_eq!(failure.missing.len(), 1);
                assert_eq!(failure.missing[0].node_id, NodeId::from("b"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(gateway.requests().is_empty());
        assert_eq!(session.snapshot(), before);
        assert!(!session.is_executing());
    }

    #[tokio::test]
    async fn test_cycle_is_rejected_before_start() {
        let gateway = Arc::new(MockGateway::new());
        let (nodes, mut edges) = fixtures::linear_pipeline().into_parts();
        edges.push(Edge::between("c", "b"));
        let mut session = session_with(gateway.clone(), WorkflowGraph::from_parts(nodes, edges));
        fill(&mut session, "a");

        assert!(matches!(
            session.start_execution().await,
            Err(FlowsmithError::Cycle { .. })
        ));
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_order_and_params() {
        let gateway = Arc::new(MockGateway::new().with_events(vec![done("ok")]));
        let mut session = session_with(gateway.clone(), fixtures::linear_pipeline());
        fill(&mut session, "a");

        session.start_execution().await.unwrap();
        let snap = session.wait().await.unwrap();
        assert_eq!(snap.phase, Phase::Complete);

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        let order: Vec<&str> = requests[0].order.iter().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(requests[0].params.contains_key(&NodeId::from("a")));
    }

    #[tokio::test]
    async fn test_start_failure_yields_error_state() {
        let gateway = Arc::new(MockGateway::new().with_start_failure("503 Service Unavailable"));
        let mut session = session_with(gateway, fixtures::linear_pipeline());
        fill(&mut session, "a");

        let snap = session.start_execution().await.unwrap();
        assert_eq!(snap.phase, Phase::Error);
        assert!(snap.error.as_deref().unwrap().contains("503"));
        assert!(!session.is_executing());
        assert!(session.close_view().is_ok());
    }

    #[tokio::test]
    async fn test_close_view_blocked_while_running() {
        let gateway = Arc::new(MockGateway::new());
        let tx = gateway.live_channel();
        let mut session = session_with(gateway.clone(), fixtures::linear_pipeline());
        fill(&mut session, "a");

        session.start_execution().await.unwrap();
        assert!(session.is_executing());
        assert!(matches!(session.close_view(), Err(FlowsmithError::ExecutionInFlight)));

        tx.send(done("finished")).unwrap();
        session.wait().await.unwrap();
        assert!(session.close_view().is_ok());
    }

    #[tokio::test]
    async fn test_new_execution_tears_down_previous() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_events_held_open(vec![GatewayEvent::NodeStart { node_id: "a".into() }])
                .with_events(vec![done("second")]),
        );
        let mut session = session_with(gateway.clone(), fixtures::linear_pipeline());
        fill(&mut session, "a");

        session.start_execution().await.unwrap();
        session.start_execution().await.unwrap();
        assert_eq!(gateway.cancelled(), vec!["mock-exec-1".to_string()]);

        let snap = session.wait().await.unwrap();
        assert_eq!(snap.phase, Phase::Complete);
        assert_eq!(snap.result.unwrap().markdown_text(), Some("second"));
        assert!(snap.completed_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_load_template_seeds_params() {
        let template = Template::from_json(
            r#"{
                "id": "tpl-1", "name": "Brief", "description": "", "category": "writing",
                "nodes": [
                    {"id": "a", "kind": "text-input", "category": "input",
                     "data": {"label": "Brief", "config": {}}, "position": {"x": 0.0, "y": 0.0}},
                    {"id": "s", "kind": "ai-summarize", "category": "ai",
                     "data": {"label": "Summary", "config": {"modelId": "model-small"}},
                     "position": {"x": 0.0, "y": 0.0}}
                ],
                "edges": [{"id": "e1", "source": "a", "target": "s"}]
            }"#,
        )
        .unwrap();
        let mut session = BuilderSession::new(Arc::new(MockGateway::new()), ExecutionConfig::default());
        session
            .params_mut()
            .set(&NodeId::from("s"), ParamKey::ModelId, json!("model-large"))
            .unwrap();
        session
            .params_mut()
            .set(&NodeId::from("old-input"), ParamKey::Data, json!("left over"))
            .unwrap();
        session.load_template(&template);

        assert_eq!(session.graph().nodes().len(), 2);
        let params = session.params().get(&NodeId::from("s")).unwrap();
        assert_eq!(params.model_id.as_deref(), Some("model-large"));
        assert!(session.params().get(&NodeId::from("old-input")).is_none());

        session.apply_layout();
        assert_eq!(session.graph().nodes()[1].position.x, 500.0);
    }

    async fn abandon_wait(session: &mut BuilderSession) {
        tokio::select! {
            _ = session.wait() => panic!("execution should still be running"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
    }

    #[tokio::test]
    async fn test_abandoned_wait_keeps_execution_for_restart() {
        let gateway = MockGateway::new();
        let stale = gateway.live_channel();
        let gateway = Arc::new(gateway.with_events(vec![done("second")]));
        let mut session = session_with(gateway.clone(), fixtures::linear_pipeline());
        fill(&mut session, "a");

        session.start_execution().await.unwrap();
        abandon_wait(&mut session).await;
        assert!(session.is_executing());

        session.start_execution().await.unwrap();
        assert_eq!(gateway.cancelled(), vec!["mock-exec-1".to_string()]);
        assert!(stale
            .send(GatewayEvent::Error { message: "from the first channel".into() })
            .is_err());

        let snap = session.wait().await.unwrap();
        assert_eq!(snap.phase, Phase::Complete);
        assert!(snap.error.is_none());
        assert_eq!(snap.result.unwrap().markdown_text(), Some("second"));
    }

    #[tokio::test]
    async fn test_teardown_after_abandoned_wait_cancels_service() {
        let gateway = MockGateway::new();
        let _live = gateway.live_channel();
        let gateway = Arc::new(gateway);
        let mut session = session_with(gateway.clone(), fixtures::linear_pipeline());
        fill(&mut session, "a");

        session.start_execution().await.unwrap();
        abandon_wait(&mut session).await;
        session.teardown().await;

        assert_eq!(gateway.cancelled(), vec!["mock-exec-1".to_string()]);
        assert!(!session.is_executing());
        assert!(session.last_execution().is_some());
    }
}
