use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::GatewayEvent;
use crate::graph::{Edge, Node};
use crate::types::{NodeId, NodeParams};

/// Body of a start-execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Node ids in the order the service should run them.
    pub order: Vec<NodeId>,
    pub params: HashMap<NodeId, NodeParams>,
}

/// An open execution subscription.
pub struct EventChannel {
    /// Service-side id, when the service reports one. Used for cancellation.
    pub execution_id: Option<String>,
    pub events: BoxStream<'static, Result<GatewayEvent>>,
}

impl EventChannel {
    pub fn new(execution_id: Option<String>, events: BoxStream<'static, Result<GatewayEvent>>) -> Self {
        Self { execution_id, events }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("execution_id", &self.execution_id)
            .finish()
    }
}

/// Boundary to the remote execution service.
pub trait ExecutionGateway: Send + Sync + 'static {
    /// Start an execution and open its event channel.
    fn start_execution(&self, request: ExecutionRequest) -> BoxFuture<'_, Result<EventChannel>>;

    /// Ask the service to stop an execution. Dropping the channel already
    /// closes the subscription; this additionally frees server-side work.
    fn cancel(&self, execution_id: &str) -> BoxFuture<'_, Result<()>> {
        let _ = execution_id;
        Box::pin(async { Ok(()) })
    }
}
