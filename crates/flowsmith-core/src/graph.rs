use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowsmithError, Result};
use crate::registry;
use crate::types::{Category, EdgeId, NodeId, NodeKind, Position};

/// A single pipeline step.
///
/// `config` is owned by the node and never shared; it holds persisted settings
/// such as `extraInstructions` or `modelId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub category: Category,
    pub position: Position,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    /// Create a node with the palette defaults for `kind`.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let spec = registry::spec_for(kind);
        Self {
            id: id.into(),
            kind,
            category: kind.category(),
            position: Position::default(),
            label: spec.default_label.to_string(),
            description: spec.description.to_string(),
            config: serde_json::Map::new(),
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    /// Set one config entry.
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

/// A directed dependency: `source` must run before `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    /// Edge with an id derived from its endpoints.
    pub fn between(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: EdgeId(format!("e-{}-{}", source, target)),
            source,
            target,
        }
    }
}

/// The nodes and edges of one builder session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parts without validating edges.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Add a node. Ids are unique.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.contains(&node.id) {
            return Err(FlowsmithError::Graph(format!("duplicate node id '{}'", node.id)));
        }
        debug!(node_id = %node.id, kind = %node.kind, "Node added");
        self.nodes.push(node);
        Ok(())
    }

    /// Drop a new node of `kind` onto the canvas, returning its id.
    pub fn create_node(&mut self, kind: NodeKind, position: Position) -> NodeId {
        let mut node = Node::new(NodeId::generate(kind), kind);
        node.position = position;
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node> {
        let idx = self
            .nodes
            .iter()
            .position(|n| &n.id == id)
            .ok_or_else(|| FlowsmithError::Graph(format!("node '{}' not found", id)))?;
        let node = self.nodes.remove(idx);
        self.edges.retain(|e| &e.source != id && &e.target != id);
        debug!(node_id = %id, "Node removed");
        Ok(node)
    }

    /// Draw a connection between two existing nodes.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> Result<EdgeId> {
        for endpoint in [source, target] {
            if !self.contains(endpoint) {
                return Err(FlowsmithError::Graph(format!("node '{}' not found", endpoint)));
            }
        }
        if source == target {
            return Err(FlowsmithError::Graph(format!("cannot connect '{}' to itself", source)));
        }
        if self
            .edges
            .iter()
            .any(|e| &e.source == source && &e.target == target)
        {
            return Err(FlowsmithError::Graph(format!(
                "'{}' is already connected to '{}'",
                source, target
            )));
        }
        let edge = Edge::between(source.clone(), target.clone());
        let id = edge.id.clone();
        self.edges.push(edge);
        Ok(id)
    }

    pub fn disconnect(&mut self, edge_id: &EdgeId) -> Result<Edge> {
        let idx = self
            .edges
            .iter()
            .position(|e| &e.id == edge_id)
            .ok_or_else(|| FlowsmithError::Graph(format!("edge '{}' not found", edge_id)))?;
        Ok(self.edges.remove(idx))
    }

    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| FlowsmithError::Graph(format!("node '{}' not found", id)))?;
        node.position = position;
        Ok(())
    }

    /// Replace the whole graph, e.g. when a template is loaded.
    pub fn replace(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        self.nodes = nodes;
        self.edges = edges;
    }

    /// Take positions from a laid-out copy of the nodes, matched by id.
    pub fn apply_positions(&mut self, laid_out: &[Node]) {
        for node in &mut self.nodes {
            if let Some(other) = laid_out.iter().find(|o| o.id == node.id) {
                node.position = other.position;
            }
        }
    }

    /// Nodes with an edge into `id`.
    pub fn predecessors(&self, id: &NodeId) -> Vec<&NodeId> {
        self.edges
            .iter()
            .filter(|e| &e.target == id)
            .map(|e| &e.source)
            .collect()
    }

    /// Nodes `id` has an edge into.
    pub fn successors(&self, id: &NodeId) -> Vec<&NodeId> {
        self.edges
            .iter()
            .filter(|e| &e.source == id)
            .map(|e| &e.target)
            .collect()
    }

    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes, self.edges)
    }
}
