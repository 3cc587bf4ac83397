use std::collections::HashSet;
use std::fmt;

use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::graph::WorkflowGraph;
use flowsmith_core::types::{EdgeId, NodeId};
use tracing::warn;

use crate::deps::DependencyMap;

/// Structural problems that ordering and layout tolerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIntegrityWarning {
    /// An edge endpoint names a node that does not exist.
    DanglingEdge { edge_id: EdgeId, missing: NodeId },
    SelfLoop { node_id: NodeId },
    DuplicateEdge { source: NodeId, target: NodeId },
    /// A dependency cycle; the path starts and ends on the same node.
    CycleDetected { path: Vec<NodeId> },
}

impl fmt::Display for GraphIntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingEdge { edge_id, missing } => {
                write!(f, "edge '{}' references missing node '{}'", edge_id, missing)
            }
            Self::SelfLoop { node_id } => write!(f, "node '{}' depends on itself", node_id),
            Self::DuplicateEdge { source, target } => {
                write!(f, "'{}' is connected to '{}' more than once", source, target)
            }
            Self::CycleDetected { path } => {
                let path: Vec<&str> = path.iter().map(|id| id.as_str()).collect();
                write!(f, "dependency cycle {}", path.join(" -> "))
            }
        }
    }
}

/// Report every integrity problem in `graph`, logging each one.
pub fn inspect(graph: &WorkflowGraph) -> Vec<GraphIntegrityWarning> {
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for edge in graph.edges() {
        for endpoint in [&edge.source, &edge.target] {
            if !graph.contains(endpoint) {
                warnings.push(GraphIntegrityWarning::DanglingEdge {
                    edge_id: edge.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        if edge.source == edge.target {
            warnings.push(GraphIntegrityWarning::SelfLoop {
                node_id: edge.source.clone(),
            });
        } else if !seen.insert((&edge.source, &edge.target)) {
            warnings.push(GraphIntegrityWarning::DuplicateEdge {
                source: edge.source.clone(),
                target: edge.target.clone(),
            });
        }
    }

    if let Some(path) = find_cycle(graph) {
        // Self loops are already reported on their own.
        if path.len() > 2 {
            warnings.push(GraphIntegrityWarning::CycleDetected { path });
        }
    }

    for w in &warnings {
        warn!(warning = %w, "Graph integrity");
    }
    warnings
}

/// Fail with [`FlowsmithError::Cycle`] if any dependency cycle exists.
pub fn check_acyclic(graph: &WorkflowGraph) -> Result<()> {
    match find_cycle(graph) {
        Some(path) => Err(FlowsmithError::Cycle { path }),
        None => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

fn find_cycle(graph: &WorkflowGraph) -> Option<Vec<NodeId>> {
    let nodes = graph.nodes();
    let deps = DependencyMap::new(nodes, graph.edges());
    let mut colors = vec![Color::White; nodes.len()];
    let mut stack = Vec::new();

    for start in 0..nodes.len() {
        if colors[start] != Color::White {
            continue;
        }
        if let Some(cycle) = visit(start, &deps, &mut colors, &mut stack) {
            return Some(cycle.into_iter().map(|i| nodes[i].id.clone()).collect());
        }
    }
    None
}

fn visit(
    idx: usize,
    deps: &DependencyMap,
    colors: &mut [Color],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    colors[idx] = Color::Grey;
    stack.push(idx);
    for &next in deps.successors(idx) {
        match colors[next] {
            Color::Grey => {
                let from = stack.iter().position(|&i| i == next).unwrap_or(0);
                let mut path = stack[from..].to_vec();
                path.push(next);
                return Some(path);
            }
            Color::White => {
                if let Some(path) = visit(next, deps, colors, stack) {
                    return Some(path);
                }
            }
            Color::Black => {}
        }
    }
    stack.pop();
    colors[idx] = Color::Black;
    None
}
