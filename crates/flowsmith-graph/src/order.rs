use flowsmith_core::graph::{Edge, Node, WorkflowGraph};
use flowsmith_core::types::NodeId;
use tracing::warn;

use crate::deps::DependencyMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Emitted,
}

struct Walk<'a> {
    deps: &'a DependencyMap,
    nodes: &'a [Node],
    marks: Vec<Mark>,
    reached: Vec<bool>,
    out: Vec<usize>,
}

impl Walk<'_> {
    /// Emit `idx` after all of its predecessors.
    fn emit(&mut self, idx: usize) {
        if self.marks[idx] != Mark::Unvisited {
            return;
        }
        self.marks[idx] = Mark::Visiting;
        for &pred in self.deps.predecessors(idx) {
            match self.marks[pred] {
                Mark::Unvisited => self.emit(pred),
                Mark::Visiting => warn!(
                    from = %self.nodes[pred].id,
                    to = %self.nodes[idx].id,
                    "Skipping edge that re-enters an unresolved node"
                ),
                Mark::Emitted => {}
            }
        }
        self.marks[idx] = Mark::Emitted;
        self.out.push(idx);
    }

    /// Emit `idx`, then everything downstream of it.
    fn reach(&mut self, idx: usize) {
        if self.reached[idx] {
            return;
        }
        self.reached[idx] = true;
        self.emit(idx);
        for &next in self.deps.successors(idx) {
            self.reach(next);
        }
    }
}

/// Linear execution order respecting every dependency edge.
///
/// Starts from each root in array order, emitting a node only after its
/// direct predecessors. Nodes no root reaches are appended in array order.
/// A graph without roots is returned unchanged.
pub fn order(nodes: &[Node], edges: &[Edge]) -> Vec<Node> {
    order_indices(nodes, edges)
        .into_iter()
        .map(|i| nodes[i].clone())
        .collect()
}

/// [`order`] over a [`WorkflowGraph`], returning ids.
pub fn execution_order(graph: &WorkflowGraph) -> Vec<NodeId> {
    order_indices(graph.nodes(), graph.edges())
        .into_iter()
        .map(|i| graph.nodes()[i].id.clone())
        .collect()
}

fn order_indices(nodes: &[Node], edges: &[Edge]) -> Vec<usize> {
    let deps = DependencyMap::new(nodes, edges);
    let roots = deps.roots();
    if roots.is_empty() {
        return (0..nodes.len()).collect();
    }

    let mut walk = Walk {
        deps: &deps,
        nodes,
        marks: vec![Mark::Unvisited; nodes.len()],
        reached: vec![false; nodes.len()],
        out: Vec::with_capacity(nodes.len()),
    };
    for root in roots {
        walk.reach(root);
    }

    // Islands no root reaches (cycles hanging off nothing).
    for idx in 0..nodes.len() {
        if walk.marks[idx] == Mark::Unvisited {
            walk.marks[idx] = Mark::Emitted;
            walk.out.push(idx);
        }
    }
    walk.out
}
