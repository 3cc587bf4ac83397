use std::collections::HashMap;

use flowsmith_core::graph::{Edge, Node};
use flowsmith_core::types::NodeId;

/// Index-based adjacency over a node slice.
///
/// Neighbour lists are sorted by node array position so every traversal
/// breaks ties the same way. Edges with a missing endpoint are dropped and
/// counted in `dangling`.
#[derive(Debug, Clone)]
pub struct DependencyMap {
    /// Upstream node indices for each node.
    predecessors: Vec<Vec<usize>>,
    /// Downstream node indices for each node.
    successors: Vec<Vec<usize>>,
    index: HashMap<NodeId, usize>,
    dangling: Vec<usize>,
}

impl DependencyMap {
    pub fn new(nodes: &[Node], edges: &[Edge]) -> Self {
        let index: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let mut predecessors = vec![Vec::new(); nodes.len()];
        let mut successors = vec![Vec::new(); nodes.len()];
        let mut dangling = Vec::new();

        for (edge_idx, edge) in edges.iter().enumerate() {
            match (index.get(&edge.source), index.get(&edge.target)) {
                (Some(&s), Some(&t)) => {
                    if !predecessors[t].contains(&s) {
                        predecessors[t].push(s);
                        successors[s].push(t);
                    }
                }
                _ => dangling.push(edge_idx),
            }
        }

        for list in predecessors.iter_mut().chain(successors.iter_mut()) {
            list.sort_unstable();
        }

        Self {
            predecessors,
            successors,
            index,
            dangling,
        }
    }

    pub fn len(&self) -> usize {
        self.predecessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predecessors.is_empty()
    }

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.predecessors[idx]
    }

    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    /// Nodes with no incoming edge, in array order.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.predecessors[i].is_empty())
            .collect()
    }

    /// Positions in the edge slice of edges that reference a missing node.
    pub fn dangling_edges(&self) -> &[usize] {
        &self.dangling
    }
}
