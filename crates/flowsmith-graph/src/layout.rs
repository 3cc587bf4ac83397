use std::collections::BTreeMap;

use flowsmith_core::graph::{Edge, Node};
use flowsmith_core::types::Position;
use tracing::warn;

use crate::deps::DependencyMap;

pub const HORIZONTAL_SPACING: f64 = 400.0;
pub const VERTICAL_SPACING: f64 = 180.0;
pub const START_X: f64 = 100.0;
pub const START_Y: f64 = 100.0;

/// Dependency depth of every node, indexed like `nodes`.
///
/// Roots sit at layer 0; any other node sits one past its deepest
/// predecessor. A predecessor still being resolved (a cycle) is treated as
/// already resolved and contributes nothing.
pub fn assign_layers(nodes: &[Node], edges: &[Edge]) -> Vec<usize> {
    let deps = DependencyMap::new(nodes, edges);
    let mut layers: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut visiting = vec![false; nodes.len()];
    for idx in 0..nodes.len() {
        layer_of(idx, &deps, nodes, &mut layers, &mut visiting);
    }
    layers.into_iter().map(|l| l.unwrap_or(0)).collect()
}

fn layer_of(
    idx: usize,
    deps: &DependencyMap,
    nodes: &[Node],
    layers: &mut [Option<usize>],
    visiting: &mut [bool],
) -> Option<usize> {
    if let Some(layer) = layers[idx] {
        return Some(layer);
    }
    if visiting[idx] {
        warn!(node_id = %nodes[idx].id, "Cycle while assigning layers");
        return None;
    }
    visiting[idx] = true;
    let layer = deps
        .predecessors(idx)
        .iter()
        .filter_map(|&pred| layer_of(pred, deps, nodes, layers, visiting))
        .map(|l| l + 1)
        .max()
        .unwrap_or(0);
    visiting[idx] = false;
    layers[idx] = Some(layer);
    Some(layer)
}

/// Recompute node positions as a left-to-right layered diagram.
///
/// Each layer is a column centred on `START_Y`; nodes keep their relative
/// input order inside a column. Only `position` changes.
pub fn layout(nodes: &[Node], edges: &[Edge]) -> Vec<Node> {
    let layers = assign_layers(nodes, edges);

    let mut columns: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &layer) in layers.iter().enumerate() {
        columns.entry(layer).or_default().push(idx);
    }

    let mut out = nodes.to_vec();
    for (layer, members) in &columns {
        let k = members.len() as f64;
        for (i, &idx) in members.iter().enumerate() {
            out[idx].position = Position {
                x: START_X + *layer as f64 * HORIZONTAL_SPACING,
                y: START_Y - (k * VERTICAL_SPACING) / 2.0
                    + VERTICAL_SPACING / 2.0
                    + i as f64 * VERTICAL_SPACING,
            };
        }
    }
    out
}
