use flowsmith_core::error::{FlowsmithError, MissingInput, Result, ValidationFailure};
use flowsmith_core::graph::{Node, WorkflowGraph};
use flowsmith_core::types::Category;

use crate::params::ParamStore;

/// Nodes the user must fill in: input category with no incoming edge.
pub fn input_nodes(graph: &WorkflowGraph) -> Vec<&Node> {
    graph
        .nodes()
        .iter()
        .filter(|n| n.category == Category::Input && graph.predecessors(&n.id).is_empty())
        .collect()
}

/// Every input node without data or files, in graph order.
pub fn missing_inputs(graph: &WorkflowGraph, params: &ParamStore) -> ValidationFailure {
    let missing = input_nodes(graph)
        .into_iter()
        .filter(|n| !params.has_input(&n.id))
        .map(|n| MissingInput {
            node_id: n.id.clone(),
            label: if n.label.trim().is_empty() {
                n.id.to_string()
            } else {
                n.label.clone()
            },
        })
        .collect();
    ValidationFailure { missing }
}

/// Fail with [`FlowsmithError::Validation`] listing every unmet input node.
pub fn validate_inputs(graph: &WorkflowGraph, params: &ParamStore) -> Result<()> {
    let failure = missing_inputs(graph, params);
    if failure.is_empty() {
        Ok(())
    } else {
        Err(FlowsmithError::Validation(failure))
    }
}
