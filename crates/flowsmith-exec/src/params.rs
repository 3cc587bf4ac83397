use std::collections::HashMap;
use std::path::PathBuf;

use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::graph::WorkflowGraph;
use flowsmith_core::types::{FileRef, NodeId, NodeParams};
use tracing::debug;

use crate::files;

/// Node config key holding persisted extra instructions.
pub const CONFIG_EXTRA_INSTRUCTIONS: &str = "extraInstructions";
/// Node config key holding the persisted model selection.
pub const CONFIG_MODEL_ID: &str = "modelId";

/// Which field of [`NodeParams`] a `set` call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKey {
    Data,
    Files,
    ExtraInstructions,
    ModelId,
}

impl std::str::FromStr for ParamKey {
    type Err = FlowsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "data" => Ok(Self::Data),
            "files" => Ok(Self::Files),
            "extraInstructions" => Ok(Self::ExtraInstructions),
            "modelId" => Ok(Self::ModelId),
            other => Err(FlowsmithError::Config(format!("unknown parameter key '{}'", other))),
        }
    }
}

/// Run-time inputs keyed by node, kept apart from the node definitions.
///
/// Values are opaque here; deciding how to render or check them belongs to
/// the node kind.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: HashMap<NodeId, NodeParams>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&NodeParams> {
        self.params.get(node_id)
    }

    pub fn set(&mut self, node_id: &NodeId, key: ParamKey, value: serde_json::Value) -> Result<()> {
        let entry = self.params.entry(node_id.clone()).or_default();
        match key {
            ParamKey::Data => {
                entry.data = if value.is_null() { None } else { Some(value) };
            }
            ParamKey::Files => {
                entry.files = if value.is_null() {
                    Vec::new()
                } else {
                    serde_json::from_value::<Vec<FileRef>>(value)?
                };
            }
            ParamKey::ExtraInstructions => {
                entry.extra_instructions = serde_json::from_value::<Option<String>>(value)?;
            }
            ParamKey::ModelId => {
                entry.model_id = serde_json::from_value::<Option<String>>(value)?;
            }
        }
        Ok(())
    }

    /// Replace every parameter of one node.
    pub fn insert(&mut self, node_id: NodeId, params: NodeParams) {
        self.params.insert(node_id, params);
    }

    pub fn has_input(&self, node_id: &NodeId) -> bool {
        self.params.get(node_id).is_some_and(NodeParams::has_input)
    }

    /// Seed persisted node config underneath the values already entered in
    /// this session. Values the user typed are never overwritten.
    pub fn seed_from_graph(&mut self, graph: &WorkflowGraph) {
        for node in graph.nodes() {
            let instructions = node.config_str(CONFIG_EXTRA_INSTRUCTIONS);
            let model = node.config_str(CONFIG_MODEL_ID);
            if instructions.is_none() && model.is_none() {
                continue;
            }

            let entry = self.params.entry(node.id.clone()).or_default();
            if entry.extra_instructions.is_none() {
                entry.extra_instructions = instructions.map(str::to_string);
            }
            if entry.model_id.is_none() {
                entry.model_id = model.map(str::to_string);
            }
            debug!(node_id = %node.id, "Seeded parameters from node config");
        }
    }

    /// Read, encode and append files to a node's inputs, keeping path order.
    pub async fn attach_files(&mut self, node_id: &NodeId, paths: &[PathBuf]) -> Result<()> {
        let encoded = files::encode_files(paths).await?;
        self.params
            .entry(node_id.clone())
            .or_default()
            .files
            .extend(encoded);
        Ok(())
    }

    /// Drop parameters of nodes no longer in `graph`.
    pub fn retain_graph(&mut self, graph: &WorkflowGraph) {
        self.params.retain(|id, _| graph.contains(id));
    }

    /// Parameters to send with an execution request for `graph`, skipping
    /// empty entries and nodes the graph no longer has.
    pub fn to_request_params(&self, graph: &WorkflowGraph) -> HashMap<NodeId, NodeParams> {
        self.params
            .iter()
            .filter(|(id, p)| graph.contains(id) && **p != NodeParams::default())
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_core::graph::Node;
    use flowsmith_core::types::{NodeKind, TransformKind};
    use flowsmith_test_utils::fixtures;
    use serde_json::json;

    fn configured_graph() -> WorkflowGraph {
        WorkflowGraph::from_parts(
            vec![Node::new("s", NodeKind::AiTransform(TransformKind::Summarize))
                .with_config(CONFIG_EXTRA_INSTRUCTIONS, json!("Keep it under 200 words"))
                .with_config(CONFIG_MODEL_ID, json!("model-small"))],
            vec![],
        )
    }

    #[test]
    fn test_set_and_get() {
        let mut store = ParamStore::new();
        let id = NodeId::from("a");
        store.set(&id, ParamKey::Data, json!({ "name": "Ada" })).unwrap();
        store.set(&id, ParamKey::ModelId, json!("model-large")).unwrap();

        let params = store.get(&id).unwrap();
        assert_eq!(params.data, Some(json!({ "name": "Ada" })));
        assert_eq!(params.model_id.as_deref(), Some("model-large"));
        assert!(store.has_input(&id));
        assert!(store.get(&NodeId::from("other")).is_none());
    }

    #[test]
    fn test_set_rejects_wrong_shape() {
        let mut store = ParamStore::new();
        let id = NodeId::from("a");
        assert!(matches!(
            store.set(&id, ParamKey::ModelId, json!(12)),
            Err(FlowsmithError::Json(_))
        ));
        assert!(store.set(&id, ParamKey::Files, json!([{ "name": "x" }])).is_err());
    }

    #[test]
    fn test_set_files_from_json() {
        let mut store = ParamStore::new();
        let id = NodeId::from("b");
        store
            .set(
                &id,
                ParamKey::Files,
                json!([{ "name": "notes.txt", "type": "text/plain", "size": 2, "data": "aGk=" }]),
            )
            .unwrap();
        assert!(store.has_input(&id));
        store.set(&id, ParamKey::Files, json!(null)).unwrap();
        assert!(!store.has_input(&id));
    }

    #[test]
    fn test_seed_fills_empty_fields() {
        let mut store = ParamStore::new();
        store.seed_from_graph(&configured_graph());
        let params = store.get(&NodeId::from("s")).unwrap();
        assert_eq!(params.extra_instructions.as_deref(), Some("Keep it under 200 words"));
        assert_eq!(params.model_id.as_deref(), Some("model-small"));
    }

    #[test]
    fn test_session_values_win_over_seed() {
        let mut store = ParamStore::new();
        let id = NodeId::from("s");
        store
            .set(&id, ParamKey::ExtraInstructions, json!("Bullet points only"))
            .unwrap();
        store.seed_from_graph(&configured_graph());

        let params = store.get(&id).unwrap();
        assert_eq!(params.extra_instructions.as_deref(), Some("Bullet points only"));
        assert_eq!(params.model_id.as_deref(), Some("model-small"));
    }

    #[test]
    fn test_seed_skips_unconfigured_nodes() {
        let mut store = ParamStore::new();
        let graph = fixtures::linear_pipeline();
        store.seed_from_graph(&graph);
        assert!(store.to_request_params(&graph).is_empty());
    }

    #[test]
    fn test_param_key_from_str() {
        assert_eq!("extraInstructions".parse::<ParamKey>().unwrap(), ParamKey::ExtraInstructions);
        assert!("colour".parse::<ParamKey>().is_err());
    }

    #[test]
    fn test_retain_graph() {
        let mut store = ParamStore::new();
        store.set(&NodeId::from("a"), ParamKey::Data, json!("x")).unwrap();
        store.set(&NodeId::from("gone"), ParamKey::Data, json!("y")).unwrap();
        store.retain_graph(&fixtures::linear_pipeline());
        assert!(store.get(&NodeId::from("gone")).is_none());
        assert!(store.has_input(&NodeId::from("a")));
    }

    #[test]
    fn test_request_params_skip_removed_nodes() {
        let mut graph = fixtures::linear_pipeline();
        let mut store = ParamStore::new();
        store.set(&NodeId::from("a"), ParamKey::Data, json!("brief")).unwrap();
        store.set(&NodeId::from("b"), ParamKey::ExtraInstructions, json!("Short")).unwrap();
        graph.remove_node(&NodeId::from("b")).unwrap();

        let params = store.to_request_params(&graph);
        assert_eq!(params.len(), 1);
        assert!(params.contains_key(&NodeId::from("a")));
    }

    #[tokio::test]
    async fn test_attach_files_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("brief.md");
        let second = dir.path().join("data.csv");
        std::fs::write(&first, "# Brief").unwrap();
        std::fs::write(&second, "a,b\n1,2\n").unwrap();

        let mut store = ParamStore::new();
        let id = NodeId::from("b");
        store.attach_files(&id, &[first, second]).await.unwrap();

        let names: Vec<&str> = store.get(&id).unwrap().files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["brief.md", "data.csv"]);
        assert!(store.has_input(&id));
    }
}
