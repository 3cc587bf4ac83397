use serde::{Deserialize, Serialize};

use crate::types::{NodeId, Phase};

/// One event on an execution channel.
///
/// `token`/`thinking`/`tool_*` are side-channel stream content; `phase`,
/// `node_start` and `node_complete` drive progress; `done` and `error` are
/// terminal and close the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Incremental output text for the node currently producing output.
    Token { content: String },
    /// Intermediate reasoning, accumulated separately from tokens.
    Thinking { content: String },
    ToolCall {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    ToolResult {
        name: String,
        #[serde(default)]
        result: serde_json::Value,
    },
    Phase { phase: Phase },
    NodeStart { node_id: NodeId },
    NodeComplete {
        node_id: NodeId,
        #[serde(default)]
        data: serde_json::Value,
    },
    Done {
        #[serde(default)]
        final_output: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        links: Vec<String>,
    },
    Error { message: String },
}

impl GatewayEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Phase { .. } => "phase",
            Self::NodeStart { .. } => "node_start",
            Self::NodeComplete { .. } => "node_complete",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// Notices exchanged between panels of one builder session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// A new execution opened its channel.
    ExecutionStarted { node_count: usize },
    /// The remote service named the conversation.
    TitleUpdated {
        conversation_id: Option<String>,
        title: String,
    },
    /// An execution reached a terminal phase.
    ExecutionFinished { phase: Phase },
}

/// Session-scoped notice bus using tokio broadcast channel.
/// All subscribers receive all notices.
pub struct SessionBus {
    tx: tokio::sync::broadcast::Sender<SessionNotice>,
}

impl SessionBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, notice: SessionNotice) {
        // Ignore error if no receivers
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionNotice> {
        self.tx.subscribe()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Clone for SessionBus {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_events() {
        let ev: GatewayEvent =
            serde_json::from_str(r#"{"type":"token","content":"Hel"}"#).unwrap();
        assert_eq!(ev, GatewayEvent::Token { content: "Hel".into() });

        let ev: GatewayEvent =
            serde_json::from_str(r#"{"type":"phase","phase":"summarizing"}"#).unwrap();
        assert_eq!(ev, GatewayEvent::Phase { phase: Phase::Summarizing });

        let ev: GatewayEvent = serde_json::from_str(
            r#"{"type":"done","final_output":"ok","conversation_id":"c1","title":"Q3 report"}"#,
        )
        .unwrap();
        assert!(ev.is_terminal());
        assert_eq!(ev.kind(), "done");
    }

    #[test]
    fn test_tool_call_args_default() {
        let ev: GatewayEvent =
            serde_json::from_str(r#"{"type":"tool_call","name":"lookup"}"#).unwrap();
        assert!(matches!(ev, GatewayEvent::ToolCall { args, .. } if args.is_null()));
    }

    #[tokio::test]
    async fn test_bus_delivers_to_all_subscribers() {
        let bus = SessionBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(SessionNotice::TitleUpdated {
            conversation_id: None,
            title: "Weekly digest".into(),
        });
        assert!(matches!(a.recv().await.unwrap(), SessionNotice::TitleUpdated { .. }));
        assert!(matches!(b.recv().await.unwrap(), SessionNotice::TitleUpdated { .. }));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = SessionBus::default();
        bus.publish(SessionNotice::ExecutionStarted { node_count: 3 });
    }
}
