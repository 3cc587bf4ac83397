use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, info, warn};

use flowsmith_core::config::GatewayConfig;
use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::event::GatewayEvent;
use flowsmith_core::traits::{EventChannel, ExecutionGateway, ExecutionRequest};

use crate::streaming::{SseEvent, SseStream};

/// Response header carrying the service-side execution id.
pub const EXECUTION_ID_HEADER: &str = "x-execution-id";
/// Data payload that ends a stream.
///
/// Read as a `done` with no final output, so a run closed only by the
/// sentinel finishes with the text streamed so far. Anything after it is
/// ignored.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Execution gateway over HTTP with a server-sent events response.
pub struct HttpGateway {
    http: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| FlowsmithError::Gateway(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn cancel_url(&self, execution_id: &str) -> String {
        format!("{}/{}/cancel", self.config.execute_url(), execution_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Turn one SSE block into a gateway event.
///
/// The event type comes from the JSON `type` field, falling back to the SSE
/// `event:` name. Blocks that do not decode are skipped.
pub fn decode_event(event: &SseEvent) -> Option<GatewayEvent> {
    if event.event_type.as_deref() == Some("ping") || event.data.trim().is_empty() {
        return None;
    }
    let mut value: serde_json::Value = match serde_json::from_str(&event.data) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Skipping non-JSON event data");
            return None;
        }
    };
    if let (Some(obj), Some(kind)) = (value.as_object_mut(), &event.event_type) {
        obj.entry("type")
            .or_insert_with(|| serde_json::Value::String(kind.clone()));
    }
    match serde_json::from_value::<GatewayEvent>(value) {
        Ok(ev) => Some(ev),
        Err(e) => {
            warn!(error = %e, event_type = ?event.event_type, "Skipping unknown event");
            None
        }
    }
}

fn is_done_sentinel(item: &Result<SseEvent>) -> bool {
    matches!(item, Ok(ev) if ev.data.trim() == DONE_SENTINEL)
}

/// Gateway events from parsed SSE blocks, ending at the done sentinel.
pub fn gateway_events<S>(blocks: S) -> BoxStream<'static, Result<GatewayEvent>>
where
    S: Stream<Item = Result<SseEvent>> + Send + 'static,
{
    blocks
        .scan(false, |closed, item| {
            future::ready(if *closed {
                None
            } else {
                *closed = is_done_sentinel(&item);
                Some(item)
            })
        })
        .filter_map(|item| {
            future::ready(match item {
                Ok(ev) if ev.data.trim() == DONE_SENTINEL => Some(Ok(GatewayEvent::Done {
                    final_output: serde_json::Value::Null,
                    conversation_id: None,
                    title: None,
                    links: vec![],
                })),
                Ok(ev) => decode_event(&ev).map(Ok),
                Err(e) => Some(Err(e)),
            })
        })
        .boxed()
}

impl ExecutionGateway for HttpGateway {
    fn start_execution(&self, request: ExecutionRequest) -> BoxFuture<'_, Result<EventChannel>> {
        Box::pin(async move {
            let url = self.config.execute_url();
            debug!(url = %url, nodes = request.nodes.len(), "Starting execution");

            let response = self
                .authorize(self.http.post(&url))
                .header("accept", "text/event-stream")
                .json(&request)
                .send()
                .await
                .map_err(|e| FlowsmithError::Gateway(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(FlowsmithError::Gateway(format!("HTTP {}: {}", status, body)));
            }

            let execution_id = response
                .headers()
                .get(EXECUTION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            info!(execution_id = ?execution_id, "Execution channel open");

            let events = gateway_events(SseStream::new(response.bytes_stream()));

            Ok(EventChannel::new(execution_id, events))
        })
    }

    fn cancel(&self, execution_id: &str) -> BoxFuture<'_, Result<()>> {
        let url = self.cancel_url(execution_id);
        Box::pin(async move {
            let response = self
                .authorize(self.http.post(&url))
                .send()
                .await
                .map_err(|e| FlowsmithError::Gateway(e.to_string()))?;
            if !response.status().is_success() {
                return Err(FlowsmithError::Gateway(format!(
                    "cancel failed: HTTP {}",
                    response.status()
                )));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_core::types::Phase;

    fn sse(event_type: Option<&str>, data: &str) -> SseEvent {
        SseEvent {
            event_type: event_type.map(str::to_string),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_decode_tagged_data() {
        let ev = decode_event(&sse(None, r#"{"type":"phase","phase":"analyzing"}"#)).unwrap();
        assert_eq!(ev, GatewayEvent::Phase { phase: Phase::Analyzing });
    }

    #[test]
    fn test_decode_uses_event_name_when_untagged() {
        let ev = decode_event(&sse(Some("token"), r#"{"content":"Hel"}"#)).unwrap();
        assert_eq!(ev, GatewayEvent::Token { content: "Hel".into() });
    }

    #[test]
    fn test_decode_skips_noise() {
        assert!(decode_event(&sse(Some("ping"), "{}")).is_none());
        assert!(decode_event(&sse(None, "not json")).is_none());
        assert!(decode_event(&sse(None, r#"{"type":"heartbeat"}"#)).is_none());
    }

    #[test]
    fn test_done_sentinel() {
        assert!(is_done_sentinel(&Ok(sse(None, "[DONE]"))));
        assert!(!is_done_sentinel(&Ok(sse(None, r#"{"type":"done"}"#))));
    }

    #[tokio::test]
    async fn test_sentinel_closes_as_done() {
        let blocks = futures::stream::iter(vec![
            Ok(sse(Some("token"), r##"{"content":"# Notes"}"##)),
            Ok(sse(None, "[DONE]")),
            Ok(sse(Some("token"), r#"{"content":"late"}"#)),
        ]);
        let events: Vec<GatewayEvent> = gateway_events(blocks)
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], GatewayEvent::Token { content: "# Notes".into() });
        assert!(matches!(
            &events[1],
            GatewayEvent::Done { final_output: serde_json::Value::Null, .. }
        ));
    }

    #[test]
    fn test_urls() {
        let mut config = GatewayConfig::new("https://exec.example.com/");
        config.api_key = Some("secret".into());
        let gateway = HttpGateway::new(config).unwrap();
        assert_eq!(
            gateway.cancel_url("run-42"),
            "https://exec.example.com/api/executions/run-42/cancel"
        );
    }
}
