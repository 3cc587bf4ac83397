use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::event::GatewayEvent;
use flowsmith_core::traits::{EventChannel, ExecutionGateway, ExecutionRequest};

enum Script {
    Events { events: Vec<GatewayEvent>, hold_open: bool },
    Live(mpsc::UnboundedReceiver<GatewayEvent>),
    FailStart(String),
}

/// Gateway that replays scripted channels, one script per execution.
///
/// When no script is queued the channel finishes immediately with an empty
/// `done`.
#[derive(Default)]
pub struct MockGateway {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ExecutionRequest>>,
    cancelled: Mutex<Vec<String>>,
    started: Mutex<usize>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a channel that emits `events` and then closes.
    pub fn with_events(self, events: Vec<GatewayEvent>) -> Self {
        self.push(Script::Events { events, hold_open: false });
        self
    }

    /// Queue a channel that emits `events` and then stays open.
    pub fn with_events_held_open(self, events: Vec<GatewayEvent>) -> Self {
        self.push(Script::Events { events, hold_open: true });
        self
    }

    /// Queue a start request that fails before any channel opens.
    pub fn with_start_failure(self, message: impl Into<String>) -> Self {
        self.push(Script::FailStart(message.into()));
        self
    }

    /// Queue a channel fed by the returned sender.
    pub fn live_channel(&self) -> mpsc::UnboundedSender<GatewayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Script::Live(rx));
        tx
    }

    fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Execution ids passed to `cancel`.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl ExecutionGateway for MockGateway {
    fn start_execution(&self, request: ExecutionRequest) -> BoxFuture<'_, Result<EventChannel>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let script = self.scripts.lock().unwrap().pop_front();
            let execution_id = {
                let mut started = self.started.lock().unwrap();
                *started += 1;
                format!("mock-exec-{}", *started)
            };

            let events = match script {
                None => stream::iter(vec![Ok(GatewayEvent::Done {
                    final_output: serde_json::Value::Null,
                    conversation_id: None,
                    title: None,
                    links: vec![],
                })])
                .boxed(),
                Some(Script::FailStart(message)) => return Err(FlowsmithError::Gateway(message)),
                Some(Script::Events { events, hold_open }) => {
                    let scripted = stream::iter(events.into_iter().map(Ok));
                    if hold_open {
                        scripted.chain(stream::pending()).boxed()
                    } else {
                        scripted.boxed()
                    }
                }
                Some(Script::Live(rx)) => stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|event| (Ok(event), rx))
                })
                .boxed(),
            };

            Ok(EventChannel::new(Some(execution_id), events))
        })
    }

    fn cancel(&self, execution_id: &str) -> BoxFuture<'_, Result<()>> {
        let id = execution_id.to_string();
        Box::pin(async move {
            self.cancelled.lock().unwrap().push(id);
            Ok(())
        })
    }
}
