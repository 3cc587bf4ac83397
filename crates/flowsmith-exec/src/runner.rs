use std::sync::Arc;
use std::time::Instant;

use flowsmith_core::event::{GatewayEvent, SessionBus, SessionNotice};
use flowsmith_core::traits::EventChannel;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::machine::ExecutionMachine;
use crate::state::ExecutionSnapshot;

/// Message recorded when a channel ends without `done` or `error`.
pub const CHANNEL_CLOSED: &str = "Execution channel closed before the run finished";

/// Drive `channel` into `machine` until a terminal event or cancellation.
///
/// Every applied event publishes a fresh snapshot on `snapshots`. A title on
/// `done` and the terminal phase are announced on `bus`. On cancellation the
/// machine is returned as-is and nothing more is published.
pub async fn run_channel(
    mut channel: EventChannel,
    mut machine: ExecutionMachine,
    snapshots: Arc<watch::Sender<ExecutionSnapshot>>,
    bus: SessionBus,
    cancel: CancellationToken,
) -> ExecutionMachine {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(execution_id = ?channel.execution_id, "Execution subscription cancelled");
                return machine;
            }
            next = channel.events.next() => next,
        };

        let applied = match next {
            Some(Ok(event)) => {
                if let GatewayEvent::Done {
                    conversation_id,
                    title: Some(title),
                    ..
                } = &event
                {
                    bus.publish(SessionNotice::TitleUpdated {
                        conversation_id: conversation_id.clone(),
                        title: title.clone(),
                    });
                }
                machine.apply(event, Instant::now())
            }
            Some(Err(e)) => {
                warn!(error = %e, "Execution channel failed");
                machine.fail(e.to_string())
            }
            None => {
                warn!("Execution channel closed early");
                machine.fail(CHANNEL_CLOSED)
            }
        };

        if applied {
            snapshots.send_replace(machine.snapshot());
        }

        if machine.is_terminal() {
            let phase = machine.state().phase();
            info!(phase = %phase, progress = machine.state().progress(), "Execution finished");
            bus.publish(SessionNotice::ExecutionFinished { phase });
            debug!(execution_id = ?channel.execution_id, "Closing execution channel");
            return machine;
        }
    }
}
