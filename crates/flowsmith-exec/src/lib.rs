//! Execution side of a builder session.
//!
//! [`state`] is a pure reducer over [`ExecutionEvent`]s. [`machine`] maps
//! gateway events onto it and the stream [`transcript`]. [`runner`] drives a
//! live channel and [`session`] owns the graph, the parameters and the single
//! execution allowed in flight.

pub mod files;
pub mod machine;
pub mod output;
pub mod params;
pub mod runner;
pub mod session;
pub mod state;
pub mod transcript;
pub mod validate;

pub use machine::ExecutionMachine;
pub use output::{Download, ResultDownload};
pub use params::{ParamKey, ParamStore};
pub use runner::run_channel;
pub use session::BuilderSession;
pub use state::{progress_for, ExecutionEvent, ExecutionSnapshot, ExecutionState};
pub use transcript::{CompletionEntry, ToolCallRecord, Transcript};
pub use validate::{input_nodes, missing_inputs, validate_inputs};
