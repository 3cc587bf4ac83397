pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod registry;
pub mod template;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{FlowsmithError, Result};
pub use event::{GatewayEvent, SessionBus, SessionNotice};
pub use graph::{Edge, Node, WorkflowGraph};
pub use template::Template;
pub use types::*;
