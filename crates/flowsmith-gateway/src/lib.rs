pub mod http;
pub mod streaming;

pub use http::HttpGateway;
pub use streaming::{SseEvent, SseParser, SseStream};
