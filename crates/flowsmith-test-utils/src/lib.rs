pub mod fixtures;
pub mod mock_gateway;

pub use mock_gateway::MockGateway;
