mod faults;
mod fixtures;
mod mock_server;

pub use faults::FaultyTransport;
pub use fixtures::*;
pub use mock_server::MockConfigServer;
