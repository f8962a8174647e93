pub mod connection;
pub mod dispatcher;
pub mod registry;

pub use connection::{ConnectionConfig, handle_connection};
pub use dispatcher::{BroadcastDispatcher, PublishReport};
pub use registry::{ConnectionId, ConnectionRegistry, Registration};
