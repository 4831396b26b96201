// WebSocket transport layer for the chat engine.

pub mod connection;
pub mod endpoint;

pub use connection::{connect, ConnectionHandle, SocketCommand, SocketEvent};
pub use endpoint::ws_endpoint;
