//! # tally-shared
//!
//! Wire protocol frames, id newtypes and constants shared by every tally
//! crate. The server speaks JSON on both the REST and WebSocket surfaces,
//! so everything here derives `Serialize`/`Deserialize`.

pub mod constants;
pub mod protocol;
pub mod types;

mod error;

pub use error::ProtocolError;
