//! Room gateway protocol
//!
//! JSON text frames over WebSocket. Every frame is an envelope carrying an
//! id, a timestamp, the protocol version and a typed payload.

mod messages;
mod version;

pub use messages::*;
pub use version::*;
