//! Room transport
//!
//! The audio room platform, seen through the [`RoomTransport`] trait. The
//! gateway client is the production implementation; the mock drives tests
//! and the `simulate` command.

pub mod gateway;
pub mod mock;
pub mod traits;

pub use gateway::{GatewayConfig, GatewayRoom};
pub use mock::{MockRoom, MockRoomConfig};
pub use traits::{
    AutoSubscribe, RemoteParticipant, RoomBinding, RoomEvent, RoomTransport, TrackKind,
};
