//! Realtime speech engine
//!
//! - `traits`: [`RealtimeEngine`] and the session configuration it accepts
//! - `events`: OpenAI Realtime wire events
//! - `openai`: WebSocket engine client
//! - `mock`: scripted engine for tests and `simulate`

pub mod events;
pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockEngine, MockEngineConfig};
pub use openai::{OpenAiConfig, OpenAiRealtimeEngine};
pub use traits::{AgentSpec, EngineConfig, EngineEvent, Modality, RealtimeEngine, RoomInputOptions};
