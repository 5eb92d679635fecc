//! Practice session lifecycle
//!
//! - `context`: participant metadata and the resolved persona/prompt
//! - `policy`: the fixed turn-detection policy
//! - `state`: forward-only session state machine
//! - `observer`: passive lifecycle callbacks
//! - `orchestrator`: drives a session end to end

pub mod context;
pub mod observer;
pub mod orchestrator;
pub mod policy;
pub mod state;

pub use context::SessionContext;
pub use observer::{EventRecorder, LifecycleEvent, LifecycleObserver, LoggingObserver};
pub use orchestrator::{SessionOrchestrator, SessionSettings, SessionSummary};
pub use policy::{configure_turn_detection, TurnDetectionPolicy};
pub use state::{SessionState, StateTracker};
