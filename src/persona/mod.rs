//! Persona catalog and prompt assembly.
//!
//! A persona is a named conversational role (recruiter, investor, ...). The
//! catalog maps keys to personas with a fixed fallback, and the prompt
//! builder turns a persona plus optional situational context into the final
//! instruction text for the realtime engine.

pub mod catalog;
pub mod prompt;
pub mod types;

pub use catalog::PersonaCatalog;
