//! Event system for crewflow
//!
//! This crate provides the event bus and the workflow lifecycle events
//! published while pipelines run.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
