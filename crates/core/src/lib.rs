//! Domain types shared by the crewflow orchestrator and its HTTP surface.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, Result};
