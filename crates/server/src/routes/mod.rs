pub mod event_stream;
mod health;
pub mod workflows;

pub use health::*;
pub use workflows::*;
