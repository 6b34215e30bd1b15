pub mod execution;
pub mod report;
pub mod stage;

pub use execution::*;
pub use report::*;
pub use stage::*;
