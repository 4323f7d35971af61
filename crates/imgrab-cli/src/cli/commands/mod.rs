//! CLI command handlers, one per file.

mod agent;
mod get;
mod serve;

pub use agent::run_agent;
pub use get::run_get;
pub use serve::run_serve;
