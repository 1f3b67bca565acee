//! Command-execution subsystem (spec §4.13): a controlled local subprocess
//! wrapper driven by the same parameter-mapping machinery the HTTP pipeline
//! uses, surfaced as tools through `CommandHandler`.

pub mod execution;
pub mod handler;

pub use execution::{execute, ExecutionConfig, ExecutionResult};
pub use handler::CommandHandler;
