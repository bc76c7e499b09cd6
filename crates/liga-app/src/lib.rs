// Library side of the `liga` binary, split out so the command handlers and
// scheduler can be tested without a process.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod scheduler;
