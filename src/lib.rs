pub mod cli;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod fs;
pub mod invocation;
pub mod logging;
