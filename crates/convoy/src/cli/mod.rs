//! CLI command implementations.

mod display;

pub mod analyze;
pub mod chain;
pub mod circular;
pub mod execute;
pub mod importance;
pub mod init;
pub mod plan;
