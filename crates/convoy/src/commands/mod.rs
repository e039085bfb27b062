//! Command implementations shared by the CLI layer.

pub mod init;
