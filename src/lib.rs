//! Library root — the binary entry point is `src/main.rs`; integration tests
//! and the binary both reach the internals through here.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod subsystems;
pub mod supervisor;
