//! Server module for Sentinel
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `health`: Keep-alive HTTP routes
//! - `init`: Bot startup and the run loop

pub mod config;
pub mod health;
mod init;
mod loader;

// Re-export public API
pub use init::run;
pub use loader::load_config;
