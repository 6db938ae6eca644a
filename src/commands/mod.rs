//! Command implementations for the CLI
//!
//! - start: Start the gateway server
//! - test: Check configuration and backend reachability
//! - config: Configuration display and validation

pub mod config;
pub mod start;
