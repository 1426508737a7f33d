// ABOUTME: Library root for rollout - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod cancel;
pub mod cleanup;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod invoke;
pub mod output;
pub mod pipeline;
pub mod readiness;
pub mod report;
pub mod stage;
pub mod stages;
pub mod tunnel;
pub mod types;
