//! Client-side core of the qualcode dashboard: long-running task
//! orchestration, the pre-commit deduplication gate and the error channel.

pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod task;
pub mod transport;
