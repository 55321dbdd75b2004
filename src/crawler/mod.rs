//! Crawler module for bulk scraping of a manifest
//!
//! This module contains the core dispatch logic, including:
//! - Retry schedules shared by page fetches and corpus imports
//! - Request pacing
//! - The bounded worker pool and per-entry pipeline
//! - Checkpointing and interrupt handling

mod coordinator;
mod scheduler;

pub use coordinator::{DispatchPlan, Orchestrator, RunOptions, RunSummary};
pub use scheduler::{Pacer, RetryPolicy};
