//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `ProgressTracker`: thread-safe, disk-backed record of completed keys and errors
//! - `RunMode`: which manifest entries a run dispatches
//! - `BatchState`: lifecycle of one remote import batch

mod batch_state;
mod progress;
mod run_mode;

// Re-export main types
pub use batch_state::BatchState;
pub use progress::{CompletionMeta, ErrorRecord, ProgressState, ProgressStats, ProgressTracker};
pub use run_mode::RunMode;
