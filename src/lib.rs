// bulkpatch - batch patching of directory trees that contain zip archives
//
// This is the library crate containing the pipeline and its data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigLoader};
pub use metrics::{RunMetrics, RunSummary};
pub use models::{Configuration, MainConfig, PendingArchiveSet, PipelineStage, PipelineState};
pub use pipeline::{
    JoinStatus, Pipeline, PipelineHandle, PipelineOutcome, ProgressObserver, StopHandle,
    StopSignal, run_from_config_path, stop_channel,
};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
