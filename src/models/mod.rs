//! Data models for bulkpatch.
//!
//! - [`Configuration`]: root path plus the two substitution maps, loaded once per run
//! - [`MainConfig`]: the on-disk main configuration document
//! - [`PendingArchiveSet`]: directories created by expansion that still need recompressing
//! - [`PipelineState`] / [`PipelineStage`]: observable run state, wrapped by
//!   [`StateManager`](crate::state::StateManager)

pub mod config;
pub mod pending;
pub mod pipeline_state;

pub use config::{Configuration, FileSubstitutions, MainConfig, TextSubstitutions};
pub use pending::PendingArchiveSet;
pub use pipeline_state::{PipelineStage, PipelineState};
