//! dirscout common library
//!
//! Shared storage primitives, error handling and logging for the dirscout
//! workspace.
//!
//! # Overview
//!
//! - **Checkpoints**: per-(source, stage) record sequences, rewritten
//!   atomically on every save
//! - **Error log**: append-only JSON-lines log of per-item failures
//! - **Error Handling**: [`DirscoutError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use dirscout_common::checkpoint::{CheckpointStore, Namespace};
//!
//! fn main() -> dirscout_common::Result<()> {
//!     let store = CheckpointStore::open("./data", "french-tech", Namespace::Live)?;
//!     let mut names = store.checkpoint::<String>("list")?;
//!     names.append(["Acme".to_string()])?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checkpoint;
pub mod error;
pub mod error_log;
pub mod logging;

// Re-export commonly used types
pub use error::{DirscoutError, Result};
