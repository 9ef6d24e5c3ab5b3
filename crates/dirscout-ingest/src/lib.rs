//! dirscout ingestion pipeline
//!
//! Collects entities from a directory site and enriches them in five
//! checkpointed stages:
//!
//! ```text
//! list ──▶ details ──▶ registry ──▶ social ──▶ export
//! ```
//!
//! Every stage reads the previous stage's checkpoint plus its own partial
//! output, skips what is already done and persists after each item, so an
//! interrupted run picks up where it stopped.
//!
//! # Collaborators
//!
//! Each external dependency sits behind a trait so stages can be driven by
//! in-process fakes:
//!
//! - [`adapters::SourceAdapter`]: directory listing and detail pages
//! - [`registry::RegistrySearch`] and [`registry::GeoLabels`]: company registry
//! - [`social::BrowserLauncher`] and [`social::WebSearch`]: profile discovery

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod social;
pub mod stages;

pub use config::PipelineConfig;
pub use error::{IngestError, Result};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
pub use stages::{Stage, StageReport};
