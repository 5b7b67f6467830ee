//! # pageflow-core - Document Processing Data Model
//!
//! Core types shared across the pageflow workspace: processed documents and
//! their page thumbnails, processing strategies and configuration, file
//! analysis results, lifecycle state and metrics, and the closed error
//! taxonomy used by the retry layer.
//!
//! This crate is deliberately free of I/O and async machinery. Everything
//! here is plain data: the orchestration layer in `pageflow-pipeline` owns
//! the runtime behavior, and hosts can serialize any of these types across
//! an IPC or UI boundary unchanged.
//!
//! ## Quick Start
//!
//! ```rust
//! use pageflow_core::{select_strategy, ProcessingStrategy};
//!
//! // Strategy selection is a pure function of file size and page count.
//! let strategy = select_strategy(500 * 1024, Some(2));
//! assert_eq!(strategy, ProcessingStrategy::ImmediateFull);
//! ```
//!
//! ## Module Organization
//!
//! - [`document`] - Processed documents, pages, and thumbnail slots
//! - [`input`] - In-memory input files
//! - [`config`] - Strategies, quality tiers, and processing configuration
//! - [`analysis`] - File analysis results and the strategy decision table
//! - [`state`] - Lifecycle state snapshots and processing metrics
//! - [`error`] - Error taxonomy and the engine-boundary error type
//! - [`probe`] - Cheap magic-byte document probe

pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod input;
pub mod probe;
pub mod state;

pub use analysis::*;
pub use config::*;
pub use document::*;
pub use error::*;
pub use input::*;
pub use probe::*;
pub use state::*;
