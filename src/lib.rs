//! Docfinder Core Library
//!
//! Resolves publication landing-page URLs to the document or dataset they
//! lead to, while learning per-domain health on the way.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Run-wide settings and their validation
//! - [`domain`] - Domain keys, health records, politeness spacing
//! - [`classify`] - Pure content classification and URL rule tables
//! - [`connection`] - The only component that talks to the network
//! - [`resolve`] - Redirect following, the resolution state machine, the worker pool
//! - [`frontier`] - Link extraction and the per-page crawl driver
//! - [`storage`] - Retrieval of confirmed resources to disk
//! - [`input`] / [`output`] - JSON-lines records in and out

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod config;
pub mod connection;
pub mod domain;
pub mod frontier;
pub mod input;
pub mod output;
pub mod resolve;
pub mod storage;
pub mod user_agent;

// Re-export commonly used types
pub use classify::{ClassifyInput, ContentKind, ResourceFamilies, classify};
pub use config::{ConfigError, EngineConfig};
pub use connection::{Attempt, ConnectionError, ConnectionManager};
pub use domain::{BlockReason, DomainHealthStore, FailureCategory};
pub use frontier::{HrefExtractor, LinkExtractor, PageCrawler};
pub use input::{InputBatch, InputError, parse_input};
pub use output::{OutputError, RecordWriter};
pub use resolve::{
    AlreadyFoundIndex, Locator, OutcomeKind, OutcomeRecord, PoolStats, PoolSummary,
    ResolutionEngine, ResolutionOutcome, ResolveError, Role, WorkerPool,
};
pub use storage::{DirectoryStore, FileStore, StoreError};
