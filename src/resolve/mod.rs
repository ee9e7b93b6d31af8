//! Resolution of locators to classified outcomes.
//!
//! [`ResolutionEngine`] drives one locator through connection, redirects and
//! classification. [`WorkerPool`] runs many of them concurrently through the
//! page crawler.

mod engine;
mod error;
mod found_index;
mod locator;
mod outcome;
mod pool;
mod redirect;

pub use engine::ResolutionEngine;
pub use error::ResolveError;
pub use found_index::AlreadyFoundIndex;
pub use locator::{Locator, Role, RolePolicy};
pub use outcome::{OutcomeKind, OutcomeRecord, ResolutionOutcome, UNREACHABLE_STATUS};
pub use pool::{PoolError, PoolStats, PoolSummary, WorkerPool};
pub use redirect::{FollowOutcome, RedirectResolver};
