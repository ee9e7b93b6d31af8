//! Adaptive per-domain knowledge: health records, 403 path blocking,
//! failure counters with leniency, and politeness spacing.

mod health;
mod key;
mod politeness;

pub use health::{
    BlockReason, DomainHealthRecord, DomainHealthStore, FailureCategory, FailureVerdict,
    PathVerdict, StatusVerdict,
};
pub use key::{UNKNOWN_DOMAIN, domain_key, domain_of, domain_of_str, path_of};
pub use politeness::politeness_delay;
