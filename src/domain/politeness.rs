//! Per-domain politeness spacing.
//!
//! The wait decision and the "last contacted" update happen under the
//! domain's own async lock, so two workers aimed at the same domain cannot
//! both conclude that no wait is needed. Workers on other domains never touch
//! that lock. The request itself runs after the lock is released.

use std::sync::atomic::Ordering;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::health::DomainHealthStore;
use super::key::domain_key;
use crate::config::PolitenessBand;

/// Warn once a single domain has made the run wait this long in total.
const CUMULATIVE_WAIT_WARNING_THRESHOLD: Duration = Duration::from_secs(600);

/// Delay owed before the next contact, given the time since the last one.
///
/// `None` when the band is disabled or enough time has already passed.
/// Otherwise a random target in `min..=max` minus `elapsed`.
#[must_use]
pub fn politeness_delay(band: &PolitenessBand, elapsed: Duration) -> Option<Duration> {
    if band.is_disabled() || elapsed >= band.min {
        return None;
    }
    let target = if band.max > band.min {
        #[allow(clippy::cast_possible_truncation)]
        let (min_ms, max_ms) = (band.min.as_millis() as u64, band.max.as_millis() as u64);
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    } else {
        band.min
    };
    Some(target.saturating_sub(elapsed))
}

impl DomainHealthStore {
    /// Waits until the domain may be contacted again, then stamps the
    /// contact time. Returns how long this call slept.
    ///
    /// The first contact with a domain never waits.
    #[instrument(skip(self), fields(domain))]
    pub async fn wait_for_turn(&self, domain: &str) -> Duration {
        if self.politeness.is_disabled() {
            return Duration::ZERO;
        }

        let key = domain_key(domain);
        tracing::Span::current().record("domain", key.as_str());

        // Clone the Arc out so no map shard lock is held across the await.
        let record = self.record(&key);
        let mut last = record.last_connected.lock().await;

        let mut slept = Duration::ZERO;
        if let Some(previous) = *last
            && let Some(delay) = politeness_delay(&self.politeness, previous.elapsed())
        {
            #[allow(clippy::cast_possible_truncation)]
            let delay_ms = delay.as_millis() as u64;
            let before = record
                .cumulative_wait_ms
                .fetch_add(delay_ms, Ordering::SeqCst);
            let total = Duration::from_millis(before + delay_ms);

            debug!(
                domain = %key,
                delay_ms,
                cumulative_ms = total.as_millis(),
                "applying politeness delay"
            );
            if Duration::from_millis(before) < CUMULATIVE_WAIT_WARNING_THRESHOLD
                && total >= CUMULATIVE_WAIT_WARNING_THRESHOLD
            {
                warn!(
                    domain = %key,
                    cumulative_wait_secs = total.as_secs(),
                    "domain dominates politeness waiting"
                );
            }

            tokio::time::sleep(delay).await;
            slept = delay;
        }

        *last = Some(Instant::now());
        slept
    }
}
