//! Building and starting the configured breakers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::breaker::{BreakerResult, BreakerTasks, Hystrix};
use crate::config::{BreakerEntry, HystrixConfig};
use crate::lifecycle::Shutdown;

/// Extended data attached to daemon-managed breakers: the entry description.
pub type Description = String;

/// The running breakers of a daemon, keyed by id.
pub struct BreakerSet {
    breakers: HashMap<String, Hystrix<Description>>,
    tasks: Vec<BreakerTasks>,
}

/// Build one breaker for an entry, with logging transition callbacks.
pub fn build_breaker(entry: &BreakerEntry) -> BreakerResult<Hystrix<Description>> {
    let breaker = Hystrix::new(&entry.settings, None, None)?;
    breaker.set_id(entry.id.clone());
    if let Some(description) = &entry.description {
        breaker.set_extended_data(description.clone());
    }

    breaker.register_on_trigger_hystrix(Arc::new(|h: &Hystrix<Description>| {
        let description = h.extended_data().map(|d| d.to_string()).unwrap_or_default();
        tracing::warn!(
            breaker = %h.id(),
            description = %description,
            failures = h.counter().count(),
            "Dependency marked as failed"
        );
    }));
    breaker.register_on_trigger_alive(Arc::new(|h: &Hystrix<Description>| {
        let description = h.extended_data().map(|d| d.to_string()).unwrap_or_default();
        tracing::info!(
            breaker = %h.id(),
            description = %description,
            "Dependency marked as alive"
        );
    }));

    Ok(breaker)
}

/// Build every configured breaker, then start them all.
///
/// Nothing is started if any entry fails to build.
pub fn start_breakers(config: &HystrixConfig, shutdown: &Shutdown) -> BreakerResult<BreakerSet> {
    let breakers = config
        .breakers
        .iter()
        .map(|entry| -> BreakerResult<_> { Ok((entry.id.clone(), build_breaker(entry)?)) })
        .collect::<BreakerResult<HashMap<_, _>>>()?;

    let tasks = breakers.values().map(|b| b.start(shutdown)).collect();

    tracing::info!(count = breakers.len(), "Breakers started");
    Ok(BreakerSet { breakers, tasks })
}

impl BreakerSet {
    pub fn get(&self, id: &str) -> Option<&Hystrix<Description>> {
        self.breakers.get(id)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Apply reloaded tuning to breakers that already run. Entries for
    /// unknown ids are skipped; adding breakers needs a restart.
    pub fn apply(&self, config: &HystrixConfig) {
        for entry in &config.breakers {
            match self.breakers.get(&entry.id) {
                Some(breaker) => {
                    if let Err(e) = breaker.apply_config(&entry.settings) {
                        tracing::error!(breaker = %entry.id, error = %e, "Rejected breaker update");
                    }
                    match &entry.description {
                        Some(description) => breaker.set_extended_data(description.clone()),
                        None => breaker.clear_extended_data(),
                    }
                }
                None => {
                    tracing::warn!(breaker = %entry.id, "New breaker in config ignored until restart");
                }
            }
        }
    }

    /// Wait for every loop to exit.
    pub async fn join(self) {
        for tasks in self.tasks {
            tasks.join().await;
        }
    }
}
