//! Configuration file watcher for hot reload.
//!
//! Only breaker tuning is applied on reload; adding or removing breakers
//! and observability changes need a restart.
//!
//! Editors tend to produce several modify events per save, so file events
//! only mark the config dirty. The file is re-read once the events have
//! been quiet for the debounce window, and a revision equal to the last
//! forwarded one is dropped, so each breaker sees one `apply_config` per
//! real change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time;

use crate::config::loader::load_config;
use crate::config::schema::HystrixConfig;

/// Quiet period after the last file event before reloading.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches the config file and forwards every new valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    current: Option<HystrixConfig>,
    update_tx: mpsc::UnboundedSender<HystrixConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HystrixConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                current: None,
                update_tx,
            },
            update_rx,
        )
    }

    /// The config already running, so an unchanged file is not re-applied.
    pub fn starting_from(mut self, config: HystrixConfig) -> Self {
        self.current = Some(config);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. The returned handle must be kept alive; dropping it
    /// also stops the reload task. Must be called from within a tokio
    /// runtime.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(
            path = ?self.path,
            debounce_ms = self.debounce.as_millis() as u64,
            "Config watcher started"
        );

        tokio::spawn(forward_reloads(
            self.path,
            self.debounce,
            self.current,
            event_rx,
            self.update_tx,
        ));
        Ok(watcher)
    }
}

/// Turn bursts of file events into at most one reload each, forwarding
/// only revisions that differ from the last one sent.
///
/// Returns when either channel closes.
pub async fn forward_reloads(
    path: PathBuf,
    debounce: Duration,
    mut current: Option<HystrixConfig>,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<HystrixConfig>,
) {
    while events.recv().await.is_some() {
        let mut coalesced = 0usize;
        loop {
            match time::timeout(debounce, events.recv()).await {
                Ok(Some(())) => coalesced += 1,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::info!(path = ?path, coalesced, "Config file change detected, reloading");
        let new_config = match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current settings");
                continue;
            }
        };

        if current.as_ref() == Some(&new_config) {
            tracing::debug!(path = ?path, "Config unchanged, nothing to apply");
            continue;
        }

        current = Some(new_config.clone());
        if updates.send(new_config).is_err() {
            tracing::debug!("Config update receiver dropped");
            return;
        }
    }
}
