// ABOUTME: Polls the config file and posts changed configurations to the control loop
//
// Invalid edits are logged and skipped so a typo never tears down live mappers.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ProxyConfig;
use crate::splitter::controller::ControllerHandle;

/// Watches a config file by modification time
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Start watching `path`, treating its current contents as already applied
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the file if it changed since the last check.
    ///
    /// Returns `None` when unchanged or when the new contents are invalid.
    pub fn check(&mut self) -> Option<ProxyConfig> {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return None;
        }
        self.last_modified = current;

        match ProxyConfig::load(&self.path) {
            Ok(config) => {
                info!("Config file {} changed, reloading", self.path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Ignoring invalid config change: {e:#}");
                None
            }
        }
    }

    /// Poll on `interval` and forward changes until the controller goes away
    pub fn spawn(mut self, interval: Duration, handle: ControllerHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // First tick fires immediately; the file was just loaded
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if let Some(config) = self.check() {
                    if handle.config_changed(config).is_err() {
                        debug!("Controller closed, stopping config watcher");
                        break;
                    }
                }
            }
        })
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
