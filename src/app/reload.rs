use std::{collections::HashMap, path::PathBuf, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use crate::sources::{FileEvent, FileWatcher};

use super::service::WeakAppService;

/// Spawns the reload loop.
///
/// Events are collected until the debounce window passes without a new
/// one, then the file layer is reloaded once for the whole batch. The stop
/// signal is checked first on every turn, so no reload starts after it
/// fires. Dropping the last service handle also drops the stop sender,
/// which ends the task.
pub(super) fn spawn(
    service: WeakAppService,
    mut watcher: FileWatcher,
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    mut stop: oneshot::Receiver<()>,
    debounce: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

        let debounce_sleep = time::sleep(debounce);
        tokio::pin!(debounce_sleep);

        loop {
            tokio::select! {
                biased;

                _ = &mut stop => {
                    debug!("config watcher received stop signal");
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("file watcher channel closed");
                        break;
                    };

                    debug!(path = %event.path.display(), kind = ?event.kind, "config file event");
                    pending.insert(event.path, Instant::now());
                    debounce_sleep.as_mut().reset(Instant::now() + debounce);
                }

                _ = &mut debounce_sleep, if !pending.is_empty() => {
                    info!(files = pending.len(), "Config files changed; reloading");
                    pending.clear();

                    let Some(service) = service.upgrade() else {
                        debug!("service dropped; config watcher exiting");
                        break;
                    };

                    if let Err(e) = service.reload_config() {
                        warn!(error = %e, "Failed to reload config");
                    }

                    if let Err(e) = watcher.update_watched_files(&service.watched_files()) {
                        warn!(error = %e, "Failed to update watched files");
                    }
                }
            }
        }
    })
}
