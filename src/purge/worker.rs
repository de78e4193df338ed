use crate::adapter::LifecycleAdapter;
use crate::clock::Clock;
use crate::core::{Result, ScopeError};
use crate::facade::SharedScopeStore;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a background task that sweeps a shared store on a fixed period.
pub struct PurgeWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl PurgeWorker {
    /// Signal the task and wait for it to finish its current tick.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| ScopeError::Worker(format!("purge worker join: {}", err)))?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for PurgeWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

/// Run `purge_now` on `store` every `interval` (at least 10ms).
///
/// Must be called from within a Tokio runtime. The task exits on `stop`, on
/// drop of the handle, or when the store's lock is poisoned.
pub fn spawn_purge_worker<A, C>(store: SharedScopeStore<A, C>, interval: Duration) -> PurgeWorker
where
    A: LifecycleAdapter + 'static,
    C: Clock + 'static,
{
    let interval = interval.max(MIN_INTERVAL);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    break;
                }
                _ = sleep(interval) => {
                    match store.lock() {
                        Ok(mut guard) => {
                            let report = guard.purge_now();
                            debug!(removed = report.removed.len(), "background purge tick");
                        }
                        Err(err) => {
                            warn!(error = %err, "scope store lock poisoned; purge worker exiting");
                            break;
                        }
                    }
                }
            }
        }
    });

    PurgeWorker {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ManualAdapter;
    use crate::clock::ManualClock;
    use crate::config::ScopeConfig;
    use crate::core::ScopeId;
    use crate::facade::ScopeStore;

    #[tokio::test]
    async fn test_worker_purges_and_stops() {
        let clock = ManualClock::new(0);
        let config = ScopeConfig::new()
            .ttl(Duration::from_millis(100))
            .purge_interval(Duration::from_millis(100));
        let store = ScopeStore::with_clock(config, ManualAdapter::new(), clock.clone())
            .unwrap()
            .shared();

        store.lock().unwrap().on_create(ScopeId(1), None);
        clock.advance(Duration::from_secs(1));

        let worker = spawn_purge_worker(store.clone(), Duration::from_millis(10));
        for _ in 0..200 {
            if store.lock().unwrap().size().live_count == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(store.lock().unwrap().size().live_count, 0);
        worker.stop().await.unwrap();
    }
}
