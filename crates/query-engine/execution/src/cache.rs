//! A cache of entity models, one per connection, and the task that periodically
//! clears it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use query_engine_metadata::metadata::EntityModel;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::error::Error;
use crate::metrics;

/// Identifies the database connection a model was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub String);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let ConnectionId(name) = self;
        write!(f, "{name}")
    }
}

type Slot = Arc<OnceCell<Arc<EntityModel>>>;

/// Entity models by connection. Concurrent requests for the same connection share a
/// single build.
#[derive(Debug)]
pub struct ModelCache {
    slots: RwLock<HashMap<ConnectionId, Slot>>,
    metrics: metrics::Metrics,
}

impl ModelCache {
    pub fn new(metrics: metrics::Metrics) -> Self {
        ModelCache {
            slots: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Return the cached model for `connection`, building it with `build` if there is
    /// none. A failed build is attempted once more before the error is returned; a
    /// failure leaves nothing cached.
    pub async fn get_or_build<F, Fut>(
        &self,
        connection: &ConnectionId,
        build: F,
    ) -> Result<Arc<EntityModel>, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<EntityModel, Error>>,
    {
        let slot = self.slot(connection).await;
        let build = &build;
        let metrics = &self.metrics;
        let build_once = move || async move {
            let model = build()
                .instrument(info_span!("Build entity model", connection = %connection))
                .await?;
            metrics.record_model_build();
            Ok::<_, Error>(Arc::new(model))
        };

        match slot.get_or_try_init(build_once).await {
            Ok(model) => Ok(model.clone()),
            Err(error) => {
                tracing::warn!(connection = %connection, error = %error, "entity model build failed, retrying");
                slot.get_or_try_init(build_once).await.cloned()
            }
        }
    }

    /// Drop every cached model. Builds already running complete into their own slot
    /// and are not visible to later calls.
    pub async fn clear(&self) {
        self.slots.write().await.clear();
        self.metrics.record_cache_clear();
        tracing::info!("entity model cache cleared");
    }

    async fn slot(&self, connection: &ConnectionId) -> Slot {
        if let Some(slot) = self.slots.read().await.get(connection) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(connection.clone())
            .or_default()
            .clone()
    }
}

/// A background task clearing a cache at a fixed interval. Stopped when dropped.
#[derive(Debug)]
pub struct CacheSweeper {
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Start sweeping `cache` every `interval`. The first sweep happens one interval
    /// after start.
    pub fn start(cache: Arc<ModelCache>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.clear().await;
            }
        });
        CacheSweeper {
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
