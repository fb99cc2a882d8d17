//! Transient state used by the service.
//!
//! This is initialized on startup.

use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{info_span, Instrument};

use odata_producer_configuration::{Configuration, PoolSettings};
use query_engine_execution::cache::{CacheSweeper, ConnectionId, ModelCache};
use query_engine_execution::{error, introspection, metrics};
use query_engine_metadata::metadata::EntityModel;

/// State shared by every request handler.
#[derive(Clone)]
pub struct ServerState {
    pub configuration: Arc<Configuration>,
    pub pool: SqlitePool,
    pub metrics: metrics::Metrics,
    pub metrics_registry: prometheus::Registry,
    pub cache: Arc<ModelCache>,
    /// Dropping the last handle stops the sweeper.
    sweeper: Option<Arc<CacheSweeper>>,
}

/// Create a connection pool, the metrics and the model cache, and start the cache
/// sweeper when a sweep interval is configured.
pub async fn create_state(configuration: Configuration) -> Result<ServerState, InitializationError> {
    let mut metrics_registry = prometheus::Registry::new();
    let metrics = async {
        metrics::Metrics::initialize(&mut metrics_registry)
            .map_err(InitializationError::MetricsError)
    }
    .instrument(info_span!("Setup metrics"))
    .await?;

    let pool = create_pool(&configuration.connection_uri, &configuration.pool_settings)
        .instrument(info_span!("Create connection pool"))
        .await
        .map_err(InitializationError::UnableToCreatePool)?;

    let cache = Arc::new(ModelCache::new(metrics.clone()));
    let sweeper = configuration.sweep_interval.map(|interval| {
        tracing::info!(interval_seconds = interval.as_secs(), "starting entity model cache sweeper");
        Arc::new(CacheSweeper::start(cache.clone(), interval))
    });

    Ok(ServerState {
        configuration: Arc::new(configuration),
        pool,
        metrics,
        metrics_registry,
        cache,
        sweeper,
    })
}

/// Create a connection pool with default settings.
async fn create_pool(
    connection_uri: &str,
    pool_settings: &PoolSettings,
) -> Result<SqlitePool, sqlx::Error> {
    let pool_options = SqlitePoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(pool_settings.pool_timeout))
        .idle_timeout(
            pool_settings
                .idle_timeout
                .map(std::time::Duration::from_secs),
        )
        .max_lifetime(
            pool_settings
                .connection_lifetime
                .map(std::time::Duration::from_secs),
        );

    pool_options.connect(connection_uri).await
}

impl ServerState {
    /// The cache key of the configured connection.
    pub fn connection_id(&self) -> ConnectionId {
        ConnectionId(self.configuration.connection_name.clone())
    }

    /// The entity model of the configured connection, built on first use.
    pub async fn entity_model(&self) -> Result<Arc<EntityModel>, error::Error> {
        let pool = &self.pool;
        let custom_entities = &self.configuration.custom_entities;
        self.cache
            .get_or_build(&self.connection_id(), move || async move {
                let mut connection = pool.acquire().await?;
                introspection::build_entity_model(&mut *connection, custom_entities).await
            })
            .await
    }

    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .as_ref()
            .is_some_and(|sweeper| sweeper.is_running())
    }
}

/// State initialization error.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("unable to initialize connection pool: {0}")]
    UnableToCreatePool(sqlx::Error),
    #[error("error initializing metrics: {0}")]
    MetricsError(prometheus::Error),
}
