//! Metrics setup and update for the service.

use prometheus::core::{AtomicF64, AtomicI64, AtomicU64, GenericCounter, GenericGauge};
use std::time::Duration;

/// The collection of all metrics exposed through the `/metrics` endpoint.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub query_total: GenericCounter<AtomicU64>,
    pub mutation_total: GenericCounter<AtomicU64>,
    pub batch_operation_total: GenericCounter<AtomicU64>,
    pub model_build_total: GenericCounter<AtomicU64>,
    pub cache_clear_total: GenericCounter<AtomicU64>,
    pub pool_size: GenericGauge<AtomicI64>,
    pub pool_idle_count: GenericGauge<AtomicI64>,
    pub pool_active_count: GenericGauge<AtomicI64>,
    pub pool_max_connections: GenericGauge<AtomicI64>,
    pub pool_acquire_timeout: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Set up counters and gauges used to produce Prometheus metrics
    pub fn initialize(metrics_registry: &mut prometheus::Registry) -> Result<Self, prometheus::Error> {
        let query_total = add_int_counter_metric(
            metrics_registry,
            "odata_producer_query_total",
            "Total successful queries.",
        )?;

        let mutation_total = add_int_counter_metric(
            metrics_registry,
            "odata_producer_mutation_total",
            "Total successful mutations.",
        )?;

        let batch_operation_total = add_int_counter_metric(
            metrics_registry,
            "odata_producer_batch_operation_total",
            "Total operations processed within batch requests.",
        )?;

        let model_build_total = add_int_counter_metric(
            metrics_registry,
            "odata_producer_model_build_total",
            "Total entity models built from the database schema.",
        )?;

        let cache_clear_total = add_int_counter_metric(
            metrics_registry,
            "odata_producer_cache_clear_total",
            "Total clears of the entity model cache.",
        )?;

        let pool_size = add_int_gauge_metric(
            metrics_registry,
            "odata_producer_pool_size",
            "The number of connections currently active. This includes idle connections.",
        )?;

        let pool_idle_count = add_int_gauge_metric(
            metrics_registry,
            "odata_producer_pool_idle",
            "The number of connections active and idle (not in use).",
        )?;

        let pool_active_count = add_int_gauge_metric(
            metrics_registry,
            "odata_producer_pool_active",
            "The number of connections current active. This does not include idle connections.",
        )?;

        let pool_max_connections = add_int_gauge_metric(
            metrics_registry,
            "odata_producer_pool_max_connections",
            "The maximum number of connections that this pool should maintain.",
        )?;

        let pool_acquire_timeout = add_gauge_metric(
            metrics_registry,
            "odata_producer_pool_acquire_timeout",
            "Get the maximum amount of time to spend waiting for a connection, in seconds.",
        )?;

        Ok(Self {
            query_total,
            mutation_total,
            batch_operation_total,
            model_build_total,
            cache_clear_total,
            pool_size,
            pool_idle_count,
            pool_active_count,
            pool_max_connections,
            pool_acquire_timeout,
        })
    }

    pub fn record_successful_query(&self) {
        self.query_total.inc();
    }

    pub fn record_successful_mutation(&self) {
        self.mutation_total.inc();
    }

    pub fn record_batch_operation(&self) {
        self.batch_operation_total.inc();
    }

    pub fn record_model_build(&self) {
        self.model_build_total.inc();
    }

    pub fn record_cache_clear(&self) {
        self.cache_clear_total.inc();
    }

    /// Update all pool gauges from the current state of the pool.
    pub fn update_pool_metrics(&self, pool: &sqlx::SqlitePool) {
        let pool_size: i64 = pool.size().into();
        self.pool_size.set(pool_size);

        let pool_idle: i64 = pool.num_idle().try_into().unwrap_or(i64::MAX);
        self.pool_idle_count.set(pool_idle);

        self.pool_active_count.set(pool_size - pool_idle);

        let pool_options = pool.options();

        let max_connections: i64 = pool_options.get_max_connections().into();
        self.pool_max_connections.set(max_connections);

        let acquire_timeout: Duration = pool_options.get_acquire_timeout();
        self.pool_acquire_timeout.set(acquire_timeout.as_secs_f64());
    }
}

/// Create a new int counter metric and register it with the provided Prometheus Registry
fn add_int_counter_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericCounter<AtomicU64>, prometheus::Error> {
    let int_counter =
        prometheus::IntCounter::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_counter.clone()))?;
    Ok(int_counter)
}

/// Create a new int gauge metric and register it with the provided Prometheus Registry
fn add_int_gauge_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicI64>, prometheus::Error> {
    let int_gauge =
        prometheus::IntGauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_gauge.clone()))?;
    Ok(int_gauge)
}

/// Create a new gauge metric and register it with the provided Prometheus Registry
fn add_gauge_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicF64>, prometheus::Error> {
    let gauge = prometheus::Gauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}
