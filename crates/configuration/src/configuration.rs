//! Configuration for the connector.

use std::time::Duration;

use query_engine_metadata::metadata::CustomEntity;

use crate::values::PoolSettings;
use crate::version1::{BatchSettings, ServiceSettings};

/// The 'Configuration' type collects all the information necessary to serve requests at
/// runtime.
///
/// Values of this type are produced from a 'ParsedConfiguration' using
/// 'make_runtime_configuration', which resolves secrets, reads referenced files and
/// settles the batch flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub connection_name: String,
    pub connection_uri: String,
    pub pool_settings: PoolSettings,
    pub service: ServiceSettings,
    pub batch: BatchFlags,
    pub show_inline_error: bool,
    /// `None` when the cache is never swept.
    pub sweep_interval: Option<Duration>,
    pub custom_entities: Vec<CustomEntity>,
}

/// Batch processing flags after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFlags {
    pub transactional: bool,
    pub fast_fail: bool,
    pub allow_any_request_body: bool,
}

impl BatchFlags {
    /// A transactional batch always stops at the first failure.
    pub fn resolve(settings: BatchSettings) -> Self {
        BatchFlags {
            transactional: settings.transactional,
            fast_fail: settings.transactional || settings.fast_fail,
            allow_any_request_body: settings.allow_any_request_body,
        }
    }
}

impl Default for BatchFlags {
    fn default() -> Self {
        BatchFlags::resolve(BatchSettings::default())
    }
}
