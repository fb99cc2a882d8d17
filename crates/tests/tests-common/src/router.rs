//! Routers over a test database.

use odata_producer::state::{create_state, ServerState};
use odata_producer_configuration::environment::FixedEnvironment;
use odata_producer_configuration::version1::DEFAULT_CONNECTION_URI_VARIABLE;
use odata_producer_configuration::{make_runtime_configuration, ParsedConfiguration};

use crate::database::TestDatabase;

/// Creates a router with a fresh state over `database`, using the initial
/// configuration.
pub async fn create_router(database: &TestDatabase) -> anyhow::Result<(axum::Router, ServerState)> {
    create_router_with(database, |_| {}).await
}

/// Creates a router with a fresh state over `database`, after `customize` has
/// adjusted the initial configuration. The connection URI is read from the default
/// environment variable.
pub async fn create_router_with(
    database: &TestDatabase,
    customize: impl FnOnce(&mut ParsedConfiguration),
) -> anyhow::Result<(axum::Router, ServerState)> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut parsed = ParsedConfiguration::initial();
    parsed.cache.sweep_interval_seconds = 0;
    customize(&mut parsed);
    let environment = FixedEnvironment::new([(DEFAULT_CONNECTION_URI_VARIABLE, database.uri.as_str())]);
    let configuration =
        make_runtime_configuration(parsed, database.directory(), environment).await?;

    let state = create_state(configuration).await?;
    Ok((odata_producer::routes::create_router(state.clone()), state))
}
