use std::env;
use std::path::PathBuf;

use clap::Parser;

use odata_producer::routes::create_router;
use odata_producer::state::create_state;
use odata_producer_configuration::environment::ProcessEnvironment;
use odata_producer_configuration::{make_runtime_configuration, parse_configuration};

#[derive(Parser)]
#[command(version, about)]
struct ServerOptions {
    /// Directory holding `configuration.json`.
    #[arg(long, value_name = "DIRECTORY", env = "ODATA_CONFIGURATION_DIR")]
    configuration: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_options = ServerOptions::parse();
    env_logger::init();

    let parsed = parse_configuration(&server_options.configuration).await?;
    let configuration =
        make_runtime_configuration(parsed, &server_options.configuration, ProcessEnvironment).await?;
    let state = create_state(configuration).await?;
    let router = create_router(state);

    // allow server port to be set via PORT env var
    let port = env::var("PORT").unwrap_or("8080".to_string());
    let address = format!("0.0.0.0:{port}");
    tracing::info!(address = %address, "starting server");

    axum::Server::bind(&address.parse()?)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
