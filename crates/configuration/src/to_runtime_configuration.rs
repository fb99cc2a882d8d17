//! Convert a parsed configuration into the runtime configuration.

use std::path::Path;
use std::time::Duration;

use query_engine_metadata::metadata::{self, CustomEntitiesSource, CustomEntity};

use crate::configuration::{BatchFlags, Configuration};
use crate::environment::Environment;
use crate::error::MakeRuntimeConfigurationError;
use crate::values::{ConnectionUri, Secret};
use crate::version1::{ParsedConfiguration, CONFIGURATION_FILENAME};

/// Convert the parsed configuration into the runtime one. Secrets are read from
/// `environment`; a custom entities file is read relative to `configuration_dir`.
pub async fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
    configuration_dir: impl AsRef<Path>,
    environment: impl Environment,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    let connection_uri = match parsed_config.connection_uri {
        ConnectionUri(Secret::Plain(uri)) => Ok(uri),
        ConnectionUri(Secret::FromEnvironment { variable }) => {
            environment.read(&variable).map_err(|error| {
                MakeRuntimeConfigurationError::MissingEnvironmentVariable {
                    file_path: CONFIGURATION_FILENAME.into(),
                    message: error.to_string(),
                }
            })
        }
    }?;

    let custom_entities =
        read_custom_entities(parsed_config.custom_entities, configuration_dir.as_ref()).await?;

    let sweep_interval = match parsed_config.cache.sweep_interval_seconds {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    };

    Ok(Configuration {
        connection_name: parsed_config.connection_name,
        connection_uri,
        pool_settings: parsed_config.pool_settings,
        service: parsed_config.service,
        batch: BatchFlags::resolve(parsed_config.batch),
        show_inline_error: parsed_config.show_inline_error,
        sweep_interval,
        custom_entities,
    })
}

async fn read_custom_entities(
    source: CustomEntitiesSource,
    configuration_dir: &Path,
) -> Result<Vec<CustomEntity>, MakeRuntimeConfigurationError> {
    match source {
        CustomEntitiesSource::Inline(entities) => Ok(entities),
        CustomEntitiesSource::File { file } => {
            let file_path = configuration_dir.join(file);
            let xml = tokio::fs::read_to_string(&file_path)
                .await
                .map_err(|source| MakeRuntimeConfigurationError::IoError {
                    file_path: file_path.clone(),
                    source,
                })?;
            let entities = metadata::parse_custom_entities_xml(&xml).map_err(|source| {
                MakeRuntimeConfigurationError::CustomEntities {
                    file_path: file_path.clone(),
                    source,
                }
            })?;
            tracing::info!(
                file = %file_path.display(),
                custom_entities = entities.len(),
                "read custom entities"
            );
            Ok(entities)
        }
    }
}
