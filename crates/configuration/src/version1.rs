//! Version 1 of the on-disk configuration format.

use std::path::Path;

use query_engine_metadata::metadata::CustomEntitiesSource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{ParseConfigurationError, WriteParsedConfigurationError};
use crate::values::{ConnectionUri, PoolSettings, Secret};

pub const CURRENT_VERSION: u32 = 1;
pub const CONFIGURATION_FILENAME: &str = "configuration.json";
pub const CONFIGURATION_JSONSCHEMA_FILENAME: &str = "schema.json";
pub const DEFAULT_CONNECTION_URI_VARIABLE: &str = "ODATA_DATABASE_URL";
pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// Initial configuration, just enough to connect to a database and serve it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConfiguration {
    // Which version of the configuration format are we using
    pub version: u32,
    /// Identifies the connection; entity models are cached per connection name.
    #[serde(default = "connection_name_default")]
    pub connection_name: String,
    #[serde(default = "connection_uri_default")]
    pub connection_uri: ConnectionUri,
    #[serde(skip_serializing_if = "PoolSettings::is_default")]
    #[serde(default)]
    pub pool_settings: PoolSettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub batch: BatchSettings,
    /// Include database error messages in error documents.
    #[serde(default)]
    pub show_inline_error: bool,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub custom_entities: CustomEntitiesSource,
}

/// Where the service lives in the request path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    /// Base URI used for `xml:base` and entry ids. Derived from the request when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_uri: Option<String>,
    /// Number of leading path segments naming the service.
    #[serde(default = "path_index_default")]
    pub path_index: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            root_uri: None,
            path_index: 1,
        }
    }
}

fn path_index_default() -> usize {
    ServiceSettings::default().path_index
}

/// How `$batch` requests are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettings {
    /// Run every operation of a batch in one transaction.
    #[serde(default = "enabled")]
    pub transactional: bool,
    /// Stop at the first failed operation. Only honoured when not transactional.
    #[serde(default = "enabled")]
    pub fast_fail: bool,
    /// Accept batch bodies whose content type is not multipart, sniffing the boundary.
    #[serde(default = "enabled")]
    pub allow_any_request_body: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            transactional: true,
            fast_fail: true,
            allow_any_request_body: true,
        }
    }
}

fn enabled() -> bool {
    true
}

/// Entity model cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Seconds between cache sweeps. `0` never sweeps.
    #[serde(default = "sweep_interval_default")]
    pub sweep_interval_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            sweep_interval_seconds: 3600,
        }
    }
}

fn sweep_interval_default() -> u64 {
    CacheSettings::default().sweep_interval_seconds
}

fn connection_name_default() -> String {
    DEFAULT_CONNECTION_NAME.to_string()
}

fn connection_uri_default() -> ConnectionUri {
    ConnectionUri(Secret::FromEnvironment {
        variable: DEFAULT_CONNECTION_URI_VARIABLE.into(),
    })
}

impl ParsedConfiguration {
    pub fn initial() -> Self {
        ParsedConfiguration::empty()
    }

    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            connection_name: connection_name_default(),
            connection_uri: connection_uri_default(),
            pool_settings: PoolSettings::default(),
            service: ServiceSettings::default(),
            batch: BatchSettings::default(),
            show_inline_error: false,
            cache: CacheSettings::default(),
            custom_entities: CustomEntitiesSource::default(),
        }
    }
}

/// Read `configuration.json` from a configuration directory.
pub async fn parse_configuration(
    configuration_dir: impl AsRef<Path>,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let configuration_file = configuration_dir.as_ref().join(CONFIGURATION_FILENAME);

    let configuration_file_contents =
        fs::read_to_string(&configuration_file)
            .await
            .map_err(|err| {
                ParseConfigurationError::IoErrorButStringified(format!(
                    "{}: {}",
                    &configuration_file.display(),
                    err
                ))
            })?;

    let parsed_config: ParsedConfiguration = serde_json::from_str(&configuration_file_contents)
        .map_err(|error| ParseConfigurationError::ParseError {
            file_path: configuration_file.clone(),
            line: error.line(),
            column: error.column(),
            message: error.to_string(),
        })?;

    if parsed_config.version != CURRENT_VERSION {
        return Err(ParseConfigurationError::UnsupportedVersion {
            file_path: configuration_file,
            found: parsed_config.version,
            expected: CURRENT_VERSION,
        });
    }

    Ok(parsed_config)
}

/// Write a configuration and its JSON schema into `out_dir`.
pub async fn write_parsed_configuration(
    parsed_config: ParsedConfiguration,
    out_dir: impl AsRef<Path>,
) -> Result<(), WriteParsedConfigurationError> {
    let configuration_file = out_dir.as_ref().to_owned().join(CONFIGURATION_FILENAME);
    fs::create_dir_all(out_dir.as_ref()).await?;

    // create the configuration file
    fs::write(
        configuration_file,
        serde_json::to_string_pretty(&parsed_config)? + "\n",
    )
    .await?;

    // create the jsonschema file
    let configuration_jsonschema_file_path = out_dir
        .as_ref()
        .to_owned()
        .join(CONFIGURATION_JSONSCHEMA_FILENAME);

    let output = schemars::schema_for!(ParsedConfiguration);
    fs::write(
        &configuration_jsonschema_file_path,
        serde_json::to_string_pretty(&output)? + "\n",
    )
    .await?;

    Ok(())
}
