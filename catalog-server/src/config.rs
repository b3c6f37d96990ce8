use anyhow::Result;
use catalog_api::observability::{LogConfig, MetricsConfig};
use catalog_telemetry::{InventoryThresholds, SlowOperationThresholds};
use config::{
    builder::{ConfigBuilder, DefaultState},
    Config as ConfigLoader, Environment, File,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Extra regexes whose matches are replaced wholesale. From the
    /// environment they are newline separated, since a regex may hold commas.
    pub extra_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LogConfig,
    pub metrics: MetricsConfig,
    pub inventory: InventoryThresholds,
    pub slow_operations: SlowOperationThresholds,
    pub masking: MaskingConfig,
}

impl Config {
    /// Defaults, then `config/default.*`, `config/local.*` and finally
    /// `CATALOG__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        Self::build(
            ConfigLoader::builder()
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false))
                .add_source(environment()),
        )
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("CATALOG")
        .separator("__")
        .try_parsing(true)
        .list_separator("\n")
        .with_list_parse_key("masking.extra_patterns")
}
