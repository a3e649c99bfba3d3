use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "assembly-closure.toml";

/// Defaults read from `assembly-closure.toml` and `ASSEMBLY_CLOSURE_*` variables.
pub struct ClosureConfig {
    pub platform_dir: Option<PathBuf>,
    pub module_extension: Option<String>,
    pub symbols_extension: Option<String>,
}

impl ClosureConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(Some(PathBuf::from(CONFIG_FILE_NAME)), None)?;

        Ok(Self {
            platform_dir: raw_config.platform.dir,
            module_extension: raw_config.module.extension,
            symbols_extension: raw_config.symbols.extension,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    platform: PlatformConfig,
    #[serde(default)]
    module: ModuleConfig,
    #[serde(default)]
    symbols: SymbolsConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct PlatformConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct ModuleConfig {
    extension: Option<String>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct SymbolsConfig {
    extension: Option<String>,
}

impl RawConfig {
    fn load(
        file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("ASSEMBLY_CLOSURE")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
