use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::engine::Visualization;
use crate::error::DysonError;
use crate::paginator::{DEFAULT_BATCH_SIZE, DEFAULT_RADIUS, DEFAULT_SCALE, RegionOptions};

pub const CONFIG_FILE: &str = "dyson.json";
pub const ENGINE_URL_ENV: &str = "DYSON_ENGINE_URL";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub features_dir: Option<String>,
    #[serde(default)]
    pub engine_url: Option<String>,
    #[serde(default)]
    pub image_source: Option<String>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub visualization: Option<Visualization>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<String>,
    pub features_dir: Option<String>,
    pub engine_url: Option<String>,
    pub image_source: Option<String>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_dir: Utf8PathBuf,
    pub features_dir: Utf8PathBuf,
    pub engine_url: Option<String>,
    pub image_source: Option<String>,
    pub radius: f64,
    pub scale: f64,
    pub batch_size: usize,
    pub visualization: Visualization,
}

impl ResolvedConfig {
    pub fn engine_url(&self) -> Result<&str, DysonError> {
        self.engine_url.as_deref().ok_or_else(|| {
            DysonError::InvalidConfig(format!(
                "engine_url is required (config, --engine-url or {ENGINE_URL_ENV})"
            ))
        })
    }

    pub fn region_options(&self) -> Result<RegionOptions, DysonError> {
        let source = self.image_source.clone().ok_or_else(|| {
            DysonError::InvalidConfig("image_source is required (config or --source)".to_string())
        })?;
        Ok(RegionOptions {
            source,
            radius: self.radius,
            scale: self.scale,
            batch_size: self.batch_size,
            visualization: self.visualization.clone(),
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `dyson.json` in the current directory when present.
    /// Without either, defaults are used.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, DysonError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| DysonError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| DysonError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, DysonError> {
        let engine_url = overrides
            .engine_url
            .or(config.engine_url)
            .or_else(|| std::env::var(ENGINE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty());

        let resolved = ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            data_dir: Utf8PathBuf::from(
                overrides
                    .data_dir
                    .or(config.data_dir)
                    .unwrap_or_else(|| "data".to_string()),
            ),
            features_dir: Utf8PathBuf::from(
                overrides
                    .features_dir
                    .or(config.features_dir)
                    .unwrap_or_else(|| "features".to_string()),
            ),
            engine_url,
            image_source: overrides.image_source.or(config.image_source),
            radius: config.radius.unwrap_or(DEFAULT_RADIUS),
            scale: config.scale.unwrap_or(DEFAULT_SCALE),
            batch_size: overrides
                .batch_size
                .or(config.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            visualization: config.visualization.unwrap_or_default(),
        };

        validate(&resolved)?;
        Ok(resolved)
    }
}

fn validate(config: &ResolvedConfig) -> Result<(), DysonError> {
    if config.batch_size == 0 {
        return Err(DysonError::InvalidConfig(
            "batch_size must be at least 1".to_string(),
        ));
    }
    if !(config.radius > 0.0) {
        return Err(DysonError::InvalidConfig(format!(
            "radius must be positive, got {}",
            config.radius
        )));
    }
    if !(config.scale > 0.0) {
        return Err(DysonError::InvalidConfig(format!(
            "scale must be positive, got {}",
            config.scale
        )));
    }
    if config.visualization.bands.len() != 3 {
        return Err(DysonError::InvalidConfig(format!(
            "visualization needs exactly three bands, got {}",
            config.visualization.bands.len()
        )));
    }
    if config.visualization.min >= config.visualization.max {
        return Err(DysonError::InvalidConfig(
            "visualization min must be below max".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let resolved = ConfigLoader::resolve_config(
            Config {
                engine_url: Some("https://engine.example".to_string()),
                ..Config::default()
            },
            ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.batch_size, 10);
        assert_eq!(resolved.radius, 0.02);
        assert_eq!(resolved.scale, 30.0);
        assert_eq!(resolved.data_dir, Utf8PathBuf::from("data"));
        assert_eq!(resolved.visualization, Visualization::default());
    }
}
