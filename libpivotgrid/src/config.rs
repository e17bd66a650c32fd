use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use eyre::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resizing::{ColumnAutoresizeOption, TableFonts};

pub const CONFIG_FILE: &str = "config.toml";
pub const LOCAL_CONFIG_DIR: &str = ".pivotgrid";

pub static PROJECT_DIR: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("org", "pivotgrid", "pivotgrid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotGridConfig {
    /// Width of columns that no override, auto-size or grow-to-fit sizes.
    pub default_column_width: f32,
    /// Request attribute grouping of repeated row values.
    pub group_rows: bool,
    pub grow_to_fit: bool,
    pub column_autoresize: ColumnAutoresizeOption,
    /// Rows requested per window.
    pub page_size: usize,
    pub autosize: AutoSizeSettings,
    pub fonts: TableFonts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSizeSettings {
    pub measure_headers: bool,
    pub padding: f32,
    pub resize_delay_ms: u64,
}

impl PivotGridConfig {
    /// Loads the embedded defaults, then the user and local config files, then
    /// `PIVOTGRID_*` environment variables. Later sources win.
    pub fn new(force_default_config: bool) -> Result<Self> {
        let mut config = Config::builder().add_source(config::File::from_str(
            include_str!("../../default_config.toml"),
            config::FileFormat::Toml,
        ));

        if !force_default_config {
            if let Some(proj_dirs) = &*PROJECT_DIR {
                let config_file = proj_dirs.config_dir().join(CONFIG_FILE);
                debug!("Looking for user config in {}", config_file.display());
                config = config.add_source(File::from(config_file).required(false));
            }
            config = config
                .add_source(File::from(local_config_path()).required(false))
                .add_source(Environment::with_prefix("pivotgrid"));
        }

        config
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to parse config {e}"))
    }

    /// Defaults overlaid with one explicit file, which must exist.
    pub fn new_from_file(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(config::File::from_str(
                include_str!("../../default_config.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to parse config {} {e}", path.display()))
    }

    pub fn new_from_toml(config: &str) -> Result<Self> {
        Ok(toml::from_str(config)?)
    }
}

impl Default for PivotGridConfig {
    fn default() -> Self {
        Self::new_from_toml(include_str!("../../default_config.toml"))
            .expect("embedded default config is valid")
    }
}

fn local_config_path() -> PathBuf {
    Path::new(LOCAL_CONFIG_DIR).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_parses() {
        let config = PivotGridConfig::new(true).expect("default config");

        assert_eq!(config.default_column_width, 200.0);
        assert_eq!(config.column_autoresize, ColumnAutoresizeOption::Unset);
        assert_eq!(config.autosize.padding, 25.0);
        assert_eq!(config.autosize.resize_delay_ms, 300);
        assert_eq!(config.fonts.total.weight, 700);
    }

    #[test]
    fn embedded_toml_matches_layered_defaults() {
        assert_eq!(
            PivotGridConfig::default(),
            PivotGridConfig::new(true).expect("default config")
        );
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "column_autoresize = \"viewport\"\ngrow_to_fit = true\n[autosize]\npadding = 10"
        )
        .expect("write config");

        let config = PivotGridConfig::new_from_file(file.path()).expect("config");

        assert_eq!(config.column_autoresize, ColumnAutoresizeOption::Viewport);
        assert!(config.grow_to_fit);
        assert_eq!(config.autosize.padding, 10.0);
        assert!(config.autosize.measure_headers);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PivotGridConfig::new_from_file(Path::new("/nonexistent/pivotgrid.toml")).is_err());
    }
}
