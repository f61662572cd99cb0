use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "MEMPLOT_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "memplot", "memplot")
            .context("cannot locate config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads `path`, else `$MEMPLOT_CONFIG`, else the per-user config file.
    /// A file that does not exist means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                Config::default_path().unwrap_or_else(|_| PathBuf::from("./memplot.toml"))
            });
        let mut cfg = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading config at {:?}", path))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("parsing config at {:?}", path))?
        } else {
            Config::default()
        };
        cfg.expand_paths();
        Ok(cfg)
    }

    pub fn expand_paths(&mut self) {
        if let Some(font) = &self.chart.font {
            self.chart.font = Some(expand_tilde(font));
        }
        if let Some(file) = &self.logging.file {
            self.logging.file = Some(expand_tilde(file));
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "ChartConfig::default_title")]
    pub title: String,
    #[serde(default = "ChartConfig::default_width_in")]
    pub width_in: f64,
    #[serde(default = "ChartConfig::default_height_in")]
    pub height_in: f64,
    #[serde(default = "ChartConfig::default_dpi")]
    pub dpi: u32,
    #[serde(default = "ChartConfig::default_suffix")]
    pub suffix: String,
    /// TrueType/OpenType font used for all text. Searched for when unset.
    #[serde(default)]
    pub font: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width_in: Self::default_width_in(),
            height_in: Self::default_height_in(),
            dpi: Self::default_dpi(),
            suffix: Self::default_suffix(),
            font: None,
        }
    }
}

impl ChartConfig {
    fn default_title() -> String {
        "golubsmtpd Memory Performance Over Time".into()
    }

    fn default_width_in() -> f64 {
        15.0
    }

    fn default_height_in() -> f64 {
        10.0
    }

    fn default_dpi() -> u32 {
        300
    }

    fn default_suffix() -> String {
        "_plot.png".into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "LoaderConfig::default_delimiter")]
    pub delimiter: char,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: Self::default_delimiter(),
        }
    }
}

impl LoaderConfig {
    fn default_delimiter() -> char {
        ','
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".into()
    }
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if !path_str.starts_with('~') {
        return path.to_path_buf();
    }

    let home = BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if path_str == "~" {
        home
    } else {
        let mut expanded = home;
        expanded.push(path_str.trim_start_matches("~/"));
        expanded
    }
}
