use anyhow::{Context, Result};
use listing_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment prefix for overrides, e.g. `APP__ENGINE__MAX_PAGE_SIZE=50`.
pub const ENV_PREFIX: &str = "APP__";

/// Directory created under the user's home when `home_dir` is not set.
const DEFAULT_SUBDIR: &str = ".catalog";

/// Application configuration: the listing engine section plus logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base directory for relative log paths. Normalized to an absolute path on load.
    #[serde(default)]
    pub home_dir: String,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging sections (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
}

/// Maps target prefixes (`listing_engine`, `catalog_cli`) to their settings.
/// Key "default" covers every target without a section of its own.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/engine.log", empty disables the file
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

/// Console at `warn` on stderr, no log file.
fn default_section() -> Section {
    Section {
        console_level: "warn".to_string(),
        file: String::new(),
        file_level: "info".to_string(),
        max_backups: Some(3),
        max_size_mb: Some(10),
    }
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert("default".to_string(), default_section());
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            engine: EngineConfig::default(),
            logging: Some(default_logging_config()),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    /// Also normalizes `home_dir` into an absolute path and creates the directory.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_with_prefix(config_path.as_ref(), ENV_PREFIX)
    }

    fn load_with_prefix(config_path: &Path, env_prefix: &str) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        if !config_path.is_file() {
            anyhow::bail!("config file not found: {}", config_path.display());
        }

        // Logging stays None unless YAML or env provides it.
        let base = AppConfig {
            logging: None,
            ..Default::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(env_prefix).split("__"));

        let mut config: AppConfig = figment
            .extract()
            .with_context(|| format!("invalid config in {}", config_path.display()))?;

        config.normalize_home_dir()?;
        Ok(config)
    }

    /// Load configuration from file or fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                c.normalize_home_dir()
                    .context("failed to resolve home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize config to YAML")
    }

    /// `-v` raises the default console level to debug, `-vv` and more to trace.
    pub fn apply_verbosity(&mut self, verbose: u8) {
        let logging = self.logging.get_or_insert_with(default_logging_config);
        let section = logging
            .entry("default".to_string())
            .or_insert_with(default_section);
        match verbose {
            0 => {}
            1 => section.console_level = "debug".to_string(),
            _ => section.console_level = "trace".to_string(),
        }
    }

    fn normalize_home_dir(&mut self) -> Result<()> {
        let raw = self.home_dir.trim();
        let raw = (!raw.is_empty()).then_some(raw);
        let resolved = resolve_home_dir(raw, dirs::home_dir().as_deref(), DEFAULT_SUBDIR)?;
        std::fs::create_dir_all(&resolved)
            .with_context(|| format!("cannot create home_dir {}", resolved.display()))?;
        self.home_dir = resolved.to_string_lossy().to_string();
        Ok(())
    }
}

/// Resolve a configured home dir to an absolute path.
///
/// `None` yields `<user home>/<subdir>`; a leading `~` expands to the user home;
/// other relative paths are taken relative to the working directory.
pub fn resolve_home_dir(raw: Option<&str>, user_home: Option<&Path>, subdir: &str) -> Result<PathBuf> {
    let user_home = || user_home.map(Path::to_path_buf).context("user home directory is unknown");
    let path = match raw {
        None => user_home()?.join(subdir),
        Some("~") => user_home()?,
        Some(p) => match p.strip_prefix("~/") {
            Some(rest) => user_home()?.join(rest),
            None => PathBuf::from(p),
        },
    };
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()
            .context("cannot read working directory")?
            .join(path))
    }
}
