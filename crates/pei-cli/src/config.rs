//! Configuration file management for pei.
//!
//! Provides a TOML-based config file at `~/.config/pei/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pei_core::ai::GeminiConfig;
use pei_core::autosave::AutosaveConfig;
use pei_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub ai: AiSection,
    pub autosave: AutosaveSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSection {
    pub interval_secs: u64,
    pub skip_unchanged: bool,
}

impl Default for AutosaveSection {
    fn default() -> Self {
        let defaults = AutosaveConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            skip_unchanged: defaults.skip_unchanged,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the pei config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/pei` or `~/.config/pei`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("pei");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pei")
}

/// Return the path to the pei config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("falha ao ler o arquivo de configuração em {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("arquivo de configuração inválido")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix, since it may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("falha ao criar o diretório de configuração {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("falha ao serializar a configuração")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("falha ao gravar o arquivo de configuração em {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("falha ao definir as permissões de {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

pub const API_KEY_VARS: [&str; 2] = ["PEI_API_KEY", "GEMINI_API_KEY"];
pub const MODEL_VAR: &str = "PEI_MODEL";

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PeiConfig {
    pub db_config: DbConfig,
    pub gemini: GeminiConfig,
    pub autosave: AutosaveConfig,
}

impl PeiConfig {
    /// Resolve configuration from the process environment and the config
    /// file on disk.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();
        Self::resolve_from(cli_db_url, file_config.as_ref(), |key| {
            std::env::var(key).ok()
        })
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `PEI_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - API key: `PEI_API_KEY` > `GEMINI_API_KEY` > `ai.api_key` > none
    /// - Model: `PEI_MODEL` > `ai.model` > `GeminiConfig::DEFAULT_MODEL`
    ///
    /// A missing API key is not an error here; model calls fail with an
    /// authentication error instead, so commands that never reach the model
    /// keep working.
    pub fn resolve_from(
        cli_db_url: Option<&str>,
        file_config: Option<&ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let db_url = cli_db_url
            .map(str::to_string)
            .or_else(|| non_empty(DbConfig::ENV_VAR))
            .or_else(|| file_config.map(|c| c.database.url.clone()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_string());

        let ai = file_config.map(|c| &c.ai);
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|&key| non_empty(key))
            .or_else(|| ai.and_then(|a| a.api_key.clone()))
            .filter(|k| !k.trim().is_empty());

        let mut gemini = GeminiConfig::new(api_key);
        if let Some(model) = non_empty(MODEL_VAR).or_else(|| ai.and_then(|a| a.model.clone())) {
            gemini.model = model;
        }
        if let Some(base_url) = ai.and_then(|a| a.base_url.clone()) {
            gemini.base_url = base_url;
        }
        if let Some(budget) = ai.and_then(|a| a.thinking_budget) {
            gemini.thinking_budget = budget;
        }

        let autosave = match file_config.map(|c| &c.autosave) {
            Some(section) => {
                if section.interval_secs == 0 {
                    anyhow::bail!("autosave.interval_secs deve ser maior que zero");
                }
                AutosaveConfig {
                    interval: Duration::from_secs(section.interval_secs),
                    skip_unchanged: section.skip_unchanged,
                }
            }
            None => AutosaveConfig::default(),
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            gemini,
            autosave,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
