use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::FetcherKind;
use crate::error::PfamError;

pub const DEFAULT_CONFIG_FILE: &str = "pfam-subset.json";
pub const DEFAULT_FAMILY_DIR: &str = "pfam_hmms";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub column_aliases: Option<Vec<String>>,
    #[serde(default)]
    pub fetcher: Option<FetcherKind>,
    #[serde(default)]
    pub hmmpress: Option<bool>,
    #[serde(default)]
    pub family_dir_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub column_aliases: Vec<String>,
    pub fetcher: FetcherKind,
    pub hmmpress: bool,
    pub family_dir_name: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            column_aliases: default_column_aliases(),
            fetcher: FetcherKind::Auto,
            hmmpress: false,
            family_dir_name: DEFAULT_FAMILY_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub columns: Vec<String>,
    pub fetcher: Option<FetcherKind>,
    pub hmmpress: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit path, then `./pfam-subset.json`, then the user config dir,
    /// then built-in defaults. Only an explicit path is required to exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PfamError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            debug!("no config file found, using defaults");
            return Ok(ResolvedConfig::default());
        };

        debug!(path = %config_path.display(), "loading config");
        let content = fs::read_to_string(&config_path)
            .map_err(|_| PfamError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PfamError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PfamError> {
        let column_aliases = match config.column_aliases {
            Some(aliases) => {
                let aliases = aliases
                    .into_iter()
                    .map(|alias| alias.trim().to_string())
                    .filter(|alias| !alias.is_empty())
                    .collect::<Vec<_>>();
                if aliases.is_empty() {
                    return Err(PfamError::ConfigParse(
                        "column_aliases must contain at least one header name".to_string(),
                    ));
                }
                aliases
            }
            None => default_column_aliases(),
        };

        let family_dir_name = config
            .family_dir_name
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|| DEFAULT_FAMILY_DIR.to_string());
        if family_dir_name.is_empty() || family_dir_name.contains(['/', '\\']) {
            return Err(PfamError::ConfigParse(format!(
                "family_dir_name must be a single path component: {family_dir_name:?}"
            )));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            column_aliases,
            fetcher: config.fetcher.unwrap_or_default(),
            hmmpress: config.hmmpress.unwrap_or(false),
            family_dir_name,
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        ProjectDirs::from("", "", "pfam-subset")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.is_file())
    }
}

impl ResolvedConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if !overrides.columns.is_empty() {
            let mut aliases = overrides.columns;
            for alias in self.column_aliases {
                if !aliases.contains(&alias) {
                    aliases.push(alias);
                }
            }
            self.column_aliases = aliases;
        }
        if let Some(fetcher) = overrides.fetcher {
            self.fetcher = fetcher;
        }
        self.hmmpress |= overrides.hmmpress;
        self
    }
}

pub fn default_column_aliases() -> Vec<String> {
    [
        "pfam_list",
        "Pfam",
        "pfam",
        "PFAM",
        "Pfam_list",
        "Cross-reference (Pfam)",
        "Pfam ID",
        "pfam_ids",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
