use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = ".vitatrack";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_PROVISION_TIME: &str = "00:05";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    /// Daily provisioning time, HH:MM in UTC.
    pub provision_time: String,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("vitatrack.db"),
            api_port: 7810,
            provision_time: DEFAULT_PROVISION_TIME.to_string(),
        }
    }
}

impl Config {
    pub fn root_dir() -> PathBuf {
        default_root_dir()
    }

    pub fn config_path() -> PathBuf {
        default_root_dir().join(CONFIG_FILE)
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn parse_provision_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.provision_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "provision_time" => {
                parse_hhmm(value)?;
                self.provision_time = value.to_string();
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: provision_time|provision.time, api_port|api.port, db_path|db.path"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "provision_time" => Some(self.provision_time.clone()),
            "api_port" => Some(self.api_port.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "provision_time" | "provision.time" => "provision_time",
        "api_port" | "api.port" => "api_port",
        "db_path" | "db.path" => "db_path",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 00:05 (24-hour format)"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_hhmm};

    #[test]
    fn default_config_has_a_valid_provision_time() {
        let config = Config::default();
        assert!(config.parse_provision_time().is_ok());
    }

    #[test]
    fn set_value_validates_provision_time() {
        let mut config = Config::default();

        assert!(config.set_value("provision_time", "23:59").is_ok());
        assert_eq!(config.provision_time, "23:59");
        assert!(config.set_value("provision_time", "25:00").is_err());
        assert!(config.set_value("nonsense", "1").is_err());
    }

    #[test]
    fn dotted_key_aliases_resolve() {
        let mut config = Config::default();

        config.set_value("api.port", "8099").expect("set port");
        assert_eq!(config.get_value("api_port").as_deref(), Some("8099"));
    }

    #[test]
    fn hhmm_parser_rejects_garbage() {
        assert!(parse_hhmm("7am").is_err());
        assert!(parse_hhmm("07:30").is_ok());
    }
}
