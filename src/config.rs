use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::suggestions::SuggestionTrigger;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the assistant backend
    pub backend_url: String,

    /// Messages per history page
    pub page_size: usize,

    /// How many follow-up suggestions to request
    pub suggestion_quantity: usize,

    /// What prompts a suggestion fetch
    pub suggestion_trigger: SuggestionTrigger,

    /// Suggestions shown for a stale conversation under the recency trigger
    pub initial_suggestions: Vec<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Parley home directory
    #[serde(skip)]
    pub parley_home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            backend_url: "http://localhost:5000".to_string(),
            page_size: 50,
            suggestion_quantity: 3,
            suggestion_trigger: SuggestionTrigger::Context,
            initial_suggestions: vec![
                "What can you help me with?".to_string(),
                "What sources do you know about?".to_string(),
                "Summarize the latest project updates.".to_string(),
            ],
            request_timeout_secs: 60,
            parley_home: home.join(".parley"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.parley/config.toml`, falling back to
    /// defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(home.join(".parley"))
    }

    pub fn load_from(parley_home: PathBuf) -> Result<Self> {
        let config_path = parley_home.join("config.toml");

        fs::create_dir_all(&parley_home)
            .context("Failed to create .parley directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.parley_home = parley_home;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.parley_home)
            .context("Failed to create .parley directory")?;
        let config_path = self.parley_home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Where the log file lives.
    pub fn log_path(&self) -> PathBuf {
        self.parley_home.join("parley.log")
    }
}
