// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required Discord/webhook settings and defaults the team markers and state path
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, skip_serializing)]
    pub token: String,
    /// Server whose threads are watched
    #[serde(default)]
    pub guild_id: String,
    /// Category that holds the game-day channels
    #[serde(default)]
    pub game_day_category_id: String,
}

// Keep the bot token out of logs
impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[redacted]")
            .field("guild_id", &self.guild_id)
            .field("game_day_category_id", &self.game_day_category_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default = "default_team_abbr")]
    pub abbr: String,
    #[serde(default = "default_team_name_text")]
    pub name_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
}

fn default_team_abbr() -> String {
    "LAF".to_string()
}

fn default_team_name_text() -> String {
    "@Los Angeles Foos".to_string()
}

fn default_state_path() -> String {
    "./forward_state.json".to_string()
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            abbr: default_team_abbr(),
            name_text: default_team_name_text(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Read a non-empty environment variable
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from config.toml with environment variable overrides
    ///
    /// The file location can be changed with `FOOS_RELAY_CONFIG_PATH`; a missing
    /// file is fine as long as the environment supplies the required values.
    pub fn load() -> Result<Self> {
        let config_path = env_value("FOOS_RELAY_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file without env overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_value("DISCORD_TOKEN") {
            self.discord.token = val;
        }
        if let Some(val) = env_value("GIB_GUILD_ID") {
            self.discord.guild_id = val;
        }
        if let Some(val) = env_value("GAME_DAY_CATEGORY_ID") {
            self.discord.game_day_category_id = val;
        }
        if let Some(val) = env_value("FOOS_WEBHOOK_URL") {
            self.webhook.url = val;
        }
        if let Some(val) = env_value("TEAM_ABBR") {
            self.team.abbr = val;
        }
        if let Some(val) = env_value("TEAM_NAME_TEXT") {
            self.team.name_text = val;
        }
        if let Some(val) = env_value("FORWARD_STATE_PATH") {
            self.state.path = val;
        }
    }

    fn validate(&mut self) -> Result<()> {
        let required = [
            ("discord.token", "DISCORD_TOKEN", &self.discord.token),
            ("discord.guild_id", "GIB_GUILD_ID", &self.discord.guild_id),
            (
                "discord.game_day_category_id",
                "GAME_DAY_CATEGORY_ID",
                &self.discord.game_day_category_id,
            ),
            ("webhook.url", "FOOS_WEBHOOK_URL", &self.webhook.url),
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|(_, _, value)| value.trim().is_empty())
            .map(|(key, env, _)| format!("{} ({})", key, env))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required settings: {} (set in config.toml or env vars)",
                missing.join(", ")
            );
        }

        // Blank optional values fall back to their defaults
        if self.team.abbr.trim().is_empty() {
            self.team.abbr = default_team_abbr();
        }
        if self.team.name_text.trim().is_empty() {
            self.team.name_text = default_team_name_text();
        }
        if self.state.path.trim().is_empty() {
            self.state.path = default_state_path();
        }

        Ok(())
    }
}
