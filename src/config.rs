use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const API_URL_ENV: &str = "CHAT_API_URL";
pub const CONFIG_PATH_ENV: &str = "CHAT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiConfig,
    persona: PersonaConfig,
    ui: UiConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ApiConfig {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct PersonaConfig {
    name: String,
    tagline: String,
    assistant_avatar: String,
    user_avatar: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Alex Melia AI".to_string(),
            tagline: "This is an AI version of myself, trained on my own data. Go ahead, ask me anything!"
                .to_string(),
            assistant_avatar: "me".to_string(),
            user_avatar: "you".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiConfig {
    notification_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            notification_secs: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub persona_name: String,
    pub tagline: String,
    pub assistant_avatar: String,
    pub user_avatar: String,
    pub notification_ttl: Duration,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;

        Ok(config_file.into())
    }

    /// Loads the config file if one exists, then applies the endpoint
    /// override from the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let path = Path::new(&path);

        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            ConfigFile::default().into()
        };

        Ok(config.with_api_url_override(std::env::var(API_URL_ENV).ok()))
    }

    fn with_api_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api_url = url;
        }
        self
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Self {
            api_url: file.api.url.unwrap_or_default(),
            persona_name: file.persona.name,
            tagline: file.persona.tagline,
            assistant_avatar: file.persona.assistant_avatar,
            user_avatar: file.persona.user_avatar,
            notification_ttl: Duration::from_secs(file.ui.notification_secs),
        }
    }
}
