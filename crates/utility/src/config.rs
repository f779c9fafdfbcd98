use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, DurationSeconds};
use tracing::warn;

use crate::{here, streams::NotificationKind};

#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub youtube_api_key: String,
    pub discord_webhook_url: String,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default)]
    pub channels: Vec<Channel>,

    #[serde(default)]
    pub notification: NotificationConfig,
}

impl Config {
    pub fn load(folder: &Path) -> anyhow::Result<Arc<Self>> {
        let path = folder.join("config.toml");
        let config_toml = fs::read_to_string(&path)
            .with_context(|| format!("config.toml not found at {}", path.display()))?;

        let config: Self = toml::from_str(&config_toml).context(here!())?;
        config.validate()?;

        Ok(Arc::new(config))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.youtube_api_key.is_empty() {
            bail!("youtube_api_key is not set in config.toml");
        }

        if self.discord_webhook_url.is_empty() {
            bail!("discord_webhook_url is not set in config.toml");
        }

        if self.channels.is_empty() {
            warn!("No channels are configured, nothing will be polled.");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Channel {
    pub channel_id: String,

    /// Display-name override; when absent the name is looked up once per run.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub embed: EmbedConfig,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbedConfig {
    #[serde(default = "default_embed_fields")]
    pub fields: Vec<EmbedField>,

    #[serde_as(as = "HashMap<DisplayFromStr, _>")]
    #[serde(default)]
    pub colors: HashMap<NotificationKind, ColourSetting>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            fields: default_embed_fields(),
            colors: HashMap::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedField {
    Title,
    Url,
    Thumbnail,
    StartTime,
}

/// Embed colours accept either a raw integer or a string: one of the named
/// presets, `#rrggbb`, or bare hex digits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColourSetting {
    Value(u32),
    Name(String),
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

const fn default_poll_interval() -> Duration {
    Duration::from_secs(600)
}

const fn default_max_results() -> usize {
    10
}

fn default_embed_fields() -> Vec<EmbedField> {
    vec![
        EmbedField::Title,
        EmbedField::Url,
        EmbedField::Thumbnail,
        EmbedField::StartTime,
    ]
}
