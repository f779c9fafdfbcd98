use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Tokyo;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument};

use utility::{
    config::{ColourSetting, Config, EmbedConfig, EmbedField},
    here,
    streams::{Notification, NotificationKind},
};

const DEFAULT_EMBED_COLOUR: u32 = 0x2F3136;

pub struct DiscordApi {}

impl DiscordApi {
    #[instrument(skip(config, channel, exit_receiver))]
    pub async fn start(
        config: Arc<Config>,
        channel: mpsc::Receiver<Notification>,
        mut exit_receiver: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            tokio::select! {
                res = Self::posting_thread(config, channel) => {
                    if let Err(e) = res {
                        error!("{:?}", e);
                    }
                }
                res = exit_receiver.changed() => {
                    if let Err(e) = res {
                        error!("{:#}", e);
                    }
                }
            }

            info!(task = "Webhook notifier", "Shutting down.");
        });
    }

    async fn posting_thread(
        config: Arc<Config>,
        mut channel: mpsc::Receiver<Notification>,
    ) -> anyhow::Result<()> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))
            .build()
            .context(here!())?;

        while let Some(notification) = channel.recv().await {
            let embed = build_embed(&notification, &config.notification.embed);

            // Delivery is fire-and-continue: the state decision was already
            // made, a failed send must not take the cycle down with it.
            match Self::deliver(&client, &config.discord_webhook_url, &embed).await {
                Ok(()) => {
                    info!(
                        kind = %notification.kind,
                        video = %notification.video.id,
                        "Notification sent."
                    );
                }
                Err(e) => {
                    error!(
                        kind = %notification.kind,
                        video = %notification.video.id,
                        channel = %notification.video.channel_id,
                        "Failed to send notification: {:?}", e
                    );
                }
            }
        }

        Ok(())
    }

    async fn deliver(client: &Client, webhook_url: &str, embed: &Embed) -> anyhow::Result<()> {
        let response = client
            .post(webhook_url)
            .json(&WebhookPayload {
                embeds: vec![embed],
            })
            .send()
            .await
            .context(here!())?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Discord webhook error {}: {}", status, body);
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'e> {
    embeds: Vec<&'e Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author: EmbedAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedInlineField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedInlineField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

pub fn build_embed(notification: &Notification, config: &EmbedConfig) -> Embed {
    let video = &notification.video;

    let mut embed = Embed {
        title: None,
        url: None,
        color: config
            .colors
            .get(&notification.kind)
            .map_or(DEFAULT_EMBED_COLOUR, resolve_colour),
        description: (!notification.channel_name.is_empty())
            .then(|| format!("Channel: {}", notification.channel_name)),
        author: EmbedAuthor {
            name: kind_label(notification.kind).to_owned(),
        },
        thumbnail: None,
        fields: Vec::new(),
    };

    for field in &config.fields {
        match field {
            EmbedField::Title => embed.title = Some(video.title.clone()),
            EmbedField::Url => embed.url = Some(video.url.clone()),
            EmbedField::Thumbnail => {
                if !video.thumbnail.is_empty() {
                    embed.thumbnail = Some(EmbedThumbnail {
                        url: video.thumbnail.clone(),
                    });
                }
            }
            EmbedField::StartTime => {
                if let Some(start_time) = video.start_time {
                    embed.fields.push(EmbedInlineField {
                        name: "Start Time".to_owned(),
                        value: format_start_time(start_time),
                        inline: false,
                    });
                }
            }
        }
    }

    embed
}

const fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::ScheduledCreated => "配信予定が登録されました",
        NotificationKind::ScheduledUpdated => "配信予定が更新されました",
        NotificationKind::LiveStarted => "配信が開始されました",
        NotificationKind::LiveEnded => "配信が終了しました",
    }
}

fn resolve_colour(setting: &ColourSetting) -> u32 {
    match setting {
        ColourSetting::Value(value) => *value,
        ColourSetting::Name(name) => {
            let name = name.to_lowercase();

            match name.as_str() {
                "yellowgreen" => 0x9ACD32,
                "orange" => 0xFFA500,
                "lightskyblue" => 0x87CEFA,
                "red" => 0xFF0000,
                other => {
                    let hex = other.strip_prefix('#').unwrap_or(other);
                    u32::from_str_radix(hex, 16).unwrap_or(DEFAULT_EMBED_COLOUR)
                }
            }
        }
    }
}

/// Start times are shown in Japan Standard Time, matching the audience of
/// the tracked channels.
fn format_start_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Tokyo).format("%Y-%m-%d %H:%M").to_string()
}
