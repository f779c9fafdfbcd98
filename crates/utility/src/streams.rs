use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display as EnumDisplay, EnumString};

/// Lifecycle state of a tracked video, as derived from which of its
/// live-streaming timestamps are present.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, EnumDisplay, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VideoStatus {
    Upcoming,
    Live,
    Completed,
}

/// Persisted per-video state. The serialized field names are the on-disk
/// state-file format and must stay stable across versions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnail: String,
    pub start_time: Option<DateTime<Utc>>,
    pub status: Option<VideoStatus>,
    pub channel_id: String,
    pub channel_name: String,
}

impl Display for VideoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}][{:?}] {} by {}",
            self.id, self.status, self.title, self.channel_name
        )
    }
}

/// One fetched snapshot item, before any lifecycle state has been derived
/// from it. Not persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetail {
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnail: String,

    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
}

impl VideoDetail {
    /// The start time shown to users: the scheduled time when one exists,
    /// otherwise the actual time the stream went live.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.scheduled_start_time.or(self.actual_start_time)
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, EnumDisplay, EnumString, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    ScheduledCreated,
    ScheduledUpdated,
    LiveStarted,
    LiveEnded,
}

/// A single status transition to be delivered to the webhook.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub video: VideoRecord,
    pub channel_name: String,
}
