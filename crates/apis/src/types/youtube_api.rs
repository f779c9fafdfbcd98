use chrono::{DateTime, Utc};
use serde::Deserialize;

use utility::streams::VideoDetail;

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelResource {
    pub snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelSnippet {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoResource {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
    #[serde(rename = "liveStreamingDetails", default)]
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

impl VideoResource {
    pub(crate) fn into_detail(self) -> VideoDetail {
        let snippet = self.snippet.unwrap_or_default();
        let live = self.live_streaming_details.unwrap_or_default();

        let thumbnail = snippet
            .thumbnails
            .high
            .or(snippet.thumbnails.default)
            .map(|t| t.url)
            .unwrap_or_default();

        VideoDetail {
            url: format!("https://www.youtube.com/watch?v={}", self.id),
            id: self.id,
            title: snippet.title,
            thumbnail,
            scheduled_start_time: live.scheduled_start_time,
            actual_start_time: live.actual_start_time,
            actual_end_time: live.actual_end_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Thumbnails {
    #[serde(default)]
    pub high: Option<Thumbnail>,
    #[serde(default)]
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveStreamingDetails {
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
}

/// The error envelope YouTube wraps failed API calls in.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
}
