use std::time::Duration;

use anyhow::{anyhow, Context};
use backoff::ExponentialBackoff;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{instrument, warn};

use utility::{
    functions::{try_run_with_config, validate_json_bytes},
    here, regex,
    streams::VideoDetail,
};

use crate::types::youtube_api::{ApiErrorResponse, ChannelListResponse, VideoListResponse};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";

// videos.list accepts at most 50 IDs per call.
const DETAILS_CHUNK_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum Error {
    #[error("YouTube API quota exceeded.")]
    QuotaExceeded,
    #[error("Error creating HTTP client: {0:?}")]
    HttpClientCreationError(#[source] reqwest::Error),
    #[error("Error sending request to {endpoint}: {source:?}")]
    ApiRequestFailed {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid response received from {endpoint}: {error:?}")]
    InvalidResponse {
        endpoint: &'static str,
        error: anyhow::Error,
    },
}

pub struct YouTubeApi {
    client: Client,
    api_key: String,
}

impl YouTubeApi {
    pub fn new(api_key: String) -> Result<Self, Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))
            .build()
            .map_err(Error::HttpClientCreationError)?;

        Ok(Self { client, api_key })
    }

    /// Resolves a channel's display name, falling back to the raw channel ID
    /// when the lookup fails for any reason.
    #[instrument(skip(self))]
    pub async fn fetch_channel_name(&self, channel_id: &str) -> String {
        match self.get_channel_title(channel_id).await {
            Ok(Some(title)) => title,
            Ok(None) => {
                warn!(%channel_id, "Channel not found, falling back to the raw ID.");
                channel_id.to_owned()
            }
            Err(e) => {
                warn!(%channel_id, error = %e, "Channel name lookup failed, falling back to the raw ID.");
                channel_id.to_owned()
            }
        }
    }

    /// Fetches candidate video IDs from the channel's lightweight feed.
    /// Best effort: returns an empty list when the feed cannot be fetched.
    #[instrument(skip(self))]
    pub async fn fetch_candidate_ids(&self, channel_id: &str, limit: usize) -> Vec<String> {
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(8),
            max_elapsed_time: Some(Duration::from_secs(20)),
            ..ExponentialBackoff::default()
        };

        let feed = try_run_with_config(
            || async {
                let res = self
                    .client
                    .get(FEED_URL)
                    .query(&[("channel_id", channel_id)])
                    .send()
                    .await
                    .context(here!())?;

                res.error_for_status()
                    .context(here!())?
                    .text()
                    .await
                    .context(here!())
            },
            backoff_config,
        )
        .await;

        match feed {
            Ok(feed) => Self::extract_feed_ids(&feed, limit),
            Err(e) => {
                warn!(%channel_id, error = %e, "Failed to fetch the channel feed.");
                Vec::new()
            }
        }
    }

    /// Fetches full details for the given video IDs, in the order the IDs
    /// were passed in.
    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn fetch_details(&self, ids: &[String]) -> Result<Vec<VideoDetail>, Error> {
        let mut details = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(DETAILS_CHUNK_SIZE) {
            let res = self
                .client
                .get(format!("{}/videos", API_BASE))
                .query(&[
                    ("part", "snippet,liveStreamingDetails"),
                    ("id", &chunk.join(",")),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await
                .map_err(|e| Error::ApiRequestFailed {
                    endpoint: "videos.list",
                    source: e,
                })?;

            let response: VideoListResponse = Self::validate_api_response(res, "videos.list").await?;
            details.extend(response.items.into_iter().map(|v| v.into_detail()));
        }

        Ok(details)
    }

    async fn get_channel_title(&self, channel_id: &str) -> Result<Option<String>, Error> {
        let res = self
            .client
            .get(format!("{}/channels", API_BASE))
            .query(&[
                ("part", "snippet"),
                ("id", channel_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::ApiRequestFailed {
                endpoint: "channels.list",
                source: e,
            })?;

        let response: ChannelListResponse =
            Self::validate_api_response(res, "channels.list").await?;

        Ok(response.items.into_iter().next().map(|c| c.snippet.title))
    }

    async fn validate_api_response<T>(response: Response, endpoint: &'static str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| Error::ApiRequestFailed {
            endpoint,
            source: e,
        })?;

        if !status.is_success() {
            return Err(Self::classify_error_response(status, &bytes, endpoint));
        }

        validate_json_bytes(&bytes).map_err(|error| Error::InvalidResponse { endpoint, error })
    }

    fn classify_error_response(status: StatusCode, bytes: &[u8], endpoint: &'static str) -> Error {
        if let Ok(parsed) = serde_json::from_slice::<ApiErrorResponse>(bytes) {
            let quota = parsed.error.errors.iter().any(|e| {
                matches!(
                    e.reason.as_str(),
                    "quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded" | "userRateLimitExceeded"
                )
            });

            if quota {
                return Error::QuotaExceeded;
            }

            return Error::InvalidResponse {
                endpoint,
                error: anyhow!("server returned {}: {}", status, parsed.error.message),
            };
        }

        Error::InvalidResponse {
            endpoint,
            error: anyhow!("server returned {}", status),
        }
    }

    fn extract_feed_ids(feed: &str, limit: usize) -> Vec<String> {
        let video_id: &'static Regex = regex!(r"<yt:videoId>([A-Za-z0-9_-]+)</yt:videoId>");

        video_id
            .captures_iter(feed)
            .filter_map(|cap| cap.get(1))
            .map(|id| id.as_str().to_owned())
            .take(limit)
            .collect()
    }
}
