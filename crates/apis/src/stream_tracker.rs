use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use chrono::Utc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, error, info, instrument, warn};

use utility::{
    config::{Channel, Config},
    here,
    streams::{Notification, VideoDetail, VideoRecord, VideoStatus},
};

use crate::{
    reconciler::reconcile_channel,
    state_store::StateStore,
    youtube_api::{self, YouTubeApi},
};

// A stuck fetch must not stall the remaining channels for the whole cycle.
const CHANNEL_FETCH_TIMEOUT: Duration = Duration::from_secs(90);

pub struct StreamTracker {
    config: Arc<Config>,
    api: YouTubeApi,
    store: StateStore,
    index: HashMap<String, VideoRecord>,
    channel_names: HashMap<String, String>,
    notifier_sender: mpsc::Sender<Notification>,
}

impl StreamTracker {
    /// Spawns the polling task. The returned handle resolves with an error
    /// only for failures that must take the process down, i.e. a failed
    /// state write or an unusable configuration.
    #[instrument(skip(config, notifier_sender, exit_receiver))]
    pub async fn start(
        config: Arc<Config>,
        notifier_sender: mpsc::Sender<Notification>,
        mut exit_receiver: watch::Receiver<bool>,
    ) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let result = tokio::select! {
                res = Self::poller(config, notifier_sender) => res,
                res = exit_receiver.changed() => res.context(here!()),
            };

            info!(task = "Stream tracker", "Shutting down.");
            result
        })
    }

    async fn poller(
        config: Arc<Config>,
        notifier_sender: mpsc::Sender<Notification>,
    ) -> anyhow::Result<()> {
        let api = YouTubeApi::new(config.youtube_api_key.clone())?;
        let store = StateStore::new(&config.state_file);
        let index = store.load()?;

        info!(
            tracked_videos = index.len(),
            channels = config.channels.len(),
            "Stream tracker started."
        );

        let mut tracker = Self {
            config,
            api,
            store,
            index,
            channel_names: HashMap::new(),
            notifier_sender,
        };

        let mut is_startup = true;

        loop {
            tracker.poll_cycle(is_startup).await?;
            is_startup = false;

            sleep(tracker.config.poll_interval).await;
        }
    }

    /// One full pass over all configured channels, followed by a single
    /// state write. A failing channel is skipped, never the whole cycle.
    #[instrument(skip(self))]
    async fn poll_cycle(&mut self, is_startup: bool) -> anyhow::Result<()> {
        let channels = self.config.channels.clone();

        for channel in &channels {
            let channel_name = self.resolve_channel_name(channel).await;

            debug!(channel = %channel.channel_id, name = %channel_name, "Polling channel.");

            let details = match timeout(
                CHANNEL_FETCH_TIMEOUT,
                self.fetch_channel_snapshot(&channel.channel_id),
            )
            .await
            {
                Ok(Ok(details)) => details,
                Ok(Err(youtube_api::Error::QuotaExceeded)) => {
                    warn!(
                        channel = %channel.channel_id,
                        "API quota exceeded, skipping channel this cycle."
                    );
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(
                        channel = %channel.channel_id,
                        error = %e,
                        "Failed to fetch channel snapshot, skipping channel this cycle."
                    );
                    continue;
                }
                Err(_) => {
                    warn!(
                        channel = %channel.channel_id,
                        "Channel fetch timed out, skipping channel this cycle."
                    );
                    continue;
                }
            };

            let events = reconcile_channel(
                &mut self.index,
                &channel.channel_id,
                &channel_name,
                &details,
                is_startup,
                Utc::now(),
            );

            for event in events {
                info!(kind = %event.kind, video = %event.video, "Status transition detected.");

                if let Err(e) = self.notifier_sender.send(event).await {
                    error!("{:#}", e);
                }
            }
        }

        self.store.save(&self.index).context(here!())?;

        Ok(())
    }

    /// Builds the snapshot ID set for one channel: the feed's candidates,
    /// plus every video still tracked as upcoming or live so it keeps being
    /// re-checked after it drops out of the feed.
    async fn fetch_channel_snapshot(
        &self,
        channel_id: &str,
    ) -> Result<Vec<VideoDetail>, youtube_api::Error> {
        let mut ids = self
            .api
            .fetch_candidate_ids(channel_id, self.config.max_results)
            .await;

        let mut seen = ids.iter().cloned().collect::<HashSet<_>>();

        let tracked = self.index.values().filter(|record| {
            record.channel_id == channel_id
                && matches!(
                    record.status,
                    Some(VideoStatus::Upcoming | VideoStatus::Live)
                )
        });

        for record in tracked {
            if seen.insert(record.id.clone()) {
                ids.push(record.id.clone());
            }
        }

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.api.fetch_details(&ids).await
    }

    async fn resolve_channel_name(&mut self, channel: &Channel) -> String {
        if let Some(name) = &channel.name {
            return name.clone();
        }

        if let Some(name) = self.channel_names.get(&channel.channel_id) {
            return name.clone();
        }

        let name = self.api.fetch_channel_name(&channel.channel_id).await;
        self.channel_names
            .insert(channel.channel_id.clone(), name.clone());

        name
    }
}
