//! Pure lifecycle reconciliation: given the persisted index and a freshly
//! fetched snapshot for one channel, decides which status transitions
//! happened and which notifications to emit. No I/O happens here.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use utility::streams::{
    Notification, NotificationKind, VideoDetail, VideoRecord, VideoStatus,
};

/// Derives the lifecycle state of a fetched item from which of its
/// timestamps are present. `None` means the item carries no lifecycle
/// signal at all and must be skipped entirely.
pub fn derive_status(detail: &VideoDetail) -> Option<VideoStatus> {
    if detail.actual_end_time.is_some() {
        Some(VideoStatus::Completed)
    } else if detail.actual_start_time.is_some() {
        Some(VideoStatus::Live)
    } else if detail.scheduled_start_time.is_some() {
        Some(VideoStatus::Upcoming)
    } else {
        None
    }
}

fn fields_differ(previous: &VideoRecord, detail: &VideoDetail) -> bool {
    previous.title != detail.title
        || previous.url != detail.url
        || previous.thumbnail != detail.thumbnail
        || previous.start_time != detail.start_time()
}

/// Applies one channel's snapshot to the index, returning the notifications
/// to emit, in snapshot order followed by the stale-live cleanup pass.
///
/// On the first cycle after process start (`is_startup`), events the process
/// could not have observed itself are suppressed: schedules that are already
/// due, and endings of streams whose start was never seen.
pub fn reconcile_channel(
    index: &mut HashMap<String, VideoRecord>,
    channel_id: &str,
    channel_name: &str,
    details: &[VideoDetail],
    is_startup: bool,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let mut events = Vec::new();

    for detail in details {
        let status = match derive_status(detail) {
            Some(status) => status,
            None => {
                debug!(video = %detail.id, "Item carries no lifecycle signal, skipping.");
                continue;
            }
        };

        let previous = index.get(&detail.id);

        let kind = match status {
            VideoStatus::Upcoming => match previous {
                None => {
                    let already_due = detail.start_time().map_or(true, |t| t <= now);

                    if is_startup && already_due {
                        None
                    } else {
                        Some(NotificationKind::ScheduledCreated)
                    }
                }
                Some(previous) => {
                    fields_differ(previous, detail).then(|| NotificationKind::ScheduledUpdated)
                }
            },
            VideoStatus::Live => (previous.and_then(|p| p.status) != Some(VideoStatus::Live))
                .then(|| NotificationKind::LiveStarted),
            VideoStatus::Completed => match previous {
                None => None,
                Some(previous) => match previous.status {
                    Some(VideoStatus::Completed) => None,
                    Some(VideoStatus::Upcoming) if is_startup => None,
                    _ => Some(NotificationKind::LiveEnded),
                },
            },
        };

        let record = VideoRecord {
            id: detail.id.clone(),
            title: detail.title.clone(),
            url: detail.url.clone(),
            thumbnail: detail.thumbnail.clone(),
            start_time: detail.start_time(),
            status: Some(status),
            channel_id: channel_id.to_owned(),
            channel_name: channel_name.to_owned(),
        };

        if let Some(kind) = kind {
            events.push(Notification {
                kind,
                video: record.clone(),
                channel_name: channel_name.to_owned(),
            });
        }

        index.insert(record.id.clone(), record);
    }

    // Cleanup pass: anything still marked live for this channel that the
    // snapshot no longer contains has ended outside the fetch window.
    let returned_ids = details.iter().map(|d| d.id.as_str()).collect::<HashSet<_>>();

    let mut stale_ids = index
        .values()
        .filter(|record| {
            record.channel_id == channel_id
                && record.status == Some(VideoStatus::Live)
                && !returned_ids.contains(record.id.as_str())
        })
        .map(|record| record.id.clone())
        .collect::<Vec<_>>();
    stale_ids.sort_unstable();

    for id in stale_ids {
        if let Some(record) = index.get_mut(&id) {
            record.status = Some(VideoStatus::Completed);

            if !is_startup {
                events.push(Notification {
                    kind: NotificationKind::LiveEnded,
                    video: record.clone(),
                    channel_name: record.channel_name.clone(),
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tracing_test::traced_test;

    use super::*;

    const CHANNEL_ID: &str = "UCqm3BQLlJfvkTsX_hvm0UmA";
    const CHANNEL_NAME: &str = "Watame Ch.";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 4, 1, 12, 0, 0).unwrap()
    }

    fn detail(id: &str) -> VideoDetail {
        VideoDetail {
            id: id.to_string(),
            title: format!("Stream {}", id),
            url: format!("https://www.youtube.com/watch?v={}", id),
            thumbnail: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id),
            ..VideoDetail::default()
        }
    }

    fn upcoming(id: &str, start: DateTime<Utc>) -> VideoDetail {
        VideoDetail {
            scheduled_start_time: Some(start),
            ..detail(id)
        }
    }

    fn live(id: &str, start: DateTime<Utc>) -> VideoDetail {
        VideoDetail {
            scheduled_start_time: Some(start),
            actual_start_time: Some(start),
            ..detail(id)
        }
    }

    fn completed(id: &str, start: DateTime<Utc>) -> VideoDetail {
        VideoDetail {
            scheduled_start_time: Some(start),
            actual_start_time: Some(start),
            actual_end_time: Some(start + Duration::hours(1)),
            ..detail(id)
        }
    }

    fn reconcile(
        index: &mut HashMap<String, VideoRecord>,
        details: &[VideoDetail],
        is_startup: bool,
    ) -> Vec<Notification> {
        reconcile_channel(index, CHANNEL_ID, CHANNEL_NAME, details, is_startup, now())
    }

    fn kinds(events: &[Notification]) -> Vec<NotificationKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn derive_status_follows_timestamp_precedence() {
        let start = now();

        assert_eq!(derive_status(&detail("a")), None);
        assert_eq!(
            derive_status(&upcoming("a", start)),
            Some(VideoStatus::Upcoming)
        );
        assert_eq!(derive_status(&live("a", start)), Some(VideoStatus::Live));
        assert_eq!(
            derive_status(&completed("a", start)),
            Some(VideoStatus::Completed)
        );
    }

    #[test]
    fn new_upcoming_video_is_announced() {
        let mut index = HashMap::new();
        let snapshot = vec![upcoming("a", now() + Duration::hours(2))];

        let events = reconcile(&mut index, &snapshot, false);

        assert_eq!(kinds(&events), vec![NotificationKind::ScheduledCreated]);
        assert_eq!(events[0].channel_name, CHANNEL_NAME);
        assert_eq!(index["a"].status, Some(VideoStatus::Upcoming));
        assert_eq!(index["a"].channel_id, CHANNEL_ID);
    }

    #[test]
    fn startup_suppresses_already_due_schedules() {
        let mut index = HashMap::new();
        let snapshot = vec![upcoming("a", now() - Duration::minutes(5))];

        let events = reconcile(&mut index, &snapshot, true);

        assert!(events.is_empty());
        // The record is still tracked, only the announcement is skipped.
        assert_eq!(index["a"].status, Some(VideoStatus::Upcoming));
    }

    #[test]
    fn startup_still_announces_future_schedules() {
        let mut index = HashMap::new();
        let snapshot = vec![upcoming("a", now() + Duration::hours(2))];

        let events = reconcile(&mut index, &snapshot, true);

        assert_eq!(kinds(&events), vec![NotificationKind::ScheduledCreated]);
    }

    #[test]
    fn upcoming_video_going_live_is_announced() {
        let start = now() - Duration::minutes(1);
        let mut index = HashMap::new();

        reconcile(&mut index, &[upcoming("a", start)], false);
        let events = reconcile(&mut index, &[live("a", start)], false);

        assert_eq!(kinds(&events), vec![NotificationKind::LiveStarted]);
        assert_eq!(index["a"].status, Some(VideoStatus::Live));
    }

    #[test]
    fn live_video_discovered_late_is_announced() {
        let mut index = HashMap::new();

        let events = reconcile(&mut index, &[live("a", now())], false);

        assert_eq!(kinds(&events), vec![NotificationKind::LiveStarted]);
        assert_eq!(index["a"].status, Some(VideoStatus::Live));
    }

    #[test]
    fn end_of_untracked_video_is_never_announced() {
        let mut index = HashMap::new();

        let events = reconcile(&mut index, &[completed("a", now())], false);

        assert!(events.is_empty());
        // Still recorded, so later cycles stay quiet about it too.
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));
    }

    #[test]
    fn live_video_ending_is_announced_once() {
        let start = now() - Duration::hours(2);
        let mut index = HashMap::new();

        reconcile(&mut index, &[live("a", start)], false);

        let events = reconcile(&mut index, &[completed("a", start)], false);
        assert_eq!(kinds(&events), vec![NotificationKind::LiveEnded]);
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));

        let events = reconcile(&mut index, &[completed("a", start)], false);
        assert!(events.is_empty());
    }

    #[test]
    fn startup_suppresses_end_of_unwatched_stream() {
        let start = now() - Duration::hours(3);
        let mut index = HashMap::new();

        reconcile(&mut index, &[upcoming("a", start)], false);

        // Process restarts; the whole stream happened while it was offline.
        let events = reconcile(&mut index, &[completed("a", start)], true);

        assert!(events.is_empty());
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));
    }

    #[test]
    fn end_of_unwatched_stream_is_announced_outside_startup() {
        let start = now() - Duration::hours(3);
        let mut index = HashMap::new();

        reconcile(&mut index, &[upcoming("a", start)], false);
        let events = reconcile(&mut index, &[completed("a", start)], false);

        assert_eq!(kinds(&events), vec![NotificationKind::LiveEnded]);
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));
    }

    #[test]
    fn stale_live_video_is_forced_to_completed() {
        let mut index = HashMap::new();

        reconcile(&mut index, &[live("a", now())], false);

        // The video dropped out of the fetch window entirely.
        let events = reconcile(&mut index, &[], false);

        assert_eq!(kinds(&events), vec![NotificationKind::LiveEnded]);
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));
    }

    #[test]
    fn stale_live_cleanup_is_suppressed_at_startup() {
        let mut index = HashMap::new();

        reconcile(&mut index, &[live("a", now())], false);
        let events = reconcile(&mut index, &[], true);

        assert!(events.is_empty());
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));
    }

    #[test]
    fn stale_live_cleanup_ignores_other_channels() {
        let mut index = HashMap::new();

        reconcile_channel(
            &mut index,
            "UC_other",
            "Other Ch.",
            &[live("a", now())],
            false,
            now(),
        );

        let events = reconcile(&mut index, &[], false);

        assert!(events.is_empty());
        assert_eq!(index["a"].status, Some(VideoStatus::Live));
    }

    #[test]
    fn stale_cleanup_leaves_upcoming_records_alone() {
        let mut index = HashMap::new();

        reconcile(&mut index, &[upcoming("a", now() + Duration::hours(2))], false);
        let events = reconcile(&mut index, &[], false);

        assert!(events.is_empty());
        assert_eq!(index["a"].status, Some(VideoStatus::Upcoming));
    }

    #[test]
    fn reschedule_is_announced_once() {
        let mut index = HashMap::new();

        reconcile(&mut index, &[upcoming("a", now() + Duration::hours(2))], false);
        let events = reconcile(&mut index, &[upcoming("a", now() + Duration::hours(4))], false);

        assert_eq!(kinds(&events), vec![NotificationKind::ScheduledUpdated]);
        assert_eq!(index["a"].start_time, Some(now() + Duration::hours(4)));
    }

    #[test]
    fn simultaneous_field_changes_yield_a_single_event() {
        let mut index = HashMap::new();
        let start = now() + Duration::hours(2);

        reconcile(&mut index, &[upcoming("a", start)], false);

        let mut changed = upcoming("a", start + Duration::hours(1));
        changed.title = "Renamed stream".to_string();
        changed.thumbnail = "https://i.ytimg.com/vi/a/maxresdefault.jpg".to_string();

        let events = reconcile(&mut index, &[changed], false);

        assert_eq!(kinds(&events), vec![NotificationKind::ScheduledUpdated]);
    }

    #[test]
    fn field_appearing_counts_as_a_change() {
        let mut index = HashMap::new();

        // Legacy record without a start time, e.g. from an older state file.
        index.insert(
            "a".to_string(),
            VideoRecord {
                id: "a".to_string(),
                title: "Stream a".to_string(),
                url: "https://www.youtube.com/watch?v=a".to_string(),
                thumbnail: "https://i.ytimg.com/vi/a/hqdefault.jpg".to_string(),
                start_time: None,
                status: Some(VideoStatus::Upcoming),
                channel_id: CHANNEL_ID.to_string(),
                channel_name: CHANNEL_NAME.to_string(),
            },
        );

        let events = reconcile(&mut index, &[upcoming("a", now() + Duration::hours(1))], false);

        assert_eq!(kinds(&events), vec![NotificationKind::ScheduledUpdated]);
    }

    #[tokio::test]
    #[traced_test]
    async fn undetermined_items_are_dropped_entirely() {
        let mut index = HashMap::new();

        let events = reconcile(&mut index, &[detail("a")], false);

        assert!(events.is_empty());
        assert!(!index.contains_key("a"));
    }

    #[test]
    fn unchanged_snapshot_is_idempotent() {
        let start = now() - Duration::hours(1);
        let snapshot = vec![
            upcoming("a", now() + Duration::hours(2)),
            live("b", start),
            completed("c", start),
        ];

        let mut index = HashMap::new();
        let first = reconcile(&mut index, &snapshot, false);
        assert!(!first.is_empty());

        let second = reconcile(&mut index, &snapshot, false);
        assert!(second.is_empty());
    }

    #[test]
    fn status_never_regresses() {
        let start = now() - Duration::minutes(30);
        let mut index = HashMap::new();

        reconcile(&mut index, &[upcoming("a", start)], false);
        assert_eq!(index["a"].status, Some(VideoStatus::Upcoming));

        reconcile(&mut index, &[live("a", start)], false);
        assert_eq!(index["a"].status, Some(VideoStatus::Live));

        reconcile(&mut index, &[completed("a", start)], false);
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));

        // Completed items keep their status however often they reappear.
        reconcile(&mut index, &[completed("a", start)], false);
        assert_eq!(index["a"].status, Some(VideoStatus::Completed));
    }

    #[test]
    fn events_follow_snapshot_order_then_cleanup() {
        let start = now() - Duration::minutes(10);
        let mut index = HashMap::new();

        reconcile(&mut index, &[live("stale", start)], false);

        let snapshot = vec![upcoming("a", now() + Duration::hours(1)), live("b", start)];
        let events = reconcile(&mut index, &snapshot, false);

        assert_eq!(
            kinds(&events),
            vec![
                NotificationKind::ScheduledCreated,
                NotificationKind::LiveStarted,
                NotificationKind::LiveEnded,
            ]
        );
        assert_eq!(events[2].video.id, "stale");
    }
}
