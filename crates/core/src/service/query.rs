//! Read side of the service: live surfaces, timestamps, manual refresh

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, FixedOffset, Offset, Utc};
use serde::Serialize;

use super::cache::PredictionCache;
use super::scheduler::{RefreshScheduler, TriggerOutcome, TriggerSource};
use crate::core_types::Horizon;

/// Message returned while no cycle has completed.
pub const NOT_READY_MESSAGE: &str = "Data is not ready yet. Try again later.";

/// Acknowledgement for a manual refresh.
pub const REFRESH_MESSAGE: &str = "Updating live data & predictions in the background...";

/// Timestamp format for horizon labels.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Default service time zone offset (UTC+09:00) in seconds.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Response of [`QueryService::live`].
///
/// Serializes either as `{"status": "processing", "message": ...}` or as a
/// map from horizon key to `[lat, lon, value]` triples.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LiveResponse {
    Processing {
        status: &'static str,
        message: &'static str,
    },
    Ready(BTreeMap<Horizon, Vec<[f64; 3]>>),
}

impl LiveResponse {
    pub fn processing() -> Self {
        Self::Processing {
            status: "processing",
            message: NOT_READY_MESSAGE,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Horizon labels: the current time, then the next four full hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampsResponse {
    pub timestamps: Vec<String>,
}

/// Response of [`QueryService::request_refresh`]. The cycle result is never
/// included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshAck {
    pub message: &'static str,
    pub outcome: TriggerOutcome,
}

/// Read-only view over the cache plus the manual trigger.
#[derive(Clone)]
pub struct QueryService {
    cache: Arc<PredictionCache>,
    scheduler: RefreshScheduler,
    offset: FixedOffset,
}

impl QueryService {
    pub fn new(cache: Arc<PredictionCache>, scheduler: RefreshScheduler) -> Self {
        Self {
            cache,
            scheduler,
            offset: default_offset(),
        }
    }

    /// Render timestamps in this zone instead of UTC+09:00.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Latest surfaces, or the processing notice before the first cycle.
    pub fn live(&self) -> LiveResponse {
        match self.cache.get() {
            Ok(snapshot) => LiveResponse::Ready(snapshot.to_query_map()),
            Err(_) => LiveResponse::processing(),
        }
    }

    /// Labels for the five horizons relative to `now`.
    pub fn timestamps(&self, now: DateTime<Utc>) -> TimestampsResponse {
        TimestampsResponse {
            timestamps: timestamps_for(now, self.offset),
        }
    }

    /// Labels relative to the scheduler's clock.
    pub fn timestamps_now(&self) -> TimestampsResponse {
        self.timestamps(self.scheduler.pipeline().clock().now())
    }

    /// Schedule one refresh and return at once.
    pub fn request_refresh(&self) -> RefreshAck {
        RefreshAck {
            message: REFRESH_MESSAGE,
            outcome: self.scheduler.trigger(TriggerSource::Manual),
        }
    }
}

/// UTC+09:00.
pub fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `now` to the minute, then the next four full hours, in `offset`.
pub fn timestamps_for(now: DateTime<Utc>, offset: FixedOffset) -> Vec<String> {
    let local = now.with_timezone(&offset);
    let hour = local.duration_trunc(Duration::hours(1)).unwrap_or(local);

    std::iter::once(local.format(TIMESTAMP_FORMAT).to_string())
        .chain(Horizon::ALL[1..].iter().map(|h| {
            (hour + Duration::hours(i64::from(h.offset_hours())))
                .format(TIMESTAMP_FORMAT)
                .to_string()
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_processing_shape() {
        let json = serde_json::to_value(LiveResponse::processing()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "processing",
                "message": "Data is not ready yet. Try again later."
            })
        );
    }

    #[test]
    fn test_ready_shape() {
        let mut map = BTreeMap::new();
        map.insert(Horizon::T1, vec![[35.6, 139.7, 12.5]]);
        let json = serde_json::to_string(&LiveResponse::Ready(map)).unwrap();
        assert_eq!(json, r#"{"t+1":[[35.6,139.7,12.5]]}"#);
    }

    #[test]
    fn test_refresh_ack_shape() {
        let ack = RefreshAck {
            message: REFRESH_MESSAGE,
            outcome: TriggerOutcome::Dropped,
        };
        let json = serde_json::to_value(ack).unwrap();
        assert_eq!(json["message"], REFRESH_MESSAGE);
        assert_eq!(json["outcome"], "dropped");
    }

    #[test]
    fn test_timestamp_labels() {
        // 05:36 UTC is 14:36 in Tokyo
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 5, 36, 12).unwrap();
        let labels = timestamps_for(now, default_offset());
        assert_eq!(
            labels,
            vec![
                "2025-03-14 14:36",
                "2025-03-14 15:00",
                "2025-03-14 16:00",
                "2025-03-14 17:00",
                "2025-03-14 18:00",
            ]
        );
    }

    #[test]
    fn test_timestamp_labels_cross_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 13, 5, 0).unwrap();
        let labels = timestamps_for(now, default_offset());
        assert_eq!(labels[0], "2025-03-14 22:05");
        assert_eq!(labels[2], "2025-03-15 00:00");
        assert_eq!(labels[4], "2025-03-15 02:00");
    }
}
