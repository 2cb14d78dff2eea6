//! Normalization of raw host records into [`DownloadRecord`]s.

use chrono::{DateTime, NaiveDateTime};
use tracing::debug;

use crate::classify::classify;
use crate::host::{HostDownload, HostState};
use crate::identity;
use crate::record::{DownloadRecord, DownloadStatus, compute_progress};
use crate::speed::SpeedEstimator;

/// Maps the host state vocabulary onto [`DownloadStatus`].
///
/// `Cancelled` never comes from the host; it is set by the user cancel action.
#[must_use]
pub fn map_status(state: HostState, paused: bool) -> DownloadStatus {
    match (state, paused) {
        (HostState::Complete, _) => DownloadStatus::Completed,
        (HostState::InProgress | HostState::Interrupted, true) => DownloadStatus::Paused,
        (HostState::InProgress, false) => DownloadStatus::Downloading,
        (HostState::Interrupted, false) => DownloadStatus::Failed,
    }
}

/// Parses a host ISO-8601 timestamp into milliseconds since the Unix epoch.
///
/// Accepts RFC 3339 with an offset and, failing that, a naive timestamp read as UTC.
#[must_use]
pub fn parse_host_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Converts a raw host record, sampling the speed estimator as a side effect.
///
/// Returns `None` when no display name can be resolved; such records are host
/// self-test noise. Speed is sampled only while downloading with bytes
/// received; any other status clears the estimator entry for the id.
pub fn convert(
    raw: &HostDownload,
    speed_estimator: &mut SpeedEstimator,
    now_ms: i64,
) -> Option<DownloadRecord> {
    let Some(name) = identity::resolve(raw) else {
        debug!(id = raw.id, url = %raw.url, "Excluding host record without a usable name");
        return None;
    };

    let file_type = classify(&name, raw.mime.as_deref());
    let status = map_status(raw.state, raw.paused);

    let size = if raw.total_bytes > 0 {
        raw.total_bytes
    } else {
        raw.bytes_received
    };
    let received_bytes = raw.bytes_received;

    let speed = if status == DownloadStatus::Downloading && received_bytes > 0 {
        speed_estimator.sample(raw.id, received_bytes, now_ms)
    } else {
        speed_estimator.clear(raw.id);
        0.0
    };

    Some(DownloadRecord {
        id: raw.id,
        name,
        url: raw.url.clone(),
        path: raw.filename.clone(),
        size,
        received_bytes,
        progress: compute_progress(received_bytes, size),
        status,
        speed,
        start_time: raw
            .start_time
            .as_deref()
            .and_then(parse_host_timestamp)
            .unwrap_or(now_ms),
        end_time: raw.end_time.as_deref().and_then(parse_host_timestamp),
        error: raw.error.clone(),
        mime_type: raw.mime.clone(),
        file_type,
        can_resume: raw.can_resume,
        exists: raw.exists != Some(false),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::FileType;

    fn raw_download() -> HostDownload {
        let mut raw = HostDownload::new(7, "https://example.com/files/movie.mp4");
        raw.filename = "/home/u/Downloads/movie.mp4".to_string();
        raw.total_bytes = 4_000;
        raw.bytes_received = 1_000;
        raw.start_time = Some("2026-01-01T00:00:00.000Z".to_string());
        raw
    }

    #[test]
    fn test_map_status_covers_host_vocabulary() {
        assert_eq!(map_status(HostState::InProgress, false), DownloadStatus::Downloading);
        assert_eq!(map_status(HostState::InProgress, true), DownloadStatus::Paused);
        assert_eq!(map_status(HostState::Complete, false), DownloadStatus::Completed);
        assert_eq!(map_status(HostState::Interrupted, true), DownloadStatus::Paused);
        assert_eq!(map_status(HostState::Interrupted, false), DownloadStatus::Failed);
    }

    #[test]
    fn test_parse_host_timestamp_formats() {
        assert_eq!(parse_host_timestamp("1970-01-01T00:00:01.500Z"), Some(1_500));
        assert_eq!(parse_host_timestamp("1970-01-01T01:00:00+01:00"), Some(0));
        assert_eq!(parse_host_timestamp("1970-01-01T00:00:02"), Some(2_000));
        assert_eq!(parse_host_timestamp("yesterday"), None);
        assert_eq!(parse_host_timestamp(""), None);
    }

    #[test]
    fn test_convert_populates_derived_fields() {
        let mut speed = SpeedEstimator::new();
        let record = convert(&raw_download(), &mut speed, 0).unwrap();
        assert_eq!(record.name, "movie.mp4");
        assert_eq!(record.file_type, FileType::Video);
        assert_eq!(record.status, DownloadStatus::Downloading);
        assert_eq!(record.progress, 25);
        assert_eq!(record.start_time, 1_767_225_600_000);
        assert!(record.exists);
    }

    #[test]
    fn test_convert_samples_speed_while_downloading() {
        let mut speed = SpeedEstimator::new();
        let mut raw = raw_download();
        convert(&raw, &mut speed, 0).unwrap();
        raw.bytes_received = 3_000;
        let record = convert(&raw, &mut speed, 1_000).unwrap();
        assert!((record.speed - 2_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_convert_clears_speed_when_not_downloading() {
        let mut speed = SpeedEstimator::new();
        let mut raw = raw_download();
        convert(&raw, &mut speed, 0).unwrap();
        assert!(speed.is_tracking(7));

        raw.state = HostState::Complete;
        let record = convert(&raw, &mut speed, 1_000).unwrap();
        assert!(record.speed.abs() < f64::EPSILON);
        assert!(!speed.is_tracking(7));
    }

    #[test]
    fn test_convert_without_received_bytes_does_not_sample() {
        let mut speed = SpeedEstimator::new();
        let mut raw = raw_download();
        raw.bytes_received = 0;
        convert(&raw, &mut speed, 0).unwrap();
        assert!(!speed.is_tracking(7));
    }

    #[test]
    fn test_convert_size_falls_back_to_received_bytes() {
        let mut speed = SpeedEstimator::new();
        let mut raw = raw_download();
        raw.total_bytes = 0;
        let record = convert(&raw, &mut speed, 0).unwrap();
        assert_eq!(record.size, 1_000);
        assert_eq!(record.progress, 100);
    }

    #[test]
    fn test_convert_missing_start_time_uses_now() {
        let mut speed = SpeedEstimator::new();
        let mut raw = raw_download();
        raw.start_time = None;
        let record = convert(&raw, &mut speed, 42).unwrap();
        assert_eq!(record.start_time, 42);
    }

    #[test]
    fn test_convert_exists_only_false_when_explicit() {
        let mut speed = SpeedEstimator::new();
        let mut raw = raw_download();
        raw.exists = Some(false);
        assert!(!convert(&raw, &mut speed, 0).unwrap().exists);
        raw.exists = Some(true);
        assert!(convert(&raw, &mut speed, 0).unwrap().exists);
    }

    #[test]
    fn test_convert_excludes_self_test_entry() {
        let mut speed = SpeedEstimator::new();
        let mut raw = HostDownload::new(99, "");
        raw.filename = "/tmp/请确保关闭浏览器另存为对话框".to_string();
        assert!(convert(&raw, &mut speed, 0).is_none());
    }
}
