//! Integration tests for the download session.
//!
//! These tests drive a session against the in-memory host, mirroring each
//! host notification into the host before the session sees it.

use std::sync::{Arc, Mutex, PoisonError};

use tempfile::TempDir;
use tracker_core::{
    CompletionNotice, ControlError, DownloadDelta, DownloadSession, DownloadSettings,
    DownloadStatus, FieldChange, FilterOptions, HostDownload, HostEvent, HostOperation, HostState,
    MemoryHost, Notifier, RetryOutcome, TrackerConfig,
};

const FIRST_START_MS: i64 = 1_700_000_000_000;
const FIRST_START: &str = "2023-11-14T22:13:20Z";

#[derive(Debug, Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<CompletionNotice>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<CompletionNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &CompletionNotice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
    }
}

fn config() -> TrackerConfig {
    TrackerConfig {
        auto_resume_delay_ms: Some(0),
        ..TrackerConfig::default()
    }
}

fn setup() -> (Arc<MemoryHost>, DownloadSession) {
    let host = Arc::new(MemoryHost::new());
    let session = DownloadSession::new(host.clone(), &config());
    (host, session)
}

fn in_progress(id: i64, url: &str, path: &str) -> HostDownload {
    let mut raw = HostDownload::new(id, url);
    raw.filename = path.to_string();
    raw.total_bytes = 1_000;
    raw.bytes_received = 250;
    raw.start_time = Some(FIRST_START.to_string());
    raw
}

fn failed(id: i64, url: &str, path: &str) -> HostDownload {
    let mut raw = in_progress(id, url, path);
    raw.state = HostState::Interrupted;
    raw.can_resume = Some(false);
    raw.error = Some("NETWORK_FAILED".to_string());
    raw
}

fn state_change(id: i64, from: HostState, to: HostState) -> DownloadDelta {
    let mut delta = DownloadDelta::new(id);
    delta.state = Some(FieldChange::new(Some(from), Some(to)));
    delta
}

async fn deliver(host: &MemoryHost, session: &mut DownloadSession, event: HostEvent) {
    host.observe(&event);
    session.handle_event(event).await;
}

// ==================== Retry ====================

#[tokio::test]
async fn test_retry_after_failure_keeps_slot_and_original_start() {
    let (host, mut session) = setup();
    host.insert(in_progress(1, "https://example.com/other.bin", "/d/other.bin"));
    host.insert(failed(2, "https://example.com/report.pdf", "/d/report.pdf"));
    session.refresh().await.unwrap();
    let slot = session.records().iter().position(|r| r.id == 2).unwrap();

    let outcome = session.retry(2).await.unwrap();
    let RetryOutcome::Restarted { old_id, new_id } = outcome else {
        panic!("expected a restart, got {outcome:?}");
    };
    assert_eq!(old_id, 2);
    assert!(host.get(2).is_none());

    let record = &session.records()[slot];
    assert_eq!(record.id, new_id);
    assert_eq!(record.start_time, FIRST_START_MS);
    assert_eq!(record.status, DownloadStatus::Downloading);
    assert_eq!(session.records().len(), 2);

    // The host announces the new download afterwards; nothing is duplicated.
    let created = host.get(new_id).unwrap();
    session.handle_event(HostEvent::Created(created)).await;
    assert_eq!(session.records().len(), 2);
    assert_eq!(session.ledger().get(new_id).unwrap().start_time, FIRST_START_MS);
}

#[tokio::test]
async fn test_retry_requests_old_file_name() {
    let (host, mut session) = setup();
    host.insert(failed(3, "https://example.com/get?id=9", "/d/quarterly.xlsx"));
    session.refresh().await.unwrap();

    let RetryOutcome::Restarted { new_id, .. } = session.retry(3).await.unwrap() else {
        panic!("expected a restart");
    };
    assert_eq!(host.get(new_id).unwrap().filename, "quarterly.xlsx");
    assert_eq!(session.ledger().get(new_id).unwrap().name, "quarterly.xlsx");
}

#[tokio::test]
async fn test_retry_resumes_resumable_download() {
    let (host, mut session) = setup();
    let mut raw = failed(4, "https://example.com/big.iso", "/d/big.iso");
    raw.can_resume = Some(true);
    host.insert(raw);
    session.refresh().await.unwrap();

    assert_eq!(session.retry(4).await.unwrap(), RetryOutcome::Resumed);
    assert_eq!(host.get(4).unwrap().state, HostState::InProgress);
    assert_eq!(host.call_count(HostOperation::Download), 0);
}

#[tokio::test]
async fn test_retry_without_url_touches_nothing() {
    let (host, mut session) = setup();
    host.insert(failed(5, "", "/d/orphan.txt"));
    session.refresh().await.unwrap();
    let calls_before = host.calls().len();

    assert_eq!(session.retry(5).await.unwrap_err(), ControlError::MissingUrl);
    assert_eq!(host.calls().len(), calls_before);
    assert!(host.get(5).is_some());
}

// ==================== Completion ====================

#[tokio::test]
async fn test_completion_notifies_with_file_name() {
    let (host, session) = setup();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session.with_notifier(notifier.clone());
    host.insert(in_progress(1, "https://example.com/a.pdf", "C:\\Users\\u\\Downloads\\report.pdf"));
    session.refresh().await.unwrap();

    let delta = state_change(1, HostState::InProgress, HostState::Complete);
    deliver(&host, &mut session, HostEvent::Changed(delta)).await;

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].file_name, "report.pdf");
    assert!(notices[0].silent);
    assert_eq!(session.records()[0].status, DownloadStatus::Completed);
    assert_eq!(host.call_count(HostOperation::Show), 0);
}

#[tokio::test]
async fn test_completion_opens_folder_when_enabled() {
    let (host, session) = setup();
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = DownloadSettings {
        open_folder: true,
        show_notification: false,
        play_sound: true,
    };
    let mut session = session.with_notifier(notifier.clone()).with_settings(settings);
    host.insert(in_progress(1, "https://example.com/a.zip", "/d/a.zip"));
    session.refresh().await.unwrap();

    let delta = state_change(1, HostState::InProgress, HostState::Complete);
    deliver(&host, &mut session, HostEvent::Changed(delta)).await;

    assert_eq!(host.call_count(HostOperation::Show), 1);
    assert!(notifier.notices().is_empty());
}

// ==================== Interruptions ====================

#[tokio::test]
async fn test_resumable_interruption_is_auto_resumed() {
    let (host, mut session) = setup();
    host.insert(in_progress(1, "https://example.com/a.zip", "/d/a.zip"));
    session.refresh().await.unwrap();

    let mut delta = state_change(1, HostState::InProgress, HostState::Interrupted);
    delta.can_resume = Some(FieldChange::new(None, Some(true)));
    deliver(&host, &mut session, HostEvent::Changed(delta)).await;
    assert_eq!(session.records()[0].status, DownloadStatus::Failed);

    session.settle().await;
    assert_eq!(host.call_count(HostOperation::Resume), 1);
    assert_eq!(host.get(1).unwrap().state, HostState::InProgress);
}

#[tokio::test]
async fn test_user_cancel_is_not_auto_resumed() {
    let (host, mut session) = setup();
    host.insert(in_progress(1, "https://example.com/a.zip", "/d/a.zip"));
    session.refresh().await.unwrap();

    session.cancel(1).await.unwrap();
    let mut delta = state_change(1, HostState::InProgress, HostState::Interrupted);
    delta.can_resume = Some(FieldChange::new(None, Some(true)));
    session.handle_event(HostEvent::Changed(delta)).await;
    session.settle().await;

    assert_eq!(host.call_count(HostOperation::Resume), 0);
    assert_eq!(session.records()[0].status, DownloadStatus::Cancelled);
    assert_eq!(session.records()[0].speed, 0.0);
}

#[tokio::test]
async fn test_failed_pause_leaves_ledger_untouched() {
    let (host, mut session) = setup();
    host.insert(in_progress(1, "https://example.com/a.zip", "/d/a.zip"));
    session.refresh().await.unwrap();
    host.fail_on(HostOperation::Pause, "Download must be in progress");

    let err = session.pause(1).await.unwrap_err();
    assert!(matches!(err, ControlError::Host { operation: HostOperation::Pause, .. }));
    assert_eq!(session.records()[0].status, DownloadStatus::Downloading);
}

// ==================== Records and views ====================

#[tokio::test]
async fn test_self_test_records_are_excluded() {
    let (host, mut session) = setup();
    let noise = in_progress(9, "", "/tmp/这是Chrono在测试下载配置.txt");
    deliver(&host, &mut session, HostEvent::Created(noise)).await;
    assert!(session.records().is_empty());
}

#[tokio::test]
async fn test_delete_file_and_record_follows_erase_event() {
    let (host, mut session) = setup();
    let mut raw = in_progress(1, "https://example.com/a.zip", "/d/a.zip");
    raw.state = HostState::Complete;
    raw.bytes_received = 1_000;
    host.insert(raw);
    session.refresh().await.unwrap();

    session.delete_file_and_record(1).await.unwrap();
    assert_eq!(session.records().len(), 1);

    session.handle_event(HostEvent::Erased { id: 1 }).await;
    assert!(session.records().is_empty());
}

#[tokio::test]
async fn test_pagination_persists_across_sessions() {
    let dir = TempDir::new().unwrap();
    let config = TrackerConfig {
        pagination_file: Some(dir.path().join("pagination.json")),
        ..config()
    };
    let host = Arc::new(MemoryHost::new());

    let mut first = DownloadSession::new(host.clone(), &config);
    first.set_page_size(5);
    first.set_current_page(3);

    let second = DownloadSession::new(host, &config);
    assert_eq!(second.view().page_size(), 5);
    assert_eq!(second.view().current_page(), 3);
}

#[tokio::test]
async fn test_filter_and_stats_over_session_records() {
    let (host, mut session) = setup();
    host.insert(in_progress(1, "https://example.com/a.mp4", "/d/a.mp4"));
    host.insert(failed(2, "https://example.com/b.pdf", "/d/b.pdf"));
    host.insert(failed(3, "https://example.com/c.png", "/d/c.png"));
    session.refresh().await.unwrap();

    session.set_filter(FilterOptions {
        status: Some(DownloadStatus::Failed),
        ..FilterOptions::default()
    });
    let page = session.page();
    assert_eq!(page.total_items, 2);
    assert!(page.items.iter().all(|r| r.status == DownloadStatus::Failed));

    let stats = session.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.downloading, 1);
    assert_eq!(stats.failed, 2);
}
