use super::{IngestRequest, ReadingIngestor, SiteDetails};
use crate::alerts::GLOBAL_ALERTS_KEY;
use crate::classify::Status;
use crate::error::ValidationError;
use crate::history::{HistoryFilter, HistoryLog, HistorySubject, MemoryHistoryLog};
use crate::stats::IngestStats;
use crate::store::{LatestState, MemoryStateStore, StateStore};
use crate::test_support::{FlakyHistoryLog, FlakyStateStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_717_000_000 + secs, 0).unwrap()
}

fn memory_ingestor() -> (ReadingIngestor, Arc<MemoryStateStore>, Arc<MemoryHistoryLog>) {
    let state = Arc::new(MemoryStateStore::new());
    let history = Arc::new(MemoryHistoryLog::new());
    let ingestor = ReadingIngestor::new(
        state.clone(),
        history.clone(),
        Arc::new(IngestStats::new()),
    );
    (ingestor, state, history)
}

#[tokio::test]
async fn critical_machine_reading_counts_once_and_is_logged() {
    let (ingestor, state, history) = memory_ingestor();

    let reading = ingestor
        .ingest(IngestRequest::machine("Machine-B2", "temperature", 85.0, Some(ts(0))))
        .await
        .unwrap();
    assert_eq!(reading.status, Status::Critical);

    assert_eq!(state.counter(GLOBAL_ALERTS_KEY).await.unwrap(), Some(1));
    assert_eq!(ingestor.alerts().total().await.unwrap(), 1);

    let entries = history.query(HistoryFilter::Machines, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].subject,
        HistorySubject::Machine {
            source_id: "Machine-B2".to_string()
        }
    );
    assert_eq!(entries[0].value, 85.0);
    assert_eq!(entries[0].status, Status::Critical);
    assert_eq!(entries[0].observed_at, ts(0));
}

#[tokio::test]
async fn newer_reading_replaces_the_snapshot_wholesale() {
    let (ingestor, state, _history) = memory_ingestor();
    ingestor
        .ingest(IngestRequest::machine("Machine-C3", "pressure", 40.0, Some(ts(0))))
        .await
        .unwrap();

    ingestor
        .ingest(IngestRequest::machine("Machine-C3", "temp", 95.0, Some(ts(60))))
        .await
        .unwrap();

    let stored = state.get("Machine-C3").await.unwrap().unwrap();
    assert_eq!(
        stored,
        LatestState {
            value: 95.0,
            status: Status::Critical,
            last_seen: ts(60),
            metric: "temp".to_string(),
            description: None,
            display_city: None,
        }
    );
}

#[tokio::test]
async fn out_of_order_reading_is_logged_but_keeps_newer_state() {
    let (ingestor, state, history) = memory_ingestor();
    ingestor
        .ingest(IngestRequest::machine("Machine-A1", "temp", 60.0, Some(ts(100))))
        .await
        .unwrap();
    ingestor
        .ingest(IngestRequest::machine("Machine-A1", "temp", 20.0, Some(ts(50))))
        .await
        .unwrap();

    let stored = state.get("Machine-A1").await.unwrap().unwrap();
    assert_eq!(stored.value, 60.0);
    assert_eq!(stored.last_seen, ts(100));
    assert_eq!(history.len().await, 2);
    assert_eq!(
        ingestor.stats().stale_state_writes.load(Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn invalid_values_are_rejected_without_writes() {
    let (ingestor, state, history) = memory_ingestor();

    let err = ingestor
        .ingest(IngestRequest::machine(
            "Machine-A1",
            "temp",
            super::RawValue::Text("hot".to_string()),
            None,
        ))
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::NotNumeric("hot".to_string()));

    let err = ingestor
        .ingest(IngestRequest::machine("Machine-A1", "temp", f64::NAN, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::NotFinite(_)));

    let err = ingestor
        .ingest(IngestRequest::machine("  ", "temp", 10.0, None))
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::MissingSource);

    assert!(state.get("Machine-A1").await.unwrap().is_none());
    assert_eq!(history.len().await, 0);
    assert_eq!(state.counter(GLOBAL_ALERTS_KEY).await.unwrap(), None);
    assert_eq!(ingestor.stats().rejected.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn numeric_text_is_accepted() {
    let (ingestor, _state, _history) = memory_ingestor();
    let reading = ingestor
        .ingest(IngestRequest::machine(
            "Machine-A1",
            "vibration",
            super::RawValue::Text(" 72.5 ".to_string()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(reading.value, 72.5);
    assert_eq!(reading.status, Status::Warning);
}

#[tokio::test]
async fn history_failure_keeps_state_and_alert() {
    let state = Arc::new(MemoryStateStore::new());
    let history = Arc::new(FlakyHistoryLog::default());
    history.fail_append.store(true, Ordering::SeqCst);
    let ingestor = ReadingIngestor::new(state.clone(), history.clone(), Arc::new(IngestStats::new()));

    let reading = ingestor
        .ingest(IngestRequest::machine("Machine-B2", "temp", 99.0, Some(ts(0))))
        .await
        .expect("ingest succeeds despite history failure");

    assert_eq!(reading.status, Status::Critical);
    assert_eq!(state.get("Machine-B2").await.unwrap().unwrap().value, 99.0);
    assert_eq!(state.counter(GLOBAL_ALERTS_KEY).await.unwrap(), Some(1));
    assert_eq!(history.inner.len().await, 0);

    let stats = ingestor.stats().snapshot();
    assert_eq!(stats.history_failures, 1);
    assert_eq!(stats.accepted, 1);
    assert!(stats.last_error.is_some());
}

#[tokio::test]
async fn state_failure_still_counts_and_logs() {
    let state = Arc::new(FlakyStateStore::default());
    state.fail_put.store(true, Ordering::SeqCst);
    let history = Arc::new(MemoryHistoryLog::new());
    let ingestor = ReadingIngestor::new(state.clone(), history.clone(), Arc::new(IngestStats::new()));

    ingestor
        .ingest(IngestRequest::machine("Machine-B2", "temp", 81.0, Some(ts(0))))
        .await
        .unwrap();

    assert!(state.inner.get("Machine-B2").await.unwrap().is_none());
    assert_eq!(state.inner.counter(GLOBAL_ALERTS_KEY).await.unwrap(), Some(1));
    assert_eq!(history.len().await, 1);
    assert_eq!(ingestor.stats().snapshot().state_write_failures, 1);
}

#[tokio::test]
async fn alert_failure_does_not_block_history() {
    let state = Arc::new(FlakyStateStore::default());
    state.fail_increment.store(true, Ordering::SeqCst);
    let history = Arc::new(MemoryHistoryLog::new());
    let ingestor = ReadingIngestor::new(state.clone(), history.clone(), Arc::new(IngestStats::new()));

    ingestor
        .ingest(IngestRequest::machine("Machine-B2", "temp", 90.0, Some(ts(0))))
        .await
        .unwrap();

    assert!(state.inner.get("Machine-B2").await.unwrap().is_some());
    assert_eq!(history.len().await, 1);
    assert_eq!(ingestor.stats().snapshot().alert_failures, 1);
}

#[tokio::test]
async fn concurrent_critical_readings_are_conserved() {
    let (ingestor, state, history) = memory_ingestor();
    let mut handles = Vec::new();
    for i in 0..20i64 {
        let b2_ingestor = ingestor.clone();
        handles.push(tokio::spawn(async move {
            b2_ingestor
                .ingest(IngestRequest::machine("Machine-B2", "temp", 90.0, Some(ts(i))))
                .await
                .unwrap();
        }));
        let a1_ingestor = ingestor.clone();
        handles.push(tokio::spawn(async move {
            a1_ingestor
                .ingest(IngestRequest::machine("Machine-A1", "temp", 30.0, Some(ts(i))))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(state.counter(GLOBAL_ALERTS_KEY).await.unwrap(), Some(20));
    assert_eq!(history.len().await, 40);
    let b2 = state.get("Machine-B2").await.unwrap().unwrap();
    assert_eq!(b2.last_seen, ts(19));
}

#[tokio::test]
async fn site_reading_carries_site_details() {
    let (ingestor, state, history) = memory_ingestor();
    let observed = ts(0) + Duration::minutes(15);
    ingestor
        .ingest(IngestRequest::site(
            "lyon",
            "temperature",
            21.4,
            observed,
            SiteDetails {
                display_name: "Lyon".to_string(),
                description: "Partly cloudy".to_string(),
            },
        ))
        .await
        .unwrap();

    let stored = state.get("lyon").await.unwrap().unwrap();
    assert_eq!(stored.display_city.as_deref(), Some("Lyon"));
    assert_eq!(stored.description.as_deref(), Some("Partly cloudy"));

    assert!(history
        .query(HistoryFilter::Machines, 10)
        .await
        .unwrap()
        .is_empty());
    let sites = history.query(HistoryFilter::Sites, 15).await.unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(
        sites[0].subject,
        HistorySubject::Site {
            site: "lyon".to_string(),
            display_name: "Lyon".to_string(),
        }
    );
}
