// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Whole-run tests: coordinator, workers, backends and broadcaster together.

use std::collections::HashSet;
use std::time::Duration;

use crate::backends::stub::{StubBackend, StubScript};
use crate::config::{MonitorConfig, MonitorParams};
use crate::engine::{EngineState, Monitor, RunReport};
use crate::errors::{BackendError, EngineError};
use crate::model::{DataField, Frame};
use crate::pipeline::{Calibration, CalibrationConstants, CellConstants, Pipeline};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

fn base_params(node_pool_size: u64) -> MonitorParams {
    let mut params = MonitorParams::default();
    params.set("om", "node_pool_size", node_pool_size);
    params.set("om", "fetch_timeout_secs", 2.0);
    params.set("om", "drain_timeout_secs", 5.0);
    params.set("om", "backend_retry_delay_ms", 1u64);
    params.set("data_retrieval_layer", "backend_profile", "synthetic");
    params
}

/// A monitor over the scripted stub backend, without peak detection.
fn stub_monitor(params: &MonitorParams, stub: &StubBackend) -> Monitor {
    let config = MonitorConfig::from_params(params).unwrap();
    let pipeline = Pipeline::new(config.source.requested_fields().collect());
    Monitor::new(config, stub.descriptor(), pipeline)
}

async fn run_to_end(monitor: Monitor) -> Result<RunReport, EngineError> {
    tokio::time::timeout(RUN_TIMEOUT, monitor.run())
        .await
        .expect("run did not finish")
}

fn assert_all_shut_down(report: &RunReport) {
    assert_eq!(report.coordinator.final_state, EngineState::Shutdown);
    for worker in &report.workers {
        assert_eq!(worker.final_state, EngineState::Shutdown, "rank {}", worker.rank);
    }
}

#[tokio::test]
async fn test_end_to_end_synthetic_hit_count() {
    let params = MonitorParams::from_yaml_str(
        r#"
om:
  node_pool_size: 4
data_retrieval_layer:
  backend_profile: synthetic
synthetic:
  num_events: 100
  hit_fraction: 0.4
  peaks_per_hit: 5
peakfinder8_peak_detection:
  max_num_peaks: 100
  adc_threshold: 50
  minimum_snr: 5
  min_pixel_count: 1
  max_pixel_count: 30
  local_bg_radius: 3
  min_r: 0
  max_r: 100
crystallography:
  min_num_peaks_for_hit: 3
  max_num_peaks_for_hit: 10
  data_broadcast_interval: 10
broadcast:
  subscriber_queue: 64
"#,
    )
    .unwrap();
    let monitor = Monitor::from_params(&params).unwrap();
    let mut subscription = monitor.broadcaster().subscribe();

    let report = run_to_end(monitor).await.unwrap();

    assert_eq!(report.total(), 100);
    assert_eq!(report.hits(), 40);
    assert_eq!(report.lost(), 0);
    assert_eq!(report.coordinator.stats.processed, 100);
    assert_eq!(report.workers.len(), 3);
    assert!(report.failed_workers.is_empty());
    assert_all_shut_down(&report);

    let mut events = 0;
    let mut hits = 0;
    let mut last = None;
    while let Some(message) = subscription.recv_message().await {
        let message = message.unwrap();
        events += message.events.len();
        hits += message.events.iter().filter(|e| e.hit_flag == Some(true)).count();
        last = Some(message);
    }
    assert_eq!(events, 100);
    assert_eq!(hits, 40);
    let last = last.unwrap();
    assert_eq!(last.total, 100);
    assert_eq!(last.per_rank.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(last.per_rank.values().sum::<u64>(), 100);
    assert!((last.rates.hit_rate - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_shutdown_mid_stream_drains_cleanly() {
    let stub = StubBackend::new(StubScript {
        event_interval: Duration::from_millis(1),
        ..Default::default()
    });
    let monitor = stub_monitor(&base_params(4), &stub);
    let shutdown = monitor.shutdown_handle();
    let run = tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.shutdown("test");
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("nodes did not stop within the drain timeout")
        .unwrap()
        .unwrap();

    assert_all_shut_down(&report);
    assert!(!report.coordinator.drain_timed_out);
    assert_eq!(report.coordinator.workers_reported, 3);

    let ledger = stub.ledger();
    let fetched = ledger.fetched();
    let unique: HashSet<_> = fetched.iter().collect();
    assert_eq!(unique.len(), fetched.len(), "an event was fetched twice");
    assert!(ledger.balanced(), "an event was left open or closed twice");
    assert!(!fetched.is_empty());
    assert_eq!(report.total(), fetched.len() as u64);
}

#[tokio::test]
async fn test_failing_events_are_closed_exactly_once() {
    let stub = StubBackend::new(StubScript {
        num_events: Some(30),
        panic_on: vec![3, 17],
        fail_extract_on: vec![5],
        fail_open_on: vec![8, 9],
        ..Default::default()
    });
    let report = run_to_end(stub_monitor(&base_params(3), &stub)).await.unwrap();

    let ledger = stub.ledger();
    assert!(ledger.balanced());
    assert_eq!(ledger.total_opened(), 30);
    for index in [3, 5, 8, 9, 17] {
        assert_eq!(ledger.close_count(&format!("stub-{}", index)), 1, "stub-{}", index);
    }
    assert_eq!(report.total(), 28);
    assert_eq!(report.coordinator.stats.degraded, 3);
    assert_eq!(report.coordinator.stats.backend_errors, 2);
    assert_eq!(report.coordinator.stats.extraction_failures, 1);
}

#[tokio::test]
async fn test_persistent_backend_failure_is_fatal() {
    let stub = StubBackend::new(StubScript {
        always_fail_fetch: true,
        ..Default::default()
    });
    let mut params = base_params(3);
    params.set("om", "max_backend_retries", 2u64);

    let err = run_to_end(stub_monitor(&params, &stub)).await.unwrap_err();
    assert!(matches!(err, EngineError::BackendFatal { attempts: 3, .. }));
    assert_eq!(stub.ledger().fetch_failures(), 6);
}

#[tokio::test]
async fn test_stale_events_are_counted_not_processed() {
    let stub = StubBackend::new(StubScript {
        num_events: Some(10),
        timestamp: Some(0.0),
        ..Default::default()
    });
    let mut params = base_params(3);
    params.set("data_retrieval_layer", "frame_age_threshold_secs", 5.0);

    let report = run_to_end(stub_monitor(&params, &stub)).await.unwrap();
    assert_eq!(report.total(), 0);
    assert_eq!(report.coordinator.stats.skipped_stale, 10);
    assert_eq!(stub.ledger().total_opened(), 0);
}

#[tokio::test]
async fn test_stalled_backend_is_bounded_by_fetch_timeout() {
    let stub = StubBackend::new(StubScript {
        stall_after: Some(1),
        ..Default::default()
    });
    let mut params = base_params(3);
    params.set("om", "fetch_timeout_secs", 0.05);
    let monitor = stub_monitor(&params, &stub);
    let shutdown = monitor.shutdown_handle();
    let run = tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.shutdown("test");
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(report.total(), 2);
    assert!(report.coordinator.stats.skipped_timeout >= 2);
    assert_all_shut_down(&report);
}

#[tokio::test]
async fn test_shutdown_reaches_workers_stalled_in_initialization() {
    let stub = StubBackend::new(StubScript {
        stall_init: true,
        ..Default::default()
    });
    let monitor = stub_monitor(&base_params(4), &stub);
    let shutdown = monitor.shutdown_handle();
    let run = tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.shutdown("test");
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown did not reach the initializing workers")
        .unwrap()
        .unwrap();

    assert_all_shut_down(&report);
    assert_eq!(report.total(), 0);
    assert_eq!(report.coordinator.workers_reported, 3);
    assert!(!report.coordinator.drain_timed_out);
    assert_eq!(stub.ledger().init_attempts(), 4);
}

#[tokio::test]
async fn test_stalled_initialization_exhausts_retries() {
    let stub = StubBackend::new(StubScript {
        stall_init: true,
        ..Default::default()
    });
    let mut params = base_params(3);
    params.set("om", "fetch_timeout_secs", 0.05);
    params.set("om", "max_backend_retries", 1u64);

    let err = run_to_end(stub_monitor(&params, &stub)).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::BackendFatal {
            attempts: 2,
            source: BackendError::TimedOut { .. },
            ..
        }
    ));
    // one coordinator attempt plus two per worker
    assert_eq!(stub.ledger().init_attempts(), 5);
}

#[tokio::test]
async fn test_multi_cell_calibration_without_cell_ids_degrades_every_event() {
    let stub = StubBackend::new(StubScript {
        num_events: Some(10),
        ..Default::default()
    });
    let constants = CalibrationConstants::new(vec![
        CellConstants {
            offset: Frame::zeros(16, 16),
            gain: Frame::filled(16, 16, 1.0),
        },
        CellConstants {
            offset: Frame::filled(16, 16, 50.0),
            gain: Frame::filled(16, 16, 2.0),
        },
    ])
    .unwrap();
    let config = MonitorConfig::from_params(&base_params(3)).unwrap();
    let pipeline = Pipeline::new(vec![(DataField::DetectorData, true), (DataField::CellId, false)])
        .with_calibration(Calibration::new(constants));

    let report = run_to_end(Monitor::new(config, stub.descriptor(), pipeline)).await.unwrap();
    assert_eq!(report.total(), 10);
    assert_eq!(report.coordinator.stats.degraded, 10);
    assert_eq!(report.coordinator.stats.extraction_failures, 0);
    assert!(stub.ledger().balanced());
}
