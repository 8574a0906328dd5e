use crate::aggregator::StatusAggregator;
use crate::config::ReportingConfig;
use crate::snapshot::{StatusFlags, StatusSnapshot};
use chrono::{DateTime, TimeZone, Utc};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0)
        .single()
        .expect("valid timestamp")
}

fn running() -> StatusFlags {
    StatusFlags {
        connected: true,
        servo_on: true,
        operating: true,
        ..StatusFlags::default()
    }
}

fn snap(ts: DateTime<Utc>, flags: StatusFlags) -> StatusSnapshot {
    StatusSnapshot {
        controller_id: 1,
        recorded_at: ts,
        flags,
    }
}

#[test]
fn last_sample_contributes_no_duration() {
    // Arrange
    let aggregator = StatusAggregator::new(ReportingConfig::default());
    let snapshots = vec![
        snap(at(10, 0), running()),
        snap(at(10, 30), StatusFlags::default()),
    ];

    // Act
    let history = aggregator.aggregate(&snapshots);

    // Assert
    assert_eq!(history.status_durations.running, 30.0);
    assert_eq!(history.status_durations.disconnect, 0.0);
    assert_eq!(history.status_durations.total(), 30.0);
    assert_eq!(history.total_records, 2);
    assert_eq!(history.operating_rate, 100.0);
}

#[test]
fn category_totals_sum_to_elapsed_time() {
    // Arrange
    let aggregator = StatusAggregator::new(ReportingConfig::default());
    let alarm = StatusFlags {
        alarm: true,
        ..running()
    };
    let snapshots = vec![
        snap(at(8, 0), running()),
        snap(at(8, 45), alarm),
        snap(at(9, 5), StatusFlags::default()),
        snap(at(9, 20), running()),
        snap(at(11, 0), running()),
    ];

    // Act
    let history = aggregator.aggregate(&snapshots);

    // Assert
    let elapsed = (at(11, 0) - at(8, 0)).num_minutes() as f64;
    assert!((history.status_durations.total() - elapsed).abs() < 1e-9);
    assert_eq!(history.status_durations.running, 45.0 + 100.0);
    assert_eq!(history.status_durations.alarm, 20.0);
    assert_eq!(history.status_durations.disconnect, 15.0);
    assert!((history.operating_rate - 145.0 / 180.0 * 100.0).abs() < 1e-9);
}

#[test]
fn unordered_input_is_sorted_before_attribution() {
    // Arrange
    let aggregator = StatusAggregator::new(ReportingConfig::default());
    let snapshots = vec![
        snap(at(10, 30), StatusFlags::default()),
        snap(at(10, 0), running()),
    ];

    // Act
    let history = aggregator.aggregate(&snapshots);

    // Assert
    assert_eq!(history.status_durations.running, 30.0);
    assert_eq!(history.status_durations.disconnect, 0.0);
}

#[test]
fn empty_window_yields_zeroed_history() {
    // Arrange
    let aggregator = StatusAggregator::new(ReportingConfig::default());

    // Act
    let history = aggregator.aggregate(&[]);

    // Assert
    assert_eq!(history.status_durations.total(), 0.0);
    assert_eq!(history.operating_rate, 0.0);
    assert_eq!(history.total_records, 0);
    assert_eq!(history.hourly_data.len(), 24);
    assert!(history.daily_data.is_empty());
}

#[test]
fn single_sample_has_no_duration_and_zero_rate() {
    let aggregator = StatusAggregator::new(ReportingConfig::default());

    let history = aggregator.aggregate(&[snap(at(10, 0), running())]);

    assert_eq!(history.status_durations.total(), 0.0);
    assert_eq!(history.operating_rate, 0.0);
    assert_eq!(history.total_records, 1);
}

#[test]
fn hourly_and_daily_buckets_use_local_offset() {
    // Arrange: 22:30 UTC is 01:30 on the next local day at +3h
    let aggregator = StatusAggregator::new(ReportingConfig::new(3));
    let snapshots = vec![
        snap(at(22, 30), running()),
        snap(at(23, 0), running()),
    ];

    // Act
    let history = aggregator.aggregate(&snapshots);

    // Assert
    let one_am = &history.hourly_data[1];
    assert_eq!(one_am.hour, "01:00");
    assert_eq!(one_am.durations.running, 30.0);
    assert_eq!(history.hourly_data[22].durations.running, 0.0);
    assert_eq!(history.daily_data.len(), 1);
    assert_eq!(history.daily_data[0].date, "2026-03-11");
}

#[test]
fn serializes_with_dashboard_field_names() {
    let aggregator = StatusAggregator::new(ReportingConfig::default());
    let history = aggregator.aggregate(&[snap(at(10, 0), running()), snap(at(10, 30), running())]);

    let json = serde_json::to_value(&history).expect("serialize history");

    assert_eq!(json["statusDurations"]["running"], 30.0);
    assert_eq!(json["statusDurations"]["energy_saving"], 0.0);
    assert_eq!(json["operatingRate"], 100.0);
    assert_eq!(json["totalRecords"], 2);
    assert_eq!(json["hourlyData"][13]["hour"], "13:00");
    assert_eq!(json["hourlyData"][13]["running"], 30.0);
    assert_eq!(json["dailyData"][0]["date"], "2026-03-10");
}
