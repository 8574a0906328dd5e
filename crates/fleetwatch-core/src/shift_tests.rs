use crate::config::ReportingConfig;
use crate::shift::{parse_date, parse_days, parse_time, ReportWindow, ShiftWindow, WindowError};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

fn t(value: &str) -> NaiveTime {
    parse_time(value).expect("valid time")
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn day_shift_uses_and_range() {
    // Arrange
    let shift = ShiftWindow::parse("08:00:00", "16:00:00").expect("shift");

    // Act / Assert
    assert!(!shift.crosses_midnight());
    assert!(!shift.contains(t("07:59:59")));
    assert!(shift.contains(t("08:00:01")));
    assert!(shift.contains(t("16:00:00")));
    assert!(!shift.contains(t("16:00:01")));
}

#[test]
fn night_shift_uses_or_range() {
    // Arrange
    let shift = ShiftWindow::parse("22:00:00", "06:00:00").expect("shift");

    // Act / Assert
    assert!(shift.crosses_midnight());
    assert!(shift.contains(t("23:00:00")));
    assert!(shift.contains(t("05:00:00")));
    assert!(!shift.contains(t("12:00:00")));
}

#[test]
fn shift_ending_at_midnight_crosses() {
    let shift = ShiftWindow::parse("16:00", "00:00").expect("shift");

    assert!(shift.crosses_midnight());
    assert!(shift.contains(t("23:59:59")));
    assert!(shift.contains(t("00:00:00")));
    assert!(!shift.contains(t("15:59:59")));
}

#[test]
fn sql_predicate_switches_joiner() {
    let day_shift = ShiftWindow::parse("07:00", "15:00").expect("shift");
    let night_shift = ShiftWindow::parse("23:00", "07:00").expect("shift");

    let day_sql = day_shift.sql_predicate("lt");
    let night_sql = night_shift.sql_predicate("lt");

    assert_eq!(day_sql.clause, "(lt >= :shift_start AND lt <= :shift_end)");
    assert_eq!(night_sql.clause, "(lt >= :shift_start OR lt <= :shift_end)");
    assert_eq!(
        night_sql.params,
        vec![
            (":shift_start", "23:00:00".to_string()),
            (":shift_end", "07:00:00".to_string())
        ]
    );
}

#[test]
fn equal_bounds_cover_the_whole_day() {
    let shift = ShiftWindow::parse("00:00", "00:00").expect("shift");

    assert!(shift.contains(t("12:00:00")));
    assert!(shift.sql_predicate("lt").params.is_empty());
}

#[test]
fn window_defaults_to_today_and_one_day() {
    // Arrange
    let config = ReportingConfig::new(3);
    let today = day(2026, 3, 10);

    // Act
    let window = ReportWindow::resolve(None, None, None, today, &config).expect("window");

    // Assert
    assert_eq!(window.first_day, today);
    assert_eq!(window.last_day, today);
    assert_eq!(
        window.start_utc,
        Utc.with_ymd_and_hms(2026, 3, 9, 21, 0, 0).single().expect("ts")
    );
    assert_eq!(
        window.end_utc,
        Utc.with_ymd_and_hms(2026, 3, 10, 20, 59, 59).single().expect("ts")
    );
}

#[test]
fn window_spans_requested_days_inclusive_of_end_date() {
    let config = ReportingConfig::new(0);

    let window = ReportWindow::resolve(Some(day(2026, 3, 10)), Some(7), None, day(2026, 1, 1), &config)
        .expect("window");

    assert_eq!(window.first_day, day(2026, 3, 4));
    assert_eq!(window.last_day, day(2026, 3, 10));
}

#[test]
fn window_applies_shift_in_local_time() {
    // Arrange
    let config = ReportingConfig::new(3);
    let shift = ShiftWindow::parse("22:00", "06:00").expect("shift");
    let window = ReportWindow::resolve(Some(day(2026, 3, 10)), Some(1), Some(shift), day(2026, 3, 10), &config)
        .expect("window");

    // Act: 20:00 UTC = 23:00 local, 02:00 UTC = 05:00 local, 09:00 UTC = 12:00 local
    let late = Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).single().expect("ts");
    let early = Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).single().expect("ts");
    let noon = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).single().expect("ts");

    // Assert
    assert!(window.contains(late, &config));
    assert!(window.contains(early, &config));
    assert!(!window.contains(noon, &config));
}

#[test]
fn zero_days_is_rejected() {
    let config = ReportingConfig::default();

    let result = ReportWindow::resolve(None, Some(0), None, day(2026, 3, 10), &config);

    assert_eq!(result, Err(WindowError::InvalidDays("0".to_string())));
    assert!(parse_days("0").is_err());
    assert!(parse_days("abc").is_err());
    assert_eq!(parse_days("3"), Ok(3));
}

#[test]
fn dates_at_the_calendar_edges_are_out_of_range() {
    // Arrange
    let east = ReportingConfig::new(3);
    let west = ReportingConfig::new(-3);
    let earliest = parse_date("-262143-01-01").expect("parsable date");

    // Act
    let before_min = ReportWindow::resolve(Some(earliest), Some(1), None, day(2026, 3, 10), &east);
    let after_max = ReportWindow::resolve(Some(NaiveDate::MAX), Some(1), None, day(2026, 3, 10), &west);
    let too_many_days = ReportWindow::resolve(Some(day(2026, 3, 10)), Some(u32::MAX), None, day(2026, 3, 10), &east);

    // Assert
    assert_eq!(before_min, Err(WindowError::OutOfRange));
    assert_eq!(after_max, Err(WindowError::OutOfRange));
    assert_eq!(too_many_days, Err(WindowError::OutOfRange));
}
