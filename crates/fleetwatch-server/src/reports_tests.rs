use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleetwatch_core::{ReportFormat, ReportKind, ReportingConfig};

use crate::reports::{
    collect, render_to_file, ReportCell, ReportError, ReportParams, ReportTable, ReportTasks,
    TaskState,
};
use crate::test_support::{idle, make_temp_dir, running, snapshot, temp_db, utc};

fn sample_table() -> ReportTable {
    ReportTable {
        kind: ReportKind::OperatingRate,
        title: "Operating rate".to_string(),
        subtitle: "2026-03-10 to 2026-03-10".to_string(),
        columns: vec!["Controller".to_string(), "Operating rate (%)".to_string()],
        rows: vec![
            vec![ReportCell::Text("R-01".to_string()), ReportCell::Number(62.5)],
            vec![ReportCell::Text("R-02".to_string()), ReportCell::Number(0.0)],
        ],
    }
}

#[test]
fn params_accept_empty_text_and_reject_garbage() {
    assert_eq!(ReportParams::from_json("").expect("empty"), ReportParams::default());
    assert_eq!(
        ReportParams::from_json(r#"{"controllerId":4,"days":7}"#).expect("params"),
        ReportParams {
            controller_id: Some(4),
            days: Some(7),
            ..ReportParams::default()
        }
    );
    assert!(matches!(
        ReportParams::from_json("{not json"),
        Err(ReportError::InvalidParams(_))
    ));
}

#[test]
fn csv_output_lists_header_and_rows() {
    // Arrange
    let dir = make_temp_dir("render-csv");

    // Act
    let report = render_to_file(&sample_table(), ReportFormat::Csv, &dir).expect("render");

    // Assert
    let text = fs::read_to_string(&report.path).expect("read");
    assert_eq!(text, "Controller,Operating rate (%)\nR-01,62.5\nR-02,0\n");
    assert_eq!(report.content_type, "text/csv");
    assert!(report.filename.starts_with("operating-rate-"));
    assert_eq!(
        report.content_disposition(),
        format!("attachment; filename=\"{}\"", report.filename)
    );

    report.remove();
    assert!(!report.path.exists());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn excel_and_pdf_files_carry_their_magic_bytes() {
    // Arrange
    let dir = make_temp_dir("render-binary");

    // Act
    let xlsx = render_to_file(&sample_table(), ReportFormat::Excel, &dir).expect("xlsx");
    let pdf = render_to_file(&sample_table(), ReportFormat::Pdf, &dir).expect("pdf");

    // Assert
    let xlsx_bytes = fs::read(&xlsx.path).expect("read xlsx");
    let pdf_bytes = fs::read(&pdf.path).expect("read pdf");
    assert!(xlsx.filename.ends_with(".xlsx"));
    assert_eq!(&xlsx_bytes[..2], b"PK");
    assert!(pdf.filename.ends_with(".pdf"));
    assert_eq!(&pdf_bytes[..4], b"%PDF");

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn operating_rate_report_covers_every_controller() {
    // Arrange
    let (db, dir) = temp_db("collect-rate");
    let config = ReportingConfig::default();
    let busy = db.create_controller("R-01".to_string(), None, None).await.expect("controller");
    db.create_controller("R-02".to_string(), None, None).await.expect("controller");
    for (at, flags) in [
        (utc(2026, 3, 10, 6, 0, 0), running()),
        (utc(2026, 3, 10, 6, 30, 0), idle()),
        (utc(2026, 3, 10, 7, 0, 0), idle()),
    ] {
        db.insert_snapshot(snapshot(busy.id, at, flags)).await.expect("insert");
    }
    let params = ReportParams {
        date: Some("2026-03-10".to_string()),
        ..ReportParams::default()
    };

    // Act
    let table = collect(&db, ReportKind::OperatingRate, &params, &config, utc(2026, 3, 11, 0, 0, 0))
        .await
        .expect("collect");

    // Assert
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0][0], ReportCell::Text("R-01".to_string()));
    assert_eq!(table.rows[0][1], ReportCell::Number(30.0), "running minutes");
    assert_eq!(table.rows[0][7], ReportCell::Number(50.0), "operating rate");
    assert_eq!(table.rows[1][7], ReportCell::Number(0.0));
    assert_eq!(table.columns.len(), table.rows[0].len());

    drop(db);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn status_history_report_needs_a_controller() {
    // Arrange
    let (db, dir) = temp_db("collect-history");
    let config = ReportingConfig::default();

    // Act
    let missing = collect(
        &db,
        ReportKind::StatusHistory,
        &ReportParams::default(),
        &config,
        utc(2026, 3, 11, 0, 0, 0),
    )
    .await;
    let unknown = collect(
        &db,
        ReportKind::StatusHistory,
        &ReportParams {
            controller_id: Some(42),
            ..ReportParams::default()
        },
        &config,
        utc(2026, 3, 11, 0, 0, 0),
    )
    .await;

    // Assert
    assert!(matches!(missing, Err(ReportError::InvalidParams(_))));
    assert!(matches!(unknown, Err(ReportError::ControllerNotFound(42))));

    drop(db);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn background_task_completes_and_exposes_its_file() {
    // Arrange
    let dir = make_temp_dir("task-complete");
    let tasks = ReportTasks::new();
    let out_dir = dir.clone();

    // Act
    let mut handle = tasks.spawn(async move {
        render_to_file(&sample_table(), ReportFormat::Csv, &out_dir).map_err(|err| err.to_string())
    });
    let finished = handle.wait().await;

    // Assert
    assert!(matches!(finished, TaskState::Completed { .. }));
    let report = tasks.output(&handle.id).expect("output");
    assert!(report.path.exists());
    assert!(tasks.remove(&handle.id));
    assert!(!report.path.exists(), "removing a task deletes its file");
    assert!(tasks.status(&handle.id).is_none());

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn background_task_reports_failure() {
    // Arrange
    let tasks = ReportTasks::new();

    // Act
    let mut handle = tasks.spawn(async { Err("controller 9 not found".to_string()) });
    let finished = handle.wait().await;

    // Assert
    assert_eq!(
        finished,
        TaskState::Failed {
            message: "controller 9 not found".to_string()
        }
    );
    assert!(tasks.output(&handle.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelled_task_stops_before_finishing() {
    // Arrange
    let tasks = ReportTasks::new();
    let mut handle = tasks.spawn(async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err("should not finish".to_string())
    });

    // Act
    assert!(tasks.cancel(&handle.id));
    let finished = handle.wait().await;

    // Assert
    assert_eq!(finished, TaskState::Cancelled);
    assert_eq!(tasks.status(&handle.id), Some(TaskState::Cancelled));
    assert!(!tasks.cancel(&uuid::Uuid::new_v4()));
}

#[tokio::test(start_paused = true)]
async fn finished_tasks_are_evicted_with_their_file() {
    // Arrange
    let dir = make_temp_dir("task-evict");
    let tasks = ReportTasks::with_retention(Duration::from_secs(600));
    let out_dir = dir.clone();
    let mut handle = tasks.spawn(async move {
        render_to_file(&sample_table(), ReportFormat::Csv, &out_dir).map_err(|err| err.to_string())
    });
    assert!(matches!(handle.wait().await, TaskState::Completed { .. }));
    let report = tasks.output(&handle.id).expect("output");

    // Act
    tokio::time::sleep(Duration::from_secs(300)).await;
    let still_there = tasks.status(&handle.id);
    tokio::time::sleep(Duration::from_secs(301)).await;

    // Assert
    assert!(matches!(still_there, Some(TaskState::Completed { .. })));
    assert!(tasks.status(&handle.id).is_none());
    assert!(tasks.is_empty());
    assert!(!report.path.exists(), "evicted task must not leave its file behind");

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test(start_paused = true)]
async fn render_finishing_after_cancel_leaves_no_file() {
    // Arrange
    let dir = make_temp_dir("task-cancel-render");
    let tasks = ReportTasks::new();
    let rendered = Arc::new(AtomicBool::new(false));
    let out_dir = dir.clone();
    let flag = rendered.clone();
    let mut handle = tasks.spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        let report = render_to_file(&sample_table(), ReportFormat::Csv, &out_dir).map_err(|err| err.to_string());
        flag.store(true, Ordering::SeqCst);
        report
    });

    // Act
    assert!(tasks.cancel(&handle.id));
    let finished = handle.wait().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    // Assert
    assert_eq!(finished, TaskState::Cancelled);
    assert!(rendered.load(Ordering::SeqCst), "work ran to completion in the background");
    let leftovers = fs::read_dir(&dir).expect("dir").count();
    assert_eq!(leftovers, 0);
    assert!(tasks.output(&handle.id).is_none());

    let _ = fs::remove_dir_all(dir);
}
