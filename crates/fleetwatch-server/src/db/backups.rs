use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use fleetwatch_core::BackupPlan;
use rusqlite::{params, Connection, Row};

use super::{
    helpers::{format_time, format_ts, parse_time, parse_ts},
    models::BackupRun,
    Database,
};

fn encode_weekdays(weekdays: &[Weekday]) -> String {
    weekdays
        .iter()
        .map(|day| day.num_days_from_sunday().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_weekdays(value: &str) -> Result<Vec<Weekday>> {
    const BY_INDEX: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    value
        .split(',')
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<usize>()
                .ok()
                .and_then(|idx| BY_INDEX.get(idx).copied())
                .ok_or_else(|| anyhow!("invalid weekday '{item}' in backup plan"))
        })
        .collect()
}

fn row_to_plan(row: &Row) -> Result<BackupPlan> {
    let weekdays: String = row.get("weekdays")?;
    let run_time: String = row.get("run_time")?;

    Ok(BackupPlan {
        id: row.get("id")?,
        controller_id: row.get("controller_id")?,
        name: row.get("name")?,
        weekdays: decode_weekdays(&weekdays)?,
        time: parse_time(&run_time, "run_time")?,
        enabled: row.get("enabled")?,
    })
}

fn row_to_run(row: &Row) -> Result<BackupRun> {
    let started_at: String = row.get("started_at")?;
    let finished_at: String = row.get("finished_at")?;

    Ok(BackupRun {
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        started_at: parse_ts(&started_at)?,
        finished_at: parse_ts(&finished_at)?,
        attempts: row.get("attempts")?,
        status: row.get("status")?,
        message: row.get("message")?,
    })
}

fn load_plans(conn: &Connection, filter: &str, id: Option<i64>) -> Result<Vec<BackupPlan>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, controller_id, name, weekdays, run_time, enabled FROM backup_plans {filter} ORDER BY id ASC"
    ))?;
    let mut rows = match id {
        Some(id) => stmt.query(params![id])?,
        None => stmt.query([])?,
    };
    let mut plans = Vec::new();
    while let Some(row) = rows.next()? {
        plans.push(row_to_plan(row)?);
    }
    Ok(plans)
}

impl Database {
    pub async fn create_backup_plan(
        &self,
        controller_id: i64,
        name: String,
        weekdays: Vec<Weekday>,
        time: NaiveTime,
    ) -> Result<BackupPlan> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO backup_plans (controller_id, name, weekdays, run_time, enabled, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    controller_id,
                    name,
                    encode_weekdays(&weekdays),
                    format_time(time),
                    format_ts(Utc::now()),
                ],
            )?;

            Ok(BackupPlan {
                id: conn.last_insert_rowid(),
                controller_id,
                name,
                weekdays,
                time,
                enabled: true,
            })
        })
        .await
    }

    pub async fn list_backup_plans(&self) -> Result<Vec<BackupPlan>> {
        self.execute(|conn| load_plans(conn, "", None)).await
    }

    pub async fn list_enabled_backup_plans(&self) -> Result<Vec<BackupPlan>> {
        self.execute(|conn| load_plans(conn, "WHERE enabled = 1", None))
            .await
    }

    pub async fn get_backup_plan(&self, plan_id: i64) -> Result<Option<BackupPlan>> {
        self.execute(move |conn| Ok(load_plans(conn, "WHERE id = ?1", Some(plan_id))?.into_iter().next()))
            .await
    }

    /// Returns false when the plan does not exist. Its run history goes with it.
    pub async fn delete_backup_plan(&self, plan_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM backup_runs WHERE plan_id = ?1", params![plan_id])?;
            let changed = tx.execute("DELETE FROM backup_plans WHERE id = ?1", params![plan_id])?;
            tx.commit().context("failed to commit backup plan delete")?;
            Ok(changed == 1)
        })
        .await
    }

    pub async fn insert_backup_run(
        &self,
        plan_id: i64,
        started_at: DateTime<Utc>,
        attempts: u32,
        status: &str,
        message: Option<String>,
    ) -> Result<i64> {
        let status = status.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO backup_runs (plan_id, started_at, finished_at, attempts, status, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    plan_id,
                    format_ts(started_at),
                    format_ts(Utc::now()),
                    attempts,
                    status,
                    message
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn list_backup_runs(&self, plan_id: i64) -> Result<Vec<BackupRun>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, plan_id, started_at, finished_at, attempts, status, message
                 FROM backup_runs WHERE plan_id = ?1 ORDER BY id DESC",
            )?;
            let mut rows = stmt.query(params![plan_id])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(row_to_run(row)?);
            }
            Ok(runs)
        })
        .await
    }
}
