use anyhow::Result;
use fleetwatch_core::{ReportWindow, ReportingConfig, StatusFlags, StatusSnapshot};
use rusqlite::{
    params,
    types::{ToSql, Value},
    Row,
};

use super::{
    helpers::{format_ts, parse_ts},
    Database,
};

const LOCAL_TIME_EXPR: &str = "time(recorded_at, :offset)";

fn row_to_snapshot(row: &Row) -> Result<StatusSnapshot> {
    let recorded_at: String = row.get("recorded_at")?;

    Ok(StatusSnapshot {
        controller_id: row.get("controller_id")?,
        recorded_at: parse_ts(&recorded_at)?,
        flags: StatusFlags {
            connected: row.get("connected")?,
            servo_on: row.get("servo_on")?,
            operating: row.get("operating")?,
            alarm: row.get("alarm")?,
            error: row.get("error")?,
            stopped: row.get("stopped")?,
            hold: row.get("hold")?,
            door_open: row.get("door_open")?,
            cmos_backup: row.get("cmos_backup")?,
        },
    })
}

impl Database {
    pub async fn insert_snapshot(&self, snapshot: StatusSnapshot) -> Result<i64> {
        self.execute(move |conn| {
            let f = snapshot.flags;
            conn.execute(
                "INSERT INTO status_snapshots
                    (controller_id, recorded_at, connected, servo_on, operating, alarm, error,
                     stopped, hold, door_open, cmos_backup)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    snapshot.controller_id,
                    format_ts(snapshot.recorded_at),
                    f.connected,
                    f.servo_on,
                    f.operating,
                    f.alarm,
                    f.error,
                    f.stopped,
                    f.hold,
                    f.door_open,
                    f.cmos_backup,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Snapshots of one controller inside the window, oldest first. The shift filter is
    /// evaluated on local wall time inside SQLite.
    pub async fn fetch_snapshots(
        &self,
        controller_id: i64,
        window: &ReportWindow,
        config: &ReportingConfig,
    ) -> Result<Vec<StatusSnapshot>> {
        let window = window.clone();
        let modifier = config.sqlite_modifier();

        self.execute(move |conn| {
            let mut sql = String::from(
                "SELECT controller_id, recorded_at, connected, servo_on, operating, alarm, error,
                        stopped, hold, door_open, cmos_backup
                 FROM status_snapshots
                 WHERE controller_id = :controller_id
                   AND recorded_at >= :start
                   AND recorded_at <= :end",
            );

            let mut named: Vec<(&str, Value)> = vec![
                (":controller_id", Value::Integer(controller_id)),
                (":start", Value::Text(format_ts(window.start_utc))),
                (":end", Value::Text(format_ts(window.end_utc))),
            ];

            if let Some(shift) = window.shift {
                let predicate = shift.sql_predicate(LOCAL_TIME_EXPR);
                if !predicate.params.is_empty() {
                    sql.push_str(" AND ");
                    sql.push_str(&predicate.clause);
                    named.push((":offset", Value::Text(modifier)));
                    for (name, value) in predicate.params {
                        named.push((name, Value::Text(value)));
                    }
                }
            }
            sql.push_str(" ORDER BY recorded_at ASC, id ASC");

            let refs: Vec<(&str, &dyn ToSql)> =
                named.iter().map(|(name, value)| (*name, value as &dyn ToSql)).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(refs.as_slice())?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                snapshots.push(row_to_snapshot(row)?);
            }
            Ok(snapshots)
        })
        .await
    }
}
