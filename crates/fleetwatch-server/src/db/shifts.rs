use anyhow::Result;
use chrono::{NaiveTime, Utc};
use rusqlite::{params, Row};

use super::{
    helpers::{format_time, format_ts, parse_time, parse_ts},
    models::Shift,
    Database,
};

fn row_to_shift(row: &Row) -> Result<Shift> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let created_at: String = row.get("created_at")?;

    Ok(Shift {
        id: row.get("id")?,
        name: row.get("name")?,
        start_time: parse_time(&start_time, "start_time")?,
        end_time: parse_time(&end_time, "end_time")?,
        created_at: parse_ts(&created_at)?,
    })
}

impl Database {
    pub async fn create_shift(
        &self,
        name: String,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Shift> {
        self.execute(move |conn| {
            let now = format_ts(Utc::now());
            conn.execute(
                "INSERT INTO shifts (name, start_time, end_time, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, format_time(start_time), format_time(end_time), now],
            )?;

            Ok(Shift {
                id: conn.last_insert_rowid(),
                name,
                start_time,
                end_time,
                created_at: parse_ts(&now)?,
            })
        })
        .await
    }

    pub async fn list_shifts(&self) -> Result<Vec<Shift>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, start_time, end_time, created_at FROM shifts ORDER BY start_time ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut shifts = Vec::new();
            while let Some(row) = rows.next()? {
                shifts.push(row_to_shift(row)?);
            }
            Ok(shifts)
        })
        .await
    }

    pub async fn get_shift(&self, shift_id: i64) -> Result<Option<Shift>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, start_time, end_time, created_at FROM shifts WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![shift_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_shift(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}
