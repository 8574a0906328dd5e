use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};

use super::{
    helpers::{format_ts, parse_ts},
    models::Controller,
    Database,
};

fn row_to_controller(row: &Row) -> Result<Controller> {
    let created_at: String = row.get("created_at")?;

    Ok(Controller {
        id: row.get("id")?,
        name: row.get("name")?,
        model: row.get("model")?,
        location: row.get("location")?,
        created_at: parse_ts(&created_at)?,
    })
}

impl Database {
    /// Fails with a constraint violation when the name is taken.
    pub async fn create_controller(
        &self,
        name: String,
        model: Option<String>,
        location: Option<String>,
    ) -> Result<Controller> {
        self.execute(move |conn| {
            let now = format_ts(Utc::now());
            conn.execute(
                "INSERT INTO controllers (name, model, location, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, model, location, now],
            )?;
            let id = conn.last_insert_rowid();

            Ok(Controller {
                id,
                name,
                model,
                location,
                created_at: parse_ts(&now)?,
            })
        })
        .await
    }

    pub async fn list_controllers(&self) -> Result<Vec<Controller>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, model, location, created_at FROM controllers ORDER BY name ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut controllers = Vec::new();
            while let Some(row) = rows.next()? {
                controllers.push(row_to_controller(row)?);
            }
            Ok(controllers)
        })
        .await
    }

    pub async fn get_controller(&self, controller_id: i64) -> Result<Option<Controller>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, model, location, created_at FROM controllers WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![controller_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_controller(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}
