use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use super::{
    helpers::{format_ts, parse_ts},
    models::{Notification, NotificationKind},
    Database,
};

fn row_to_notification(row: &Row) -> Result<Notification> {
    let kind: String = row.get("kind")?;
    let created_at: String = row.get("created_at")?;

    Ok(Notification {
        id: row.get("id")?,
        kind: NotificationKind::parse(&kind)
            .ok_or_else(|| anyhow!("unknown notification kind '{kind}'"))?,
        title: row.get("title")?,
        message: row.get("message")?,
        is_read: row.get("is_read")?,
        created_at: parse_ts(&created_at)?,
    })
}

impl Database {
    pub async fn insert_notification(
        &self,
        kind: NotificationKind,
        title: String,
        message: String,
    ) -> Result<i64> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO notifications (kind, title, message, is_read, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![kind.as_str(), title, message, format_ts(Utc::now())],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn list_notifications(&self, unread_only: bool) -> Result<Vec<Notification>> {
        self.execute(move |conn| {
            let sql = if unread_only {
                "SELECT id, kind, title, message, is_read, created_at FROM notifications
                 WHERE is_read = 0 ORDER BY id DESC"
            } else {
                "SELECT id, kind, title, message, is_read, created_at FROM notifications
                 ORDER BY id DESC"
            };
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query([])?;
            let mut notifications = Vec::new();
            while let Some(row) = rows.next()? {
                notifications.push(row_to_notification(row)?);
            }
            Ok(notifications)
        })
        .await
    }

    /// Returns false when the notification does not exist.
    pub async fn mark_notification_read(&self, notification_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1",
                params![notification_id],
            )?;
            Ok(changed == 1)
        })
        .await
    }
}
