use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{DlqEntry, DlqStatus, NewDeadLetter};

pub async fn fetch_entry(event_id: &str, conn: &mut SqliteConnection) -> Result<Option<DlqEntry>, sqlx::Error> {
    sqlx::query_as::<_, DlqEntry>("SELECT * FROM dead_letters WHERE event_id = ?")
        .bind(event_id)
        .fetch_optional(conn)
        .await
}

/// Parks a failed event, keyed on the event id. If an entry already exists in
/// any state it is returned untouched; a replayed failure must not reset a
/// retry schedule that is already running.
pub async fn idempotent_insert(
    entry: NewDeadLetter,
    conn: &mut SqliteConnection,
) -> Result<(DlqEntry, bool), sqlx::Error> {
    match fetch_entry(&entry.event_id, conn).await? {
        Some(existing) => {
            debug!("📮️ {existing} is already queued");
            Ok((existing, false))
        },
        None => {
            let row = sqlx::query_as::<_, DlqEntry>(
                r#"INSERT INTO dead_letters (event_id, event_type, payload, last_error, next_retry_at)
                VALUES (?, ?, ?, ?, ?)
                RETURNING *"#,
            )
            .bind(&entry.event_id)
            .bind(&entry.event_type)
            .bind(&entry.payload)
            .bind(&entry.error)
            .bind(entry.next_retry_at)
            .fetch_one(conn)
            .await?;
            debug!("📮️ Queued {row}");
            Ok((row, true))
        },
    }
}

/// Selection and claim in one statement, so two overlapping sweeps can never
/// both pick up the same entry.
pub async fn claim_due(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DlqEntry>, sqlx::Error> {
    sqlx::query_as::<_, DlqEntry>(
        r#"UPDATE dead_letters
        SET status = 'sending', updated_at = CURRENT_TIMESTAMP
        WHERE event_id IN (
            SELECT event_id FROM dead_letters
            WHERE status = 'pending' AND (next_retry_at IS NULL OR unixepoch(next_retry_at) <= unixepoch(?))
            ORDER BY unixepoch(next_retry_at) ASC
            LIMIT ?
        )
        RETURNING *"#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn mark_resolved(event_id: &str, conn: &mut SqliteConnection) -> Result<Option<DlqEntry>, sqlx::Error> {
    sqlx::query_as::<_, DlqEntry>(
        r#"UPDATE dead_letters
        SET status = 'resolved', next_retry_at = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE event_id = ?
        RETURNING *"#,
    )
    .bind(event_id)
    .fetch_optional(conn)
    .await
}

pub async fn record_failure(
    event_id: &str,
    error: &str,
    next_retry_at: Option<DateTime<Utc>>,
    dead: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<DlqEntry>, sqlx::Error> {
    let status = if dead { DlqStatus::Dead } else { DlqStatus::Pending };
    sqlx::query_as::<_, DlqEntry>(
        r#"UPDATE dead_letters
        SET attempts = attempts + 1, last_error = ?, next_retry_at = ?, status = ?, updated_at = CURRENT_TIMESTAMP
        WHERE event_id = ?
        RETURNING *"#,
    )
    .bind(error)
    .bind(next_retry_at)
    .bind(status.to_string())
    .bind(event_id)
    .fetch_optional(conn)
    .await
}

/// The operator recovery path. Only dead entries can be requeued; the reset
/// leaves `last_error` in place for the audit trail.
pub async fn reset_for_retry(event_id: &str, conn: &mut SqliteConnection) -> Result<Option<DlqEntry>, sqlx::Error> {
    sqlx::query_as::<_, DlqEntry>(
        r#"UPDATE dead_letters
        SET status = 'pending', attempts = 0, next_retry_at = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE event_id = ? AND status = 'dead'
        RETURNING *"#,
    )
    .bind(event_id)
    .fetch_optional(conn)
    .await
}

pub async fn list_entries(
    status: Option<DlqStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<DlqEntry>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM dead_letters");
    if let Some(status) = status {
        builder.push(" WHERE status = ");
        builder.push_bind(status.to_string());
    }
    builder.push(" ORDER BY updated_at DESC, event_id ASC");
    let rows = builder.build().fetch_all(conn).await?;
    let entries = rows.iter().map(DlqEntry::from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}
