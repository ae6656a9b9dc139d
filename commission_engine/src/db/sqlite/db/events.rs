use sqlx::SqliteConnection;

use crate::db_types::WebhookEventRow;

/// Registers the event id as processing. Returns the new row when this
/// delivery is the first, `None` when the id has been seen before.
pub async fn try_insert_processing(
    event_id: &str,
    event_type: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEventRow>, sqlx::Error> {
    sqlx::query_as::<_, WebhookEventRow>(
        r#"INSERT INTO webhook_events (event_id, event_type) VALUES (?, ?)
        ON CONFLICT (event_id) DO NOTHING
        RETURNING *"#,
    )
    .bind(event_id)
    .bind(event_type)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_event(event_id: &str, conn: &mut SqliteConnection) -> Result<Option<WebhookEventRow>, sqlx::Error> {
    sqlx::query_as::<_, WebhookEventRow>("SELECT * FROM webhook_events WHERE event_id = ?")
        .bind(event_id)
        .fetch_optional(conn)
        .await
}

pub async fn mark_completed(event_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE webhook_events SET status = 'completed', completed_at = CURRENT_TIMESTAMP WHERE event_id = ?",
    )
    .bind(event_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
