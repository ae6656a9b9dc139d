use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DisputeOutcome, DisputeRecord, DisputeStatus, DisputeStatusEntry},
    traits::DisputeUpdate,
};

pub async fn fetch_dispute(id: &str, conn: &mut SqliteConnection) -> Result<Option<DisputeRecord>, sqlx::Error> {
    sqlx::query_as::<_, DisputeRecord>("SELECT * FROM disputes WHERE id = ?").bind(id).fetch_optional(conn).await
}

pub async fn insert_dispute(update: &DisputeUpdate, conn: &mut SqliteConnection) -> Result<DisputeRecord, sqlx::Error> {
    let row = sqlx::query_as::<_, DisputeRecord>(
        r#"INSERT INTO disputes (id, charge_id, amount, currency, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *"#,
    )
    .bind(&update.id)
    .bind(&update.charge_id)
    .bind(update.amount)
    .bind(&update.currency)
    .bind(&update.reason)
    .bind(update.status.to_string())
    .fetch_one(conn)
    .await?;
    debug!("⚖️ Opened {row}");
    Ok(row)
}

pub async fn update_status(
    id: &str,
    status: DisputeStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<DisputeRecord>, sqlx::Error> {
    sqlx::query_as::<_, DisputeRecord>(
        "UPDATE disputes SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *",
    )
    .bind(status.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Sets the outcome if none is recorded yet. The `outcome IS NULL` guard is
/// what makes "exactly one outcome, exactly one closure notification" hold
/// under replays.
pub async fn set_outcome_once(
    id: &str,
    outcome: DisputeOutcome,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE disputes SET outcome = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND outcome IS NULL")
            .bind(outcome.to_string())
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn append_history(
    dispute_id: &str,
    status: DisputeStatus,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO dispute_status_history (dispute_id, status) VALUES (?, ?)")
        .bind(dispute_id)
        .bind(status.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn history(dispute_id: &str, conn: &mut SqliteConnection) -> Result<Vec<DisputeStatusEntry>, sqlx::Error> {
    sqlx::query_as::<_, DisputeStatusEntry>(
        "SELECT * FROM dispute_status_history WHERE dispute_id = ? ORDER BY recorded_at ASC, id ASC",
    )
    .bind(dispute_id)
    .fetch_all(conn)
    .await
}
