use chrono::{DateTime, Duration, Utc};
use log::debug;
use pcg_common::Cents;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{CommissionRecord, CommissionStatus, CommissionType, NewCommission, PartnerRole},
    traits::CommissionQueryFilter,
};

pub async fn fetch_commission(id: i64, conn: &mut SqliteConnection) -> Result<Option<CommissionRecord>, sqlx::Error> {
    sqlx::query_as::<_, CommissionRecord>("SELECT * FROM commissions WHERE id = ?").bind(id).fetch_optional(conn).await
}

pub async fn fetch_by_business_key(
    partner_id: &str,
    source_id: &str,
    commission_type: CommissionType,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionRecord>, sqlx::Error> {
    sqlx::query_as::<_, CommissionRecord>(
        "SELECT * FROM commissions WHERE partner_id = ? AND source_id = ? AND commission_type = ?",
    )
    .bind(partner_id)
    .bind(source_id)
    .bind(commission_type.to_string())
    .fetch_optional(conn)
    .await
}

/// Writes the commission row. The UNIQUE constraint on
/// (partner_id, source_id, commission_type) is the last line of defence
/// against concurrent duplicates; callers must treat a unique violation here
/// as "already credited", not as a failure.
pub async fn insert_commission(
    commission: &NewCommission,
    role: PartnerRole,
    status: CommissionStatus,
    conn: &mut SqliteConnection,
) -> Result<CommissionRecord, sqlx::Error> {
    let (validated_at, available_at): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = match status {
        CommissionStatus::Available => (Some(Utc::now()), Some(Utc::now())),
        CommissionStatus::Validated => (Some(Utc::now()), None),
        _ => (None, None),
    };
    let row = sqlx::query_as::<_, CommissionRecord>(
        r#"INSERT INTO commissions
            (partner_id, partner_role, commission_type, status, amount, source_id, description, validated_at, available_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *"#,
    )
    .bind(&commission.partner_id)
    .bind(role.to_string())
    .bind(commission.commission_type.to_string())
    .bind(status.to_string())
    .bind(commission.amount)
    .bind(&commission.source_id)
    .bind(&commission.description)
    .bind(validated_at)
    .bind(available_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Inserted {row}");
    Ok(row)
}

/// Cumulative non-cancelled client-referral earnings for a partner. This is
/// the number the recruitment threshold is measured against.
pub async fn sum_client_referrals(partner_id: &str, conn: &mut SqliteConnection) -> Result<Cents, sqlx::Error> {
    let sum: i64 = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(amount), 0) FROM commissions
        WHERE partner_id = ? AND commission_type = 'client_referral' AND status != 'cancelled'"#,
    )
    .bind(partner_id)
    .fetch_one(conn)
    .await?;
    Ok(Cents::from(sum))
}

pub async fn fetch_cancellable_for_source(
    source_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, sqlx::Error> {
    sqlx::query_as::<_, CommissionRecord>(
        "SELECT * FROM commissions WHERE source_id = ? AND status IN ('pending', 'validated')",
    )
    .bind(source_id)
    .fetch_all(conn)
    .await
}

/// Cancels one commission if it is still cancellable. Returns `None` when the
/// row has already moved to available or cancelled under us.
pub async fn cancel_commission(
    id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionRecord>, sqlx::Error> {
    sqlx::query_as::<_, CommissionRecord>(
        r#"UPDATE commissions
        SET status = 'cancelled', cancelled_at = CURRENT_TIMESTAMP, cancellation_reason = ?
        WHERE id = ? AND status IN ('pending', 'validated')
        RETURNING *"#,
    )
    .bind(reason)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// validated → available for every commission whose validation is older than
/// `release_delay`. Time comes from the database clock.
pub async fn release_validated(
    release_delay: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, sqlx::Error> {
    sqlx::query_as::<_, CommissionRecord>(
        r#"UPDATE commissions
        SET status = 'available', available_at = CURRENT_TIMESTAMP
        WHERE status = 'validated' AND unixepoch(CURRENT_TIMESTAMP) - unixepoch(validated_at) >= ?
        RETURNING *"#,
    )
    .bind(release_delay.num_seconds())
    .fetch_all(conn)
    .await
}

/// pending → validated for every commission older than `validation_hold`.
pub async fn validate_pending(
    validation_hold: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, sqlx::Error> {
    sqlx::query_as::<_, CommissionRecord>(
        r#"UPDATE commissions
        SET status = 'validated', validated_at = CURRENT_TIMESTAMP
        WHERE status = 'pending' AND unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at) >= ?
        RETURNING *"#,
    )
    .bind(validation_hold.num_seconds())
    .fetch_all(conn)
    .await
}

pub async fn search_commissions(
    filter: CommissionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM commissions");
    if !filter.is_empty() {
        builder.push(" WHERE ");
        let mut where_clause = builder.separated(" AND ");
        if let Some(partner_id) = filter.partner_id {
            where_clause.push("partner_id = ");
            where_clause.push_bind_unseparated(partner_id);
        }
        if let Some(commission_type) = filter.commission_type {
            where_clause.push("commission_type = ");
            where_clause.push_bind_unseparated(commission_type.to_string());
        }
        if !filter.statuses.is_empty() {
            where_clause.push("status IN (");
            let mut first = true;
            for status in &filter.statuses {
                if !first {
                    where_clause.push_unseparated(", ");
                }
                where_clause.push_bind_unseparated(status.to_string());
                first = false;
            }
            where_clause.push_unseparated(")");
        }
        if let Some(source_id) = filter.source_id {
            where_clause.push("source_id = ");
            where_clause.push_bind_unseparated(source_id);
        }
        if let Some(since) = filter.since {
            where_clause.push("unixepoch(created_at) >= unixepoch(");
            where_clause.push_bind_unseparated(since);
            where_clause.push_unseparated(")");
        }
        if let Some(until) = filter.until {
            where_clause.push("unixepoch(created_at) <= unixepoch(");
            where_clause.push_bind_unseparated(until);
            where_clause.push_unseparated(")");
        }
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    let rows = builder.build().fetch_all(conn).await?;
    let commissions = rows.iter().map(CommissionRecord::from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(commissions)
}
