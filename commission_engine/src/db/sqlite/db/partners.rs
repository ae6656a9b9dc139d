use log::debug;
use pcg_common::Cents;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPartner, Partner},
    traits::LedgerError,
};

pub async fn fetch_partner(id: &str, conn: &mut SqliteConnection) -> Result<Option<Partner>, sqlx::Error> {
    let partner =
        sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE id = ?").bind(id).fetch_optional(conn).await?;
    Ok(partner)
}

/// Inserts the partner if the id is new, returning the row and whether a new
/// row was written.
pub async fn idempotent_insert(partner: NewPartner, conn: &mut SqliteConnection) -> Result<(Partner, bool), LedgerError> {
    match fetch_partner(&partner.id, conn).await? {
        Some(existing) => {
            debug!("🧑️ Partner {} already registered", existing.id);
            Ok((existing, false))
        },
        None => {
            let row = insert_partner(partner, conn).await?;
            debug!("🧑️ Registered {row}");
            Ok((row, true))
        },
    }
}

async fn insert_partner(partner: NewPartner, conn: &mut SqliteConnection) -> Result<Partner, sqlx::Error> {
    let row = sqlx::query_as::<_, Partner>(
        "INSERT INTO partners (id, name, role, status) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(&partner.id)
    .bind(&partner.name)
    .bind(partner.role.to_string())
    .bind(partner.status.to_string())
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Applies atomic increments to the balance buckets. Deltas may be negative;
/// a bucket going negative indicates a ledger bug, not a user error, so no
/// floor is applied here.
pub async fn adjust_balances(
    partner_id: &str,
    pending: Cents,
    validated: Cents,
    available: Cents,
    earned: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"UPDATE partners SET
            pending_balance = pending_balance + ?,
            validated_balance = validated_balance + ?,
            available_balance = available_balance + ?,
            total_earned = total_earned + ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?"#,
    )
    .bind(pending)
    .bind(validated)
    .bind(available)
    .bind(earned)
    .bind(partner_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::PartnerNotFound(partner_id.to_string()));
    }
    Ok(())
}

/// Bumps the lifetime counters and the rolling month stats in one statement.
/// When `month` differs from the stored `stats_month` the month columns are
/// reset to just this increment, which is how the monthly rollover happens
/// without a scheduled job.
pub async fn incr_commission_stats(
    partner_id: &str,
    month: &str,
    referrals: i64,
    recruits: i64,
    earnings: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE partners SET
            total_commissions = total_commissions + 1,
            total_referrals = total_referrals + ?,
            total_recruits = total_recruits + ?,
            month_referrals = CASE WHEN stats_month = ? THEN month_referrals + ? ELSE ? END,
            month_recruits = CASE WHEN stats_month = ? THEN month_recruits + ? ELSE ? END,
            month_earnings = CASE WHEN stats_month = ? THEN month_earnings + ? ELSE ? END,
            stats_month = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?"#,
    )
    .bind(referrals)
    .bind(recruits)
    .bind(month)
    .bind(referrals)
    .bind(referrals)
    .bind(month)
    .bind(recruits)
    .bind(recruits)
    .bind(month)
    .bind(earnings)
    .bind(earnings)
    .bind(month)
    .bind(partner_id)
    .execute(conn)
    .await?;
    Ok(())
}
