use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewRecruitmentLink, RecruitmentLink};

pub async fn fetch_link_for_recruit(
    recruited_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<RecruitmentLink>, sqlx::Error> {
    sqlx::query_as::<_, RecruitmentLink>("SELECT * FROM recruitment_links WHERE recruited_id = ?")
        .bind(recruited_id)
        .fetch_optional(conn)
        .await
}

/// A partner can only be recruited once, so the insert is keyed on the
/// recruit. Returns the link and whether a new row was written.
pub async fn idempotent_insert(
    link: NewRecruitmentLink,
    conn: &mut SqliteConnection,
) -> Result<(RecruitmentLink, bool), sqlx::Error> {
    match fetch_link_for_recruit(&link.recruited_id, conn).await? {
        Some(existing) => {
            debug!("🤝️ Recruit {} is already linked to {}", existing.recruited_id, existing.recruiter_id);
            Ok((existing, false))
        },
        None => {
            let row = sqlx::query_as::<_, RecruitmentLink>(
                r#"INSERT INTO recruitment_links (recruiter_id, recruited_id, commission_window_end)
                VALUES (?, ?, ?)
                RETURNING *"#,
            )
            .bind(&link.recruiter_id)
            .bind(&link.recruited_id)
            .bind(link.commission_window_end)
            .fetch_one(conn)
            .await?;
            debug!("🤝️ {} recruited {}", row.recruiter_id, row.recruited_id);
            Ok((row, true))
        },
    }
}

/// Flips `commission_paid` false → true. The guard in the WHERE clause makes
/// the flip first-writer-wins; a `false` return means another invocation beat
/// us to it and the caller must roll its bonus back.
pub async fn mark_commission_paid(
    link_id: i64,
    commission_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE recruitment_links
        SET commission_paid = 1, commission_id = ?, commission_paid_at = CURRENT_TIMESTAMP
        WHERE id = ? AND commission_paid = 0"#,
    )
    .bind(commission_id)
    .bind(link_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
