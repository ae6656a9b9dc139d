pub mod commissions;
pub mod disputes;
pub mod dlq;
pub mod events;
pub mod partners;
pub mod recruitment;

use log::*;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub fn db_url() -> String {
    let url = std::env::var("PCG_DATABASE_URL").ok().unwrap_or_else(|| {
        error!("🗃️ PCG_DATABASE_URL must be set. Falling back to the default");
        String::from("sqlite://data/commissions.db")
    });
    debug!("🗃️ Using database URL: {url}");
    url
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
