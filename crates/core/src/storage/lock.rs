use anyhow::Context;
use chrono::{Datelike, NaiveDate};

// Advisory locks are scoped to the Postgres session, so acquire and release must use the
// same connection. Guards against concurrent pipeline runs for one run date.
const LOCK_NAMESPACE: i64 = 0x5349_5453_434F; // "SITSCO"

fn lock_key_for_date(run_date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ (run_date.num_days_from_ce() as i64)
}

pub async fn try_acquire_run_date_lock(
    conn: &mut sqlx::PgConnection,
    run_date: NaiveDate,
) -> anyhow::Result<bool> {
    let key = lock_key_for_date(run_date);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_run_date_lock(
    conn: &mut sqlx::PgConnection,
    run_date: NaiveDate,
) -> anyhow::Result<()> {
    let key = lock_key_for_date(run_date);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(conn)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differ_per_day() {
        let d = NaiveDate::from_ymd_opt(2024, 10, 7).unwrap();
        let next = d.succ_opt().unwrap();
        assert_ne!(lock_key_for_date(d), lock_key_for_date(next));
        assert_eq!(lock_key_for_date(d), lock_key_for_date(d));
    }
}
