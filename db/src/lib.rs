use color_eyre::{eyre::Context, Result};
use sqlx::postgres::PgPoolOptions;

pub mod cooking;

pub use sqlx;
pub use sqlx::PgPool;

const MIGRATION_LOCK_ID: i64 = 0xDB_DB_DB_DB_DB_DB_DB;

#[tracing::instrument(skip(database_url), err)]
pub async fn setup_db_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to the database")?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Runs pending migrations while holding a Postgres advisory lock, so two
/// processes booting at once don't race each other.
#[tracing::instrument(skip(pool), err)]
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut conn = pool
        .acquire()
        .await
        .wrap_err("Failed to acquire a connection for migrations")?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&mut *conn)
        .await
        .wrap_err("Failed to take migration lock")?;

    let migrated = sqlx::migrate!().run(&mut *conn).await;

    let unlocked: Option<bool> = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .fetch_one(&mut *conn)
        .await
        .wrap_err("Failed to release migration lock")?;

    match unlocked {
        Some(true) => tracing::info!("Migration lock unlocked"),
        _ => tracing::warn!("Failed to unlock migration lock"),
    }

    migrated.wrap_err("Failed to run migrations")?;

    Ok(())
}
