use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use anyhow::Result;
use crate::config::Config;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn create_pool(config: &Config) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    let pool = Pool::builder()
        .max_size(config.database.pool_max_connections)
        .min_idle(Some(config.database.pool_min_connections))
        .build(manager)?;

    tracing::info!(
        max_connections = config.database.pool_max_connections,
        min_connections = config.database.pool_min_connections,
        "Database pool ready"
    );

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("migration failed: {}", e))?;

    if applied.is_empty() {
        tracing::debug!("No pending migrations");
    } else {
        tracing::info!(count = applied.len(), "Applied pending migrations");
    }

    Ok(())
}
