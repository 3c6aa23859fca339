use anyhow::{Context, Result, anyhow};
use diesel::{Connection, PgConnection};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, bb8::Pool},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use super::aliases::DbPool;

/// Migrations embedded into the binary which helps with streamlining image building process
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub async fn create_pool(url: &str, max_size: u32) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Applies pending migrations on a dedicated blocking thread and returns how many ran.
pub async fn run_migrations_blocking(migrations: EmbeddedMigrations, url: &str) -> Result<usize> {
    let url = url.to_owned();
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn =
            PgConnection::establish(&url).context("Failed to connect for migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow!("Failed to run migrations: {err}"))?;
        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
