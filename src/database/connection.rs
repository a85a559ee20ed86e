use sqlx::{postgres::PgPoolOptions, PgPool};
use std::path::Path;
use std::time::Duration;

use crate::database::migrations::{migrate_down, migrate_up, MigrationError};

#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;
        Ok(Database { pool })
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let migrations_dir = Path::new("./migrations");
        migrate_up(&self.pool, migrations_dir).await?;
        Ok(())
    }

    pub async fn migrate_up(&self) -> Result<Vec<crate::database::migrations::Migration>, DatabaseError> {
        let migrations_dir = Path::new("./migrations");
        migrate_up(&self.pool, migrations_dir).await.map_err(DatabaseError::Migration)
    }

    pub async fn migrate_down(
        &self,
        target_version: Option<i64>,
    ) -> Result<Vec<crate::database::migrations::Migration>, DatabaseError> {
        let migrations_dir = Path::new("./migrations");
        migrate_down(&self.pool, migrations_dir, target_version)
            .await
            .map_err(DatabaseError::Migration)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
