use std::time::Duration;

use deadpool::managed::{self, Pool, RecycleError, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

/// Creates pooled libsql connections with the pragmas the store relies on
pub struct LibsqlManager {
    database: Database,
    busy_timeout: Duration,
}

impl LibsqlManager {
    pub fn new(database: Database, busy_timeout: Duration) -> Self {
        Self { database, busy_timeout }
    }

    async fn apply_pragmas(&self, conn: &Connection) -> Result<(), LibsqlError> {
        let pragmas = [
            "PRAGMA journal_mode = WAL".to_string(),
            "PRAGMA synchronous = NORMAL".to_string(),
            "PRAGMA foreign_keys = ON".to_string(),
            format!("PRAGMA busy_timeout = {}", self.busy_timeout.as_millis()),
        ];
        // Some pragmas answer with a row, so go through query rather than execute
        for pragma in pragmas {
            let mut rows = conn.query(&pragma, ()).await?;
            while rows.next().await?.is_some() {}
        }
        Ok(())
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        self.apply_pragmas(&conn).await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        let mut rows = conn.query("SELECT 1", ()).await?;
        match rows.next().await? {
            Some(_) => Ok(()),
            None => Err(RecycleError::Message("health check returned no rows".into())),
        }
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

/// Open (or create) the database file and wrap it in a pool
pub async fn open_pool(
    path: &str,
    busy_timeout: Duration,
    max_connections: usize,
) -> anyhow::Result<LibsqlPool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let database = libsql::Builder::new_local(path).build().await?;
    let manager = LibsqlManager::new(database, busy_timeout);
    let pool = Pool::builder(manager).max_size(max_connections.max(1)).build()?;
    Ok(pool)
}
