//! Forward-only schema migrations.
//!
//! Migrations live in a static registry ordered by version. At startup every
//! migration newer than the recorded `SchemaVersion` runs, and the version row
//! is written once, after the last one, inside the same transaction.

use futures_util::future::BoxFuture;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to prepare schema version table: {0}")]
    Bootstrap(#[source] sqlx::Error),
    #[error("failed to read schema version: {0}")]
    ReadVersion(#[source] sqlx::Error),
    #[error("migration registry is not strictly increasing at v{0}")]
    OutOfOrder(i64),
    #[error("migration v{version} ({name}) failed: {source}")]
    Apply {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to record schema version {version}: {source}")]
    RecordVersion {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
}

type ApplyFn = for<'c> fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<(), sqlx::Error>>;

/// One registered schema step.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    apply: ApplyFn,
}

/// Registered migrations, oldest first.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "post queues",
        apply: migration_v1,
    },
    Migration {
        version: 2,
        name: "provider, explicit flag and links",
        apply: migration_v2,
    },
    Migration {
        version: 3,
        name: "users and sessions",
        apply: migration_v3,
    },
];

/// Outcome of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    pub applied: usize,
}

/// Highest registered version.
#[must_use]
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<MigrationReport, MigrationError> {
    run_registry(pool, MIGRATIONS).await
}

async fn run_registry(
    pool: &SqlitePool,
    registry: &[Migration],
) -> Result<MigrationReport, MigrationError> {
    check_order(registry)?;
    create_version_table(pool).await?;
    let current = get_schema_version(pool).await?;

    let pending: Vec<&Migration> = registry.iter().filter(|m| m.version > current).collect();
    let Some(target) = pending.last().map(|m| m.version) else {
        debug!(version = current, "Schema is up to date");
        return Ok(MigrationReport {
            from_version: current,
            to_version: current,
            applied: 0,
        });
    };

    info!(from = current, to = target, "Database schema is outdated, migrating");

    let mut tx = pool.begin().await.map_err(MigrationError::Bootstrap)?;
    for migration in &pending {
        debug!(version = migration.version, name = migration.name, "Running migration");
        (migration.apply)(&mut *tx)
            .await
            .map_err(|source| MigrationError::Apply {
                version: migration.version,
                name: migration.name,
                source,
            })?;
    }

    sqlx::query("UPDATE SchemaVersion SET version = ? WHERE id = 1")
        .bind(target)
        .execute(&mut *tx)
        .await
        .map_err(|source| MigrationError::RecordVersion {
            version: target,
            source,
        })?;
    tx.commit()
        .await
        .map_err(|source| MigrationError::RecordVersion {
            version: target,
            source,
        })?;

    info!(version = target, "Database updated");

    Ok(MigrationReport {
        from_version: current,
        to_version: target,
        applied: pending.len(),
    })
}

fn check_order(registry: &[Migration]) -> Result<(), MigrationError> {
    registry.windows(2).try_for_each(|pair| {
        if pair[1].version > pair[0].version {
            Ok(())
        } else {
            Err(MigrationError::OutOfOrder(pair[1].version))
        }
    })
}

async fn create_version_table(pool: &SqlitePool) -> Result<(), MigrationError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS SchemaVersion (
            id INTEGER PRIMARY KEY,
            version INTEGER NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Bootstrap)?;

    sqlx::query("INSERT OR IGNORE INTO SchemaVersion (id, version) VALUES (1, 0)")
        .execute(pool)
        .await
        .map_err(MigrationError::Bootstrap)?;

    Ok(())
}

/// Read the recorded schema version.
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64, MigrationError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM SchemaVersion WHERE id = 1")
        .fetch_optional(pool)
        .await
        .map_err(MigrationError::ReadVersion)?;

    Ok(row.map_or(0, |(v,)| v))
}

/// `ALTER TABLE .. ADD COLUMN` that tolerates an existing column.
async fn add_column_if_missing(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), sqlx::Error> {
    let existing: Vec<(String,)> =
        sqlx::query_as(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .fetch_all(&mut *conn)
            .await?;

    if existing.iter().any(|(name,)| name == column) {
        return Ok(());
    }

    sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn migration_v1(conn: &mut SqliteConnection) -> BoxFuture<'_, Result<(), sqlx::Error>> {
    Box::pin(async move {
        for table in ["default_posts", "boosted_posts"] {
            sqlx::query(&format!(
                r"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id TEXT UNIQUE NOT NULL,
                    author TEXT NOT NULL,
                    author_link TEXT NOT NULL,
                    message TEXT NOT NULL DEFAULT '',
                    attachments TEXT NOT NULL DEFAULT '[]'
                )
                "
            ))
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    })
}

fn migration_v2(conn: &mut SqliteConnection) -> BoxFuture<'_, Result<(), sqlx::Error>> {
    Box::pin(async move {
        for table in ["default_posts", "boosted_posts"] {
            add_column_if_missing(conn, table, "provider", "TEXT").await?;
            add_column_if_missing(conn, table, "is_explicit", "INTEGER NOT NULL DEFAULT 0")
                .await?;
            add_column_if_missing(conn, table, "links", "TEXT").await?;
        }
        Ok(())
    })
}

fn migration_v3(conn: &mut SqliteConnection) -> BoxFuture<'_, Result<(), sqlx::Error>> {
    Box::pin(async move {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            )
            ",
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cookie TEXT UNIQUE NOT NULL,
                email TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
                token TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)")
            .execute(&mut *conn)
            .await?;
        Ok(())
    })
}
