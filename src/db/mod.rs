pub mod models;
pub mod repository;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<SqliteConnectionManager>;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Per-connection pragmas. `foreign_keys` is connection-scoped in SQLite, so
/// it has to be applied to every connection the pool opens.
fn connection_init(
    busy_timeout_ms: u32,
) -> impl Fn(&mut rusqlite::Connection) -> rusqlite::Result<()> + Send + Sync + 'static {
    move |conn: &mut rusqlite::Connection| {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {busy_timeout_ms};"
        ))
    }
}

pub fn create_pool(db_path: &Path, settings: &DatabaseConfig) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path)
        .with_init(connection_init(settings.busy_timeout_ms));
    let pool = Pool::builder().max_size(settings.pool_size).build(manager)?;

    // journal_mode is persisted in the database file
    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    tracing::debug!(
        path = %db_path.display(),
        pool_size = settings.pool_size,
        "Opened database"
    );
    Ok(pool)
}

/// Single-connection in-memory database. Every pooled connection would
/// otherwise see its own empty database.
pub fn create_memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(connection_init(DatabaseConfig::default().busy_timeout_ms));
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
            tx.commit()?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> DbPool {
        create_memory_pool().unwrap()
    }

    fn table_names(pool: &DbPool) -> Vec<String> {
        let conn = pool.get().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path, &DatabaseConfig::default()).unwrap();
        assert!(db_path.exists());
        // Verify we can get a connection
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn every_pooled_connection_enforces_foreign_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("fk.db"), &DatabaseConfig::default()).unwrap();

        let first = pool.get().unwrap();
        let second = pool.get().unwrap();
        for conn in [&first, &second] {
            let enabled: bool = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert!(enabled);
        }
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
        drop(conn);

        let tables = table_names(&pool);
        for expected in ["user", "post", "media", "comment", "followers"] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap(); // Should not error on second run

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn user_defaults_to_active() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO user (email, password) VALUES (?1, ?2)",
            params!["a@x.com", "pw"],
        )
        .unwrap();

        let is_active: bool = conn
            .query_row(
                "SELECT is_active FROM user WHERE email = ?1",
                params!["a@x.com"],
                |row| row.get(0),
            )
            .unwrap();
        assert!(is_active);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        // Inserting a post with a non-existent user_id should fail
        let result = conn.execute("INSERT INTO post (user_id) VALUES (?1)", params![42]);
        assert!(result.is_err());
    }

    #[test]
    fn schema_rejects_unknown_media_type() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO user (id, email, password) VALUES (1, 'a@x.com', 'pw');
             INSERT INTO post (id, user_id) VALUES (1, 1);",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO media (type, url, post_id) VALUES ('GIF', 'https://x/a.gif', 1)",
            [],
        );
        assert!(result.is_err());

        conn.execute(
            "INSERT INTO media (type, url, post_id) VALUES ('IMAGE', 'https://x/a.png', 1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn schema_rejects_over_length_email() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let email = "e".repeat(121);
        let result = conn.execute(
            "INSERT INTO user (email, password) VALUES (?1, 'pw')",
            params![email],
        );
        assert!(result.is_err());
    }

    #[test]
    fn schema_rejects_self_follow_edge() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO user (id, email, password) VALUES (1, 'a@x.com', 'pw')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO followers (follower_id, followed_id) VALUES (1, 1)",
            [],
        );
        assert!(result.is_err());
    }
}
