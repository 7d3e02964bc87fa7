//! SQLite-backed store.
//!
//! Each operation checks a connection out of an r2d2 pool, so concurrent
//! callers never queue behind a process-wide lock. SQLite serializes writers
//! through its own file locking (WAL mode lets readers proceed alongside),
//! and every mutation runs inside an `IMMEDIATE` transaction so the whole
//! operation is atomic.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{Cmd, Dir, Store, DIR_SCORE_DECAY, DIR_SCORE_INCREMENT};
use crate::common::{paths, Error, Result};

/// How long a connection waits on another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on connections open at once
const MAX_CONNECTIONS: u32 = 16;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cmds (
        seq  INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS dirs (
        path  TEXT PRIMARY KEY,
        score REAL NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_dirs_score ON dirs(score DESC);

    CREATE TABLE IF NOT EXISTS shared_vars (
        name  TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Store persisted in a single SQLite database file
pub struct SqliteStore {
    path: PathBuf,
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, applying the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |message: String| Error::StoreOpen {
            path: path.clone(),
            message,
        };

        paths::ensure_parent_dir(&path).map_err(|e| open_err(e.to_string()))?;

        // A direct connection first, so a bad path fails now instead of
        // after the pool's connection timeout
        let mut conn = Connection::open(&path).map_err(|e| open_err(e.to_string()))?;
        init_connection(&mut conn).map_err(|e| open_err(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| open_err(format!("failed to initialize schema: {e}")))?;
        drop(conn);

        let manager = SqliteConnectionManager::file(&path).with_init(init_connection);
        let pool = Pool::builder()
            .max_size(MAX_CONNECTIONS)
            .min_idle(Some(0))
            .connection_timeout(BUSY_TIMEOUT)
            .build(manager)
            .map_err(|e| open_err(e.to_string()))?;

        debug!(path = %path.display(), "Opened store");

        Ok(Self { path, pool })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
}

/// Clamp a sequence bound into SQLite's signed integer range
fn sql_seq(seq: u64) -> i64 {
    i64::try_from(seq).unwrap_or(i64::MAX)
}

fn row_to_cmd(row: &rusqlite::Row<'_>) -> rusqlite::Result<Cmd> {
    Ok(Cmd {
        seq: row.get::<_, i64>(0)? as u64,
        text: row.get(1)?,
    })
}

impl Store for SqliteStore {
    fn shared_var(&self, name: &str) -> Result<String> {
        self.conn()?
            .query_row(
                "SELECT value FROM shared_vars WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NoSuchVariable(name.to_string()))
    }

    fn set_shared_var(&self, name: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO shared_vars (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )?;
        Ok(())
    }

    fn del_shared_var(&self, name: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM shared_vars WHERE name = ?1", params![name])?;
        Ok(())
    }

    fn next_cmd_seq(&self) -> Result<u64> {
        // AUTOINCREMENT keeps the high-water mark even after deletions
        let last: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'cmds'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(last.map_or(1, |seq| seq as u64 + 1))
    }

    fn add_cmd(&self, text: &str) -> Result<u64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("INSERT INTO cmds (text) VALUES (?1)", params![text])?;
        let seq = tx.last_insert_rowid() as u64;
        tx.commit()?;
        Ok(seq)
    }

    fn del_cmd(&self, seq: u64) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM cmds WHERE seq = ?1", params![sql_seq(seq)])?;
        Ok(())
    }

    fn cmd(&self, seq: u64) -> Result<String> {
        self.conn()?
            .query_row(
                "SELECT text FROM cmds WHERE seq = ?1",
                params![sql_seq(seq)],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::NoMatchingCommand)
    }

    fn cmds(&self, from: u64, upto: u64) -> Result<Vec<Cmd>> {
        if from > upto {
            return Err(Error::InvalidQuery(format!(
                "history range start {from} is after end {upto}"
            )));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT seq, text FROM cmds WHERE seq >= ?1 AND seq < ?2 ORDER BY seq ASC",
        )?;
        let cmds = stmt
            .query_map(params![sql_seq(from), sql_seq(upto)], row_to_cmd)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cmds)
    }

    fn next_cmd(&self, from: u64, prefix: &str) -> Result<Cmd> {
        self.conn()?
            .query_row(
                "SELECT seq, text FROM cmds
                 WHERE seq >= ?1 AND substr(text, 1, length(?2)) = ?2
                 ORDER BY seq ASC LIMIT 1",
                params![sql_seq(from), prefix],
                row_to_cmd,
            )
            .optional()?
            .ok_or(Error::NoMatchingCommand)
    }

    fn prev_cmd(&self, upto: u64, prefix: &str) -> Result<Cmd> {
        self.conn()?
            .query_row(
                "SELECT seq, text FROM cmds
                 WHERE seq < ?1 AND substr(text, 1, length(?2)) = ?2
                 ORDER BY seq DESC LIMIT 1",
                params![sql_seq(upto), prefix],
                row_to_cmd,
            )
            .optional()?
            .ok_or(Error::NoMatchingCommand)
    }

    fn add_dir(&self, path: &str, inc_factor: f64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("UPDATE dirs SET score = score * ?1", params![DIR_SCORE_DECAY])?;
        tx.execute(
            "INSERT INTO dirs (path, score) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET score = score + excluded.score",
            params![path, DIR_SCORE_INCREMENT * inc_factor],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn del_dir(&self, path: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM dirs WHERE path = ?1", params![path])?;
        Ok(())
    }

    fn dirs(&self, blacklist: &[String]) -> Result<Vec<Dir>> {
        let blacklist: HashSet<&str> = blacklist.iter().map(String::as_str).collect();

        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT path, score FROM dirs ORDER BY score DESC, path ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Dir {
                path: row.get(0)?,
                score: row.get(1)?,
            })
        })?;

        let mut dirs = Vec::new();
        for dir in rows {
            let dir = dir?;
            if !blacklist.contains(dir.path.as_str()) {
                dirs.push(dir);
            }
        }
        Ok(dirs)
    }
}
