//! `sqlite` store: persistent partition store in a single SQLite file.
//!
//! One table holds every row:
//!
//! ```text
//! rows(pk TEXT, sk TEXT, attrs TEXT /* JSON object */, PRIMARY KEY (pk, sk))
//! ```
//!
//! A fresh connection is opened per call, so the store itself holds only the
//! database path and is trivially `Send + Sync`.  `put_versioned` runs inside
//! an `IMMEDIATE` transaction so the version check and the write are atomic
//! with respect to other connections.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AppError;
use super::{PartitionStore, Row, check_version};

/// Schema version stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`, creating parent
    /// directories and the schema as needed.  Safe to call repeatedly.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("sqlite: cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let store = Self { db_path: db_path.to_path_buf() };
        store.init_db()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = open_conn(&self.db_path)?;
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| AppError::Store(format!("sqlite: read user_version: {e}")))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rows (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                attrs TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            );
            PRAGMA user_version = 1;
            ",
        )
        .map_err(|e| AppError::Store(format!("sqlite: initialize schema: {e}")))
    }
}

/// Open a connection to `db_path` with WAL journaling and a 5 s busy timeout.
fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Store(format!("sqlite: open {}: {e}", db_path.display())))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Store(format!("sqlite: set journal_mode WAL: {e}")))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| AppError::Store(format!("sqlite: set busy_timeout: {e}")))?;
    Ok(conn)
}

fn decode_attrs(pk: &str, sk: &str, json: &str) -> Result<Map<String, Value>, AppError> {
    serde_json::from_str(json)
        .map_err(|e| AppError::Store(format!("sqlite: malformed attrs for {pk}/{sk}: {e}")))
}

fn encode_attrs(row: &Row) -> Result<String, AppError> {
    serde_json::to_string(&row.attrs)
        .map_err(|e| AppError::Store(format!("sqlite: serialize {}: {e}", row.key())))
}

fn select_row(conn: &Connection, pk: &str, sk: &str) -> Result<Option<Row>, AppError> {
    let attrs: Option<String> = conn
        .query_row(
            "SELECT attrs FROM rows WHERE pk = ?1 AND sk = ?2",
            params![pk, sk],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Store(format!("sqlite: get {pk}/{sk}: {e}")))?;
    attrs
        .map(|json| {
            Ok(Row {
                pk: pk.to_string(),
                sk: sk.to_string(),
                attrs: decode_attrs(pk, sk, &json)?,
            })
        })
        .transpose()
}

fn upsert_row(conn: &Connection, row: &Row) -> Result<(), AppError> {
    let attrs = encode_attrs(row)?;
    conn.execute(
        "INSERT INTO rows (pk, sk, attrs) VALUES (?1, ?2, ?3)
         ON CONFLICT (pk, sk) DO UPDATE SET attrs = excluded.attrs",
        params![row.pk, row.sk, attrs],
    )
    .map_err(|e| AppError::Store(format!("sqlite: put {}: {e}", row.key())))?;
    Ok(())
}

impl PartitionStore for SqliteStore {
    fn store_type(&self) -> &str {
        "sqlite"
    }

    fn get(&self, pk: &str, sk: &str) -> Result<Option<Row>, AppError> {
        let conn = open_conn(&self.db_path)?;
        select_row(&conn, pk, sk)
    }

    fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Row>, AppError> {
        let conn = open_conn(&self.db_path)?;
        let mut stmt = conn
            .prepare(
                "SELECT sk, attrs FROM rows
                 WHERE pk = ?1 AND substr(sk, 1, length(?2)) = ?2
                 ORDER BY sk",
            )
            .map_err(|e| AppError::Store(format!("sqlite: prepare query: {e}")))?;

        let raw = stmt
            .query_map(params![pk, sk_prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| AppError::Store(format!("sqlite: query {pk}/{sk_prefix}*: {e}")))?;

        let mut rows = Vec::new();
        for item in raw {
            let (sk, json) =
                item.map_err(|e| AppError::Store(format!("sqlite: query row: {e}")))?;
            match decode_attrs(pk, &sk, &json) {
                Ok(attrs) => rows.push(Row { pk: pk.to_string(), sk, attrs }),
                Err(e) => warn!(key = %format!("{pk}/{sk}"), error = %e, "skipping row with malformed attrs"),
            }
        }
        Ok(rows)
    }

    fn put(&self, row: Row) -> Result<(), AppError> {
        let conn = open_conn(&self.db_path)?;
        upsert_row(&conn, &row)
    }

    fn put_versioned(&self, row: Row, expected: Option<i64>) -> Result<(), AppError> {
        let mut conn = open_conn(&self.db_path)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| AppError::Store(format!("sqlite: begin tx: {e}")))?;

        let existing = select_row(&tx, &row.pk, &row.sk)?;
        check_version(row.key(), existing.as_ref(), expected)?;
        upsert_row(&tx, &row)?;

        tx.commit()
            .map_err(|e| AppError::Store(format!("sqlite: commit {}: {e}", row.key())))
    }
}
