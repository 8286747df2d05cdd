use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::record::{CleanRecord, StoredRecord};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS web_data (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            title     TEXT,
            content   TEXT,
            url       TEXT UNIQUE,
            timestamp TEXT,
            data_hash TEXT UNIQUE
        );
        ",
    )
    .context("Failed to create web_data table")?;
    Ok(())
}

/// Open `path` and make sure the table exists.
pub fn setup(path: &Path) -> Result<()> {
    let conn = connect(path).with_context(|| format!("Failed to open {:?}", path))?;
    init_schema(&conn)
}

// ── Writes ──

/// Insert `record`, or overwrite the row already holding its URL.
///
/// The row keeps its id. A fingerprint already owned by a different URL
/// violates `data_hash UNIQUE` and comes back as an error.
pub fn upsert_record(conn: &mut Connection, record: &CleanRecord) -> rusqlite::Result<StoredRecord> {
    let timestamp = record.fetched_at.to_rfc3339();
    let tx = conn.transaction()?;
    let id: i64 = tx.query_row(
        "INSERT INTO web_data (title, content, url, timestamp, data_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(url) DO UPDATE SET
             title     = excluded.title,
             content   = excluded.content,
             timestamp = excluded.timestamp,
             data_hash = excluded.data_hash
         RETURNING id",
        params![record.title, record.content, record.url, timestamp, record.fingerprint],
        |row| row.get(0),
    )?;
    tx.commit()?;

    Ok(StoredRecord {
        id,
        title: record.title.clone(),
        content: record.content.clone(),
        url: record.url.clone(),
        timestamp,
        fingerprint: record.fingerprint.clone(),
    })
}

// ── Reads ──

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        timestamp: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        fingerprint: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

pub fn fetch_by_url(conn: &Connection, url: &str) -> Result<Option<StoredRecord>> {
    let row = conn
        .query_row(
            "SELECT id, title, content, url, timestamp, data_hash FROM web_data WHERE url = ?1",
            params![url],
            row_to_record,
        )
        .optional()?;
    Ok(row)
}

/// Most recently fetched rows first.
pub fn fetch_recent(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredRecord>> {
    let sql = format!(
        "SELECT id, title, content, url, timestamp, data_hash
         FROM web_data
         ORDER BY timestamp DESC, id DESC{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub rows: usize,
    pub latest: Option<String>,
}

pub fn count_rows(conn: &Connection) -> Result<usize> {
    let n: usize = conn.query_row("SELECT COUNT(*) FROM web_data", [], |r| r.get(0))?;
    Ok(n)
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let rows = count_rows(conn)?;
    let latest: Option<String> =
        conn.query_row("SELECT MAX(timestamp) FROM web_data", [], |r| r.get(0))?;
    Ok(Stats { rows, latest })
}
