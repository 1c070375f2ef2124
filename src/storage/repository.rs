use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::metrics::{Dimension, MetricRow};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Metric rows ────────────────────────────────────────────────────

/// Insert or replace rows for `dimension`. Returns the number of rows
/// written. Runs in one transaction.
pub fn upsert_metric_rows(
    conn: &mut Connection,
    dimension: Dimension,
    rows: &[MetricRow],
) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO metric_rows
                (dimension, date_key, dimension_key, clicks, impressions, ctr, position, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
             ON CONFLICT(dimension, date_key, dimension_key) DO UPDATE SET
                clicks = excluded.clicks,
                impressions = excluded.impressions,
                ctr = excluded.ctr,
                position = excluded.position,
                imported_at = excluded.imported_at",
        )?;
        for row in rows {
            stmt.execute(params![
                dimension.as_str(),
                row.date.format(DATE_FORMAT).to_string(),
                row.dimension_key,
                to_sql_count(row.clicks)?,
                to_sql_count(row.impressions)?,
                row.ctr,
                row.position,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

/// Rows for `dimension` dated within `[start, end]`, ordered by date then
/// key.
pub fn load_metric_rows(
    conn: &Connection,
    dimension: Dimension,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<MetricRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT date_key, dimension_key, clicks, impressions, ctr, position
         FROM metric_rows
         WHERE dimension = ?1 AND date_key BETWEEN ?2 AND ?3
         ORDER BY date_key, dimension_key",
    )?;
    let rows = stmt.query_map(
        params![
            dimension.as_str(),
            start.format(DATE_FORMAT).to_string(),
            end.format(DATE_FORMAT).to_string(),
        ],
        |row| {
            let date_key: String = row.get(0)?;
            let date = NaiveDate::parse_from_str(&date_key, DATE_FORMAT)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
            Ok(MetricRow {
                date,
                dimension_key: row.get(1)?,
                clicks: from_sql_count(2, row.get(2)?)?,
                impressions: from_sql_count(3, row.get(3)?)?,
                ctr: row.get(4)?,
                position: row.get(5)?,
            })
        },
    )?;
    rows.collect()
}

/// What is stored for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowStats {
    pub dimension: Dimension,
    pub rows: u64,
    pub dimension_keys: u64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

pub fn row_stats(conn: &Connection, dimension: Dimension) -> Result<RowStats, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT dimension_key), MIN(date_key), MAX(date_key)
         FROM metric_rows WHERE dimension = ?1",
        params![dimension.as_str()],
        |row| {
            Ok(RowStats {
                dimension,
                rows: from_sql_count(0, row.get(0)?)?,
                dimension_keys: from_sql_count(1, row.get(1)?)?,
                first_date: row.get(2)?,
                last_date: row.get(3)?,
            })
        },
    )
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Helpers ────────────────────────────────────────────────────────

/// SQLite integers are signed 64-bit.
fn to_sql_count(value: u64) -> Result<i64, rusqlite::Error> {
    i64::try_from(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_sql_count(column: usize, value: i64) -> Result<u64, rusqlite::Error> {
    u64::try_from(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(e)))
}
