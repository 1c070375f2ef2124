//! Turning exported Search Console JSON into validated rows.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::metrics::{Dimension, MetricRow, RawMetricRow};

/// One row of a `searchanalytics.query` response, requested with the
/// dimensions `["date", <page|query>]`.
#[derive(Debug, Deserialize)]
struct ApiRow {
    keys: Vec<String>,
    clicks: f64,
    impressions: f64,
    ctr: f64,
    position: f64,
}

impl ApiRow {
    fn into_raw(self, index: usize) -> Result<RawMetricRow> {
        let [date, dimension_key]: [String; 2] = self.keys.try_into().map_err(|keys: Vec<_>| {
            Error::malformed(index, format!("expected 2 keys (date, dimension), got {}", keys.len()))
        })?;
        Ok(RawMetricRow {
            date,
            dimension_key,
            clicks: self.clicks,
            impressions: self.impressions,
            ctr: self.ctr,
            position: self.position,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub dimension: Dimension,
    pub rows_imported: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl ImportReport {
    pub fn new(dimension: Dimension, rows: &[MetricRow]) -> Self {
        Self {
            dimension,
            rows_imported: rows.len(),
            first_date: rows.iter().map(|r| r.date).min(),
            last_date: rows.iter().map(|r| r.date).max(),
        }
    }
}

/// Parse rows from either a plain JSON array of rows or a Search Console
/// API response object.
///
/// The whole batch fails on the first malformed row; nothing is partially
/// accepted.
pub fn parse_rows(json: &str) -> Result<Vec<MetricRow>> {
    let raw = match serde_json::from_str::<Value>(json)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<RawMetricRow>(item)
                    .map_err(|e| Error::malformed(index, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?,
        Value::Object(mut object) => match object.remove("rows") {
            // The API leaves out `rows` entirely when nothing matched
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    serde_json::from_value::<ApiRow>(item)
                        .map_err(|e| Error::malformed(index, e.to_string()))?
                        .into_raw(index)
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(serde_json::Error::custom("`rows` must be an array").into());
            }
        },
        _ => {
            return Err(serde_json::Error::custom(
                "expected an array of rows or an object with a `rows` array",
            )
            .into());
        }
    };

    let rows = raw
        .into_iter()
        .enumerate()
        .map(|(index, r)| r.into_row(index))
        .collect::<Result<Vec<_>>>()?;
    validate_batch(&rows)?;
    log::debug!("parsed {} rows", rows.len());
    Ok(rows)
}

/// Validate every row and reject repeated `(date, dimension_key)` pairs.
pub fn validate_batch(rows: &[MetricRow]) -> Result<()> {
    let mut seen: HashSet<(NaiveDate, &str)> = HashSet::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        row.validate(index)?;
        if !seen.insert((row.date, row.dimension_key.as_str())) {
            return Err(Error::malformed(
                index,
                format!("duplicate row for {} on {}", row.dimension_key, row.date),
            ));
        }
    }
    Ok(())
}
