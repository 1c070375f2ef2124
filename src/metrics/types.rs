use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date_util::parse_date;
use crate::error::{Error, Result};

/// One day of search performance for one URL or query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub dimension_key: String,
    pub clicks: u64,
    pub impressions: u64,
    /// Click-through rate as a fraction in `[0, 1]`.
    pub ctr: f64,
    /// Average ranking position, 1 being the top result.
    pub position: f64,
}

impl MetricRow {
    /// Reject values no Search Console row can carry. `index` is the
    /// row's position in its batch and ends up in the error.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.dimension_key.trim().is_empty() {
            return Err(Error::malformed(index, "empty dimension key"));
        }
        if !self.ctr.is_finite() || !(0.0..=1.0).contains(&self.ctr) {
            return Err(Error::malformed(
                index,
                format!("ctr {} is outside [0, 1]", self.ctr),
            ));
        }
        if !self.position.is_finite() || self.position <= 0.0 {
            return Err(Error::malformed(
                index,
                format!("position {} is not a positive number", self.position),
            ));
        }
        Ok(())
    }
}

/// A row as it arrives on the wire: unvalidated, with signed or
/// fractional counts (the Search Console API reports counts as doubles).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetricRow {
    pub date: String,
    #[serde(alias = "page", alias = "query", alias = "dimension_key")]
    pub dimension_key: String,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}

impl RawMetricRow {
    pub fn into_row(self, index: usize) -> Result<MetricRow> {
        let date = parse_date(&self.date)
            .map_err(|_| Error::malformed(index, format!("invalid date '{}'", self.date)))?;
        let row = MetricRow {
            date,
            dimension_key: self.dimension_key,
            clicks: count(index, "clicks", self.clicks)?,
            impressions: count(index, "impressions", self.impressions)?,
            ctr: self.ctr,
            position: self.position,
        };
        row.validate(index)?;
        Ok(row)
    }
}

fn count(index: usize, field: &str, value: f64) -> Result<u64> {
    // 2^64 is exactly representable; anything at or above it does not fit
    const LIMIT: f64 = 18_446_744_073_709_551_616.0;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= LIMIT {
        return Err(Error::malformed(
            index,
            format!("{field} {value} is not a non-negative integer"),
        ));
    }
    Ok(value as u64)
}

/// The Search Console dimension a row is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Page,
    Query,
}

impl Dimension {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "page" | "url" => Ok(Self::Page),
            "query" => Ok(Self::Query),
            other => Err(Error::Config(format!(
                "dimension must be one of: page, query (got '{other}')"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Query => "query",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How rows are grouped before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One site-wide group.
    #[default]
    None,
    Url,
    Query,
}

impl GroupBy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "url" | "page" => Ok(Self::Url),
            "query" => Ok(Self::Query),
            other => Err(Error::Config(format!(
                "group_by must be one of: none, url, query (got '{other}')"
            ))),
        }
    }

    /// The stored dimension whose rows feed this grouping. Site-wide
    /// totals are summed from page rows.
    pub fn dimension(self) -> Dimension {
        match self {
            Self::None | Self::Url => Dimension::Page,
            Self::Query => Dimension::Query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawMetricRow {
        RawMetricRow {
            date: "2025-01-01".into(),
            dimension_key: "https://example.com/a".into(),
            clicks: 10.0,
            impressions: 100.0,
            ctr: 0.1,
            position: 3.2,
        }
    }

    #[test]
    fn test_raw_into_row() {
        let row = raw().into_row(0).unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(row.clicks, 10);
        assert_eq!(row.impressions, 100);
    }

    #[test]
    fn test_negative_clicks_rejected() {
        let err = RawMetricRow { clicks: -1.0, ..raw() }.into_row(7).unwrap_err();
        match err {
            Error::MalformedRow { index, reason } => {
                assert_eq!(index, 7);
                assert!(reason.contains("clicks"), "{reason}");
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_fractional_impressions_rejected() {
        assert!(RawMetricRow { impressions: 1.5, ..raw() }.into_row(0).is_err());
    }

    #[test]
    fn test_ctr_out_of_range_rejected() {
        assert!(RawMetricRow { ctr: 1.01, ..raw() }.into_row(0).is_err());
        assert!(RawMetricRow { ctr: -0.1, ..raw() }.into_row(0).is_err());
        assert!(RawMetricRow { ctr: f64::NAN, ..raw() }.into_row(0).is_err());
        assert!(RawMetricRow { ctr: 0.0, ..raw() }.into_row(0).is_ok());
        assert!(RawMetricRow { ctr: 1.0, ..raw() }.into_row(0).is_ok());
    }

    #[test]
    fn test_position_must_be_positive() {
        assert!(RawMetricRow { position: 0.0, ..raw() }.into_row(0).is_err());
        assert!(RawMetricRow { position: -2.0, ..raw() }.into_row(0).is_err());
        assert!(RawMetricRow { position: f64::INFINITY, ..raw() }.into_row(0).is_err());
    }

    #[test]
    fn test_bad_date_rejected() {
        let err = RawMetricRow { date: "2025-13-01".into(), ..raw() }.into_row(3).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { index: 3, .. }));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(RawMetricRow { dimension_key: "  ".into(), ..raw() }.into_row(0).is_err());
    }

    #[test]
    fn test_raw_row_accepts_page_alias() {
        let json = r#"{"date":"2025-01-01","page":"/a","clicks":1,"impressions":2,"ctr":0.5,"position":1.0}"#;
        let raw: RawMetricRow = serde_json::from_str(json).unwrap();
        assert_eq!(raw.dimension_key, "/a");
    }

    #[test]
    fn test_group_by_parse() {
        assert_eq!(GroupBy::parse("none").unwrap(), GroupBy::None);
        assert_eq!(GroupBy::parse("URL").unwrap(), GroupBy::Url);
        assert_eq!(GroupBy::parse("page").unwrap(), GroupBy::Url);
        assert_eq!(GroupBy::parse("query").unwrap(), GroupBy::Query);
        assert!(GroupBy::parse("country").is_err());
    }

    #[test]
    fn test_group_by_dimension() {
        assert_eq!(GroupBy::None.dimension(), Dimension::Page);
        assert_eq!(GroupBy::Url.dimension(), Dimension::Page);
        assert_eq!(GroupBy::Query.dimension(), Dimension::Query);
    }

    #[test]
    fn test_dimension_parse() {
        assert_eq!(Dimension::parse("page").unwrap(), Dimension::Page);
        assert_eq!(Dimension::parse("url").unwrap(), Dimension::Page);
        assert_eq!(Dimension::parse("Query").unwrap(), Dimension::Query);
        assert!(Dimension::parse("device").is_err());
        assert_eq!(Dimension::Query.to_string(), "query");
    }
}
