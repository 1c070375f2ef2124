pub mod date_util;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod period;
pub mod storage;
pub mod url;

pub use engine::{
    analyze, AnalysisReport, AnalysisRequest, ComparisonReport, DimensionSeries,
    MultiPeriodReport,
};
pub use error::{Error, Result};
pub use ingest::{parse_rows, ImportReport};
pub use metrics::{
    ComparisonResult, Dimension, GroupBy, Metric, MetricAggregate, MetricChange, MetricRow,
    PercentChange,
};
pub use period::{ComparisonMode, PeriodLength, PeriodSpec, PeriodWindow};
pub use storage::repository::RowStats;
pub use storage::Database;
pub use url::{parse_url_list, UrlList};

use std::path::Path;

use chrono::NaiveDate;
use chrono_tz::Tz;

use storage::repository;

/// IANA timezone used to decide what "today" is.
pub const CONFIG_TIMEZONE: &str = "timezone";
/// Period used by `compare` when none is given, e.g. `90d`.
pub const CONFIG_DEFAULT_PERIOD: &str = "default_period";
/// Grouping used by `compare` when none is given.
pub const CONFIG_DEFAULT_GROUP_BY: &str = "default_group_by";

/// Main entry point for the Search Console data warehouse.
pub struct GscDW {
    db: Database,
}

impl GscDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The configured timezone, UTC when unset.
    pub async fn timezone(&self) -> Result<Tz> {
        match self.config_get(CONFIG_TIMEZONE).await? {
            Some(name) => date_util::parse_timezone(&name),
            None => Ok(Tz::UTC),
        }
    }

    pub async fn today(&self) -> Result<NaiveDate> {
        Ok(date_util::today_in(self.timezone().await?))
    }

    /// Yesterday in the configured timezone. Today is always partial, so
    /// periods end here by default.
    pub async fn reference_date(&self) -> Result<NaiveDate> {
        date_util::yesterday_in(self.timezone().await?)
    }

    /// Parse `period` (`30d`, `30d-yoy`, `4x90d`, `yoy`) into a spec ending
    /// at `reference`, or at [`reference_date`](Self::reference_date).
    pub async fn period_spec(
        &self,
        period: &str,
        reference: Option<NaiveDate>,
    ) -> Result<PeriodSpec> {
        let tz = self.timezone().await?;
        let reference = match reference {
            Some(date) => date,
            None => date_util::yesterday_in(tz)?,
        };
        PeriodSpec::parse(period, reference, date_util::today_in(tz))
    }

    /// The windows `period` resolves to, most recent first.
    pub async fn windows(
        &self,
        period: &str,
        reference: Option<NaiveDate>,
    ) -> Result<Vec<PeriodWindow>> {
        Ok(self.period_spec(period, reference).await?.windows().to_vec())
    }

    // ── Import ─────────────────────────────────────────────────────

    pub async fn import_rows(
        &self,
        dimension: Dimension,
        rows: Vec<MetricRow>,
    ) -> Result<ImportReport> {
        ingest::validate_batch(&rows)?;
        let report = ImportReport::new(dimension, &rows);
        self.db
            .writer()
            .call(move |conn| repository::upsert_metric_rows(conn, dimension, &rows))
            .await?;
        log::info!(
            "imported {} {} rows ({} to {})",
            report.rows_imported,
            dimension,
            report.first_date.map_or_else(|| "-".into(), |d| d.to_string()),
            report.last_date.map_or_else(|| "-".into(), |d| d.to_string()),
        );
        Ok(report)
    }

    /// Import a JSON export (plain row array or API response) from disk.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        dimension: Dimension,
    ) -> Result<ImportReport> {
        let path = path.as_ref();
        log::debug!("reading {}", path.display());
        let text = tokio::fs::read_to_string(path).await?;
        let rows = ingest::parse_rows(&text)?;
        self.import_rows(dimension, rows).await
    }

    // ── Analysis ───────────────────────────────────────────────────

    /// Load the rows the request spans and run the engine over them.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        let span = request.spec.span();
        let dimension = request.group_by.dimension();
        let rows = self
            .db
            .reader()
            .call(move |conn| repository::load_metric_rows(conn, dimension, span.start, span.end))
            .await?;
        log::debug!("loaded {} {dimension} rows for {span}", rows.len());
        engine::analyze(request, &rows)
    }

    pub async fn status(&self) -> Result<Vec<RowStats>> {
        let stats = self
            .db
            .reader()
            .call(|conn| {
                let conn: &rusqlite::Connection = conn;
                [Dimension::Page, Dimension::Query]
                    .into_iter()
                    .map(|dimension| repository::row_stats(conn, dimension))
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            })
            .await?;
        Ok(stats)
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await?;
        Ok(value)
    }

    /// Store a config value. Known keys are validated first.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            CONFIG_TIMEZONE => {
                date_util::parse_timezone(value)?;
            }
            CONFIG_DEFAULT_PERIOD => {
                let tz = self.timezone().await?;
                PeriodSpec::parse(value, date_util::yesterday_in(tz)?, date_util::today_in(tz))?;
            }
            CONFIG_DEFAULT_GROUP_BY => {
                GroupBy::parse(value)?;
            }
            _ => log::warn!("'{key}' is not a known config key; storing it anyway"),
        }
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        let items = self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, key: &str, clicks: u64, impressions: u64) -> MetricRow {
        MetricRow {
            date,
            dimension_key: key.to_string(),
            clicks,
            impressions,
            ctr: clicks as f64 / impressions as f64,
            position: 3.0,
        }
    }

    async fn dw() -> GscDW {
        GscDW::new(Database::open_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_timezone_defaults_to_utc() {
        let dw = dw().await;
        assert_eq!(dw.timezone().await.unwrap(), Tz::UTC);

        dw.config_set(CONFIG_TIMEZONE, "Asia/Tokyo").await.unwrap();
        assert_eq!(dw.timezone().await.unwrap(), chrono_tz::Asia::Tokyo);
    }

    #[tokio::test]
    async fn test_config_set_validates_known_keys() {
        let dw = dw().await;
        assert!(matches!(
            dw.config_set(CONFIG_TIMEZONE, "Mars/Olympus").await,
            Err(Error::Config(_))
        ));
        assert!(dw.config_set(CONFIG_DEFAULT_PERIOD, "banana").await.is_err());
        assert!(dw.config_set(CONFIG_DEFAULT_GROUP_BY, "site").await.is_err());
        dw.config_set(CONFIG_DEFAULT_PERIOD, "4x90d").await.unwrap();
        dw.config_set("note", "anything").await.unwrap();

        let items = dw.config_list().await.unwrap();
        assert_eq!(
            items,
            vec![
                ("default_period".to_string(), "4x90d".to_string()),
                ("note".to_string(), "anything".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_reference_date_is_before_today() {
        let dw = dw().await;
        let today = dw.today().await.unwrap();
        let reference = dw.reference_date().await.unwrap();
        // Equal only if midnight passed between the two calls
        assert!(reference <= today);
        assert!((today - reference).num_days() <= 1);

        let windows = dw.windows("30d", Some(reference)).await.unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end, reference);
        assert_eq!(windows[0].days(), 30);
    }

    #[tokio::test]
    async fn test_period_spec_rejects_future_reference() {
        let dw = dw().await;
        let tomorrow = dw.today().await.unwrap().succ_opt().unwrap();
        assert!(matches!(
            dw.period_spec("30d", Some(tomorrow)).await,
            Err(Error::InvalidPeriod(_))
        ));
    }

    #[tokio::test]
    async fn test_import_then_compare() {
        let dw = dw().await;
        let rows = vec![
            row(d(2025, 1, 1), "/a", 5, 100),
            row(d(2025, 1, 2), "/a", 15, 100),
            row(d(2025, 1, 3), "/a", 20, 200),
            row(d(2025, 1, 4), "/a", 10, 100),
            row(d(2025, 1, 5), "/a", 20, 200),
            row(d(2025, 1, 6), "/a", 30, 300),
            row(d(2025, 1, 6), "/b", 1, 10),
        ];
        let report = dw.import_rows(Dimension::Page, rows).await.unwrap();
        assert_eq!(report.rows_imported, 7);
        assert_eq!(report.last_date, Some(d(2025, 1, 6)));

        let spec = dw.period_spec("3d", Some(d(2025, 1, 6))).await.unwrap();
        let request = AnalysisRequest::new(spec, GroupBy::Url)
            .with_dimension_filter(vec!["/a".to_string()]);
        let AnalysisReport::Comparison(report) = dw.analyze(&request).await.unwrap() else {
            panic!("expected a comparison report");
        };
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].current.clicks, 60);
        assert_eq!(report.results[0].baseline.clicks, 40);
        assert_eq!(report.results[0].delta_pct.clicks, PercentChange::Value(50.0));
    }

    #[tokio::test]
    async fn test_query_rows_are_separate_from_pages() {
        let dw = dw().await;
        dw.import_rows(Dimension::Page, vec![row(d(2025, 1, 6), "/a", 5, 10)])
            .await
            .unwrap();
        dw.import_rows(Dimension::Query, vec![row(d(2025, 1, 6), "rust", 7, 10)])
            .await
            .unwrap();

        let spec = dw.period_spec("1d", Some(d(2025, 1, 6))).await.unwrap();
        let AnalysisReport::Comparison(report) =
            dw.analyze(&AnalysisRequest::new(spec, GroupBy::Query)).await.unwrap()
        else {
            panic!("expected a comparison report");
        };
        assert_eq!(report.results[0].label(), "rust");
        assert_eq!(report.total.current.clicks, 7);

        let stats = dw.status().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].rows, 1);
        assert_eq!(stats[1].dimension, Dimension::Query);
    }

    #[tokio::test]
    async fn test_import_rejects_duplicates() {
        let dw = dw().await;
        let rows = vec![row(d(2025, 1, 6), "/a", 5, 10), row(d(2025, 1, 6), "/a", 6, 10)];
        assert!(matches!(
            dw.import_rows(Dimension::Page, rows).await,
            Err(Error::MalformedRow { index: 1, .. })
        ));
        assert_eq!(dw.status().await.unwrap()[0].rows, 0);
    }

    #[tokio::test]
    async fn test_import_file() {
        let dw = dw().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rows": [{{"keys": ["2025-03-01", "https://example.com/"], "clicks": 4, "impressions": 40, "ctr": 0.1, "position": 1.5}}]}}"#
        )
        .unwrap();

        let report = dw.import_file(file.path(), Dimension::Page).await.unwrap();
        assert_eq!(report.rows_imported, 1);
        assert_eq!(report.first_date, Some(d(2025, 3, 1)));

        let missing = dw.import_file("/nonexistent/gsc.json", Dimension::Page).await;
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
