//! Period comparison over a batch of rows.
//!
//! [`analyze`] is pure: the same request and rows always give the same
//! report, and nothing outside its arguments is read or written.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::metrics::{
    summarize, top_n_by, ComparisonResult, GroupBy, Metric, MetricAggregate, MetricChange,
    MetricRow, PeriodSummary,
};
use crate::period::{ComparisonMode, PeriodSpec, PeriodWindow};

/// Everything one analysis needs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub spec: PeriodSpec,
    pub group_by: GroupBy,
    /// Restrict the analysis to these dimension keys. Keys without rows
    /// still appear in the report, with `has_data == false`.
    pub dimension_filter: Option<Vec<String>>,
}

impl AnalysisRequest {
    pub fn new(spec: PeriodSpec, group_by: GroupBy) -> Self {
        Self {
            spec,
            group_by,
            dimension_filter: None,
        }
    }

    pub fn with_dimension_filter(mut self, keys: Vec<String>) -> Self {
        self.dimension_filter = Some(keys);
        self
    }
}

/// Current window against one baseline (rolling or year-over-year).
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub period_key: String,
    pub mode: ComparisonMode,
    pub reference_date: NaiveDate,
    pub group_by: GroupBy,
    pub current_window: PeriodWindow,
    pub baseline_window: PeriodWindow,
    pub total: ComparisonResult,
    /// Ordered by current clicks, highest first, then by key.
    pub results: Vec<ComparisonResult>,
    /// Current window summary first, then the baseline.
    pub summaries: Vec<PeriodSummary>,
}

/// One dimension across consecutive windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSeries {
    pub dimension_key: Option<String>,
    /// Aligned with [`MultiPeriodReport::windows`].
    pub aggregates: Vec<MetricAggregate>,
    /// `changes[i]` compares window `i` against the older window `i + 1`.
    pub changes: Vec<MetricChange>,
}

impl DimensionSeries {
    fn new(dimension_key: Option<String>, aggregates: Vec<MetricAggregate>) -> Self {
        let changes = aggregates
            .windows(2)
            .map(|pair| MetricChange::between(&pair[0], &pair[1]))
            .collect();
        Self {
            dimension_key,
            aggregates,
            changes,
        }
    }

    pub fn label(&self) -> &str {
        self.dimension_key.as_deref().unwrap_or("(all)")
    }
}

/// Several adjacent windows of equal length, most recent first.
#[derive(Debug, Clone, Serialize)]
pub struct MultiPeriodReport {
    pub period_key: String,
    pub reference_date: NaiveDate,
    pub group_by: GroupBy,
    pub windows: Vec<PeriodWindow>,
    pub total: DimensionSeries,
    /// Ordered by clicks in the most recent window, highest first.
    pub series: Vec<DimensionSeries>,
    pub summaries: Vec<PeriodSummary>,
}

impl MultiPeriodReport {
    /// The `n` best series by `metric` over all windows. See [`top_n_by`].
    pub fn top_series(&self, metric: Metric, n: usize) -> Vec<&DimensionSeries> {
        let aggregates: Vec<&[MetricAggregate]> =
            self.series.iter().map(|s| s.aggregates.as_slice()).collect();
        top_n_by(&aggregates, metric, n)
            .into_iter()
            .map(|i| &self.series[i])
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisReport {
    Comparison(ComparisonReport),
    MultiPeriod(MultiPeriodReport),
}

/// Run a period analysis over `rows`.
///
/// Rows are validated first; any malformed row fails the whole analysis.
/// Rows outside every window are ignored. Rows must already be unique per
/// `(date, dimension_key)`.
pub fn analyze(request: &AnalysisRequest, rows: &[MetricRow]) -> Result<AnalysisReport> {
    for (index, row) in rows.iter().enumerate() {
        row.validate(index)?;
    }

    let spec = &request.spec;
    let windows = spec.windows();
    let filter: Option<HashSet<&str>> = request
        .dimension_filter
        .as_ref()
        .map(|keys| keys.iter().map(String::as_str).collect());

    let in_scope: Vec<&MetricRow> = rows
        .iter()
        .filter(|r| windows.iter().any(|w| w.contains(r.date)))
        .filter(|r| {
            filter
                .as_ref()
                .map_or(true, |keys| keys.contains(r.dimension_key.as_str()))
        })
        .collect();

    log::debug!(
        "analyzing {} of {} rows over {} windows ({})",
        in_scope.len(),
        rows.len(),
        windows.len(),
        spec.key()
    );

    let per_window = |group: &[&MetricRow]| -> Vec<MetricAggregate> {
        windows
            .iter()
            .map(|w| MetricAggregate::for_window(group.iter().copied(), w))
            .collect()
    };

    let total = per_window(&in_scope);
    let mut keyed: Vec<(Option<String>, Vec<MetricAggregate>)> = match request.group_by {
        GroupBy::None => vec![(None, total.clone())],
        GroupBy::Url | GroupBy::Query => {
            let mut groups: BTreeMap<&str, Vec<&MetricRow>> = BTreeMap::new();
            for key in request.dimension_filter.iter().flatten() {
                groups.entry(key.as_str()).or_default();
            }
            for row in &in_scope {
                groups.entry(row.dimension_key.as_str()).or_default().push(row);
            }
            groups
                .into_iter()
                .map(|(key, group)| (Some(key.to_string()), per_window(&group)))
                .collect()
        }
    };
    // Stable: equal clicks keep the key order from the BTreeMap
    keyed.sort_by_key(|(_, aggs)| Reverse(aggs[0].clicks));

    let summaries: Vec<PeriodSummary> = windows
        .iter()
        .enumerate()
        .map(|(i, window)| {
            let column: Vec<&MetricAggregate> = keyed.iter().map(|(_, aggs)| &aggs[i]).collect();
            summarize(*window, &column)
        })
        .collect();

    let report = match spec.mode() {
        ComparisonMode::Rolling | ComparisonMode::YearOverYear => {
            AnalysisReport::Comparison(ComparisonReport {
                period_key: spec.key(),
                mode: spec.mode(),
                reference_date: spec.reference_date(),
                group_by: request.group_by,
                current_window: windows[0],
                baseline_window: windows[1],
                total: ComparisonResult::new(None, total[0], total[1]),
                results: keyed
                    .into_iter()
                    .map(|(key, aggs)| ComparisonResult::new(key, aggs[0], aggs[1]))
                    .collect(),
                summaries,
            })
        }
        ComparisonMode::MultiConsecutive { .. } => AnalysisReport::MultiPeriod(MultiPeriodReport {
            period_key: spec.key(),
            reference_date: spec.reference_date(),
            group_by: request.group_by,
            windows: windows.to_vec(),
            total: DimensionSeries::new(None, total),
            series: keyed
                .into_iter()
                .map(|(key, aggs)| DimensionSeries::new(key, aggs))
                .collect(),
            summaries,
        }),
    };
    Ok(report)
}
