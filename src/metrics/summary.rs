use std::cmp::Ordering;

use serde::Serialize;

use super::aggregate::MetricAggregate;
use crate::error::{Error, Result};
use crate::period::PeriodWindow;

/// One of the four Search Console metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Clicks,
    Impressions,
    Ctr,
    Position,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Clicks,
        Metric::Impressions,
        Metric::Ctr,
        Metric::Position,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "clicks" => Ok(Self::Clicks),
            "impressions" => Ok(Self::Impressions),
            "ctr" => Ok(Self::Ctr),
            "position" => Ok(Self::Position),
            other => Err(Error::Config(format!(
                "metric must be one of: clicks, impressions, ctr, position (got '{other}')"
            ))),
        }
    }

    pub fn value(self, agg: &MetricAggregate) -> f64 {
        match self {
            Metric::Clicks => agg.clicks as f64,
            Metric::Impressions => agg.impressions as f64,
            Metric::Ctr => agg.ctr,
            Metric::Position => agg.position,
        }
    }
}

/// Spread of one metric across the dimensions of a window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricSummary {
    /// Sum for clicks and impressions; the pooled value (recomputed from
    /// the summed counts) for CTR and position.
    pub total: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-window summary across dimensions. Dimensions without data in the
/// window are left out. CTR and position also leave out dimensions with
/// zero impressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub window: PeriodWindow,
    pub dimensions: usize,
    pub clicks: MetricSummary,
    pub impressions: MetricSummary,
    pub ctr: MetricSummary,
    pub position: MetricSummary,
}

impl PeriodSummary {
    pub fn metric(&self, metric: Metric) -> &MetricSummary {
        match metric {
            Metric::Clicks => &self.clicks,
            Metric::Impressions => &self.impressions,
            Metric::Ctr => &self.ctr,
            Metric::Position => &self.position,
        }
    }
}

pub fn summarize(window: PeriodWindow, aggregates: &[&MetricAggregate]) -> PeriodSummary {
    let with_data: Vec<&MetricAggregate> =
        aggregates.iter().copied().filter(|a| a.has_data).collect();
    // CTR and position mean nothing for a dimension that was never shown
    let rated: Vec<&MetricAggregate> = with_data
        .iter()
        .copied()
        .filter(|a| a.impressions > 0)
        .collect();

    PeriodSummary {
        window,
        dimensions: with_data.len(),
        clicks: spread(Metric::Clicks, &with_data),
        impressions: spread(Metric::Impressions, &with_data),
        ctr: spread(Metric::Ctr, &rated),
        position: spread(Metric::Position, &rated),
    }
}

fn spread(metric: Metric, aggregates: &[&MetricAggregate]) -> MetricSummary {
    if aggregates.is_empty() {
        return MetricSummary::default();
    }
    let values: Vec<f64> = aggregates.iter().map(|a| metric.value(a)).collect();
    let sum: f64 = values.iter().sum();
    MetricSummary {
        total: match metric {
            Metric::Clicks | Metric::Impressions => sum,
            Metric::Ctr | Metric::Position => {
                metric.value(&MetricAggregate::merge(aggregates.iter().copied()))
            }
        },
        avg: sum / values.len() as f64,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Indices of the `n` best entries by `metric` across all windows, best
/// first. Clicks and impressions rank by their sum, largest first. CTR and
/// position rank by the value pooled over the windows with impressions:
/// highest CTR first, lowest (best) position first. Entries without any
/// impressions go last for those two. Ties keep input order.
pub fn top_n_by(series: &[&[MetricAggregate]], metric: Metric, n: usize) -> Vec<usize> {
    let mut ranked: Vec<(usize, Option<f64>)> = series
        .iter()
        .enumerate()
        .map(|(i, aggs)| (i, rank_value(metric, aggs)))
        .collect();
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) if metric == Metric::Position => x.total_cmp(&y),
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranked.into_iter().take(n).map(|(i, _)| i).collect()
}

fn rank_value(metric: Metric, aggregates: &[MetricAggregate]) -> Option<f64> {
    match metric {
        Metric::Clicks | Metric::Impressions => {
            Some(aggregates.iter().map(|a| metric.value(a)).sum())
        }
        Metric::Ctr | Metric::Position => {
            let pooled = MetricAggregate::merge(aggregates.iter().filter(|a| a.impressions > 0));
            (pooled.impressions > 0).then(|| metric.value(&pooled))
        }
    }
}
