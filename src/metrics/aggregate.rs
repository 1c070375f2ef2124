use serde::Serialize;

use super::format::{format_count, format_ctr, format_position};
use super::types::MetricRow;
use crate::period::PeriodWindow;

/// Search performance reduced over a window.
///
/// `has_data` separates "no rows at all" from "rows with zero clicks";
/// both have `clicks == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricAggregate {
    pub clicks: u64,
    pub impressions: u64,
    /// `clicks / impressions`, 0 without impressions.
    pub ctr: f64,
    /// Impression-weighted mean position, 0 without impressions.
    pub position: f64,
    pub rows: usize,
    pub has_data: bool,
}

/// Display strings for a [`MetricAggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedAggregate {
    pub clicks: String,
    pub impressions: String,
    pub ctr: String,
    pub position: String,
}

impl MetricAggregate {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a MetricRow>) -> Self {
        let mut acc = Accumulator::default();
        for row in rows {
            acc.add(row.clicks, row.impressions, row.position, 1);
        }
        acc.finish()
    }

    /// Aggregate only the rows dated inside `window`.
    pub fn for_window<'a>(
        rows: impl IntoIterator<Item = &'a MetricRow>,
        window: &PeriodWindow,
    ) -> Self {
        Self::from_rows(rows.into_iter().filter(|r| window.contains(r.date)))
    }

    /// Combine aggregates as if their underlying rows had been aggregated
    /// together.
    pub fn merge<'a>(aggregates: impl IntoIterator<Item = &'a MetricAggregate>) -> Self {
        let mut acc = Accumulator::default();
        for agg in aggregates.into_iter().filter(|a| a.has_data) {
            acc.add(agg.clicks, agg.impressions, agg.position, agg.rows);
        }
        acc.finish()
    }

    pub fn formatted(&self) -> FormattedAggregate {
        if !self.has_data {
            return FormattedAggregate {
                clicks: "0".into(),
                impressions: "0".into(),
                ctr: "N/A".into(),
                position: "N/A".into(),
            };
        }
        FormattedAggregate {
            clicks: format_count(self.clicks),
            impressions: format_count(self.impressions),
            ctr: format_ctr(self.ctr),
            position: if self.impressions > 0 {
                format_position(self.position)
            } else {
                "N/A".into()
            },
        }
    }
}

#[derive(Default)]
struct Accumulator {
    clicks: u64,
    impressions: u64,
    weight: f64,
    position: f64,
    rows: usize,
}

impl Accumulator {
    fn add(&mut self, clicks: u64, impressions: u64, position: f64, rows: usize) {
        self.clicks = self.clicks.saturating_add(clicks);
        self.impressions = self.impressions.saturating_add(impressions);
        self.rows += rows;
        if impressions > 0 {
            // Running weighted mean; a lone entry reproduces its position exactly
            let w = impressions as f64;
            self.weight += w;
            self.position += (position - self.position) * (w / self.weight);
        }
    }

    fn finish(self) -> MetricAggregate {
        let ctr = if self.impressions > 0 {
            self.clicks as f64 / self.impressions as f64
        } else {
            0.0
        };
        MetricAggregate {
            clicks: self.clicks,
            impressions: self.impressions,
            ctr,
            position: self.position,
            rows: self.rows,
            has_data: self.rows > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, key: &str, clicks: u64, impressions: u64, position: f64) -> MetricRow {
        MetricRow {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            dimension_key: key.to_string(),
            clicks,
            impressions,
            ctr: if impressions > 0 {
                clicks as f64 / impressions as f64
            } else {
                0.0
            },
            position,
        }
    }

    #[test]
    fn test_single_row_identity() {
        let r = row(1, "/a", 7, 300, 3.7);
        let agg = MetricAggregate::from_rows([&r]);
        assert_eq!(agg.clicks, r.clicks);
        assert_eq!(agg.impressions, r.impressions);
        assert_eq!(agg.ctr, r.ctr);
        assert_eq!(agg.position, r.position);
        assert_eq!(agg.rows, 1);
        assert!(agg.has_data);
    }

    #[test]
    fn test_three_day_sum() {
        let rows = vec![
            row(1, "/a", 10, 100, 2.0),
            row(2, "/a", 20, 200, 2.0),
            row(3, "/a", 30, 300, 2.0),
        ];
        let agg = MetricAggregate::from_rows(&rows);
        assert_eq!(agg.clicks, 60);
        assert_eq!(agg.impressions, 600);
        assert_eq!(agg.formatted().ctr, "10.0%");
    }

    #[test]
    fn test_ctr_is_not_mean_of_row_ctrs() {
        let rows = vec![row(1, "/a", 10, 1000, 1.0), row(2, "/a", 1, 10, 1.0)];
        let agg = MetricAggregate::from_rows(&rows);
        assert_eq!(agg.ctr, 11.0 / 1010.0);
        assert_eq!(agg.formatted().ctr, "1.1%");
    }

    #[test]
    fn test_position_is_impression_weighted() {
        let rows = vec![row(1, "/a", 0, 100, 2.0), row(2, "/a", 0, 300, 4.0)];
        let agg = MetricAggregate::from_rows(&rows);
        assert!((agg.position - 3.5).abs() < 1e-12);
        assert_eq!(agg.formatted().position, "3.5");
    }

    #[test]
    fn test_zero_impression_rows_carry_no_weight() {
        let rows = vec![row(1, "/a", 0, 0, 50.0), row(2, "/a", 1, 10, 4.0)];
        let agg = MetricAggregate::from_rows(&rows);
        assert_eq!(agg.position, 4.0);
        assert_eq!(agg.rows, 2);
    }

    #[test]
    fn test_all_zero_impressions() {
        let rows = vec![row(1, "/a", 0, 0, 5.0)];
        let agg = MetricAggregate::from_rows(&rows);
        assert!(agg.has_data);
        assert_eq!(agg.ctr, 0.0);
        assert_eq!(agg.position, 0.0);
        assert_eq!(agg.formatted().position, "N/A");
    }

    #[test]
    fn test_empty_has_no_data() {
        let agg = MetricAggregate::from_rows(std::iter::empty::<&MetricRow>());
        assert!(!agg.has_data);
        assert_eq!(agg, MetricAggregate::default());
        assert_eq!(agg.formatted().ctr, "N/A");
    }

    #[test]
    fn test_zero_clicks_still_has_data() {
        let agg = MetricAggregate::from_rows([&row(1, "/a", 0, 50, 8.0)]);
        assert_eq!(agg.clicks, 0);
        assert!(agg.has_data);
    }

    #[test]
    fn test_for_window_filters_by_date() {
        let rows = vec![
            row(1, "/a", 1, 10, 1.0),
            row(2, "/a", 2, 10, 1.0),
            row(3, "/a", 4, 10, 1.0),
        ];
        let window = PeriodWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
        )
        .unwrap();
        let agg = MetricAggregate::for_window(&rows, &window);
        assert_eq!(agg.clicks, 6);
        assert_eq!(agg.rows, 2);
    }

    #[test]
    fn test_merge_matches_flat_aggregation() {
        let a = vec![row(1, "/a", 10, 100, 2.0), row(2, "/a", 5, 50, 6.0)];
        let b = vec![row(1, "/b", 1, 300, 9.0)];
        let merged = MetricAggregate::merge(&[
            MetricAggregate::from_rows(&a),
            MetricAggregate::from_rows(&b),
            MetricAggregate::default(),
        ]);
        let flat = MetricAggregate::from_rows(a.iter().chain(b.iter()));
        assert_eq!(merged.clicks, flat.clicks);
        assert_eq!(merged.impressions, flat.impressions);
        assert_eq!(merged.rows, flat.rows);
        assert!((merged.position - flat.position).abs() < 1e-9);
    }
}
