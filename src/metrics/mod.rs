pub mod aggregate;
pub mod delta;
pub mod format;
pub mod summary;
pub mod types;

pub use aggregate::{FormattedAggregate, MetricAggregate};
pub use delta::{ComparisonResult, MetricChange, MetricDelta, MetricDeltaPct, PercentChange};
pub use summary::{summarize, top_n_by, Metric, MetricSummary, PeriodSummary};
pub use types::{Dimension, GroupBy, MetricRow, RawMetricRow};
