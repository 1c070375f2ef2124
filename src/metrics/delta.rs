use serde::{Serialize, Serializer};

use super::aggregate::MetricAggregate;

/// Relative change between two values, in percent.
///
/// `Undefined` stands for a change from a zero baseline to a non-zero
/// value. It serializes as `null` and is never coerced to 0 or infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PercentChange {
    Value(f64),
    Undefined,
}

impl PercentChange {
    pub fn between(current: f64, baseline: f64) -> Self {
        if baseline == 0.0 {
            if current == 0.0 {
                PercentChange::Value(0.0)
            } else {
                PercentChange::Undefined
            }
        } else {
            PercentChange::Value((current - baseline) / baseline * 100.0)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            PercentChange::Value(v) => Some(v),
            PercentChange::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, PercentChange::Undefined)
    }
}

impl Serialize for PercentChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PercentChange::Value(v) => serializer.serialize_f64(*v),
            PercentChange::Undefined => serializer.serialize_none(),
        }
    }
}

/// Signed absolute change, `current - baseline`. For position a negative
/// value means the page moved up the results.
///
/// CTR and position only exist where there were impressions, so their
/// deltas are `None` unless both sides have some.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricDelta {
    pub clicks: i64,
    pub impressions: i64,
    pub ctr: Option<f64>,
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDeltaPct {
    pub clicks: PercentChange,
    pub impressions: PercentChange,
    pub ctr: PercentChange,
    pub position: PercentChange,
}

/// Absolute and relative change between two aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricChange {
    pub delta: MetricDelta,
    pub delta_pct: MetricDeltaPct,
}

impl MetricChange {
    pub fn between(current: &MetricAggregate, baseline: &MetricAggregate) -> Self {
        let rated = current.impressions > 0 && baseline.impressions > 0;
        let rate_change = |cur: f64, base: f64| {
            if rated {
                PercentChange::between(cur, base)
            } else {
                PercentChange::Undefined
            }
        };
        let delta = MetricDelta {
            clicks: signed_diff(current.clicks, baseline.clicks),
            impressions: signed_diff(current.impressions, baseline.impressions),
            ctr: rated.then(|| current.ctr - baseline.ctr),
            position: rated.then(|| current.position - baseline.position),
        };
        let delta_pct = MetricDeltaPct {
            clicks: PercentChange::between(current.clicks as f64, baseline.clicks as f64),
            impressions: PercentChange::between(
                current.impressions as f64,
                baseline.impressions as f64,
            ),
            ctr: rate_change(current.ctr, baseline.ctr),
            position: rate_change(current.position, baseline.position),
        };
        Self { delta, delta_pct }
    }
}

/// One dimension's current aggregate set against its baseline.
///
/// `dimension_key` is `None` for the site-wide total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub dimension_key: Option<String>,
    pub current: MetricAggregate,
    pub baseline: MetricAggregate,
    pub delta: MetricDelta,
    pub delta_pct: MetricDeltaPct,
}

impl ComparisonResult {
    pub fn new(
        dimension_key: Option<String>,
        current: MetricAggregate,
        baseline: MetricAggregate,
    ) -> Self {
        let MetricChange { delta, delta_pct } = MetricChange::between(&current, &baseline);
        Self {
            dimension_key,
            current,
            baseline,
            delta,
            delta_pct,
        }
    }

    pub fn label(&self) -> &str {
        self.dimension_key.as_deref().unwrap_or("(all)")
    }
}

fn signed_diff(current: u64, baseline: u64) -> i64 {
    if current >= baseline {
        i64::try_from(current - baseline).unwrap_or(i64::MAX)
    } else {
        i64::try_from(baseline - current).map_or(i64::MIN, |d| -d)
    }
}
