//! Display formatting for metrics.
//!
//! Every displayed number goes through [`round_1dp`]: one decimal place,
//! ties rounded half away from zero (`5.25` becomes `5.3`, `-5.25` becomes
//! `-5.3`). Values are rounded only here; aggregates and deltas keep full
//! precision.

use super::delta::PercentChange;

/// Round to one decimal place, ties away from zero.
pub fn round_1dp(value: f64) -> f64 {
    let scaled = value * 10.0;
    // Snap away binary noise so 52.4999999999 still counts as a tie
    let snapped = (scaled * 1e6).round() / 1e6;
    let rounded = snapped.round() / 10.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A CTR fraction as a percentage: `0.0523` is `"5.2%"`.
pub fn format_ctr(ctr: f64) -> String {
    format!("{:.1}%", round_1dp(ctr * 100.0))
}

pub fn format_position(position: f64) -> String {
    format!("{:.1}", round_1dp(position))
}

/// An integer count with thousands separators.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// A signed count delta: `+20`, `-1,234`, `0`.
pub fn format_signed_count(n: i64) -> String {
    let magnitude = format_count(n.unsigned_abs());
    match n.signum() {
        1 => format!("+{magnitude}"),
        -1 => format!("-{magnitude}"),
        _ => magnitude,
    }
}

/// A signed one-decimal delta: `+1.5`, `-0.3`, `0.0`.
pub fn format_signed(value: f64) -> String {
    let rounded = round_1dp(value);
    if rounded > 0.0 {
        format!("+{rounded:.1}")
    } else {
        format!("{rounded:.1}")
    }
}

/// A CTR fraction delta in percentage points: `0.012` is `"+1.2 pp"`.
pub fn format_ctr_delta(delta: f64) -> String {
    format!("{} pp", format_signed(delta * 100.0))
}

/// `"+50.0%"`, `"-12.5%"`, or `"N/A"` when the baseline was zero.
pub fn format_percent_change(change: PercentChange) -> String {
    match change {
        PercentChange::Value(v) => format!("{}%", format_signed(v)),
        PercentChange::Undefined => "N/A".to_string(),
    }
}
