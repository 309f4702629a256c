//! APR trend over a lookback window.
//!
//! A trend compares the latest APR of a series with a reference value: the
//! most recent history point captured at or before `now - lookback`. A
//! series without such a point reports a flat trend with zero deltas.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::HistoryPoint;
use crate::error::GatewayError;

/// Absolute deltas below this are reported as [`TrendDirection::Flat`].
pub const FLAT_EPSILON: f64 = 0.0001;

/// Longest accepted lookback, in days (ten years).
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Direction of an APR move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// APR increased.
    Up,
    /// APR decreased.
    Down,
    /// No meaningful change, or no reference point.
    Flat,
}

/// Delta between the latest APR and a reference APR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Trend {
    /// `latest - reference`.
    pub delta_abs: f64,
    /// `delta_abs / reference * 100`, or 0 when the reference is 0.
    pub delta_pct: f64,
    /// Direction of the move.
    pub direction: TrendDirection,
}

impl Trend {
    /// The fallback trend used when no reference exists.
    #[must_use]
    pub const fn flat() -> Self {
        Self {
            delta_abs: 0.0,
            delta_pct: 0.0,
            direction: TrendDirection::Flat,
        }
    }
}

/// Trend of a series over one lookback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrendWindow {
    /// Lookback label as requested (`24h`, `7d`, ...).
    pub lookback: String,
    /// APR of the reference point, if one exists.
    pub reference_apr: Option<f64>,
    /// Capture time of the reference point.
    pub reference_at: Option<DateTime<Utc>>,
    /// Computed deltas.
    #[serde(flatten)]
    pub trend: Trend,
}

/// Latest APR of a series plus its trend over each requested lookback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrendReport {
    /// Canonical asset.
    pub asset: String,
    /// Platform as stored on the newest point.
    pub platform: String,
    /// APR of the newest history point.
    pub latest_apr: f64,
    /// Capture time of the newest history point.
    pub latest_at: DateTime<Utc>,
    /// One entry per lookback, in request order.
    pub windows: Vec<TrendWindow>,
}

/// Computes the trend from `latest` to an optional `reference`.
#[must_use]
pub fn compute_trend(latest: f64, reference: Option<f64>) -> Trend {
    let Some(reference) = reference else {
        return Trend::flat();
    };

    let delta_abs = latest - reference;
    if delta_abs.abs() < FLAT_EPSILON {
        return Trend::flat();
    }

    let delta_pct = if reference == 0.0 {
        0.0
    } else {
        delta_abs / reference * 100.0
    };
    let direction = if delta_abs > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    Trend {
        delta_abs,
        delta_pct,
        direction,
    }
}

/// Picks the reference point from newest-first `points`: the first one
/// captured at or before `now - lookback`.
#[must_use]
pub fn select_reference(
    points: &[HistoryPoint],
    now: DateTime<Utc>,
    lookback: Duration,
) -> Option<&HistoryPoint> {
    let cutoff = now.checked_sub_signed(lookback)?;
    points.iter().find(|p| p.captured_at <= cutoff)
}

/// Parses a lookback such as `30m`, `24h`, `7d` or `2w`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidLookback`] for an empty string, a
/// non-positive amount, an unknown unit, or a span longer than
/// [`MAX_LOOKBACK_DAYS`].
pub fn parse_lookback(raw: &str) -> Result<Duration, GatewayError> {
    let raw = raw.trim();
    let invalid = || GatewayError::InvalidLookback(raw.to_string());

    let (unit_at, _) = raw.char_indices().last().ok_or_else(invalid)?;
    let (amount, unit) = raw.split_at(unit_at);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let duration = match unit {
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    };
    duration
        .filter(|d| *d <= Duration::days(MAX_LOOKBACK_DAYS))
        .ok_or_else(invalid)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::opportunity::fixtures::opportunity;

    fn point_at(apr: f64, at: DateTime<Utc>) -> HistoryPoint {
        HistoryPoint::from_opportunity(&opportunity("OKX", "BTC", apr, at), at)
    }

    #[test]
    fn rising_apr_is_up() {
        let trend = compute_trend(5.0, Some(4.0));
        assert!((trend.delta_abs - 1.0).abs() < 1e-12);
        assert!((trend.delta_pct - 25.0).abs() < 1e-12);
        assert_eq!(trend.direction, TrendDirection::Up);
    }

    #[test]
    fn falling_apr_is_down() {
        let trend = compute_trend(3.0, Some(4.0));
        assert_eq!(trend.direction, TrendDirection::Down);
        assert!((trend.delta_pct + 25.0).abs() < 1e-12);
    }

    #[test]
    fn missing_reference_is_flat() {
        assert_eq!(compute_trend(5.0, None), Trend::flat());
    }

    #[test]
    fn equal_within_epsilon_is_flat() {
        assert_eq!(compute_trend(5.0, Some(5.0)), Trend::flat());
        assert_eq!(compute_trend(5.00005, Some(5.0)), Trend::flat());
    }

    #[test]
    fn zero_reference_has_zero_pct() {
        let trend = compute_trend(2.0, Some(0.0));
        assert_eq!(trend.direction, TrendDirection::Up);
        assert!(trend.delta_pct.abs() < f64::EPSILON);
    }

    #[test]
    fn reference_is_closest_at_or_before_cutoff() {
        let now = Utc::now();
        // Newest first.
        let points = vec![
            point_at(6.0, now - Duration::hours(1)),
            point_at(5.0, now - Duration::hours(23)),
            point_at(4.0, now - Duration::hours(25)),
            point_at(3.0, now - Duration::hours(48)),
        ];

        let Some(reference) = select_reference(&points, now, Duration::hours(24)) else {
            panic!("expected a reference point");
        };
        assert!((reference.apr - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reference_on_exact_cutoff_is_selected() {
        let now = Utc::now();
        let points = vec![point_at(4.0, now - Duration::hours(24))];
        assert!(select_reference(&points, now, Duration::hours(24)).is_some());
    }

    #[test]
    fn no_reference_when_history_is_too_young() {
        let now = Utc::now();
        let points = vec![point_at(4.0, now - Duration::hours(2))];
        assert!(select_reference(&points, now, Duration::days(7)).is_none());
    }

    #[test]
    fn parses_lookbacks() {
        assert_eq!(parse_lookback("24h").ok(), Some(Duration::hours(24)));
        assert_eq!(parse_lookback("7d").ok(), Some(Duration::days(7)));
        assert_eq!(parse_lookback("30m").ok(), Some(Duration::minutes(30)));
        assert_eq!(parse_lookback("2w").ok(), Some(Duration::weeks(2)));
    }

    #[test]
    fn ten_years_is_the_longest_lookback() {
        assert_eq!(parse_lookback("3650d").ok(), Some(Duration::days(MAX_LOOKBACK_DAYS)));
    }

    #[test]
    fn reference_cutoff_before_min_time_selects_nothing() {
        let now = Utc::now();
        let points = vec![point_at(4.0, now - Duration::hours(30))];
        assert!(select_reference(&points, now, Duration::days(100_000_000)).is_none());
    }

    #[test]
    fn rejects_bad_lookbacks() {
        for raw in ["", "h", "0h", "-1d", "5x", "1.5h", "100000000w", "3651d"] {
            assert!(
                matches!(parse_lookback(raw), Err(GatewayError::InvalidLookback(_))),
                "{raw} should be rejected"
            );
        }
    }
}
