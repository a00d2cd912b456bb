//! Reference scoring primitives
//!
//! Building blocks for score functions and preferrers. The engine itself
//! never calls these; hosts register them as helpers or call them directly
//! from score blocks. The count and recency curves share a decay base so a
//! tenth observation and a ten-week-old observation move confidence at
//! comparable rates.

use chrono::{DateTime, Utc};

use crate::value::Value;

/// Decay base shared by the count and recency curves.
pub const DECAY_BASE: f64 = 0.95;

/// Floor returned when an input falls outside a curve's domain.
const OUT_OF_DOMAIN: f64 = 0.0001;

/// Per-factor floor so a single zero cannot collapse a product.
const PRODUCT_FLOOR: f64 = 0.001;

/// Default half-width used by [`rangify`].
const RANGE_MARGIN: f64 = 1e-5;

/// Confidence from an observation count: `1 - k^sqrt(n)`.
///
/// Grows with diminishing returns; counts below 1 fall back to the domain
/// floor.
pub fn score_for_count(n: f64) -> f64 {
    score_for_count_with(n, DECAY_BASE)
}

pub fn score_for_count_with(n: f64, k: f64) -> f64 {
    if n >= 1.0 {
        1.0 - k.powf(n.sqrt())
    } else {
        OUT_OF_DOMAIN
    }
}

/// Confidence from staleness measured in weeks: `k^sqrt(max(0, r - 4))`.
///
/// Flat for the first four weeks, then decays. Negative recency falls back
/// to the domain floor.
pub fn score_for_recency(r: f64) -> f64 {
    score_for_recency_with(r, DECAY_BASE)
}

pub fn score_for_recency_with(r: f64, k: f64) -> f64 {
    if r >= 0.0 {
        k.powf((r - 4.0).max(0.0).sqrt())
    } else {
        OUT_OF_DOMAIN
    }
}

/// Whole weeks elapsed between `t` and `now`, as a real number.
pub fn recency_between(t: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - t).num_days();
    (days as f64 / 7.0).floor()
}

/// Whole weeks elapsed since `t`.
pub fn recency_of(t: DateTime<Utc>) -> f64 {
    recency_between(t, Utc::now())
}

/// Geometric mean with a per-factor floor of 0.001. Empty input yields 0.
pub fn geometric_mean_of(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let product: f64 = xs.iter().map(|x| x.max(PRODUCT_FLOOR)).product();
    product.powf(1.0 / xs.len() as f64)
}

/// Widen a point value into an inclusive `[v - m, v + m]` interval so
/// nearly-equal measurements group together. Lists map pointwise;
/// non-numeric scalars pass through unchanged.
pub fn rangify(value: &Value) -> Value {
    rangify_with(value, RANGE_MARGIN)
}

pub fn rangify_with(value: &Value, margin: f64) -> Value {
    match value {
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| rangify_with(item, margin))
                .collect(),
        ),
        other => match other.as_f64() {
            Some(v) => Value::List(vec![Value::Float(v - margin), Value::Float(v + margin)]),
            None => other.clone(),
        },
    }
}

/// Pick the raw text closest to the canonical key by normalized Levenshtein
/// similarity. Ties break to the first raw; when no raw is textual the
/// canonical key itself is returned.
pub fn closest_by_edit_distance(key: &Value, raws: &[Value]) -> Value {
    let target = match key {
        Value::Text(s) => s.as_str(),
        _ => return key.clone(),
    };
    let mut best: Option<(&Value, f64)> = None;
    for raw in raws {
        let Value::Text(text) = raw else { continue };
        let similarity = strsim::normalized_levenshtein(target, text);
        let replace = match best {
            None => true,
            Some((_, top)) => similarity > top,
        };
        if replace {
            best = Some((raw, similarity));
        }
    }
    best.map(|(raw, _)| raw.clone())
        .unwrap_or_else(|| key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn count_curve_grows_with_diminishing_returns() {
        assert!(close(score_for_count(1.0), 0.05));
        assert!(close(score_for_count(2.0), 1.0 - 0.95_f64.powf(2.0_f64.sqrt())));
        assert!(score_for_count(2.0) > score_for_count(1.0));
        assert!(
            score_for_count(2.0) - score_for_count(1.0)
                > score_for_count(100.0) - score_for_count(99.0)
        );
        assert!(close(score_for_count(0.0), 0.0001));
    }

    #[test]
    fn recency_curve_is_flat_for_a_month() {
        assert!(close(score_for_recency(0.0), 1.0));
        assert!(close(score_for_recency(4.0), 1.0));
        assert!(close(score_for_recency(8.0), 0.95_f64.powf(2.0)));
        assert!(close(score_for_recency(-1.0), 0.0001));
    }

    #[test]
    fn recency_counts_whole_weeks() {
        let listed = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 18, 12, 0, 0).unwrap();
        assert!(close(recency_between(listed, now), 2.0));
    }

    #[test]
    fn geometric_mean_floors_factors() {
        assert!(close(geometric_mean_of(&[0.5, 0.5]), 0.5));
        // A zero factor is floored, not collapsing the product to zero.
        assert!(geometric_mean_of(&[0.0, 1.0]) > 0.0);
        assert!(close(geometric_mean_of(&[]), 0.0));
    }

    #[test]
    fn rangify_widens_points_and_maps_lists() {
        let point = rangify(&Value::Float(2.5));
        assert_eq!(
            point,
            Value::List(vec![Value::Float(2.5 - 1e-5), Value::Float(2.5 + 1e-5)])
        );
        let list = rangify(&Value::List(vec![Value::Int(1), Value::Text("x".into())]));
        match list {
            Value::List(items) => {
                assert!(matches!(items[0], Value::List(_)));
                assert_eq!(items[1], Value::Text("x".into()));
            }
            other => panic!("expected list, got {other}"),
        }
    }

    #[test]
    fn closest_by_edit_distance_prefers_nearest_raw() {
        let key = Value::from("5551112222");
        let raws = vec![
            Value::from("555.111.2222"),
            Value::from("(555) 111-2222"),
            Value::from("555-111-2222"),
        ];
        assert_eq!(closest_by_edit_distance(&key, &raws), raws[0]);
    }
}
