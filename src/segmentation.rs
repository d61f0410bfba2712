//! Tertile auto-segmentation
//!
//! Partitions a result set into low/medium/high buckets using the 33rd and
//! 66th percentiles of the first numeric column. Returns `None` when there
//! is nothing to segment (empty result set, no numeric column); that is a
//! signal, not an error.

use crate::executor::ResultRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentBuckets {
    pub low: Vec<ResultRow>,
    pub medium: Vec<ResultRow>,
    pub high: Vec<ResultRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segmentation {
    pub segmentation_column: String,
    pub segments: SegmentBuckets,
}

/// Segment rows by the first numeric column of the first row.
///
/// Thresholds are inclusive: value <= p33 -> low, <= p66 -> medium, else
/// high. Row order is preserved within each bucket, and the three buckets
/// together are a permutation of the input.
pub fn segment(results: &[ResultRow]) -> Option<Segmentation> {
    let first = results.first()?;

    // First field whose value is numeric (not bool, not null), in stored
    // field order.
    let column = first
        .iter()
        .find(|(_, v)| v.is_number())
        .map(|(k, _)| k.clone())?;

    // Rows whose value is missing or non-numeric past the first row have no
    // rank: they go straight to `low` and stay out of the percentile sample,
    // so a NULL can never poison the interpolation with a non-finite value.
    let values: Vec<Option<f64>> = results
        .iter()
        .map(|row| row.get(&column).and_then(Value::as_f64))
        .collect();

    let sample: Vec<f64> = values.iter().flatten().copied().collect();

    let mut segments = SegmentBuckets::default();
    if sample.is_empty() {
        segments.low = results.to_vec();
        return Some(Segmentation {
            segmentation_column: column,
            segments,
        });
    }

    let p33 = percentile(&sample, 33.0);
    let p66 = percentile(&sample, 66.0);

    for (row, value) in results.iter().zip(&values) {
        match value {
            Some(v) if *v > p66 => segments.high.push(row.clone()),
            Some(v) if *v > p33 => segments.medium.push(row.clone()),
            _ => segments.low.push(row.clone()),
        }
    }

    info!(
        "Segmented {} rows on '{}': low={}, medium={}, high={}",
        results.len(),
        column,
        segments.low.len(),
        segments.medium.len(),
        segments.high.len()
    );

    Some(Segmentation {
        segmentation_column: column,
        segments,
    })
}

/// Percentile by linear interpolation between closest ranks: for p over n
/// sorted values the rank is p/100 * (n-1), interpolating between the two
/// bracketing values. Callers must pass a non-empty, finite sample.
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let rank = p / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }

    let weight = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> ResultRow {
        let mut map = ResultRow::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        map
    }

    fn numeric_rows(values: &[i64]) -> Vec<ResultRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| row(&[("score", json!(v)), ("id", json!(i))]))
            .collect()
    }

    #[test]
    fn empty_result_set_yields_none() {
        assert!(segment(&[]).is_none());
    }

    #[test]
    fn no_numeric_column_yields_none() {
        let rows = vec![row(&[
            ("name", json!("alice")),
            ("active", json!(true)),
            ("note", Value::Null),
        ])];
        assert!(segment(&rows).is_none());
    }

    #[test]
    fn bool_and_null_are_not_numeric() {
        let rows = vec![row(&[("flag", json!(false)), ("age", json!(30))])];
        let seg = segment(&rows).unwrap();
        assert_eq!(seg.segmentation_column, "age");
    }

    #[test]
    fn first_numeric_column_wins() {
        let rows = vec![row(&[
            ("name", json!("a")),
            ("age", json!(41)),
            ("balance", json!(10.0)),
        ])];
        let seg = segment(&rows).unwrap();
        assert_eq!(seg.segmentation_column, "age");
    }

    #[test]
    fn single_row_lands_in_low() {
        let rows = vec![row(&[("value", json!(42))])];
        let seg = segment(&rows).unwrap();
        assert_eq!(seg.segments.low.len(), 1);
        assert!(seg.segments.medium.is_empty());
        assert!(seg.segments.high.is_empty());
    }

    #[test]
    fn all_equal_values_land_in_low() {
        let rows = numeric_rows(&[7, 7, 7, 7, 7]);
        let seg = segment(&rows).unwrap();
        assert_eq!(seg.segments.low.len(), 5);
        assert!(seg.segments.medium.is_empty());
        assert!(seg.segments.high.is_empty());
    }

    #[test]
    fn null_values_land_in_low_and_stay_out_of_the_sample() {
        // Thresholds must come from the finite values [1, 2] only, so
        // p33 = 1.33 and p66 = 1.66: the NULL row and value 1 go to low,
        // value 2 goes to high.
        let rows = vec![
            row(&[("score", json!(1.0)), ("id", json!(0))]),
            row(&[("score", json!(2.0)), ("id", json!(1))]),
            row(&[("score", Value::Null), ("id", json!(2))]),
        ];
        let seg = segment(&rows).unwrap();

        let low_ids: Vec<i64> = seg
            .segments
            .low
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(low_ids, vec![0, 2]);
        assert!(seg.segments.medium.is_empty());
        assert_eq!(seg.segments.high.len(), 1);

        let total = seg.segments.low.len() + seg.segments.medium.len() + seg.segments.high.len();
        assert_eq!(total, rows.len());
    }

    #[test]
    fn many_nulls_do_not_degenerate_the_buckets() {
        let rows = vec![
            row(&[("score", json!(10))]),
            row(&[("score", Value::Null)]),
            row(&[("score", Value::Null)]),
            row(&[("score", json!(20))]),
            row(&[("score", json!(30))]),
        ];
        let seg = segment(&rows).unwrap();

        // Finite sample [10, 20, 30]: one finite value per bucket, both
        // NULL rows join low.
        assert_eq!(seg.segments.low.len(), 3);
        assert_eq!(seg.segments.medium.len(), 1);
        assert_eq!(seg.segments.high.len(), 1);
    }

    #[test]
    fn buckets_are_a_permutation_of_the_input() {
        let values: Vec<i64> = vec![5, 1, 9, 3, 3, 8, 2, 7, 4, 6];
        let rows = numeric_rows(&values);
        let seg = segment(&rows).unwrap();

        let total = seg.segments.low.len() + seg.segments.medium.len() + seg.segments.high.len();
        assert_eq!(total, rows.len());

        // Every input id appears exactly once across the three buckets.
        let mut ids: Vec<i64> = seg
            .segments
            .low
            .iter()
            .chain(&seg.segments.medium)
            .chain(&seg.segments.high)
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        let expected: Vec<i64> = (0..values.len() as i64).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn one_to_ninety_nine_splits_in_thirds() {
        let values: Vec<i64> = (1..=99).collect();
        let rows = numeric_rows(&values);
        let seg = segment(&rows).unwrap();

        // p33 ~= 33.34, p66 ~= 65.68 over 1..=99, so the split is ~33/33/33.
        let low = seg.segments.low.len() as i64;
        let medium = seg.segments.medium.len() as i64;
        let high = seg.segments.high.len() as i64;
        assert!((low - 33).abs() <= 1, "low = {}", low);
        assert!((medium - 33).abs() <= 1, "medium = {}", medium);
        assert!((high - 33).abs() <= 1, "high = {}", high);
    }

    #[test]
    fn row_order_preserved_within_buckets() {
        let rows = numeric_rows(&[9, 1, 8, 2, 7, 3]);
        let seg = segment(&rows).unwrap();
        for bucket in [&seg.segments.low, &seg.segments.medium, &seg.segments.high] {
            let ids: Vec<i64> = bucket.iter().map(|r| r["id"].as_i64().unwrap()).collect();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            assert_eq!(ids, sorted);
        }
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        // rank for p50 over 4 values is 1.5 -> halfway between 2 and 3
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
    }
}
