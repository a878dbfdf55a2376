//! Group-by aggregation

use std::collections::HashMap;

use serde_json::{json, Value};

use super::{field_key, field_number, percentile, sorted};
use crate::spec::{Reducer, Row};

/// Reduce the numeric values of one group
///
/// `row_count` is the number of rows in the group, used by `count` regardless of
/// whether the value field was numeric. Returns `None` for empty mean/median/min/max.
pub fn reduce(reducer: Reducer, values: &[f64], row_count: usize) -> Option<f64> {
    match reducer {
        Reducer::Count => Some(row_count as f64),
        Reducer::Sum => Some(values.iter().sum()),
        Reducer::Mean => {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Reducer::Median => percentile(&sorted(values), 0.5),
        // Linear scans; no recursion or argument spreading over the group.
        Reducer::Min => values.iter().copied().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.min(v)))
        }),
        Reducer::Max => values.iter().copied().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        }),
    }
}

struct Group<'a> {
    first: &'a Row,
    values: Vec<f64>,
    rows: usize,
}

/// Group rows by the string form of `group_by` and reduce `value_field`
///
/// One output row per group, in first-seen order, carrying the group fields from the
/// group's first row and the reduced value (`null` when nothing was numeric).
pub fn aggregate_rows(rows: &[Row], group_by: &[String], value_field: &str, reducer: Reducer) -> Vec<Row> {
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();

    for row in rows {
        let key: Vec<String> = group_by.iter().map(|f| field_key(row, f)).collect();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                first: row,
                values: Vec::new(),
                rows: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.rows += 1;
        if let Some(v) = field_number(row, value_field) {
            group.values.push(v);
        }
    }

    groups
        .into_iter()
        .map(|group| {
            let mut out = Row::new();
            for field in group_by {
                out.insert(field.clone(), group.first.get(field).cloned().unwrap_or(Value::Null));
            }
            let reduced = reduce(reducer, &group.values, group.rows);
            out.insert(value_field.to_string(), reduced.map_or(Value::Null, |v| json!(v)));
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::fixtures::rows;

    #[test]
    fn test_mean_by_group() {
        let input = rows(json!([
            { "g": "A", "v": 1 }, { "g": "A", "v": 3 }, { "g": "B", "v": 5 }
        ]));
        let out = aggregate_rows(&input, &["g".to_string()], "v", Reducer::Mean);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["g"], "A");
        assert_eq!(out[0]["v"], 2.0);
        assert_eq!(out[1]["g"], "B");
        assert_eq!(out[1]["v"], 5.0);
    }

    #[test]
    fn test_mean_ignores_non_numeric() {
        let input = rows(json!([
            { "g": "A", "v": 4 }, { "g": "A", "v": "n/a" }, { "g": "A", "v": null }
        ]));
        let out = aggregate_rows(&input, &["g".to_string()], "v", Reducer::Mean);
        assert_eq!(out[0]["v"], 4.0);
    }

    #[test]
    fn test_count_counts_rows() {
        let input = rows(json!([
            { "g": "A", "v": 4 }, { "g": "A" }, { "g": "A", "v": "n/a" }
        ]));
        let out = aggregate_rows(&input, &["g".to_string()], "v", Reducer::Count);
        assert_eq!(out[0]["v"], 3.0);
    }

    #[test]
    fn test_empty_groups() {
        let input = rows(json!([{ "g": "A", "v": "x" }]));
        let out = aggregate_rows(&input, &["g".to_string()], "v", Reducer::Max);
        assert_eq!(out[0]["v"], Value::Null);
        let out = aggregate_rows(&input, &["g".to_string()], "v", Reducer::Sum);
        assert_eq!(out[0]["v"], 0.0);
    }

    #[test]
    fn test_min_max_large_group() {
        let values: Vec<f64> = (0..500_000).map(|i| i as f64).collect();
        assert_eq!(reduce(Reducer::Min, &values, values.len()), Some(0.0));
        assert_eq!(reduce(Reducer::Max, &values, values.len()), Some(499_999.0));
    }

    #[test]
    fn test_median_and_multi_key() {
        let input = rows(json!([
            { "a": 1, "b": "x", "v": 1 }, { "a": 1, "b": "x", "v": 9 }, { "a": 1, "b": "x", "v": 4 },
            { "a": 1, "b": "y", "v": 2 }
        ]));
        let out = aggregate_rows(&input, &["a".to_string(), "b".to_string()], "v", Reducer::Median);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["a"], 1);
        assert_eq!(out[0]["v"], 4.0);
        assert_eq!(out[1]["v"], 2.0);
    }
}
