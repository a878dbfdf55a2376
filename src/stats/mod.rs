//! Aggregation & Statistics Pipeline
//!
//! Pure functions from raw rows to derived numeric series. Both render converters call
//! into this module for every number they emit, which is what keeps their outputs
//! numerically identical. Nothing here mutates input rows.

pub mod aggregate;
pub mod curves;
pub mod error_bar;
pub mod pivot;
pub mod summary;

use serde_json::Value;

use crate::spec::Row;

pub use aggregate::{aggregate_rows, reduce};
pub use curves::{kaplan_meier, roc_curve, KmCurve, RocCurve};
pub use error_bar::{error_bar_stats, z_for_level, ErrorBarPoint};
pub use pivot::{heatmap_cells, pivot, HeatCell, HeatmapGrid, HeatmapReducer, Pivot};
pub use summary::{
    box_stats, five_number_summary, histogram, histogram_bin_count, histogram_series,
    percentile, BoxStats, FiveNumberSummary, Histogram, HistogramBin, HistogramSeries,
};

/// Key used for missing and null category values
pub const NULL_KEY: &str = "null";

/// Numeric reading of a cell: JSON numbers and numeric strings, finite only
pub fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Numeric value of `field` in `row`
pub fn field_number(row: &Row, field: &str) -> Option<f64> {
    row.get(field).and_then(to_number)
}

/// String form of a cell used for grouping
pub fn category_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NULL_KEY.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Category key of `field` in `row`
pub fn field_key(row: &Row, field: &str) -> String {
    category_key(row.get(field))
}

/// All finite numeric values of `field`, in row order
pub fn numeric_column(rows: &[Row], field: &str) -> Vec<f64> {
    rows.iter().filter_map(|r| field_number(r, field)).collect()
}

/// Distinct category keys of `field` in first-seen order
pub fn distinct_keys(rows: &[Row], field: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .map(|r| field_key(r, field))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Values of `value_field` partitioned by the key of `category_field`, categories in
/// first-seen order
pub fn group_numbers(rows: &[Row], category_field: &str, value_field: &str) -> Vec<(String, Vec<f64>)> {
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for row in rows {
        let Some(v) = field_number(row, value_field) else {
            continue;
        };
        let key = field_key(row, category_field);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(v);
    }
    groups
}

/// Sort ascending with a total order (inputs are finite)
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_number(&json!(null)), None);
        assert_eq!(to_number(&json!(true)), None);
    }

    #[test]
    fn test_category_key() {
        assert_eq!(category_key(Some(&json!("A"))), "A");
        assert_eq!(category_key(Some(&json!(2))), "2");
        assert_eq!(category_key(Some(&json!(1.5))), "1.5");
        assert_eq!(category_key(Some(&json!(null))), NULL_KEY);
        assert_eq!(category_key(None), NULL_KEY);
    }

    #[test]
    fn test_group_numbers_keeps_first_seen_order() {
        let rows = fixtures::rows(json!([
            { "g": "B", "v": 1 }, { "g": "A", "v": 2 }, { "g": "B", "v": "x" }, { "g": "B", "v": 3 }
        ]));
        let groups = group_numbers(&rows, "g", "v");
        assert_eq!(groups, vec![("B".to_string(), vec![1.0, 3.0]), ("A".to_string(), vec![2.0])]);
    }
}
