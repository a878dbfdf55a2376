//! Column-type inference and default spec bootstrap
//!
//! Heuristics run once at import time; the resulting [`ColumnMeta`] list is frozen into
//! the spec's data block.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::spec::{AxisSpec, ChartSpec, ChartType, ColumnMeta, DataSpec, FieldType, Row};
use crate::stats::{category_key, to_number};

/// Rows inspected per column by default
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

const TYPE_THRESHOLD: f64 = 0.8;
const ORDINAL_MIN_VALUES: usize = 20;
const ORDINAL_MAX_UNIQUE_RATIO: f64 = 0.5;
const SAMPLE_VALUES: usize = 5;

/// Whether `s` parses as a date or timestamp
pub fn is_date_like(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(s, "%Y/%m/%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}

fn classify(values: &[&Value], unique: usize) -> FieldType {
    let n = values.len();
    if n == 0 {
        return FieldType::Nominal;
    }
    let share = |count: usize| count as f64 / n as f64;

    let numeric = values.iter().filter(|v| to_number(v).is_some()).count();
    if share(numeric) > TYPE_THRESHOLD {
        return FieldType::Quantitative;
    }
    let dates = values
        .iter()
        .filter(|v| v.as_str().is_some_and(is_date_like))
        .count();
    if share(dates) > TYPE_THRESHOLD {
        return FieldType::Temporal;
    }
    if n > ORDINAL_MIN_VALUES && share(unique) < ORDINAL_MAX_UNIQUE_RATIO {
        return FieldType::Ordinal;
    }
    FieldType::Nominal
}

/// Infer column metadata from the first `sample_size` rows
pub fn infer_columns(rows: &[Row], sample_size: usize) -> Vec<ColumnMeta> {
    let sample = &rows[..rows.len().min(sample_size)];

    let mut names: Vec<String> = Vec::new();
    for row in sample {
        for key in row.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns: Vec<ColumnMeta> = names
        .into_iter()
        .map(|name| {
            let mut has_null = false;
            let mut present: Vec<&Value> = Vec::new();
            for row in sample {
                match row.get(&name) {
                    None | Some(Value::Null) => has_null = true,
                    Some(v) => present.push(v),
                }
            }

            let mut seen = HashSet::new();
            let mut sample_values = Vec::new();
            for v in &present {
                if seen.insert(category_key(Some(*v))) && sample_values.len() < SAMPLE_VALUES {
                    sample_values.push((*v).clone());
                }
            }

            ColumnMeta {
                field_type: classify(&present, seen.len()),
                unique_count: seen.len() as u64,
                sample_values,
                has_null,
                name,
            }
        })
        .collect();

    debug!(columns = columns.len(), rows = sample.len(), "Inferred column types");
    columns
}

fn first_of<'a>(columns: &'a [ColumnMeta], pred: impl Fn(&ColumnMeta) -> bool) -> Option<&'a ColumnMeta> {
    columns.iter().find(|c| pred(c))
}

/// (chart type, x column, y column) for a set of columns
fn suggestion(columns: &[ColumnMeta]) -> Option<(ChartType, &ColumnMeta, &ColumnMeta)> {
    let quantitative: Vec<&ColumnMeta> = columns
        .iter()
        .filter(|c| c.field_type == FieldType::Quantitative)
        .collect();
    let temporal = first_of(columns, |c| c.field_type == FieldType::Temporal);
    let categorical: Vec<&ColumnMeta> = columns.iter().filter(|c| c.field_type.is_categorical()).collect();

    if let (Some(t), Some(q)) = (temporal, quantitative.first().copied()) {
        return Some((ChartType::Line, t, q));
    }
    if let (Some(c), Some(q)) = (categorical.first().copied(), quantitative.first().copied()) {
        return Some((ChartType::Bar, c, q));
    }
    if quantitative.len() >= 2 {
        return Some((ChartType::Scatter, quantitative[0], quantitative[1]));
    }
    if let Some(q) = quantitative.first().copied() {
        return Some((ChartType::Histogram, q, q));
    }
    if categorical.len() >= 2 {
        return Some((ChartType::Heatmap, categorical[0], categorical[1]));
    }
    let first = columns.first()?;
    let second = columns.get(1).unwrap_or(first);
    Some((ChartType::Bar, first, second))
}

/// Chart type that best fits the column types
pub fn suggest_chart_type(columns: &[ColumnMeta]) -> ChartType {
    suggestion(columns)
        .map(|(chart_type, _, _)| chart_type)
        .unwrap_or(ChartType::Bar)
}

/// A renderable starting spec for `columns`; `None` when there are no columns
pub fn default_spec(source_id: &str, columns: Vec<ColumnMeta>) -> Option<ChartSpec> {
    let (chart_type, x, y) = suggestion(&columns)?;
    let x = AxisSpec::new(x.name.clone(), x.field_type);
    let mut y = AxisSpec::new(y.name.clone(), y.field_type);
    if chart_type == ChartType::Histogram {
        y.title = Some("Count".to_string());
    }
    Some(ChartSpec::new(
        chart_type,
        DataSpec {
            source_id: source_id.to_string(),
            columns,
        },
        x,
        y,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_spec;
    use crate::stats::fixtures::rows;
    use serde_json::json;

    #[test]
    fn test_date_detection() {
        let cases = [
            ("2024-01-31", true),
            ("2024/01/31", true),
            ("2024-01-31T10:00:00Z", true),
            ("2024-01-31 10:00:00", true),
            ("January", false),
            ("", false),
        ];
        for (input, expected) in cases {
            assert_eq!(is_date_like(input), expected, "{:?}", input);
        }
    }

    #[test]
    fn test_infer_basic_types() {
        let input = rows(json!([
            { "day": "2024-01-01", "group": "A", "value": 1 },
            { "day": "2024-01-02", "group": "B", "value": "2.5" },
            { "day": "2024-01-03", "group": null, "value": 3 }
        ]));
        let columns = infer_columns(&input, DEFAULT_SAMPLE_SIZE);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["day", "group", "value"]);
        assert_eq!(columns[0].field_type, FieldType::Temporal);
        assert_eq!(columns[1].field_type, FieldType::Nominal);
        assert!(columns[1].has_null);
        assert_eq!(columns[1].unique_count, 2);
        assert_eq!(columns[2].field_type, FieldType::Quantitative);
        assert!(!columns[2].has_null);
    }

    #[test]
    fn test_low_cardinality_is_ordinal() {
        let data: Vec<Value> = (0..30)
            .map(|i| {
                let size = ["S", "M", "L"][i % 3];
                json!({ "size": size })
            })
            .collect();
        let columns = infer_columns(&rows(Value::Array(data)), DEFAULT_SAMPLE_SIZE);
        assert_eq!(columns[0].field_type, FieldType::Ordinal);
        assert_eq!(columns[0].sample_values.len(), 3);
    }

    #[test]
    fn test_suggestions() {
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "B", "v": 2 }]));
        let columns = infer_columns(&input, DEFAULT_SAMPLE_SIZE);
        assert_eq!(suggest_chart_type(&columns), ChartType::Bar);

        let numeric = infer_columns(&rows(json!([{ "a": 1, "b": 2 }])), DEFAULT_SAMPLE_SIZE);
        assert_eq!(suggest_chart_type(&numeric), ChartType::Scatter);
        assert_eq!(suggest_chart_type(&[]), ChartType::Bar);
    }

    #[test]
    fn test_default_spec_validates() {
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "B", "v": 2 }]));
        let spec = default_spec("upload-1", infer_columns(&input, DEFAULT_SAMPLE_SIZE)).unwrap();
        assert_eq!(spec.encoding.x.field, "g");
        assert_eq!(spec.encoding.y.field, "v");
        assert!(validate_spec(&spec.to_value()).is_ok());
        assert!(default_spec("empty", vec![]).is_none());
    }
}
