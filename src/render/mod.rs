//! Render Converters
//!
//! Two stateless compilers from a validated [`ChartSpec`] plus raw rows to the option
//! tree of a rendering backend. Both go through [`chart_data`], which calls the shared
//! statistics pipeline, so the numbers they emit are identical; they differ only in
//! output shape.

pub mod data;
pub mod echarts;
pub mod plotly;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RenderError;
use crate::spec::{AxisSpec, ChartSpec, ChartType, Domain, FieldType, LegendPosition, Reducer, Row, ScaleType, SortOrder};
use crate::stats::aggregate_rows;
use crate::style::ResolvedStyle;

pub use data::{chart_data, ChartData, ScatterPoint, ScatterSeries};

/// Target rendering backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ECharts-style option object
    Echarts,
    /// Plotly-style figure `{data, layout, config}`
    Plotly,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Echarts => "echarts",
            Backend::Plotly => "plotly",
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "echarts" | "a" => Ok(Backend::Echarts),
            "plotly" | "b" => Ok(Backend::Plotly),
            other => Err(format!("unknown backend '{}' (expected echarts or plotly)", other)),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compile `spec` and `rows` for `backend`
pub fn render(spec: &ChartSpec, rows: &[Row], backend: Backend) -> Result<Value, RenderError> {
    let option = match backend {
        Backend::Echarts => echarts::to_echarts(spec, rows)?,
        Backend::Plotly => plotly::to_plotly(spec, rows)?,
    };
    debug!(chart_type = %spec.chart_type, backend = %backend, rows = rows.len(), "Rendered chart");
    Ok(option)
}

// =============================================================================
// Shared preparation
// =============================================================================

/// Check that every field the chart reads exists in `data.columns`
///
/// Histograms never read `y`, and a `count` aggregate does not need the `y` column.
pub fn ensure_fields(spec: &ChartSpec) -> Result<(), RenderError> {
    let count_only = spec.aggregate.as_ref().is_some_and(|a| a.y == Reducer::Count)
        && !spec.chart_type.groups_internally();
    let skip_y = spec.chart_type == ChartType::Histogram || count_only;

    for (channel, field) in spec.encoding.fields() {
        if channel == "y" && skip_y {
            continue;
        }
        if !spec.data.has_column(field) {
            return Err(RenderError::UnknownField {
                channel: channel.to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Apply the generic aggregate block unless the chart type groups rows itself
///
/// Rows are grouped by x, then the color field, then any extra `groupBy` fields, so
/// each (x, series) cell reduces to one value.
pub fn prepare_rows<'a>(spec: &ChartSpec, rows: &'a [Row]) -> Cow<'a, [Row]> {
    let Some(aggregate) = &spec.aggregate else {
        return Cow::Borrowed(rows);
    };
    if spec.chart_type.groups_internally() {
        return Cow::Borrowed(rows);
    }
    Cow::Owned(aggregate_rows(rows, &group_key(spec), &spec.encoding.y.field, aggregate.y))
}

/// Ordered, deduplicated grouping fields for the aggregate block
pub fn group_key(spec: &ChartSpec) -> Vec<String> {
    let mut key: Vec<String> = Vec::new();
    let color = spec.encoding.color_field().map(str::to_string);
    let extra = spec.aggregate.iter().flat_map(|a| a.group_by.iter().cloned());
    for field in std::iter::once(spec.encoding.x.field.clone()).chain(color).chain(extra) {
        if !key.contains(&field) {
            key.push(field);
        }
    }
    key
}

fn compare_keys(a: &str, b: &str, numeric: bool) -> Ordering {
    if numeric {
        if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
            return x.total_cmp(&y);
        }
    }
    a.cmp(b)
}

/// Order the categories of a category axis
///
/// An explicit string domain fixes the order (unlisted categories follow in first-seen
/// order). Otherwise quantitative and temporal fields sort ascending by default. Sorting
/// is numeric when every key parses as a number.
pub fn order_categories(categories: &[String], axis: &AxisSpec) -> Vec<String> {
    let domain = axis.scale.as_ref().and_then(|s| match &s.domain {
        Some(Domain::Categories(d)) => Some(d),
        _ => None,
    });

    let mut ordered: Vec<String> = match domain {
        Some(domain) => domain
            .iter()
            .filter(|d| categories.contains(d))
            .chain(categories.iter().filter(|c| !domain.contains(c)))
            .cloned()
            .collect(),
        None => categories.to_vec(),
    };

    let default_sort = match (domain, axis.field_type) {
        (None, FieldType::Quantitative | FieldType::Temporal) => SortOrder::Ascending,
        _ => SortOrder::None,
    };
    let numeric = ordered.iter().all(|c| c.parse::<f64>().is_ok());
    match axis.sort.unwrap_or(default_sort) {
        SortOrder::None => {}
        SortOrder::Ascending => ordered.sort_by(|a, b| compare_keys(a, b, numeric)),
        SortOrder::Descending => ordered.sort_by(|a, b| compare_keys(b, a, numeric)),
    }
    ordered
}

/// Reorder items keyed by category according to [`order_categories`]
pub fn reorder_by<T>(items: Vec<T>, axis: &AxisSpec, key: impl Fn(&T) -> &str) -> Vec<T> {
    let names: Vec<String> = items.iter().map(|i| key(i).to_string()).collect();
    let order = order_categories(&names, axis);
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|name| {
            let i = names.iter().position(|n| n == name)?;
            slots[i].take()
        })
        .collect()
}

// =============================================================================
// Axis and legend helpers
// =============================================================================

/// How an axis is drawn by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Category,
    Value,
}

/// Numeric bounds for a value axis; string domains are ignored here
pub fn numeric_domain(axis: &AxisSpec, kind: AxisKind) -> Option<[f64; 2]> {
    if kind != AxisKind::Value {
        return None;
    }
    match axis.scale.as_ref()?.domain.as_ref()? {
        Domain::Numeric(bounds) => Some(*bounds),
        Domain::Categories(_) => None,
    }
}

/// Whether a value axis is forced to include zero (`None` leaves the backend default)
pub fn includes_zero(axis: &AxisSpec) -> Option<bool> {
    axis.scale.as_ref().and_then(|s| s.zero)
}

pub fn scale_type(axis: &AxisSpec) -> ScaleType {
    axis.scale
        .as_ref()
        .and_then(|s| s.scale_type)
        .unwrap_or(ScaleType::Linear)
}

pub fn show_grid(axis: &AxisSpec, style: &ResolvedStyle) -> bool {
    axis.grid.unwrap_or(style.show_grid)
}

/// (title size, label size) of an axis
pub fn axis_font_sizes(axis: &AxisSpec, style: &ResolvedStyle) -> (f64, f64) {
    (
        axis.title_font_size.unwrap_or(style.font_size),
        axis.label_font_size.unwrap_or(style.font_size),
    )
}

/// Legend placement; `top` unless the color legend says otherwise
pub fn legend_position(spec: &ChartSpec) -> LegendPosition {
    spec.encoding
        .color
        .as_ref()
        .and_then(|c| c.legend.as_ref())
        .and_then(|l| l.position)
        .unwrap_or(LegendPosition::Top)
}

pub fn legend_title(spec: &ChartSpec) -> Option<String> {
    let color = spec.encoding.color.as_ref()?;
    Some(
        color
            .legend
            .as_ref()
            .and_then(|l| l.title.clone())
            .unwrap_or_else(|| color.field.clone()),
    )
}

/// Display name for a series: its group label, or the y title for a single series
pub fn series_name(spec: &ChartSpec, group: Option<&str>) -> String {
    match group {
        Some(g) if !g.is_empty() => g.to_string(),
        _ => spec.encoding.y.display_title().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{AggregateSpec, ColumnMeta, DataSpec, ScaleSpec};
    use crate::stats::fixtures::rows;
    use serde_json::json;

    fn column(name: &str, field_type: FieldType) -> ColumnMeta {
        ColumnMeta {
            name: name.into(),
            field_type,
            unique_count: 0,
            sample_values: vec![],
            has_null: false,
        }
    }

    fn bar_spec() -> ChartSpec {
        ChartSpec::new(
            ChartType::Bar,
            DataSpec {
                source_id: "s".into(),
                columns: vec![column("g", FieldType::Nominal), column("v", FieldType::Quantitative)],
            },
            AxisSpec::new("g", FieldType::Nominal),
            AxisSpec::new("v", FieldType::Quantitative),
        )
    }

    #[test]
    fn test_unknown_field_is_reported() {
        let mut spec = bar_spec();
        spec.encoding.y.field = "missing".into();
        let err = ensure_fields(&spec).unwrap_err();
        assert_eq!(
            err,
            RenderError::UnknownField {
                channel: "y".into(),
                field: "missing".into()
            }
        );

        spec.chart_type = ChartType::Histogram;
        assert!(ensure_fields(&spec).is_ok());
    }

    #[test]
    fn test_prepare_rows_aggregates_only_when_gated() {
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "A", "v": 3 }, { "g": "B", "v": 5 }]));
        let mut spec = bar_spec();
        assert_eq!(prepare_rows(&spec, &input).len(), 3);

        spec.aggregate = Some(AggregateSpec {
            y: Reducer::Mean,
            group_by: vec![],
        });
        let prepared = prepare_rows(&spec, &input);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0]["v"], json!(2.0));

        spec.chart_type = ChartType::GroupedBar;
        assert_eq!(prepare_rows(&spec, &input).len(), 3);
    }

    #[test]
    fn test_group_key_keeps_x_and_color() {
        let mut spec = bar_spec();
        spec.chart_type = ChartType::Line;
        spec.data.columns.push(column("s", FieldType::Nominal));
        spec.encoding.color = Some(crate::spec::ColorSpec {
            field: "s".into(),
            field_type: FieldType::Nominal,
            scheme: None,
            range: None,
            legend: None,
        });
        spec.aggregate = Some(AggregateSpec {
            y: Reducer::Sum,
            group_by: vec!["s".into(), "region".into()],
        });
        assert_eq!(group_key(&spec), vec!["g", "s", "region"]);

        let input = rows(json!([
            { "g": "Jan", "s": "east", "v": 1 },
            { "g": "Jan", "s": "west", "v": 10 },
            { "g": "Jan", "s": "west", "v": 5 },
            { "g": "Feb", "s": "east", "v": 2 }
        ]));
        spec.aggregate.as_mut().unwrap().group_by.clear();
        let prepared = prepare_rows(&spec, &input);
        assert_eq!(prepared.len(), 3);
        assert_eq!(prepared[1]["s"], json!("west"));
        assert_eq!(prepared[1]["v"], json!(15.0));
    }

    #[test]
    fn test_order_categories() {
        let cases = [
            (FieldType::Nominal, None, vec!["b", "a", "c"]),
            (FieldType::Nominal, Some(SortOrder::Ascending), vec!["a", "b", "c"]),
            (FieldType::Nominal, Some(SortOrder::Descending), vec!["c", "b", "a"]),
            (FieldType::Temporal, None, vec!["a", "b", "c"]),
        ];
        let cats: Vec<String> = ["b", "a", "c"].iter().map(|s| s.to_string()).collect();
        for (field_type, sort, expected) in cases {
            let mut axis = AxisSpec::new("x", field_type);
            axis.sort = sort;
            assert_eq!(order_categories(&cats, &axis), expected, "{:?} {:?}", field_type, sort);
        }
    }

    #[test]
    fn test_numeric_keys_sort_numerically() {
        let axis = AxisSpec::new("x", FieldType::Quantitative);
        let cats: Vec<String> = ["10", "9", "100"].iter().map(|s| s.to_string()).collect();
        assert_eq!(order_categories(&cats, &axis), vec!["9", "10", "100"]);
    }

    #[test]
    fn test_domain_order_and_clamping() {
        let mut axis = AxisSpec::new("x", FieldType::Nominal);
        axis.scale = Some(ScaleSpec {
            scale_type: None,
            domain: Some(Domain::Categories(vec!["c".into(), "zz".into(), "a".into()])),
            zero: None,
        });
        let cats: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(order_categories(&cats, &axis), vec!["c", "a", "b"]);
        // String domains never clamp a value axis
        assert_eq!(numeric_domain(&axis, AxisKind::Value), None);

        axis.scale.as_mut().unwrap().domain = Some(Domain::Numeric([0.0, 10.0]));
        assert_eq!(numeric_domain(&axis, AxisKind::Value), Some([0.0, 10.0]));
        assert_eq!(numeric_domain(&axis, AxisKind::Category), None);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("ECharts".parse::<Backend>(), Ok(Backend::Echarts));
        assert_eq!("plotly".parse::<Backend>(), Ok(Backend::Plotly));
        assert!("vega".parse::<Backend>().is_err());
    }
}
