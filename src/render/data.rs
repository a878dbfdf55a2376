//! Backend-neutral chart content
//!
//! [`chart_data`] turns a spec and raw rows into the numbers a chart shows. Every
//! converter starts here, so they cannot disagree about a value.

use serde::Serialize;

use super::{order_categories, prepare_rows, reorder_by};
use crate::spec::{ChartSpec, ChartType, ErrorBarType, FieldType, Row};
use crate::stats::{
    box_stats, error_bar_stats, field_key, field_number, heatmap_cells, histogram_series, kaplan_meier,
    pivot, roc_curve, BoxStats, ErrorBarPoint, HeatCell, HeatmapGrid, HeatmapReducer, HistogramSeries,
    KmCurve, Pivot, RocCurve,
};

/// Marker sizes in pixels for the size channel
const MIN_MARKER: f64 = 6.0;
const MAX_MARKER: f64 = 30.0;
const FIXED_MARKER: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    /// Marker size in pixels when a size channel is encoded
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSeries {
    pub group: Option<String>,
    pub points: Vec<ScatterPoint>,
}

/// Numeric content of one chart, by family
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ChartData {
    /// bar, grouped-bar, stacked-bar and line
    Categorical(Pivot),
    Scatter(Vec<ScatterSeries>),
    /// boxplot and violin
    Boxes(Vec<BoxStats>),
    Histogram(Vec<HistogramSeries>),
    ErrorBars(Vec<ErrorBarPoint>),
    Heatmap(HeatmapGrid),
    Survival(Vec<KmCurve>),
    Roc(Vec<RocCurve>),
}

/// Compute the chart content for `spec` over `rows`
///
/// Field existence is checked by the converters beforehand.
pub fn chart_data(spec: &ChartSpec, rows: &[Row]) -> ChartData {
    let rows = prepare_rows(spec, rows);
    let rows = rows.as_ref();
    let enc = &spec.encoding;
    let x = enc.x.field.as_str();
    let y = enc.y.field.as_str();
    let color = enc.color_field();

    match spec.chart_type {
        ChartType::Bar | ChartType::GroupedBar | ChartType::StackedBar | ChartType::Line => {
            let mut p = pivot(rows, x, color, y);
            let order = order_categories(&p.categories, &enc.x);
            p.reorder_categories(&order);
            ChartData::Categorical(p)
        }
        ChartType::Scatter => ChartData::Scatter(scatter_series(
            rows,
            x,
            y,
            color,
            enc.size.as_ref().map(|s| s.field.as_str()),
        )),
        // Violin shares the boxplot statistics
        ChartType::Boxplot | ChartType::Violin => {
            let stats = box_stats(rows, x, y);
            ChartData::Boxes(reorder_by(stats, &enc.x, |b| b.category.as_str()))
        }
        ChartType::Histogram => ChartData::Histogram(histogram_series(rows, x, color)),
        ChartType::ErrorBar => {
            let (bar_type, level) = spec
                .error_bar
                .as_ref()
                .map(|e| (e.bar_type, e.value))
                .unwrap_or((ErrorBarType::Ci, None));
            let points = error_bar_stats(rows, x, y, bar_type, level);
            ChartData::ErrorBars(reorder_by(points, &enc.x, |p| p.category.as_str()))
        }
        ChartType::Heatmap => {
            let value_field = enc
                .color
                .as_ref()
                .filter(|c| c.field_type == FieldType::Quantitative)
                .map(|c| c.field.as_str());
            let reducer = HeatmapReducer::resolve(spec.aggregate.as_ref().map(|a| a.y), value_field.is_some());
            let grid = heatmap_cells(rows, x, y, value_field, reducer);
            ChartData::Heatmap(reorder_heatmap(grid, spec))
        }
        ChartType::KmCurve => ChartData::Survival(kaplan_meier(rows, x, y, color)),
        ChartType::RocCurve => ChartData::Roc(roc_curve(rows, x, y, color)),
    }
}

fn reorder_heatmap(grid: HeatmapGrid, spec: &ChartSpec) -> HeatmapGrid {
    let x_order = order_categories(&grid.x_categories, &spec.encoding.x);
    let y_order = order_categories(&grid.y_categories, &spec.encoding.y);
    let remap = |old: &[String], new: &[String]| -> Vec<Option<usize>> {
        old.iter().map(|c| new.iter().position(|n| n == c)).collect()
    };
    let x_map = remap(&grid.x_categories, &x_order);
    let y_map = remap(&grid.y_categories, &y_order);

    let cells = grid
        .cells
        .iter()
        .filter_map(|c| {
            Some(HeatCell {
                x_index: x_map[c.x_index]?,
                y_index: y_map[c.y_index]?,
                value: c.value,
            })
        })
        .collect();

    HeatmapGrid {
        x_categories: x_order,
        y_categories: y_order,
        cells,
        min: grid.min,
        max: grid.max,
    }
}

/// Linear map of raw sizes onto the marker range
pub fn marker_sizes(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|v| {
            if max > min {
                MIN_MARKER + (v - min) / (max - min) * (MAX_MARKER - MIN_MARKER)
            } else {
                FIXED_MARKER
            }
        })
        .collect()
}

/// Numeric (x, y) points split by the color field; rows missing either coordinate are skipped
pub fn scatter_series(
    rows: &[Row],
    x_field: &str,
    y_field: &str,
    group_field: Option<&str>,
    size_field: Option<&str>,
) -> Vec<ScatterSeries> {
    let points: Vec<(Option<String>, f64, f64, Option<f64>)> = rows
        .iter()
        .filter_map(|r| {
            let x = field_number(r, x_field)?;
            let y = field_number(r, y_field)?;
            let group = group_field.map(|g| field_key(r, g));
            let size = size_field.and_then(|s| field_number(r, s));
            Some((group, x, y, size))
        })
        .collect();

    let raw_sizes: Vec<f64> = points.iter().filter_map(|p| p.3).collect();
    let scaled = marker_sizes(&raw_sizes);
    let mut scaled = scaled.into_iter();

    let mut series: Vec<ScatterSeries> = Vec::new();
    for (group, x, y, size) in points {
        let size = size.and_then(|_| scaled.next());
        let point = ScatterPoint { x, y, size };
        match series.iter_mut().find(|s| s.group == group) {
            Some(existing) => existing.points.push(point),
            None => series.push(ScatterSeries {
                group,
                points: vec![point],
            }),
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{AggregateSpec, AxisSpec, ColorSpec, ColumnMeta, DataSpec, Reducer};
    use crate::stats::fixtures::rows;
    use serde_json::json;

    fn spec(chart_type: ChartType, x: (&str, FieldType), y: (&str, FieldType)) -> ChartSpec {
        let columns = [x, y]
            .iter()
            .map(|(name, t)| ColumnMeta {
                name: name.to_string(),
                field_type: *t,
                unique_count: 0,
                sample_values: vec![],
                has_null: false,
            })
            .collect();
        ChartSpec::new(
            chart_type,
            DataSpec {
                source_id: "s".into(),
                columns,
            },
            AxisSpec::new(x.0, x.1),
            AxisSpec::new(y.0, y.1),
        )
    }

    #[test]
    fn test_bar_end_to_end_mean() {
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "A", "v": 3 }, { "g": "B", "v": 5 }]));
        let mut s = spec(ChartType::Bar, ("g", FieldType::Nominal), ("v", FieldType::Quantitative));
        s.aggregate = Some(AggregateSpec {
            y: Reducer::Mean,
            group_by: vec!["g".into()],
        });
        match chart_data(&s, &input) {
            ChartData::Categorical(p) => {
                assert_eq!(p.categories, vec!["A", "B"]);
                assert_eq!(p.values, vec![vec![Some(2.0), Some(5.0)]]);
            }
            other => panic!("Expected categorical data, got {:?}", other),
        }
    }

    #[test]
    fn test_violin_uses_box_statistics() {
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "A", "v": 3 }]));
        let violin = chart_data(
            &spec(ChartType::Violin, ("g", FieldType::Nominal), ("v", FieldType::Quantitative)),
            &input,
        );
        let boxplot = chart_data(
            &spec(ChartType::Boxplot, ("g", FieldType::Nominal), ("v", FieldType::Quantitative)),
            &input,
        );
        assert_eq!(violin, boxplot);
    }

    #[test]
    fn test_heatmap_axes_follow_sort() {
        let input = rows(json!([
            { "a": "z", "b": "q", "w": 1 }, { "a": "y", "b": "p", "w": 3 }
        ]));
        let mut s = spec(ChartType::Heatmap, ("a", FieldType::Nominal), ("b", FieldType::Nominal));
        s.encoding.x.sort = Some(crate::spec::SortOrder::Ascending);
        s.encoding.color = Some(ColorSpec {
            field: "w".into(),
            field_type: FieldType::Quantitative,
            scheme: None,
            range: None,
            legend: None,
        });
        match chart_data(&s, &input) {
            ChartData::Heatmap(grid) => {
                assert_eq!(grid.x_categories, vec!["y", "z"]);
                assert_eq!(grid.value("y", "p"), Some(3.0));
                assert_eq!(grid.value("z", "q"), Some(1.0));
            }
            other => panic!("Expected heatmap data, got {:?}", other),
        }
    }

    #[test]
    fn test_scatter_groups_and_sizes() {
        let input = rows(json!([
            { "x": 1, "y": 2, "g": "a", "s": 0 },
            { "x": 2, "y": "bad", "g": "a", "s": 5 },
            { "x": 3, "y": 4, "g": "b", "s": 10 }
        ]));
        let series = scatter_series(&input, "x", "y", Some("g"), Some("s"));
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].points[0].size, Some(MIN_MARKER));
        assert_eq!(series[1].points[0].size, Some(MAX_MARKER));
    }

    #[test]
    fn test_constant_sizes_use_fixed_marker() {
        assert_eq!(marker_sizes(&[4.0, 4.0]), vec![FIXED_MARKER, FIXED_MARKER]);
    }
}
