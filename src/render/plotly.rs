//! Backend B: Plotly-style figures `{data, layout, config}`

use serde_json::{json, Map, Value};

use super::{
    axis_font_sizes, chart_data, ensure_fields, includes_zero, legend_position, legend_title, numeric_domain,
    scale_type, series_name, show_grid, AxisKind, ChartData,
};
use crate::error::RenderError;
use crate::spec::{Annotation, AxisSpec, ChartSpec, ChartType, ExportFormat, LegendPosition, LineDash, Row, ScaleType};
use crate::style::{merge_overrides, resolve_style, ResolvedStyle};

/// Compile to a Plotly figure
pub fn to_plotly(spec: &ChartSpec, rows: &[Row]) -> Result<Value, RenderError> {
    ensure_fields(spec)?;
    let style = resolve_style(spec);
    let data = chart_data(spec, rows);
    let enc = &spec.encoding;

    let mut layout = base_layout(spec, &style);
    let traces: Vec<Value> = match &data {
        ChartData::Categorical(p) => {
            let line = spec.chart_type == ChartType::Line;
            layout["barmode"] = json!(if spec.chart_type == ChartType::StackedBar { "stack" } else { "group" });
            layout["xaxis"] = axis(&enc.x, AxisKind::Category, Some(p.categories.as_slice()), &style);
            layout["yaxis"] = axis(&enc.y, AxisKind::Value, None, &style);
            p.groups
                .iter()
                .zip(&p.values)
                .enumerate()
                .map(|(i, (group, values))| {
                    let mut trace = json!({
                        "type": if line { "scatter" } else { "bar" },
                        "name": series_name(spec, Some(group)),
                        "x": p.categories,
                        "y": values,
                    });
                    if line {
                        trace["mode"] = json!("lines+markers");
                        trace["line"] = json!({ "color": style.color(i), "width": style.line_width });
                    } else {
                        trace["marker"] = json!({ "color": style.color(i) });
                    }
                    trace
                })
                .collect()
        }
        ChartData::Scatter(groups) => {
            layout["xaxis"] = axis(&enc.x, AxisKind::Value, None, &style);
            layout["yaxis"] = axis(&enc.y, AxisKind::Value, None, &style);
            groups
                .iter()
                .enumerate()
                .map(|(i, g)| {
                    let xs: Vec<f64> = g.points.iter().map(|p| p.x).collect();
                    let ys: Vec<f64> = g.points.iter().map(|p| p.y).collect();
                    let mut marker = json!({ "color": style.color(i) });
                    let sizes: Vec<f64> = g.points.iter().filter_map(|p| p.size).collect();
                    if !sizes.is_empty() {
                        marker["size"] = json!(sizes);
                    }
                    json!({
                        "type": "scatter",
                        "mode": "markers",
                        "name": series_name(spec, g.group.as_deref()),
                        "x": xs,
                        "y": ys,
                        "marker": marker,
                    })
                })
                .collect()
        }
        ChartData::Boxes(stats) => {
            let categories: Vec<String> = stats.iter().map(|b| b.category.clone()).collect();
            layout["xaxis"] = axis(&enc.x, AxisKind::Category, Some(categories.as_slice()), &style);
            layout["yaxis"] = axis(&enc.y, AxisKind::Value, None, &style);
            // Precomputed quartiles so Plotly does not recompute them its own way
            vec![json!({
                "type": "box",
                "name": series_name(spec, None),
                "x": categories,
                "q1": stats.iter().map(|b| b.summary.q1).collect::<Vec<_>>(),
                "median": stats.iter().map(|b| b.summary.median).collect::<Vec<_>>(),
                "q3": stats.iter().map(|b| b.summary.q3).collect::<Vec<_>>(),
                "lowerfence": stats.iter().map(|b| b.summary.min).collect::<Vec<_>>(),
                "upperfence": stats.iter().map(|b| b.summary.max).collect::<Vec<_>>(),
                "marker": { "color": style.color(0) },
            })]
        }
        ChartData::Histogram(groups) => {
            let mut y = AxisSpec::new("count", crate::spec::FieldType::Quantitative);
            y.title = Some("Count".to_string());
            layout["xaxis"] = axis(&enc.x, AxisKind::Value, None, &style);
            layout["yaxis"] = axis(&y, AxisKind::Value, None, &style);
            layout["barmode"] = json!("overlay");
            let overlay = groups.len() > 1;
            groups
                .iter()
                .enumerate()
                .map(|(i, g)| {
                    let bins = &g.histogram.bins;
                    json!({
                        "type": "bar",
                        "name": g.group.clone().unwrap_or_else(|| "count".to_string()),
                        "x": bins.iter().map(|b| b.midpoint()).collect::<Vec<_>>(),
                        "y": g.histogram.counts(),
                        "width": bins.iter().map(|b| b.x1 - b.x0).collect::<Vec<_>>(),
                        "opacity": if overlay { 0.6 } else { 1.0 },
                        "marker": { "color": style.color(i) },
                    })
                })
                .collect()
        }
        ChartData::ErrorBars(points) => {
            let categories: Vec<String> = points.iter().map(|p| p.category.clone()).collect();
            layout["xaxis"] = axis(&enc.x, AxisKind::Category, Some(categories.as_slice()), &style);
            layout["yaxis"] = axis(&enc.y, AxisKind::Value, None, &style);
            vec![json!({
                "type": "scatter",
                "mode": "markers",
                "name": series_name(spec, None),
                "x": categories,
                "y": points.iter().map(|p| p.mean).collect::<Vec<_>>(),
                "error_y": {
                    "type": "data",
                    "symmetric": false,
                    "array": points.iter().map(|p| p.plus).collect::<Vec<_>>(),
                    "arrayminus": points.iter().map(|p| p.minus).collect::<Vec<_>>(),
                    "visible": true,
                },
                "marker": { "color": style.color(0), "size": 8 },
            })]
        }
        ChartData::Heatmap(grid) => {
            layout["xaxis"] = axis(&enc.x, AxisKind::Category, Some(grid.x_categories.as_slice()), &style);
            layout["yaxis"] = axis(&enc.y, AxisKind::Category, Some(grid.y_categories.as_slice()), &style);
            let mut z = vec![vec![None::<f64>; grid.x_categories.len()]; grid.y_categories.len()];
            for cell in &grid.cells {
                z[cell.y_index][cell.x_index] = Some(cell.value);
            }
            vec![json!({
                "type": "heatmap",
                "name": series_name(spec, None),
                "x": grid.x_categories,
                "y": grid.y_categories,
                "z": z,
                "zmin": grid.min,
                "zmax": grid.max,
                "colorscale": colorscale(&style.sequential),
            })]
        }
        ChartData::Survival(curves) => {
            layout["xaxis"] = axis(&enc.x, AxisKind::Value, None, &style);
            let mut y = axis(&enc.y, AxisKind::Value, None, &style);
            y["range"] = json!([0, 1]);
            y["title"]["text"] = json!("Survival probability");
            layout["yaxis"] = y;
            curves
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    json!({
                        "type": "scatter",
                        "mode": "lines",
                        "name": c.group.clone().unwrap_or_else(|| "Survival".to_string()),
                        "x": c.points.iter().map(|p| p.time).collect::<Vec<_>>(),
                        "y": c.points.iter().map(|p| p.survival).collect::<Vec<_>>(),
                        "line": { "shape": "hv", "color": style.color(i), "width": style.line_width },
                    })
                })
                .collect()
        }
        ChartData::Roc(curves) => {
            let mut x = axis(&enc.x, AxisKind::Value, None, &style);
            let mut y = axis(&enc.y, AxisKind::Value, None, &style);
            for (a, name) in [(&mut x, "False positive rate"), (&mut y, "True positive rate")] {
                a["range"] = json!([0, 1]);
                a["title"]["text"] = json!(name);
            }
            layout["xaxis"] = x;
            layout["yaxis"] = y;
            let mut traces: Vec<Value> = curves
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let label = c.group.clone().unwrap_or_else(|| "ROC".to_string());
                    json!({
                        "type": "scatter",
                        "mode": "lines",
                        "name": format!("{} (AUC = {:.3})", label, c.auc),
                        "x": c.points.iter().map(|p| p.fpr).collect::<Vec<_>>(),
                        "y": c.points.iter().map(|p| p.tpr).collect::<Vec<_>>(),
                        "line": { "color": style.color(i), "width": style.line_width },
                        "meta": { "auc": c.auc },
                    })
                })
                .collect();
            traces.push(json!({
                "type": "scatter",
                "mode": "lines",
                "name": "Chance",
                "x": [0.0, 1.0],
                "y": [0.0, 1.0],
                "line": { "dash": "dash", "color": "#999999" },
            }));
            traces
        }
    };

    apply_legend(spec, &mut layout, traces.len());
    apply_annotations(spec, &mut layout);
    let mut root = Map::new();
    root.insert("data".into(), Value::Array(traces));
    root.insert("layout".into(), layout);
    root.insert("config".into(), config(spec));
    let mut figure = Value::Object(root);
    merge_overrides(&mut figure, &style.overrides);
    Ok(figure)
}

fn base_layout(spec: &ChartSpec, style: &ResolvedStyle) -> Value {
    let background = if style.transparent {
        "rgba(0,0,0,0)".to_string()
    } else {
        style.background.clone()
    };
    let mut layout = json!({
        "font": { "family": style.font_family, "size": style.font_size, "color": style.text_color },
        "paper_bgcolor": background,
        "plot_bgcolor": background,
        "colorway": style.colors,
        "margin": {
            "t": style.padding.top,
            "r": style.padding.right,
            "b": style.padding.bottom,
            "l": style.padding.left,
        },
    });
    if let Some(title) = &spec.title {
        layout["title"] = json!({ "text": title, "x": 0.5, "font": { "size": style.title_font_size } });
    }
    if let Some(width) = spec.export_config.width {
        layout["width"] = json!(width);
    }
    if let Some(height) = spec.export_config.height {
        layout["height"] = json!(height);
    }
    layout
}

fn colorscale(colors: &[String]) -> Value {
    let last = colors.len().saturating_sub(1).max(1) as f64;
    Value::Array(
        colors
            .iter()
            .enumerate()
            .map(|(i, c)| json!([i as f64 / last, c]))
            .collect(),
    )
}

fn axis(spec: &AxisSpec, kind: AxisKind, categories: Option<&[String]>, style: &ResolvedStyle) -> Value {
    let (title_size, label_size) = axis_font_sizes(spec, style);
    let log = scale_type(spec) == ScaleType::Log;
    let mut axis = json!({
        "title": { "text": spec.display_title(), "font": { "size": title_size } },
        "tickfont": { "size": label_size },
        "showgrid": show_grid(spec, style),
        "gridcolor": style.grid_color,
    });

    match kind {
        AxisKind::Category => {
            axis["type"] = json!("category");
            axis["categoryorder"] = json!("array");
            axis["categoryarray"] = json!(categories.unwrap_or_default());
        }
        AxisKind::Value => {
            axis["type"] = json!(if log { "log" } else { "linear" });
            if let Some([min, max]) = numeric_domain(spec, kind) {
                // Log axes take their range in exponent space
                axis["range"] = if log && min > 0.0 && max > 0.0 {
                    json!([min.log10(), max.log10()])
                } else {
                    json!([min, max])
                };
            }
            if let Some(zero) = includes_zero(spec) {
                axis["rangemode"] = json!(if zero { "tozero" } else { "normal" });
            }
        }
    }

    if let Some(angle) = spec.label_angle {
        axis["tickangle"] = json!(angle);
    }
    if let Some(format) = &spec.format {
        axis["tickformat"] = json!(format);
    }
    axis
}

fn apply_legend(spec: &ChartSpec, layout: &mut Value, trace_count: usize) {
    let position = legend_position(spec);
    if position == LegendPosition::None || trace_count < 2 {
        layout["showlegend"] = json!(false);
        return;
    }
    layout["showlegend"] = json!(true);
    let mut legend = match position {
        LegendPosition::Top => json!({ "orientation": "h", "x": 0.5, "xanchor": "center", "y": 1.02, "yanchor": "bottom" }),
        LegendPosition::Bottom => json!({ "orientation": "h", "x": 0.5, "xanchor": "center", "y": -0.2, "yanchor": "top" }),
        LegendPosition::Left => json!({ "orientation": "v", "x": -0.15, "xanchor": "right", "y": 0.5 }),
        LegendPosition::Right => json!({ "orientation": "v", "x": 1.02, "xanchor": "left", "y": 0.5 }),
        LegendPosition::None => json!({}),
    };
    if let Some(title) = legend_title(spec) {
        legend["title"] = json!({ "text": title });
    }
    layout["legend"] = legend;
}

fn dash(d: Option<LineDash>) -> &'static str {
    match d {
        Some(LineDash::Dashed) => "dash",
        Some(LineDash::Dotted) => "dot",
        _ => "solid",
    }
}

fn apply_annotations(spec: &ChartSpec, layout: &mut Value) {
    let mut notes = Vec::new();
    let mut shapes = Vec::new();
    for ann in &spec.annotations {
        match ann {
            Annotation::Text {
                x,
                y,
                text,
                font_size,
                color,
            } => notes.push(json!({
                "x": x.to_value(),
                "y": y.to_value(),
                "text": text,
                "showarrow": false,
                "font": { "size": font_size, "color": color },
            })),
            Annotation::Line {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
                dash: d,
            } => shapes.push(json!({
                "type": "line",
                "x0": x1.to_value(),
                "y0": y1.to_value(),
                "x1": x2.to_value(),
                "y1": y2.to_value(),
                "line": { "color": color, "width": width, "dash": dash(*d) },
            })),
            Annotation::Rect {
                x1,
                y1,
                x2,
                y2,
                fill,
                opacity,
            } => shapes.push(json!({
                "type": "rect",
                "x0": x1.to_value(),
                "y0": y1.to_value(),
                "x1": x2.to_value(),
                "y1": y2.to_value(),
                "fillcolor": fill,
                "opacity": opacity.unwrap_or(0.2),
                "line": { "width": 0 },
            })),
        }
    }
    if !notes.is_empty() {
        layout["annotations"] = Value::Array(notes);
    }
    if !shapes.is_empty() {
        layout["shapes"] = Value::Array(shapes);
    }
}

fn config(spec: &ChartSpec) -> Value {
    let export = &spec.export_config;
    // toImage has no pdf target
    let format = match export.format {
        ExportFormat::Svg | ExportFormat::Pdf => "svg",
        ExportFormat::Png => "png",
    };
    let mut options = json!({
        "format": format,
        "scale": export.pixel_ratio(),
        "filename": spec.title.clone().unwrap_or_else(|| "chart".to_string()),
    });
    if let Some(width) = export.width {
        options["width"] = json!(width);
    }
    if let Some(height) = export.height {
        options["height"] = json!(height);
    }
    json!({
        "responsive": true,
        "displaylogo": false,
        "toImageButtonOptions": options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ColumnMeta, Coord, DataSpec, Domain, FieldType, ScaleSpec};
    use crate::stats::fixtures::rows;

    fn spec(chart_type: ChartType) -> ChartSpec {
        let columns = [("g", FieldType::Nominal), ("v", FieldType::Quantitative)]
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
            AxisSpec::new("g", FieldType::Nominal),
            AxisSpec::new("v", FieldType::Quantitative),
        )
    }

    #[test]
    fn test_figure_shape() {
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "B", "v": 2 }]));
        let figure = to_plotly(&spec(ChartType::Bar), &input).unwrap();
        assert!(figure["data"].is_array());
        assert!(figure["layout"].is_object());
        assert_eq!(figure["config"]["toImageButtonOptions"]["scale"], json!(300.0 / 96.0));
        assert_eq!(figure["data"][0]["y"], json!([1.0, 2.0]));
        assert_eq!(figure["layout"]["showlegend"], false);
    }

    #[test]
    fn test_boxplot_uses_precomputed_quartiles() {
        let input = rows(json!([
            { "g": "A", "v": 1 }, { "g": "A", "v": 2 }, { "g": "A", "v": 3 }, { "g": "A", "v": 4 }
        ]));
        let figure = to_plotly(&spec(ChartType::Boxplot), &input).unwrap();
        let trace = &figure["data"][0];
        assert_eq!(trace["q1"], json!([1.75]));
        assert_eq!(trace["median"], json!([2.5]));
        assert_eq!(trace["upperfence"], json!([4.0]));
    }

    #[test]
    fn test_string_domain_ignored_on_value_axis() {
        let mut s = spec(ChartType::Bar);
        s.encoding.y.scale = Some(ScaleSpec {
            scale_type: None,
            domain: Some(Domain::Categories(vec!["a".into()])),
            zero: None,
        });
        let input = rows(json!([{ "g": "A", "v": 1 }]));
        let figure = to_plotly(&s, &input).unwrap();
        assert!(figure["layout"]["yaxis"].get("range").is_none());
    }

    #[test]
    fn test_annotations_become_shapes() {
        let mut s = spec(ChartType::Bar);
        s.annotations = vec![Annotation::Line {
            x1: Coord::Label("A".into()),
            y1: Coord::Number(0.0),
            x2: Coord::Label("B".into()),
            y2: Coord::Number(0.0),
            color: None,
            width: None,
            dash: Some(LineDash::Dashed),
        }];
        let input = rows(json!([{ "g": "A", "v": 1 }, { "g": "B", "v": 2 }]));
        let figure = to_plotly(&s, &input).unwrap();
        assert_eq!(figure["layout"]["shapes"][0]["line"]["dash"], "dash");
    }

    #[test]
    fn test_overrides_merge_into_figure_root() {
        let mut s = spec(ChartType::Bar);
        s.style.overrides = Some(
            json!({ "layout": { "bargap": 0.1 }, "config": { "displaylogo": true } })
                .as_object()
                .unwrap()
                .clone(),
        );
        let input = rows(json!([{ "g": "A", "v": 1 }]));
        let figure = to_plotly(&s, &input).unwrap();
        assert_eq!(figure["layout"]["bargap"], json!(0.1));
        assert_eq!(figure["config"]["displaylogo"], true);
        assert_eq!(figure["config"]["responsive"], true);
    }
}
