//! Backend A: ECharts-style option objects

use serde_json::{json, Map, Value};

use super::{
    axis_font_sizes, chart_data, ensure_fields, includes_zero, legend_position, legend_title, numeric_domain,
    scale_type, series_name, show_grid, AxisKind, ChartData,
};
use crate::error::RenderError;
use crate::spec::{Annotation, AxisSpec, ChartSpec, ChartType, ExportFormat, LegendPosition, LineDash, Row, ScaleType};
use crate::stats::Pivot;
use crate::style::{merge_overrides, resolve_style, ResolvedStyle};

/// Name of the custom-series renderer the host registers for error bars
pub const ERROR_BAR_RENDERER: &str = "errorBar";

/// Compile to an ECharts option
pub fn to_echarts(spec: &ChartSpec, rows: &[Row]) -> Result<Value, RenderError> {
    ensure_fields(spec)?;
    let style = resolve_style(spec);
    let data = chart_data(spec, rows);

    let (x_axis, y_axis, series, extra) = match &data {
        ChartData::Categorical(p) => categorical(spec, &style, p),
        ChartData::Scatter(groups) => {
            let series: Vec<Value> = groups
                .iter()
                .map(|g| {
                    let points: Vec<Value> = g
                        .points
                        .iter()
                        .map(|p| match p.size {
                            Some(size) => json!({ "value": [p.x, p.y], "symbolSize": size }),
                            None => json!([p.x, p.y]),
                        })
                        .collect();
                    json!({
                        "type": "scatter",
                        "name": series_name(spec, g.group.as_deref()),
                        "data": points,
                    })
                })
                .collect();
            (
                axis(&spec.encoding.x, AxisKind::Value, None, &style),
                axis(&spec.encoding.y, AxisKind::Value, None, &style),
                series,
                Map::new(),
            )
        }
        ChartData::Boxes(stats) => {
            let categories: Vec<String> = stats.iter().map(|b| b.category.clone()).collect();
            let boxes: Vec<[f64; 5]> = stats.iter().map(|b| b.summary.as_array()).collect();
            (
                axis(&spec.encoding.x, AxisKind::Category, Some(categories.as_slice()), &style),
                axis(&spec.encoding.y, AxisKind::Value, None, &style),
                vec![json!({
                    "type": "boxplot",
                    "name": series_name(spec, None),
                    "data": boxes,
                })],
                Map::new(),
            )
        }
        ChartData::Histogram(groups) => {
            let labels: Vec<String> = groups
                .first()
                .map(|g| {
                    g.histogram
                        .bins
                        .iter()
                        .map(|b| format!("{}-{}", round_label(b.x0), round_label(b.x1)))
                        .collect()
                })
                .unwrap_or_default();
            let series: Vec<Value> = groups
                .iter()
                .map(|g| {
                    json!({
                        "type": "bar",
                        "name": g.group.clone().unwrap_or_else(|| "count".to_string()),
                        "data": g.histogram.counts(),
                        "barGap": "0%",
                        "barCategoryGap": "0%",
                    })
                })
                .collect();
            let mut y = AxisSpec::new("count", crate::spec::FieldType::Quantitative);
            y.title = Some("Count".to_string());
            (
                axis(&spec.encoding.x, AxisKind::Category, Some(labels.as_slice()), &style),
                axis(&y, AxisKind::Value, None, &style),
                series,
                Map::new(),
            )
        }
        ChartData::ErrorBars(points) => {
            let categories: Vec<String> = points.iter().map(|p| p.category.clone()).collect();
            let means: Vec<f64> = points.iter().map(|p| p.mean).collect();
            let bars: Vec<Value> = points
                .iter()
                .enumerate()
                .map(|(i, p)| json!([i, p.lower(), p.upper()]))
                .collect();
            (
                axis(&spec.encoding.x, AxisKind::Category, Some(categories.as_slice()), &style),
                axis(&spec.encoding.y, AxisKind::Value, None, &style),
                vec![
                    json!({
                        "type": "scatter",
                        "name": series_name(spec, None),
                        "data": means,
                        "symbolSize": 8,
                    }),
                    json!({
                        "type": "custom",
                        "name": "error",
                        "renderItem": ERROR_BAR_RENDERER,
                        "encode": { "x": 0, "y": [1, 2] },
                        "data": bars,
                        "z": 10,
                    }),
                ],
                Map::new(),
            )
        }
        ChartData::Heatmap(grid) => {
            let cells: Vec<Value> = grid
                .cells
                .iter()
                .map(|c| json!([c.x_index, c.y_index, c.value]))
                .collect();
            let mut extra = Map::new();
            extra.insert(
                "visualMap".into(),
                json!({
                    "min": grid.min.unwrap_or(0.0),
                    "max": grid.max.unwrap_or(0.0),
                    "calculable": true,
                    "orient": "horizontal",
                    "left": "center",
                    "bottom": 0,
                    "inRange": { "color": style.sequential },
                }),
            );
            (
                axis(&spec.encoding.x, AxisKind::Category, Some(grid.x_categories.as_slice()), &style),
                axis(&spec.encoding.y, AxisKind::Category, Some(grid.y_categories.as_slice()), &style),
                vec![json!({
                    "type": "heatmap",
                    "name": series_name(spec, None),
                    "data": cells,
                    "label": { "show": true },
                })],
                extra,
            )
        }
        ChartData::Survival(curves) => {
            let series: Vec<Value> = curves
                .iter()
                .map(|c| {
                    let points: Vec<[f64; 2]> = c.points.iter().map(|p| [p.time, p.survival]).collect();
                    json!({
                        "type": "line",
                        "step": "end",
                        "symbol": "none",
                        "name": c.group.clone().unwrap_or_else(|| "Survival".to_string()),
                        "data": points,
                    })
                })
                .collect();
            let mut y = axis(&spec.encoding.y, AxisKind::Value, None, &style);
            y["min"] = json!(0);
            y["max"] = json!(1);
            y["name"] = json!("Survival probability");
            (axis(&spec.encoding.x, AxisKind::Value, None, &style), y, series, Map::new())
        }
        ChartData::Roc(curves) => {
            let mut series: Vec<Value> = curves
                .iter()
                .map(|c| {
                    let points: Vec<[f64; 2]> = c.points.iter().map(|p| [p.fpr, p.tpr]).collect();
                    let label = c.group.clone().unwrap_or_else(|| "ROC".to_string());
                    json!({
                        "type": "line",
                        "symbol": "none",
                        "name": format!("{} (AUC = {:.3})", label, c.auc),
                        "data": points,
                        "auc": c.auc,
                    })
                })
                .collect();
            series.push(json!({
                "type": "line",
                "name": "Chance",
                "symbol": "none",
                "data": [[0.0, 0.0], [1.0, 1.0]],
                "lineStyle": { "type": "dashed", "color": "#999999" },
            }));
            let mut x = axis(&spec.encoding.x, AxisKind::Value, None, &style);
            let mut y = axis(&spec.encoding.y, AxisKind::Value, None, &style);
            for (a, name) in [(&mut x, "False positive rate"), (&mut y, "True positive rate")] {
                a["min"] = json!(0);
                a["max"] = json!(1);
                a["name"] = json!(name);
            }
            (x, y, series, Map::new())
        }
    };

    let tooltip = match spec.chart_type {
        ChartType::Bar | ChartType::GroupedBar | ChartType::StackedBar | ChartType::Line => "axis",
        _ => "item",
    };

    let mut option = Map::new();
    option.insert(
        "backgroundColor".into(),
        json!(if style.transparent { "transparent" } else { style.background.as_str() }),
    );
    option.insert("color".into(), json!(style.colors));
    option.insert(
        "textStyle".into(),
        json!({ "fontFamily": style.font_family, "fontSize": style.font_size, "color": style.text_color }),
    );
    if let Some(title) = &spec.title {
        option.insert(
            "title".into(),
            json!({
                "text": title,
                "left": "center",
                "textStyle": { "fontSize": style.title_font_size },
            }),
        );
    }
    option.insert("tooltip".into(), json!({ "trigger": tooltip }));
    option.insert("legend".into(), legend(spec, &series));
    option.insert(
        "grid".into(),
        json!({
            "top": style.padding.top,
            "right": style.padding.right,
            "bottom": style.padding.bottom,
            "left": style.padding.left,
            "containLabel": true,
        }),
    );
    option.insert("xAxis".into(), x_axis);
    option.insert("yAxis".into(), y_axis);
    option.insert("series".into(), Value::Array(attach_annotations(spec, series)));
    option.insert("toolbox".into(), toolbox(spec));
    option.extend(extra);

    let mut option = Value::Object(option);
    merge_overrides(&mut option, &style.overrides);
    Ok(option)
}

fn round_label(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    format!("{}", rounded)
}

fn categorical(spec: &ChartSpec, style: &ResolvedStyle, p: &Pivot) -> (Value, Value, Vec<Value>, Map<String, Value>) {
    let kind = if spec.chart_type == ChartType::Line { "line" } else { "bar" };
    let series = p
        .groups
        .iter()
        .zip(&p.values)
        .map(|(group, values)| {
            let mut s = json!({
                "type": kind,
                "name": series_name(spec, Some(group)),
                "data": values,
            });
            if spec.chart_type == ChartType::StackedBar {
                s["stack"] = json!("total");
            }
            if kind == "line" {
                s["lineStyle"] = json!({ "width": style.line_width });
            }
            s
        })
        .collect();
    (
        axis(&spec.encoding.x, AxisKind::Category, Some(p.categories.as_slice()), style),
        axis(&spec.encoding.y, AxisKind::Value, None, style),
        series,
        Map::new(),
    )
}

fn axis(spec: &AxisSpec, kind: AxisKind, categories: Option<&[String]>, style: &ResolvedStyle) -> Value {
    let (title_size, label_size) = axis_font_sizes(spec, style);
    let mut axis = json!({
        "name": spec.display_title(),
        "nameLocation": "middle",
        "nameGap": 32,
        "nameTextStyle": { "fontSize": title_size },
        "axisLabel": { "fontSize": label_size },
        "splitLine": {
            "show": show_grid(spec, style),
            "lineStyle": { "color": style.grid_color },
        },
    });

    match kind {
        AxisKind::Category => {
            axis["type"] = json!("category");
            axis["data"] = json!(categories.unwrap_or_default());
        }
        AxisKind::Value => {
            axis["type"] = json!(if scale_type(spec) == ScaleType::Log { "log" } else { "value" });
            if let Some([min, max]) = numeric_domain(spec, kind) {
                axis["min"] = json!(min);
                axis["max"] = json!(max);
            }
            if let Some(zero) = includes_zero(spec) {
                axis["scale"] = json!(!zero);
            }
        }
    }

    if let Some(angle) = spec.label_angle {
        axis["axisLabel"]["rotate"] = json!(angle);
    }
    if let Some(format) = &spec.format {
        axis["axisLabel"]["formatter"] = json!(format);
    }
    axis
}

fn legend(spec: &ChartSpec, series: &[Value]) -> Value {
    let names: Vec<&Value> = series.iter().filter_map(|s| s.get("name")).collect();
    let position = legend_position(spec);
    if position == LegendPosition::None || names.len() < 2 {
        return json!({ "show": false });
    }
    let mut legend = match position {
        LegendPosition::Top => json!({ "top": 24, "left": "center", "orient": "horizontal" }),
        LegendPosition::Bottom => json!({ "bottom": 0, "left": "center", "orient": "horizontal" }),
        LegendPosition::Left => json!({ "left": 0, "top": "middle", "orient": "vertical" }),
        LegendPosition::Right => json!({ "right": 0, "top": "middle", "orient": "vertical" }),
        LegendPosition::None => json!({}),
    };
    legend["show"] = json!(true);
    legend["data"] = json!(names);
    if let Some(title) = legend_title(spec) {
        legend["title"] = json!(title);
    }
    legend
}

fn dash(d: Option<LineDash>) -> &'static str {
    match d {
        Some(LineDash::Dashed) => "dashed",
        Some(LineDash::Dotted) => "dotted",
        _ => "solid",
    }
}

/// Annotations ride on the first series as mark components
fn attach_annotations(spec: &ChartSpec, mut series: Vec<Value>) -> Vec<Value> {
    if spec.annotations.is_empty() {
        return series;
    }
    let Some(first) = series.first_mut() else {
        return series;
    };

    let mut points = Vec::new();
    let mut lines = Vec::new();
    let mut areas = Vec::new();
    for ann in &spec.annotations {
        match ann {
            Annotation::Text {
                x,
                y,
                text,
                font_size,
                color,
            } => points.push(json!({
                "coord": [x.to_value(), y.to_value()],
                "symbolSize": 0,
                "label": {
                    "show": true,
                    "formatter": text,
                    "fontSize": font_size,
                    "color": color,
                },
            })),
            Annotation::Line {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
                dash: d,
            } => lines.push(json!([
                { "coord": [x1.to_value(), y1.to_value()] },
                {
                    "coord": [x2.to_value(), y2.to_value()],
                    "lineStyle": { "color": color, "width": width, "type": dash(*d) },
                },
            ])),
            Annotation::Rect {
                x1,
                y1,
                x2,
                y2,
                fill,
                opacity,
            } => areas.push(json!([
                {
                    "coord": [x1.to_value(), y1.to_value()],
                    "itemStyle": { "color": fill, "opacity": opacity.unwrap_or(0.2) },
                },
                { "coord": [x2.to_value(), y2.to_value()] },
            ])),
        }
    }
    if !points.is_empty() {
        first["markPoint"] = json!({ "data": points });
    }
    if !lines.is_empty() {
        first["markLine"] = json!({ "symbol": "none", "data": lines });
    }
    if !areas.is_empty() {
        first["markArea"] = json!({ "data": areas });
    }
    series
}

fn toolbox(spec: &ChartSpec) -> Value {
    let export = &spec.export_config;
    // saveAsImage only knows png and svg
    let format = match export.format {
        ExportFormat::Svg => "svg",
        ExportFormat::Png | ExportFormat::Pdf => "png",
    };
    json!({
        "feature": {
            "saveAsImage": {
                "type": format,
                "pixelRatio": export.pixel_ratio(),
                "name": spec.title.clone().unwrap_or_else(|| "chart".to_string()),
            }
        }
    })
}
