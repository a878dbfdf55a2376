//! Style presets and override resolution
//!
//! Presets are static lookup tables. An explicit value in the spec always wins over
//! the preset value for the same attribute.

use serde_json::{Map, Value};

use crate::spec::{ChartSpec, ColorScheme, Padding, StylePreset};

/// Static values of one preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetTable {
    pub font_family: &'static str,
    pub font_size: f64,
    pub title_font_size: f64,
    pub palette: &'static [&'static str],
    pub background: &'static str,
    pub text_color: &'static str,
    pub grid_color: &'static str,
    pub line_width: f64,
    pub show_grid: bool,
}

const DEFAULT_PRESET: PresetTable = PresetTable {
    font_family: "Inter, Helvetica, Arial, sans-serif",
    font_size: 12.0,
    title_font_size: 16.0,
    palette: &[
        "#5470c6", "#91cc75", "#fac858", "#ee6666", "#73c0de", "#3ba272", "#fc8452", "#9a60b4",
        "#ea7ccc",
    ],
    background: "#ffffff",
    text_color: "#333333",
    grid_color: "#e0e6f1",
    line_width: 2.0,
    show_grid: true,
};

const SCIENCE_PRESET: PresetTable = PresetTable {
    font_family: "Times New Roman, serif",
    font_size: 11.0,
    title_font_size: 13.0,
    palette: &["#0C5DA5", "#00B945", "#FF9500", "#FF2C00", "#845B97", "#474747", "#9e9e9e"],
    background: "#ffffff",
    text_color: "#000000",
    grid_color: "#d9d9d9",
    line_width: 1.5,
    show_grid: false,
};

const IEEE_PRESET: PresetTable = PresetTable {
    font_family: "Times New Roman, serif",
    font_size: 8.0,
    title_font_size: 9.0,
    palette: &["#000000", "#FF0000", "#0000FF", "#008000", "#FF9500"],
    background: "#ffffff",
    text_color: "#000000",
    grid_color: "#cccccc",
    line_width: 1.0,
    show_grid: true,
};

const GRAYSCALE_PRESET: PresetTable = PresetTable {
    font_family: "Helvetica, Arial, sans-serif",
    font_size: 11.0,
    title_font_size: 14.0,
    palette: &["#000000", "#404040", "#707070", "#a0a0a0", "#c8c8c8"],
    background: "#ffffff",
    text_color: "#000000",
    grid_color: "#e5e5e5",
    line_width: 1.5,
    show_grid: true,
};

pub fn preset_table(preset: StylePreset) -> &'static PresetTable {
    match preset {
        StylePreset::Default => &DEFAULT_PRESET,
        StylePreset::Science => &SCIENCE_PRESET,
        StylePreset::Ieee => &IEEE_PRESET,
        StylePreset::Grayscale => &GRAYSCALE_PRESET,
    }
}

pub fn scheme_palette(scheme: ColorScheme) -> &'static [&'static str] {
    match scheme {
        ColorScheme::Category10 => &[
            "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
            "#bcbd22", "#17becf",
        ],
        ColorScheme::Tableau10 => &[
            "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1", "#ff9da7",
            "#9c755f", "#bab0ab",
        ],
        ColorScheme::Set2 => &[
            "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494", "#b3b3b3",
        ],
        ColorScheme::Pastel => &[
            "#aec7e8", "#ffbb78", "#98df8a", "#ff9896", "#c5b0d5", "#c49c94", "#f7b6d2", "#dbdb8d",
        ],
        ColorScheme::Viridis => &["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"],
        ColorScheme::Blues => &["#deebf7", "#9ecae1", "#6baed6", "#3182bd", "#08519c"],
    }
}

/// Fully resolved style for one spec
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub font_family: String,
    pub font_size: f64,
    pub title_font_size: f64,
    pub colors: Vec<String>,
    /// Sequential palette for continuous color scales
    pub sequential: Vec<String>,
    pub background: String,
    pub transparent: bool,
    pub text_color: String,
    pub grid_color: String,
    pub line_width: f64,
    pub show_grid: bool,
    pub padding: Padding,
    pub overrides: Map<String, Value>,
}

impl ResolvedStyle {
    /// Color for the i-th series, cycling the palette
    pub fn color(&self, i: usize) -> &str {
        if self.colors.is_empty() {
            return "#000000";
        }
        &self.colors[i % self.colors.len()]
    }
}

fn owned(palette: &[&str]) -> Vec<String> {
    palette.iter().map(|c| c.to_string()).collect()
}

/// Resolve preset values and explicit overrides for `spec`
///
/// Color precedence: `encoding.color.range`, then `style.colors`, then
/// `encoding.color.scheme`, then the preset palette.
pub fn resolve_style(spec: &ChartSpec) -> ResolvedStyle {
    let style = &spec.style;
    let table = preset_table(style.preset);
    let color = spec.encoding.color.as_ref();

    let colors = color
        .and_then(|c| c.range.clone())
        .or_else(|| style.colors.clone())
        .or_else(|| color.and_then(|c| c.scheme).map(|s| owned(scheme_palette(s))))
        .unwrap_or_else(|| owned(table.palette));

    let sequential = color
        .and_then(|c| c.range.clone())
        .or_else(|| color.and_then(|c| c.scheme).map(|s| owned(scheme_palette(s))))
        .unwrap_or_else(|| owned(scheme_palette(ColorScheme::Viridis)));

    ResolvedStyle {
        font_family: style
            .font_family
            .clone()
            .unwrap_or_else(|| table.font_family.to_string()),
        font_size: style.font_size.unwrap_or(table.font_size),
        title_font_size: style.title_font_size.unwrap_or(table.title_font_size),
        colors,
        sequential,
        background: style
            .background
            .clone()
            .unwrap_or_else(|| table.background.to_string()),
        transparent: spec.export_config.transparent.unwrap_or(false),
        text_color: table.text_color.to_string(),
        grid_color: table.grid_color.to_string(),
        line_width: table.line_width,
        show_grid: table.show_grid,
        padding: style.padding.clone().unwrap_or(Padding {
            top: 60.0,
            right: 40.0,
            bottom: 60.0,
            left: 60.0,
        }),
        overrides: style.overrides.clone().unwrap_or_default(),
    }
}

/// Recursively merge `overrides` into `target`; override values win
pub fn merge_overrides(target: &mut Value, overrides: &Map<String, Value>) {
    let Value::Object(target_map) = target else {
        return;
    };
    for (key, value) in overrides {
        match (target_map.get_mut(key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(nested)) => {
                merge_overrides(existing, nested);
            }
            _ => {
                target_map.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{AxisSpec, ChartType, ColorSpec, DataSpec, FieldType};
    use serde_json::json;

    fn spec() -> ChartSpec {
        ChartSpec::new(
            ChartType::Bar,
            DataSpec {
                source_id: "s".into(),
                columns: vec![],
            },
            AxisSpec::new("x", FieldType::Nominal),
            AxisSpec::new("y", FieldType::Quantitative),
        )
    }

    #[test]
    fn test_preset_values() {
        let mut s = spec();
        s.style.preset = StylePreset::Ieee;
        let resolved = resolve_style(&s);
        assert_eq!(resolved.font_size, 8.0);
        assert_eq!(resolved.colors[0], "#000000");
    }

    #[test]
    fn test_override_wins_over_preset() {
        let mut s = spec();
        s.style.preset = StylePreset::Science;
        s.style.font_size = Some(20.0);
        s.style.background = Some("#fafafa".into());
        let resolved = resolve_style(&s);
        assert_eq!(resolved.font_size, 20.0);
        assert_eq!(resolved.background, "#fafafa");
        assert_eq!(resolved.font_family, "Times New Roman, serif");
    }

    #[test]
    fn test_color_precedence() {
        let mut s = spec();
        s.style.colors = Some(vec!["#111111".into()]);
        s.encoding.color = Some(ColorSpec {
            field: "g".into(),
            field_type: FieldType::Nominal,
            scheme: Some(ColorScheme::Set2),
            range: None,
            legend: None,
        });
        assert_eq!(resolve_style(&s).colors, vec!["#111111"]);

        s.encoding.color.as_mut().unwrap().range = Some(vec!["#222222".into()]);
        assert_eq!(resolve_style(&s).colors, vec!["#222222"]);

        s.style.colors = None;
        s.encoding.color.as_mut().unwrap().range = None;
        assert_eq!(resolve_style(&s).colors[0], "#66c2a5");
    }

    #[test]
    fn test_merge_overrides_is_deep() {
        let mut target = json!({ "legend": { "show": true, "top": 0 }, "animation": true });
        let overrides = json!({ "legend": { "top": 10 }, "animation": false });
        merge_overrides(&mut target, overrides.as_object().unwrap());
        assert_eq!(target, json!({ "legend": { "show": true, "top": 10 }, "animation": false }));
    }
}
