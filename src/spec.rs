//! Chart specification model
//!
//! A [`ChartSpec`] is the versioned, declarative description of one chart. Values are
//! immutable by convention: every edit goes through the patch engine and yields a new
//! spec. Wire names are camelCase and optional fields are omitted when absent, so a
//! serialized spec always re-validates against the embedded schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only supported spec format version
pub const SPEC_VERSION: &str = "1.0";

/// One raw tabular record supplied by the row source
pub type Row = Map<String, Value>;

// =============================================================================
// Enumerations
// =============================================================================

/// Supported chart types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartType {
    Bar,
    GroupedBar,
    StackedBar,
    Line,
    Scatter,
    Boxplot,
    Histogram,
    ErrorBar,
    Heatmap,
    Violin,
    /// Kaplan-Meier survival step curve
    KmCurve,
    /// Receiver operating characteristic curve
    RocCurve,
}

impl ChartType {
    pub const ALL: [ChartType; 12] = [
        ChartType::Bar,
        ChartType::GroupedBar,
        ChartType::StackedBar,
        ChartType::Line,
        ChartType::Scatter,
        ChartType::Boxplot,
        ChartType::Histogram,
        ChartType::ErrorBar,
        ChartType::Heatmap,
        ChartType::Violin,
        ChartType::KmCurve,
        ChartType::RocCurve,
    ];

    /// Wire name of this chart type
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::GroupedBar => "grouped-bar",
            ChartType::StackedBar => "stacked-bar",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Boxplot => "boxplot",
            ChartType::Histogram => "histogram",
            ChartType::ErrorBar => "error-bar",
            ChartType::Heatmap => "heatmap",
            ChartType::Violin => "violin",
            ChartType::KmCurve => "km-curve",
            ChartType::RocCurve => "roc-curve",
        }
    }

    /// Chart types that group raw rows themselves; the generic `aggregate`
    /// block is not applied ahead of them.
    pub fn groups_internally(&self) -> bool {
        matches!(
            self,
            ChartType::Histogram
                | ChartType::Boxplot
                | ChartType::Violin
                | ChartType::Scatter
                | ChartType::Heatmap
                | ChartType::ErrorBar
                | ChartType::GroupedBar
                | ChartType::StackedBar
                | ChartType::KmCurve
                | ChartType::RocCurve
        )
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type of a column or encoded field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Quantitative,
    Nominal,
    Ordinal,
    Temporal,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Quantitative => "quantitative",
            FieldType::Nominal => "nominal",
            FieldType::Ordinal => "ordinal",
            FieldType::Temporal => "temporal",
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FieldType::Nominal | FieldType::Ordinal)
    }
}

/// Reducer applied by an [`AggregateSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Median,
    Sum,
    Count,
    Min,
    Max,
}

/// Error-bar statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorBarType {
    /// Confidence interval of the mean
    Ci,
    /// Standard error of the mean
    Stderr,
    /// Sample standard deviation
    Stdev,
    /// Interquartile range around the mean (asymmetric)
    Iqr,
}

/// Named style preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    #[default]
    Default,
    Science,
    Ieee,
    Grayscale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    Linear,
    Log,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendPosition {
    Top,
    Bottom,
    Left,
    Right,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Category10,
    Tableau10,
    Set2,
    Pastel,
    Viridis,
    Blues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDash {
    Solid,
    Dashed,
    Dotted,
}

// =============================================================================
// Data block
// =============================================================================

/// Column metadata derived once from the row source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub unique_count: u64,
    #[serde(default)]
    pub sample_values: Vec<Value>,
    pub has_null: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataSpec {
    /// Opaque reference to the external row source
    pub source_id: String,
    pub columns: Vec<ColumnMeta>,
}

impl DataSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

// =============================================================================
// Encoding block
// =============================================================================

/// Axis scale descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScaleSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub scale_type: Option<ScaleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero: Option<bool>,
}

/// Explicit axis domain: numeric bounds or an ordered category list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Domain {
    Numeric([f64; 2]),
    Categories(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AxisSpec {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
}

impl AxisSpec {
    pub fn new(field: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field: field.into(),
            field_type,
            title: None,
            label_angle: None,
            title_font_size: None,
            label_font_size: None,
            format: None,
            grid: None,
            scale: None,
            sort: None,
        }
    }

    /// Axis title, falling back to the field name
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.field)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegendSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<LegendPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColorSpec {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<ColorScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<LegendSpec>,
}

/// Field reference used by the shape and size channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldRef {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncodingSpec {
    pub x: AxisSpec,
    pub y: AxisSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<FieldRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FieldRef>,
}

impl EncodingSpec {
    /// Every (channel, field) pair named by this encoding
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![("x", self.x.field.as_str()), ("y", self.y.field.as_str())];
        if let Some(color) = &self.color {
            fields.push(("color", color.field.as_str()));
        }
        if let Some(shape) = &self.shape {
            fields.push(("shape", shape.field.as_str()));
        }
        if let Some(size) = &self.size {
            fields.push(("size", size.field.as_str()));
        }
        fields
    }

    pub fn color_field(&self) -> Option<&str> {
        self.color.as_ref().map(|c| c.field.as_str())
    }
}

// =============================================================================
// Statistics blocks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorBarSpec {
    #[serde(rename = "type")]
    pub bar_type: ErrorBarType,
    /// Confidence level for `ci`, as a fraction (0.95) or a percentage (95)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AggregateSpec {
    pub y: Reducer,
    #[serde(default)]
    pub group_by: Vec<String>,
}

// =============================================================================
// Style, annotations, export
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StyleSpec {
    #[serde(default)]
    pub preset: StylePreset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Padding>,
    /// Free-form bag merged last into the backend option root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Map<String, Value>>,
}

/// Annotation coordinate: a data value or a category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coord {
    Number(f64),
    Label(String),
}

impl Coord {
    pub fn to_value(&self) -> Value {
        match self {
            Coord::Number(n) => serde_json::json!(n),
            Coord::Label(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Annotation {
    #[serde(rename_all = "camelCase")]
    Text {
        x: Coord,
        y: Coord,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_size: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Line {
        x1: Coord,
        y1: Coord,
        x2: Coord,
        y2: Coord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dash: Option<LineDash>,
    },
    #[serde(rename_all = "camelCase")]
    Rect {
        x1: Coord,
        y1: Coord,
        x2: Coord,
        y2: Coord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: ExportFormat,
    /// Dots per inch, 72..=1200
    pub dpi: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent: Option<bool>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            dpi: 300,
            width: None,
            height: None,
            transparent: None,
        }
    }
}

impl ExportConfig {
    /// Device pixel ratio relative to a 96 dpi screen
    pub fn pixel_ratio(&self) -> f64 {
        f64::from(self.dpi) / 96.0
    }
}

// =============================================================================
// Root
// =============================================================================

/// The root chart specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChartSpec {
    pub version: String,
    pub chart_type: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub data: DataSpec,
    pub encoding: EncodingSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_bar: Option<ErrorBarSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateSpec>,
    #[serde(default)]
    pub style: StyleSpec,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub export_config: ExportConfig,
}

impl ChartSpec {
    /// Create a spec with default style and export settings
    pub fn new(chart_type: ChartType, data: DataSpec, x: AxisSpec, y: AxisSpec) -> Self {
        Self {
            version: SPEC_VERSION.to_string(),
            chart_type,
            title: None,
            data,
            encoding: EncodingSpec {
                x,
                y,
                color: None,
                shape: None,
                size: None,
            },
            error_bar: None,
            aggregate: None,
            style: StyleSpec::default(),
            annotations: Vec::new(),
            export_config: ExportConfig::default(),
        }
    }

    /// Serialize to a JSON value tree
    pub fn to_value(&self) -> Value {
        // Every field serializes to plain JSON; this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_type_wire_names() {
        for chart_type in ChartType::ALL {
            let json = serde_json::to_value(chart_type).unwrap();
            assert_eq!(json, Value::String(chart_type.as_str().to_string()));
        }
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let spec = ChartSpec::new(
            ChartType::Bar,
            DataSpec {
                source_id: "src".into(),
                columns: vec![],
            },
            AxisSpec::new("g", FieldType::Nominal),
            AxisSpec::new("v", FieldType::Quantitative),
        );
        let value = spec.to_value();
        assert!(value.get("title").is_none());
        assert!(value.get("errorBar").is_none());
        assert!(value["encoding"].get("color").is_none());
        assert_eq!(value["exportConfig"]["dpi"], 300);
    }

    #[test]
    fn test_annotation_tagging() {
        let ann: Annotation = serde_json::from_value(serde_json::json!({
            "type": "text", "x": "A", "y": 3, "text": "peak", "fontSize": 14
        }))
        .unwrap();
        match ann {
            Annotation::Text { x, y, font_size, .. } => {
                assert_eq!(x, Coord::Label("A".into()));
                assert_eq!(y, Coord::Number(3.0));
                assert_eq!(font_size, Some(14.0));
            }
            other => panic!("Expected text annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregation_gate() {
        assert!(!ChartType::Bar.groups_internally());
        assert!(!ChartType::Line.groups_internally());
        assert!(ChartType::GroupedBar.groups_internally());
        assert!(ChartType::Histogram.groups_internally());
    }
}
