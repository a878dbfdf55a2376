//! Prompt construction
//!
//! Row data never enters a prompt. The spec is serialized with column sample values
//! stripped and cut to a character budget; a separate short column list carries a
//! handful of category labels so the model can reference real values.

use serde_json::Value;

use crate::spec::{ChartSpec, ChartType, FieldType};

/// Appended when the serialized spec exceeds the budget
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// System instruction describing the spec shape and the output contract
pub fn system_prompt(readonly_paths: &[String]) -> String {
    let chart_types = ChartType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You edit chart specifications. A spec is a JSON object with these top-level keys:
- version: format version string (read-only)
- chartType: one of {chart_types}
- title: optional string
- data: {{ sourceId, columns: [{{ name, type, uniqueCount, hasNull }}] }} (read-only)
- encoding: {{ x: axis, y: axis, color?: {{ field, type, scheme?, range?, legend?: {{ position?, title? }} }}, shape?: {{ field, type }}, size?: {{ field, type }} }}
  axis = {{ field, type, title?, labelAngle?, titleFontSize?, labelFontSize?, format?, grid?, scale?: {{ type?, domain?, zero? }}, sort? }}
  type is one of quantitative, nominal, ordinal, temporal
- errorBar: optional {{ type: ci | stderr | stdev | iqr, value? }}
- aggregate: optional {{ y: mean | median | sum | count | min | max, groupBy: [field] }}
- style: {{ preset: default | science | ieee | grayscale, fontFamily?, fontSize?, titleFontSize?, colors?, background?, padding?, overrides? }}
- annotations: list of {{ type: text | line | rect, ... }}
- exportConfig: {{ format: png | svg | pdf, dpi (72-1200), width?, height?, transparent? }}

Respond with JSON only, no prose, in exactly this shape:
{{"patches": [{{"op": "add" | "replace" | "remove", "path": "/json/pointer", "value": ...}}], "explanation": "what changed and why", "confidence": 0.0-1.0}}

Rules:
- Use only field names that appear in the column list.
- Never modify these paths or anything beneath them: {readonly}.
- Use "add" to introduce optional blocks that are absent.
- Keep the patch list minimal."#,
        chart_types = chart_types,
        readonly = readonly_paths.join(", "),
    )
}

/// Spec serialization with column sample values removed
pub fn stripped_spec(spec: &ChartSpec) -> Value {
    let mut value = spec.to_value();
    if let Some(columns) = value
        .pointer_mut("/data/columns")
        .and_then(Value::as_array_mut)
    {
        for column in columns {
            if let Some(obj) = column.as_object_mut() {
                obj.remove("sampleValues");
            }
        }
    }
    value
}

/// Cut `text` to at most `budget` characters, marking the cut
pub fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut out: String = text.chars().take(budget).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Short column list with sample labels for categorical columns
pub fn column_summary(
    spec: &ChartSpec,
    column_names: &[String],
    data_types: &[FieldType],
    sample_labels: usize,
) -> String {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let field_type = data_types
                .get(i)
                .copied()
                .or_else(|| spec.data.column(name).map(|c| c.field_type));
            let type_label = field_type.map(|t| t.as_str()).unwrap_or("unknown");
            let samples = match (field_type, spec.data.column(name)) {
                (Some(t), Some(column)) if t.is_categorical() && sample_labels > 0 => column
                    .sample_values
                    .iter()
                    .take(sample_labels)
                    .map(label_of)
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            };
            if samples.is_empty() {
                format!("- {} ({})", name, type_label)
            } else {
                format!("- {} ({}): e.g. {}", name, type_label, samples.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn label_of(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

/// User message combining the stripped spec, the column list and the instruction
pub fn user_prompt(
    spec: &ChartSpec,
    column_names: &[String],
    data_types: &[FieldType],
    user_message: &str,
    char_budget: usize,
    sample_labels: usize,
) -> String {
    let spec_json = serde_json::to_string_pretty(&stripped_spec(spec)).unwrap_or_default();
    format!(
        "Current spec:\n{}\n\nColumns:\n{}\n\nRequest:\n{}",
        truncate_chars(&spec_json, char_budget),
        column_summary(spec, column_names, data_types, sample_labels),
        user_message.trim(),
    )
}
