//! Strict structural validation
//!
//! Two JSON Schemas are embedded at compile time: the full chart spec schema and the
//! narrower AI-edit response schema. Every fixed-shape object in both is closed
//! (`additionalProperties: false`), so untrusted partial JSON can only ever land in
//! places the schema names.

use std::collections::HashSet;
use std::sync::OnceLock;

use include_dir::{include_dir, Dir};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::ai_edit::AiEditResponse;
use crate::error::{ValidationError, ValidationIssue};
use crate::spec::ChartSpec;

static SCHEMA_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// File name of the chart spec schema
pub const SPEC_SCHEMA_FILE: &str = "chart-spec.schema.json";
/// File name of the AI-edit response schema
pub const AI_EDIT_RESPONSE_SCHEMA_FILE: &str = "ai-edit-response.schema.json";

/// Compiled validators for both embedded schemas
pub struct SchemaValidator {
    spec: JSONSchema,
    ai_edit_response: JSONSchema,
}

impl SchemaValidator {
    /// Compile both embedded schemas
    pub fn new() -> Result<Self, String> {
        Ok(Self {
            spec: compile_embedded(SPEC_SCHEMA_FILE)?,
            ai_edit_response: compile_embedded(AI_EDIT_RESPONSE_SCHEMA_FILE)?,
        })
    }

    /// Process-wide validator, compiled on first use
    pub fn shared() -> Result<&'static SchemaValidator, ValidationError> {
        static SHARED: OnceLock<Result<SchemaValidator, String>> = OnceLock::new();
        SHARED
            .get_or_init(SchemaValidator::new)
            .as_ref()
            .map_err(|e| ValidationError::single("", format!("schema unavailable: {}", e)))
    }

    /// Structural issues of a spec candidate (empty when valid)
    pub fn spec_issues(&self, candidate: &Value) -> Vec<ValidationIssue> {
        let mut issues = collect_issues(&self.spec, candidate);
        if issues.is_empty() {
            issues.extend(duplicate_column_issues(candidate));
        }
        issues
    }

    /// Structural issues of an AI-edit response candidate (empty when valid)
    pub fn ai_edit_response_issues(&self, candidate: &Value) -> Vec<ValidationIssue> {
        collect_issues(&self.ai_edit_response, candidate)
    }

    /// Validate and convert a spec candidate
    pub fn validate_spec(&self, candidate: &Value) -> Result<ChartSpec, ValidationError> {
        let issues = self.spec_issues(candidate);
        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }
        serde_json::from_value(candidate.clone())
            .map_err(|e| ValidationError::single("", e.to_string()))
    }

    /// Validate and convert an AI-edit response candidate
    pub fn validate_ai_edit_response(
        &self,
        candidate: &Value,
    ) -> Result<AiEditResponse, ValidationError> {
        let issues = self.ai_edit_response_issues(candidate);
        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }
        serde_json::from_value(candidate.clone())
            .map_err(|e| ValidationError::single("", e.to_string()))
    }
}

/// Raw text of an embedded schema
pub fn embedded_schema(file_name: &str) -> Option<&'static str> {
    SCHEMA_DIR.get_file(file_name).and_then(|f| f.contents_utf8())
}

fn compile_embedded(file_name: &str) -> Result<JSONSchema, String> {
    let text = embedded_schema(file_name)
        .ok_or_else(|| format!("embedded schema {} not found", file_name))?;
    let schema: Value =
        serde_json::from_str(text).map_err(|e| format!("{}: {}", file_name, e))?;
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| format!("{}: {}", file_name, e))
}

fn collect_issues(schema: &JSONSchema, candidate: &Value) -> Vec<ValidationIssue> {
    match schema.validate(candidate) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| ValidationIssue::new(e.instance_path.to_string(), e.to_string()))
            .collect(),
    }
}

/// Column names must be unique; JSON Schema cannot express uniqueness by key.
fn duplicate_column_issues(candidate: &Value) -> Vec<ValidationIssue> {
    let Some(columns) = candidate.pointer("/data/columns").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    columns
        .iter()
        .enumerate()
        .filter_map(|(i, column)| {
            let name = column.get("name")?.as_str()?;
            if seen.insert(name) {
                None
            } else {
                Some(ValidationIssue::new(
                    format!("/data/columns/{}/name", i),
                    format!("duplicate column name '{}'", name),
                ))
            }
        })
        .collect()
}

/// Validate a candidate spec against the strict schema
pub fn validate_spec(candidate: &Value) -> Result<ChartSpec, ValidationError> {
    SchemaValidator::shared()?.validate_spec(candidate)
}

/// Parse and validate a spec from JSON text
pub fn validate_spec_str(json: &str) -> Result<ChartSpec, ValidationError> {
    let candidate: Value = serde_json::from_str(json)
        .map_err(|e| ValidationError::single("", format!("invalid JSON: {}", e)))?;
    validate_spec(&candidate)
}

/// Validate a candidate AI-edit response against its own, narrower schema
pub fn validate_ai_edit_response(candidate: &Value) -> Result<AiEditResponse, ValidationError> {
    SchemaValidator::shared()?.validate_ai_edit_response(candidate)
}
