//! AI-Edit Protocol
//!
//! Turns a free-text instruction into a validated patch list:
//!
//! ```text
//! spec + columns + message
//!   -> system/user prompts (no row data)
//!   -> TextGenerator (one call, bounded by timeout and caller cancellation)
//!   -> fenced/embedded JSON extraction
//!   -> AI-edit response schema
//!   -> read-only path guard
//!   -> AiEditResponse (consumed once by the patch engine)
//! ```
//!
//! Failures stay distinguishable: nothing came back, came back unusable, or came back
//! well-formed but touching a protected path.

pub mod extract;
pub mod prompt;
pub mod provider;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AiEditError;
use crate::patch::{Patch, PatchEngine};
use crate::schema::validate_ai_edit_response;
use crate::spec::{ChartSpec, FieldType};

pub use provider::{GenerationOptions, OpenAiCompatibleGenerator, TextGenerator};

/// Characters of raw model output kept in parse-failure previews
pub const PREVIEW_CHARS: usize = 200;

/// Validated output of the text-generation collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiEditResponse {
    pub patches: Vec<Patch>,
    pub explanation: String,
    pub confidence: f64,
}

/// Limits and sampling options for one editor
#[derive(Debug, Clone, PartialEq)]
pub struct AiEditConfig {
    pub generation: GenerationOptions,
    pub timeout: Duration,
    /// Character budget for the serialized spec inside the user prompt
    pub prompt_char_budget: usize,
    /// Category labels listed per categorical column
    pub sample_labels: usize,
}

impl Default for AiEditConfig {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            timeout: Duration::from_secs(30),
            prompt_char_budget: 6000,
            sample_labels: 5,
        }
    }
}

/// Drives one text generator through the edit protocol
pub struct AiEditor<G> {
    generator: G,
    config: AiEditConfig,
    engine: PatchEngine,
}

impl<G: TextGenerator> AiEditor<G> {
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, AiEditConfig::default(), PatchEngine::default())
    }

    pub fn with_config(generator: G, config: AiEditConfig, engine: PatchEngine) -> Self {
        Self {
            generator,
            config,
            engine,
        }
    }

    pub fn config(&self) -> &AiEditConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Request an edit without external cancellation
    pub async fn edit_chart(
        &self,
        spec: &ChartSpec,
        column_names: &[String],
        data_types: &[FieldType],
        user_message: &str,
    ) -> Result<AiEditResponse, AiEditError> {
        self.edit_chart_with_cancel(
            spec,
            column_names,
            data_types,
            user_message,
            std::future::pending::<()>(),
        )
        .await
    }

    /// Request an edit; resolving `cancel` abandons the call as `NoResponse`
    pub async fn edit_chart_with_cancel<C>(
        &self,
        spec: &ChartSpec,
        column_names: &[String],
        data_types: &[FieldType],
        user_message: &str,
        cancel: C,
    ) -> Result<AiEditResponse, AiEditError>
    where
        C: Future<Output = ()>,
    {
        let system = prompt::system_prompt(self.engine.readonly_paths());
        let user = prompt::user_prompt(
            spec,
            column_names,
            data_types,
            user_message,
            self.config.prompt_char_budget,
            self.config.sample_labels,
        );

        let call = tokio::time::timeout(
            self.config.timeout,
            self.generator.generate(&system, &user, &self.config.generation),
        );

        let outcome = tokio::select! {
            result = call => result,
            _ = cancel => {
                return Err(AiEditError::NoResponse { reason: "cancelled".to_string() });
            }
        };

        let text = match outcome {
            Err(_) => {
                return Err(AiEditError::NoResponse {
                    reason: format!("timed out after {:?}", self.config.timeout),
                })
            }
            Ok(Err(e)) => {
                warn!(error = %e, "text generator failed");
                return Err(AiEditError::NoResponse {
                    reason: e.to_string(),
                });
            }
            Ok(Ok(None)) => {
                return Err(AiEditError::NoResponse {
                    reason: "empty response".to_string(),
                })
            }
            Ok(Ok(Some(text))) if text.trim().is_empty() => {
                return Err(AiEditError::NoResponse {
                    reason: "empty response".to_string(),
                })
            }
            Ok(Ok(Some(text))) => text,
        };

        let response = self.parse_response(&text)?;
        debug!(
            patches = response.patches.len(),
            confidence = response.confidence,
            "accepted edit response"
        );
        Ok(response)
    }

    /// Extract, validate and guard a raw model response
    pub fn parse_response(&self, text: &str) -> Result<AiEditResponse, AiEditError> {
        parse_edit_response(text, &self.engine)
    }

    /// Request an edit and apply it, returning the new spec alongside the response
    pub async fn edit_and_apply(
        &self,
        spec: &ChartSpec,
        column_names: &[String],
        data_types: &[FieldType],
        user_message: &str,
    ) -> Result<(ChartSpec, AiEditResponse), AiEditError> {
        let response = self
            .edit_chart(spec, column_names, data_types, user_message)
            .await?;
        let next = self.engine.apply_and_validate(spec, &response.patches)?;
        Ok((next, response))
    }
}

/// Extract, validate and guard a raw model response
pub fn parse_edit_response(
    text: &str,
    engine: &PatchEngine,
) -> Result<AiEditResponse, AiEditError> {
    let json_text = extract::extract_json(text).ok_or_else(|| AiEditError::ParseFailed {
        reason: "no JSON object found".to_string(),
        preview: extract::preview(text, PREVIEW_CHARS),
    })?;

    let candidate: Value =
        serde_json::from_str(json_text).map_err(|e| AiEditError::ParseFailed {
            reason: e.to_string(),
            preview: extract::preview(text, PREVIEW_CHARS),
        })?;

    let response = validate_ai_edit_response(&candidate).map_err(AiEditError::ValidationFailed)?;

    if let Some(path) = engine.find_readonly_violation(&response.patches) {
        warn!(path, "edit response touches read-only path");
        return Err(AiEditError::ReadonlyPathViolation {
            path: path.to_string(),
        });
    }

    Ok(response)
}
