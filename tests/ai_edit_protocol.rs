//! AI-Edit Protocol Tests
//!
//! Drives the editor with a scripted generator and checks that each failure mode
//! surfaces as its own error.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use graph_studio::ai_edit::{GenerationOptions, PREVIEW_CHARS};
use graph_studio::error::{AiEditError, ProviderError};
use graph_studio::spec::FieldType;
use graph_studio::{validate_spec_str, AiEditConfig, AiEditor, ChartSpec, ChartType, PatchEngine, TextGenerator};

enum Script {
    Reply(String),
    Nothing,
    Fail,
    Hang,
}

/// Generator that plays back one scripted outcome and records the prompts it saw
struct Scripted {
    script: Script,
    seen: Mutex<Vec<(String, String)>>,
}

impl Scripted {
    fn new(script: Script) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn reply(text: impl Into<String>) -> Self {
        Self::new(Script::Reply(text.into()))
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Option<String>, ProviderError> {
        self.seen
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        match &self.script {
            Script::Reply(text) => Ok(Some(text.clone())),
            Script::Nothing => Ok(None),
            Script::Fail => Err(ProviderError::MissingContent("upstream 503".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
        }
    }
}

fn fixture() -> ChartSpec {
    validate_spec_str(include_str!("fixtures/grouped_bar.spec.json")).unwrap()
}

fn columns(spec: &ChartSpec) -> (Vec<String>, Vec<FieldType>) {
    (
        spec.data.columns.iter().map(|c| c.name.clone()).collect(),
        spec.data.columns.iter().map(|c| c.field_type).collect(),
    )
}

fn quick_editor(script: Script) -> AiEditor<Scripted> {
    let config = AiEditConfig {
        timeout: Duration::from_millis(50),
        ..AiEditConfig::default()
    };
    AiEditor::with_config(Scripted::new(script), config, PatchEngine::default())
}

async fn edit(editor: &AiEditor<Scripted>, message: &str) -> Result<graph_studio::AiEditResponse, AiEditError> {
    let spec = fixture();
    let (names, types) = columns(&spec);
    editor.edit_chart(&spec, &names, &types, message).await
}

const STACK_RESPONSE: &str = r#"{"patches":[{"op":"replace","path":"/chartType","value":"stacked-bar"}],"explanation":"Stacked the regions","confidence":0.9}"#;

// =============================================================================
// Nothing came back
// =============================================================================

#[tokio::test]
async fn test_none_is_no_response() {
    let editor = AiEditor::new(Scripted::new(Script::Nothing));
    let err = edit(&editor, "stack it").await.unwrap_err();
    assert!(matches!(err, AiEditError::NoResponse { .. }));
}

#[tokio::test]
async fn test_blank_text_is_no_response() {
    let editor = AiEditor::new(Scripted::reply("  \n "));
    let err = edit(&editor, "stack it").await.unwrap_err();
    assert!(matches!(err, AiEditError::NoResponse { .. }));
}

#[tokio::test]
async fn test_provider_error_is_no_response() {
    let editor = AiEditor::new(Scripted::new(Script::Fail));
    match edit(&editor, "stack it").await.unwrap_err() {
        AiEditError::NoResponse { reason } => assert!(reason.contains("upstream 503")),
        other => panic!("Expected NoResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_no_response() {
    let editor = quick_editor(Script::Hang);
    match edit(&editor, "stack it").await.unwrap_err() {
        AiEditError::NoResponse { reason } => assert!(reason.contains("timed out")),
        other => panic!("Expected NoResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_is_no_response() {
    let editor = AiEditor::new(Scripted::new(Script::Hang));
    let spec = fixture();
    let (names, types) = columns(&spec);
    let err = editor
        .edit_chart_with_cancel(&spec, &names, &types, "stack it", async {})
        .await
        .unwrap_err();
    match err {
        AiEditError::NoResponse { reason } => assert_eq!(reason, "cancelled"),
        other => panic!("Expected NoResponse, got {:?}", other),
    }
}

// =============================================================================
// Something came back but is unusable
// =============================================================================

#[tokio::test]
async fn test_prose_is_parse_failure_with_bounded_preview() {
    let rambling = "Sure! ".repeat(100);
    let editor = AiEditor::new(Scripted::reply(rambling.clone()));
    match edit(&editor, "stack it").await.unwrap_err() {
        AiEditError::ParseFailed { preview, .. } => {
            assert!(preview.chars().count() <= PREVIEW_CHARS + 3);
            assert!(rambling.starts_with(preview.trim_end_matches("...")));
        }
        other => panic!("Expected ParseFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_broken_json_is_parse_failure() {
    let editor = AiEditor::new(Scripted::reply(r#"{"patches": [ {"op": "replace", "#));
    let err = edit(&editor, "stack it").await.unwrap_err();
    assert!(matches!(err, AiEditError::ParseFailed { .. }));
}

#[tokio::test]
async fn test_wrong_shape_is_validation_failure() {
    let editor = AiEditor::new(Scripted::reply(
        r#"{"patches":[{"op":"replace","path":"/title","value":"x"}],"explanation":"e","confidence":7}"#,
    ));
    match edit(&editor, "retitle").await.unwrap_err() {
        AiEditError::ValidationFailed(e) => assert!(!e.issues.is_empty()),
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_readonly_target_is_violation() {
    let editor = AiEditor::new(Scripted::reply(
        r#"{"patches":[{"op":"replace","path":"/title","value":"ok"},{"op":"remove","path":"/data/columns/1"}],"explanation":"e","confidence":0.4}"#,
    ));
    match edit(&editor, "drop region").await.unwrap_err() {
        AiEditError::ReadonlyPathViolation { path } => assert_eq!(path, "/data/columns/1"),
        other => panic!("Expected ReadonlyPathViolation, got {:?}", other),
    }
}

// =============================================================================
// Accepted responses
// =============================================================================

#[tokio::test]
async fn test_fenced_response_is_accepted() {
    let text = format!("Here you go:\n```json\n{}\n```\nLet me know!", STACK_RESPONSE);
    let editor = AiEditor::new(Scripted::reply(text));
    let response = edit(&editor, "stack it").await.unwrap();
    assert_eq!(response.patches.len(), 1);
    assert_eq!(response.explanation, "Stacked the regions");
    assert!((response.confidence - 0.9).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_edit_and_apply_returns_new_spec() {
    let editor = AiEditor::new(Scripted::reply(STACK_RESPONSE));
    let spec = fixture();
    let (names, types) = columns(&spec);

    let (next, response) = editor
        .edit_and_apply(&spec, &names, &types, "stack the regions")
        .await
        .unwrap();
    assert_eq!(next.chart_type, ChartType::StackedBar);
    assert_eq!(spec.chart_type, ChartType::GroupedBar);
    assert_eq!(response.patches[0].path, "/chartType");
}

#[tokio::test]
async fn test_apply_failure_keeps_original() {
    let editor = AiEditor::new(Scripted::reply(
        r#"{"patches":[{"op":"replace","path":"/chartType","value":"pie"}],"explanation":"e","confidence":0.3}"#,
    ));
    let spec = fixture();
    let (names, types) = columns(&spec);

    let err = editor
        .edit_and_apply(&spec, &names, &types, "make a pie")
        .await
        .unwrap_err();
    assert!(matches!(err, AiEditError::Patch(_)));
    assert_eq!(spec.chart_type, ChartType::GroupedBar);
}

#[tokio::test]
async fn test_prompts_carry_schema_not_rows() {
    let editor = AiEditor::new(Scripted::reply(STACK_RESPONSE));
    edit(&editor, "  stack it  ").await.unwrap();

    let seen = editor_prompts(&editor);
    let (system, user) = &seen[0];
    assert!(system.contains("/data, /version"));
    assert!(user.contains("- region (nominal): e.g. \"East\", \"West\""));
    assert!(user.ends_with("Request:\nstack it"));
    assert!(!user.contains("sampleValues"));
}

fn editor_prompts(editor: &AiEditor<Scripted>) -> Vec<(String, String)> {
    editor.generator().seen.lock().unwrap().clone()
}
