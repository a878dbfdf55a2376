//! Graph Studio Chart Engine
//!
//! A declarative, versioned chart specification that can be validated against a strict
//! schema, edited safely through a constrained patch protocol driven by a text-generation
//! service, and compiled into the option format of two rendering backends.
//!
//! ## Features
//!
//! - **Strict Schema**: Specs and AI-edit responses are checked against embedded JSON Schemas
//! - **Guarded Patching**: JSON-Pointer patches are atomic and never touch read-only paths
//! - **AI Editing**: One bounded generator call per edit, with distinguishable failure modes
//! - **Shared Statistics**: Both backends read every number from one aggregation pipeline
//! - **Project Store**: Checksummed specs persisted as JSON files
//!
//! ## Architecture
//!
//! ```text
//! ChartSpec ──► ai_edit (prompt → generator → extract → validate → guard)
//!     │                          │
//!     │                          ▼
//!     │                    patch (apply → re-validate)
//!     ▼                          │
//! render ◄───────────────────────┘
//!   ├── data ──► stats (aggregate, pivot, summary, error_bar, curves)
//!   ├── echarts
//!   └── plotly
//! ```

pub mod ai_edit;
pub mod checksum;
pub mod config;
pub mod error;
pub mod infer;
pub mod patch;
pub mod render;
pub mod schema;
pub mod spec;
pub mod stats;
pub mod store;
pub mod style;

pub use ai_edit::{AiEditConfig, AiEditResponse, AiEditor, OpenAiCompatibleGenerator, TextGenerator};
pub use checksum::Checksum;
pub use config::EngineConfig;
pub use error::{
    AiEditError, PatchError, ProviderError, RenderError, StoreError, ValidationError, ValidationIssue,
};
pub use patch::{Patch, PatchEngine, PatchOp};
pub use render::{render, Backend};
pub use schema::{validate_ai_edit_response, validate_spec, validate_spec_str, SchemaValidator};
pub use spec::{ChartSpec, ChartType, Row, SPEC_VERSION};
pub use store::{FileProjectStore, MemoryProjectStore, Project, ProjectStore};
