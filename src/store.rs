//! Project persistence
//!
//! A project is a named, checksummed spec. Raw rows are never stored; the spec's
//! `data.sourceId` is the only link back to them. Every load re-verifies the checksum and
//! re-validates the spec against the schema.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::error::StoreError;
use crate::schema::validate_spec;
use crate::spec::{ChartSpec, ChartType};

/// A saved chart project
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub spec: ChartSpec,
    pub checksum: Checksum,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// New project with a fresh id
    pub fn new(name: impl Into<String>, spec: ChartSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            checksum: Checksum::of_spec(&spec),
            spec,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the spec, refreshing checksum and modification time
    pub fn update_spec(&mut self, spec: ChartSpec) {
        self.checksum = Checksum::of_spec(&spec);
        self.spec = spec;
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            chart_type: self.spec.chart_type,
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub chart_type: ChartType,
    pub updated_at: DateTime<Utc>,
}

/// On-disk shape; the spec stays raw until it has been re-validated
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProject {
    id: String,
    name: String,
    spec: Value,
    checksum: Checksum,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn decode(record: Value) -> Result<Project, StoreError> {
    let stored: StoredProject = serde_json::from_value(record)?;
    let spec = validate_spec(&stored.spec)?;
    let actual = Checksum::of_spec(&spec);
    if actual != stored.checksum {
        return Err(StoreError::ChecksumMismatch {
            id: stored.id,
            expected: stored.checksum.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(Project {
        id: stored.id,
        name: stored.name,
        spec,
        checksum: stored.checksum,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    })
}

fn newest_first(mut summaries: Vec<ProjectSummary>) -> Vec<ProjectSummary> {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries
}

/// Key-value persistence of projects
pub trait ProjectStore: Send + Sync {
    /// Summaries of every loadable project, newest first
    fn list(&self) -> Result<Vec<ProjectSummary>, StoreError>;

    fn load(&self, id: &str) -> Result<Project, StoreError>;

    /// Insert or overwrite by id
    fn save(&self, project: &Project) -> Result<(), StoreError>;

    /// Remove by id; removing an absent project succeeds
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Save, logging instead of propagating failures
pub fn save_or_warn(store: &dyn ProjectStore, project: &Project) -> bool {
    match store.save(project) {
        Ok(()) => true,
        Err(e) => {
            warn!(id = %project.id, error = %e, "Failed to save project");
            false
        }
    }
}

/// Delete, logging instead of propagating failures
pub fn delete_or_warn(store: &dyn ProjectStore, id: &str) -> bool {
    match store.delete(id) {
        Ok(()) => true,
        Err(e) => {
            warn!(id = %id, error = %e, "Failed to delete project");
            false
        }
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// One pretty-printed JSON file per project under a root directory
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    root: PathBuf,
}

impl FileProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a project file; ids that could escape the root are unknown ids
    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

impl ProjectStore for FileProjectStore {
    fn list(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let loaded = fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?))
                .and_then(decode);
            match loaded {
                Ok(project) => summaries.push(project.summary()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable project"),
            }
        }
        Ok(newest_first(summaries))
    }

    fn load(&self, id: &str) -> Result<Project, StoreError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        let project = decode(serde_json::from_str(&content)?)?;
        debug!(id = %id, "Loaded project");
        Ok(project)
    }

    fn save(&self, project: &Project) -> Result<(), StoreError> {
        let path = self.path_for(&project.id)?;
        fs::create_dir_all(&self.root)?;
        let content = serde_json::to_string_pretty(project)?;
        // Write-then-rename so a crash never leaves a half-written project
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        debug!(id = %project.id, path = %path.display(), "Saved project");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id = %id, "Deleted project");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(id = %id, "Project already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store holding serialized records
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    records: Mutex<BTreeMap<String, Value>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        // A poisoned map is still structurally sound
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrite a stored record verbatim
    pub fn insert_raw(&self, id: impl Into<String>, record: Value) {
        self.records().insert(id.into(), record);
    }
}

impl ProjectStore for MemoryProjectStore {
    fn list(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        let records = self.records();
        let summaries = records
            .values()
            .filter_map(|r| decode(r.clone()).ok())
            .map(|p| p.summary())
            .collect();
        Ok(newest_first(summaries))
    }

    fn load(&self, id: &str) -> Result<Project, StoreError> {
        let record = self
            .records()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        decode(record)
    }

    fn save(&self, project: &Project) -> Result<(), StoreError> {
        let record = serde_json::to_value(project)?;
        self.records().insert(project.id.clone(), record);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records().remove(id);
        Ok(())
    }
}
