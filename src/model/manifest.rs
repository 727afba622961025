use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::package::error::{ManifestError, PersistError};

const DEPENDENCIES_KEY: &str = "dependencies";

/// What a merge did to the dependency mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Unchanged,
    Replaced { previous: String },
}

/// The project's dependency manifest.
///
/// Only the `dependencies` mapping is interpreted. Every other top-level
/// key is carried through untouched, in its original position.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    /// Top-level fields; the `dependencies` slot holds a placeholder.
    fields: Map<String, Value>,
    dependencies: Map<String, Value>,
}

impl Default for ManifestDocument {
    fn default() -> Self {
        let mut fields = Map::new();
        fields.insert(DEPENDENCIES_KEY.to_string(), Value::Null);
        Self {
            fields,
            dependencies: Map::new(),
        }
    }
}

impl ManifestDocument {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        let Value::Object(mut fields) = value else {
            return Err("manifest is not a JSON object".to_string());
        };

        let dependencies = match fields.get_mut(DEPENDENCIES_KEY) {
            None => {
                fields.insert(DEPENDENCIES_KEY.to_string(), Value::Null);
                Map::new()
            }
            Some(slot) => match slot.take() {
                Value::Object(entries) => entries,
                Value::Null => Map::new(),
                _ => return Err("`dependencies` must be an object".to_string()),
            },
        };

        if let Some((name, _)) = dependencies.iter().find(|(_, v)| !v.is_string()) {
            return Err(format!("dependency `{name}` must map to a string"));
        }

        Ok(Self {
            fields,
            dependencies,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut fields = self.fields.clone();
        if let Some(slot) = fields.get_mut(DEPENDENCIES_KEY) {
            *slot = Value::Object(self.dependencies.clone());
        }
        let mut raw = serde_json::to_string_pretty(&Value::Object(fields))?;
        raw.push('\n');
        Ok(raw)
    }

    /// Upsert `name -> locator`. Last write wins.
    pub fn merge(&mut self, name: &str, locator: &str) -> MergeOutcome {
        match self
            .dependencies
            .insert(name.to_string(), Value::String(locator.to_string()))
        {
            None => MergeOutcome::Inserted,
            Some(Value::String(previous)) if previous == locator => MergeOutcome::Unchanged,
            Some(previous) => MergeOutcome::Replaced {
                previous: previous.as_str().map(str::to_string).unwrap_or_default(),
            },
        }
    }

    /// Undo a `merge` of `name` that produced `outcome`.
    pub fn revert(&mut self, name: &str, outcome: &MergeOutcome) {
        match outcome {
            // The inserted key is the last entry, so removal keeps the order.
            MergeOutcome::Inserted => {
                self.dependencies.remove(name);
            }
            MergeOutcome::Replaced { previous } => {
                self.dependencies
                    .insert(name.to_string(), Value::String(previous.clone()));
            }
            MergeOutcome::Unchanged => {}
        }
    }

    /// Dependency entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dependencies
            .iter()
            .filter_map(|(name, locator)| Some((name.as_str(), locator.as_str()?)))
    }

    pub fn names(&self) -> Vec<String> {
        self.dependencies.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Loads and persists the manifest at a fixed path.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ManifestDocument, ManifestError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(ManifestError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        ManifestDocument::from_json(&raw).map_err(|reason| ManifestError::Malformed {
            path: self.path.clone(),
            reason,
        })
    }

    /// Rewrite the whole document. The new content is written to a sibling
    /// temp file and renamed over the manifest, so readers see either the
    /// old or the new document.
    pub fn persist(&self, doc: &ManifestDocument) -> Result<(), PersistError> {
        self.write_atomic(doc).map_err(|source| PersistError {
            path: self.path.clone(),
            source,
        })
    }

    fn write_atomic(&self, doc: &ManifestDocument) -> io::Result<()> {
        let raw = doc.to_json()?;
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".manifest-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}
