use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::package::error::ParseError;

/// A dependency declared by a package: its name and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub locator: String,
}

/// Package metadata read out of a fetched workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    /// In declaration order. Empty when the descriptor declares none.
    pub dependencies: Vec<Dependency>,
}

impl PackageDescriptor {
    /// Read `file_name` from the root of `workspace`.
    pub fn parse(workspace: &Path, file_name: &str) -> Result<Self, ParseError> {
        let path = workspace.join(file_name);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ParseError::NotFound(path));
            }
            Err(source) => return Err(ParseError::Read { path, source }),
        };

        Self::from_json(&raw, &path)
    }

    fn from_json(raw: &str, path: &Path) -> Result<Self, ParseError> {
        let malformed = |reason: String| ParseError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let value: Value = serde_json::from_str(raw).map_err(|err| malformed(err.to_string()))?;
        if !value.is_object() {
            return Err(malformed("descriptor is not a JSON object".to_string()));
        }
        let parsed: RawDescriptor =
            serde_json::from_value(value).map_err(|err| malformed(err.to_string()))?;

        let name = parsed
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ParseError::MissingName(path.to_path_buf()))?;
        let dependencies = parsed
            .dependencies
            .unwrap_or_default()
            .into_iter()
            .map(|(name, locator)| Dependency { name, locator })
            .collect();

        Ok(Self { name, dependencies })
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dependencies: Option<IndexMap<String, String>>,
}
