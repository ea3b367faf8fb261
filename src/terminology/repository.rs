/*!
 * Persistence of terminologies by identifier.
 */

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

use super::Terminology;
use crate::errors::{Error, Result};

static ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Invalid terminology id regex"));

/// Storage for terminologies keyed by an identifier
pub trait TerminologyRepository: Send + Sync {
    /// Load a terminology, `None` when nothing is stored under the id
    fn load(&self, id: &str) -> Result<Option<Terminology>>;

    /// Store a terminology, replacing any previous one
    fn save(&self, id: &str, terminology: &Terminology) -> Result<()>;

    fn exists(&self, id: &str) -> Result<bool>;
}

fn validate_id(id: &str) -> Result<()> {
    if !ID_REGEX.is_match(id) || id.chars().all(|c| c == '.') {
        return Err(Error::terminology(format!("Invalid terminology id '{}'", id)).with_context("id", id));
    }
    Ok(())
}

/// In-memory repository, mostly useful in tests
#[derive(Debug, Default)]
pub struct MemoryTerminologyRepository {
    entries: RwLock<HashMap<String, Terminology>>,
}

impl MemoryTerminologyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TerminologyRepository for MemoryTerminologyRepository {
    fn load(&self, id: &str) -> Result<Option<Terminology>> {
        validate_id(id)?;
        Ok(self.entries.read().get(id).cloned())
    }

    fn save(&self, id: &str, terminology: &Terminology) -> Result<()> {
        validate_id(id)?;
        self.entries.write().insert(id.to_string(), terminology.clone());
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        Ok(self.entries.read().contains_key(id))
    }
}

/// One `<id>.json` file per terminology in a directory
#[derive(Debug, Clone)]
pub struct JsonFileTerminologyRepository {
    dir: PathBuf,
}

impl JsonFileTerminologyRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl TerminologyRepository for JsonFileTerminologyRepository {
    fn load(&self, id: &str) -> Result<Option<Terminology>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            Error::terminology("Failed to read terminology file")
                .with_cause(e)
                .with_context("path", path.display())
        })?;
        let terminology = serde_json::from_str(&content).map_err(|e| {
            Error::terminology("Terminology file is not valid JSON")
                .with_cause(e)
                .with_context("path", path.display())
        })?;
        debug!("Loaded terminology '{}' from {}", id, path.display());
        Ok(Some(terminology))
    }

    fn save(&self, id: &str, terminology: &Terminology) -> Result<()> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::terminology("Failed to create terminology directory")
                .with_cause(e)
                .with_context("path", self.dir.display())
        })?;

        let json = serde_json::to_string_pretty(terminology)
            .map_err(|e| Error::terminology("Failed to serialize terminology").with_cause(e))?;
        fs::write(&path, json + "\n").map_err(|e| {
            Error::terminology("Failed to write terminology file")
                .with_cause(e)
                .with_context("path", path.display())
        })?;
        debug!("Saved terminology '{}' to {}", id, path.display());
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.path_for(id)?.exists())
    }
}
