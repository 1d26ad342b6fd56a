//! Screen document loading.
//!
//! A screen is a JSON array of clause records stored as `{name}.screen`.
//! Every screen is prefixed by the shared prelude document `init.screen`,
//! which applies to all screens (typically liquidity and price floors).
//! Loading validates JSON shape only; enum validation happens in the
//! pre-flight [`Screen::compile`] pass.

use crate::domain::clause::{Clause, ClauseDoc};
use crate::domain::error::SieveError;
use std::path::{Path, PathBuf};

pub const SCREEN_SUFFIX: &str = "screen";
pub const PRELUDE_NAME: &str = "init";

#[derive(Debug, Clone)]
pub struct Screen {
    pub name: String,
    pub docs: Vec<ClauseDoc>,
}

impl Screen {
    /// Load `{name}.screen` from `dir` and prepend the prelude document.
    pub fn load(dir: &Path, name: &str) -> Result<Screen, SieveError> {
        let mut docs = read_document(dir, PRELUDE_NAME)?;
        docs.extend(read_document(dir, name)?);
        Ok(Screen {
            name: name.to_string(),
            docs,
        })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Pre-flight schema pass: validate every clause's enum fields and
    /// produce the typed clauses the interpreter runs against.
    pub fn compile(&self) -> Result<Vec<Clause>, SieveError> {
        self.docs
            .iter()
            .enumerate()
            .map(|(i, doc)| doc.compile(i))
            .collect()
    }
}

fn document_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{SCREEN_SUFFIX}"))
}

fn read_document(dir: &Path, name: &str) -> Result<Vec<ClauseDoc>, SieveError> {
    let path = document_path(dir, name);
    let content = std::fs::read_to_string(&path).map_err(|_| SieveError::ScreenNotFound {
        name: name.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| SieveError::ScreenMalformed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Names of the available screens in `dir`, sorted, excluding the prelude
/// and scratch `test` documents.
pub fn screen_names(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return names;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SCREEN_SUFFIX) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem == PRELUDE_NAME || stem == "test" {
            continue;
        }
        names.push(stem.to_string());
    }

    names.sort();
    names
}
