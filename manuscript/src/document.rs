use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A manuscript file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: PathBuf,
    /// File name, used as the suite name in test reports.
    pub name: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("manuscript directory '{}' does not exist", .0.display())]
    MissingDir(PathBuf),
    #[error("cannot list '{}': {source}", .path.display())]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        Document {
            path: PathBuf::from(&name),
            name,
            text: text.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Document {
            path: path.to_path_buf(),
            name,
            // strip BOM
            text: text.trim_start_matches('\u{feff}').to_string(),
        })
    }
}

/// Load every `.md` file directly inside `dir`, sorted by path.
pub fn load_dir(dir: &Path) -> Result<Vec<Document>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDir(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::List {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::List {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            paths.push(path);
        }
    }
    paths.sort();

    tracing::debug!(dir = %dir.display(), count = paths.len(), "loading manuscript");

    paths.iter().map(|p| Document::from_path(p)).collect()
}
