//! Filesystem-backed artifact store keyed by repository root and commit id.
//!
//! Layout: `<root>/<store dir>/<commit>/<unit name>/<unit type>.{unit,graph}.json`.
//! srcref only reads through the store; the configure and make steps write it.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Error;
use crate::types::SourceUnit;

/// Suffix of source unit manifests.
pub const UNIT_SUFFIX: &str = ".unit.json";

/// Suffix of per-unit graph artifacts.
pub const GRAPH_SUFFIX: &str = ".graph.json";

/// Read-only view of the artifacts stored for one repository.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Directory holding one subdirectory per commit.
    root: PathBuf,
}

impl ArtifactStore {
    /// Store located at `dir` (relative to `repo_root` unless absolute).
    pub fn new(repo_root: &Path, dir: &str) -> Self {
        return Self { root: repo_root.join(dir) };
    }

    /// Directory holding every artifact of `commit`.
    pub fn commit_path(&self, commit: &str) -> PathBuf {
        return self.root.join(commit);
    }

    /// Whether any artifacts exist for `commit`.
    pub fn exists(&self, commit: &str) -> bool {
        return self.commit_path(commit).is_dir();
    }

    /// Physical path of a logical artifact name within `commit`.
    pub fn file_path(&self, commit: &str, logical_name: &str) -> PathBuf {
        return self.commit_path(commit).join(logical_name);
    }

    /// Open a stored artifact for buffered reading.
    ///
    /// # Errors
    ///
    /// Returns `Error::ArtifactNotFound` if the artifact is absent,
    /// or `Error::Io` for any other open failure.
    pub fn open(&self, path: &Path) -> Result<BufReader<File>, Error> {
        return match File::open(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ArtifactNotFound { path: path.to_path_buf() })
            },
            Err(e) => Err(Error::Io(e)),
            Ok(f) => Ok(BufReader::new(f)),
        };
    }

    /// Lazily walk every stored file of `commit` in file-name order.
    /// A commit with no artifacts walks nothing. Each call starts afresh.
    pub fn walk(&self, commit: &str) -> impl Iterator<Item = Result<PathBuf, Error>> + use<> {
        let commit_path = self.commit_path(commit);
        let walker = commit_path
            .is_dir()
            .then(|| return WalkDir::new(&commit_path).sort_by_file_name());
        return walker
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                return match entry {
                    Err(e) => Some(Err(Error::Io(std::io::Error::from(e)))),
                    Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
                    Ok(_) => None,
                };
            });
    }
}

/// Logical name of a per-unit artifact, e.g. `pkg/PipPackage.graph.json`.
pub fn unit_data_filename(suffix: &str, unit: &SourceUnit) -> String {
    return format!("{}/{}{suffix}", unit.name, unit.unit_type);
}
