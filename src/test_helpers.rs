//! Shared fixtures for unit tests: a throwaway repository with a populated
//! artifact store.

use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use crate::repo::Repository;
use crate::store::{ArtifactStore, GRAPH_SUFFIX, UNIT_SUFFIX, unit_data_filename};
use crate::types::{Def, Doc, Ref, SourceUnit};

/// Repository identifier used by every fixture.
pub const REPO_URI: &str = "example.com/r";

/// Commit id used by every fixture.
pub const COMMIT: &str = "c0ffee";

/// A temp repository root plus a store pointed at it.
pub struct Fixture {
    /// Keeps the directory alive for the fixture's lifetime.
    _dir: TempDir,
    /// Handle for the temp repository.
    pub repo: Repository,
    /// Store rooted under the temp repository.
    pub store: ArtifactStore,
}

impl Fixture {
    /// Empty repository with no artifacts.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = crate::repo::absolute_clean(dir.path()).unwrap();
        let store = ArtifactStore::new(&root, ".srclib-cache");
        return Self {
            _dir: dir,
            repo: Repository::new(root, REPO_URI, COMMIT),
            store,
        };
    }

    /// Absolute path of a repo-relative file.
    pub fn abs(&self, relative: &str) -> PathBuf {
        return self.repo.root.join(relative);
    }

    /// Write raw bytes at a logical artifact name of the fixture commit.
    pub fn write_raw(&self, logical_name: &str, content: &str) {
        let path = self.store.file_path(COMMIT, logical_name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Write a unit manifest.
    pub fn write_unit(&self, name: &str, unit_type: &str, files: &[&str]) -> SourceUnit {
        let unit = SourceUnit {
            files: files.iter().map(ToString::to_string).collect(),
            name: name.to_string(),
            repo: REPO_URI.to_string(),
            unit_type: unit_type.to_string(),
            ..SourceUnit::default()
        };
        let name = unit_data_filename(UNIT_SUFFIX, &unit);
        self.write_raw(&name, &serde_json::to_string(&unit).unwrap());
        return unit;
    }

    /// Write a graph artifact for a unit.
    pub fn write_graph(&self, unit: &SourceUnit, defs: &[Def], refs: &[Ref], docs: &[Doc]) {
        let graph = json!({ "Defs": defs, "Refs": refs, "Docs": docs });
        let name = unit_data_filename(GRAPH_SUFFIX, unit);
        self.write_raw(&name, &graph.to_string());
    }
}

/// A ref in `file` spanning `start..=end`, pointing at `def_path` in the same unit.
pub fn local_ref(file: &str, start: u32, end: u32, def_path: &str) -> Ref {
    return Ref {
        def_path: def_path.to_string(),
        end,
        file: file.to_string(),
        start,
        ..Ref::default()
    };
}

/// A def at `path` declared in `file`.
pub fn def(path: &str, file: &str) -> Def {
    return Def {
        file: file.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        ..Def::default()
    };
}
