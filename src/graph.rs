//! Graph loader: decode a unit's (defs, refs, docs) artifact.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::store::{ArtifactStore, GRAPH_SUFFIX, unit_data_filename};
use crate::types::{Def, Doc, Ref, SourceUnit, null_as_default};

/// Everything a toolchain emitted for one unit. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Definitions declared in the unit.
    #[serde(default, deserialize_with = "null_as_default", rename = "Defs")]
    pub defs: Vec<Def>,
    /// Documentation keyed by def path.
    #[serde(default, deserialize_with = "null_as_default", rename = "Docs")]
    pub docs: Vec<Doc>,
    /// References, in the order the toolchain emitted them.
    #[serde(default, deserialize_with = "null_as_default", rename = "Refs")]
    pub refs: Vec<Ref>,
}

impl Graph {
    /// The def with exactly this path, if any.
    pub fn def(&self, path: &str) -> Option<&Def> {
        return self.defs.iter().find(|d| return d.path == path);
    }

    /// Documentation for `path`. When several docs share the path the last
    /// one wins.
    pub fn doc(&self, path: &str) -> Option<&Doc> {
        return self.docs.iter().rev().find(|d| return d.path == path);
    }

    /// Refs located in `file`, in artifact order.
    pub fn refs_in<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a Ref> + 'a {
        return self.refs.iter().filter(move |r| return r.file == file);
    }
}

/// Load the graph artifact of `unit` at `commit`. The file is opened, decoded
/// and closed before returning. Only `name` and `unit_type` of `unit` are used.
///
/// # Errors
///
/// Returns `Error::ArtifactNotFound` if the unit has no graph,
/// `Error::Io` if the artifact cannot be read,
/// or `Error::Decode` if it is malformed.
pub fn load_graph(store: &ArtifactStore, commit: &str, unit: &SourceUnit) -> Result<Graph, Error> {
    let path = store.file_path(commit, &unit_data_filename(GRAPH_SUFFIX, unit));
    let reader = store.open(&path)?;
    return serde_json::from_reader(reader).map_err(|source| {
        // serde_json reports stream failures as io-category errors.
        if source.is_io() {
            return Error::Io(std::io::Error::other(source));
        }
        return Error::Decode { path, source };
    });
}
