//! Source unit index: which units list a given file.
//!
//! Every query decodes every unit manifest of the commit. The store layout is
//! not indexed by file, so this is a linear scan; fine for interactive use on
//! small and medium builds.

use tracing::warn;

use crate::error::Error;
use crate::paths;
use crate::store::{ArtifactStore, UNIT_SUFFIX};
use crate::types::SourceUnit;

/// All units of `commit` whose file list contains `file`, in store walk order.
/// A unit is returned at most once even if it lists the file twice. No match
/// yields an empty list, not an error.
///
/// Manifests that are malformed or vanish mid-walk are skipped with a warning.
///
/// # Errors
///
/// Returns `Error::Io` if the store cannot be walked or read.
pub fn units_containing(
    store: &ArtifactStore,
    commit: &str,
    file: &str,
) -> Result<Vec<SourceUnit>, Error> {
    let file = paths::clean(file);
    let mut units = Vec::new();

    for path in store.walk(commit) {
        let path = path?;
        if !path.to_string_lossy().ends_with(UNIT_SUFFIX) {
            continue;
        }

        let unit = match read_unit(store, &path) {
            Err(e) if e.is_skippable_unit_failure() => {
                warn!("skipping unit manifest: {e}");
                continue;
            },
            Err(e) => return Err(e),
            Ok(u) => u,
        };

        if unit.files.iter().any(|member| return paths::clean(member) == file) {
            units.push(unit);
        }
    }

    return Ok(units);
}

/// Open, decode and release one manifest.
///
/// # Errors
///
/// Returns `Error::ArtifactNotFound`, `Error::Io`, or `Error::Decode`.
fn read_unit(store: &ArtifactStore, path: &std::path::Path) -> Result<SourceUnit, Error> {
    let reader = store.open(path)?;
    return serde_json::from_reader(reader).map_err(|source| {
        return Error::Decode { path: path.to_path_buf(), source };
    });
}
