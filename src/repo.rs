//! Repository handle: root discovery, identifier and commit id.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};
use walkdir::WalkDir;

use crate::config::{CONFIG_FILE, Config};
use crate::error::Error;
use crate::paths;

/// Directories whose presence marks a repository root.
const VCS_DIRS: [&str; 2] = [".git", ".hg"];

/// A repository as seen by one invocation. Immutable once opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Commit identifier the artifacts are keyed by.
    pub commit_id: String,
    /// Absolute, lexically clean root directory.
    pub root: PathBuf,
    /// Stable repository identifier, e.g. `github.com/owner/name`.
    pub uri: String,
}

impl Repository {
    /// Build a handle from already known parts.
    pub fn new(root: PathBuf, uri: impl Into<String>, commit_id: impl Into<String>) -> Self {
        return Self {
            commit_id: commit_id.into(),
            root,
            uri: uri.into(),
        };
    }

    /// Open the repository rooted at `root`, deriving its identifier and commit
    /// id from config, version control metadata, or the working tree.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the working tree cannot be hashed.
    pub fn open(root: &Path, config: &Config) -> Result<Self, Error> {
        let git = git_repository(root);

        let uri = match &config.repository.uri {
            Some(uri) => uri.clone(),
            None => git
                .as_ref()
                .and_then(git_origin_uri)
                .unwrap_or_else(|| return directory_name(root)),
        };

        let commit_id = match &config.repository.commit {
            Some(commit) => commit.clone(),
            None => match git.as_ref().and_then(git_head_revision) {
                Some(rev) => rev,
                None => working_tree_hash(root, &config.store.dir)?,
            },
        };

        return Ok(Self::new(root.to_path_buf(), uri, commit_id));
    }

    /// Turn a file argument into a clean, repo-relative path.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if the file is not under the root or is
    /// the root itself.
    pub fn relative_path(&self, file: &Path) -> Result<String, Error> {
        let absolute = absolute_clean(file)?;
        let invalid = |reason: &str| {
            return Error::InvalidPath {
                path: file.to_path_buf(),
                reason: reason.to_string(),
            };
        };

        let relative = absolute
            .strip_prefix(&self.root)
            .map_err(|_err| return invalid(&format!("not inside {}", self.root.display())))?;
        let relative = paths::clean(&relative.to_string_lossy());
        if relative == "." {
            return Err(invalid("names the repository root, not a file"));
        }
        return Ok(relative);
    }
}

/// Make a path absolute against the working directory and clean it lexically.
///
/// # Errors
///
/// Returns `Error::Io` if the working directory is unavailable.
pub fn absolute_clean(path: &Path) -> Result<PathBuf, Error> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    return Ok(PathBuf::from(paths::clean(&joined.to_string_lossy())));
}

/// Find the nearest ancestor of `start` (inclusive) holding a VCS directory
/// or a config file.
///
/// # Errors
///
/// Returns `Error::RepositoryNotFound` if no ancestor qualifies.
pub fn discover_root(start: &Path) -> Result<PathBuf, Error> {
    let start = absolute_clean(start)?;
    for dir in start.ancestors() {
        let is_root = VCS_DIRS.iter().any(|vcs| return dir.join(vcs).exists())
            || dir.join(CONFIG_FILE).is_file();
        if is_root {
            return Ok(dir.to_path_buf());
        }
    }
    return Err(Error::RepositoryNotFound { path: start });
}

/// Last path component of the root, used when nothing better identifies it.
fn directory_name(root: &Path) -> String {
    return root
        .file_name()
        .map(|name| return name.to_string_lossy().into_owned())
        .unwrap_or_else(|| return root.to_string_lossy().into_owned());
}

/// Open the git repository that contains `root`, if any. Linked worktrees
/// and submodules, whose `.git` is a `gitdir:` file, resolve to their real
/// git directory.
fn git_repository(root: &Path) -> Option<git2::Repository> {
    return git2::Repository::discover(root).ok();
}

/// URL of the `origin` remote, normalized.
fn git_origin_uri(git: &git2::Repository) -> Option<String> {
    let remote = git.find_remote("origin").ok()?;
    let uri = normalize_remote_url(remote.url()?);
    if uri.is_empty() {
        return None;
    }
    return Some(uri);
}

/// Id of the commit `HEAD` points at. `None` for an unborn branch.
fn git_head_revision(git: &git2::Repository) -> Option<String> {
    let commit = git.head().ok()?.peel_to_commit().ok()?;
    return Some(commit.id().to_string());
}

/// Reduce a clone URL to `host/path`: strip scheme, user info, `git@host:`
/// syntax, a trailing `.git` and trailing slashes.
pub fn normalize_remote_url(url: &str) -> String {
    let mut rest = url.trim();
    if let Some((_, after)) = rest.split_once("://") {
        rest = after;
    }
    if let Some((_, after)) = rest.split_once('@') {
        rest = after;
    }

    let has_scp_colon = !url.contains("://") && rest.contains(':');
    let mut normalized = if has_scp_colon { rest.replacen(':', "/", 1) } else { rest.to_string() };

    while normalized.ends_with('/') {
        normalized.pop();
    }
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }
    return normalized;
}

/// SHA-256 over every file's relative path and contents, in lexical walk
/// order, skipping VCS metadata and the artifact store.
///
/// # Errors
///
/// Returns `Error::Io` if a file cannot be read.
pub fn working_tree_hash(root: &Path, store_dir: &str) -> Result<String, Error> {
    let store_dir = paths::clean(store_dir);
    let mut hasher = Sha256::new();
    let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|entry| {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            return true;
        };
        let relative = relative.to_string_lossy();
        return !VCS_DIRS.contains(&relative.as_ref()) && relative != store_dir.as_str();
    });

    let mut buf = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| return Error::Io(std::io::Error::other(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0_u8]);

        buf.clear();
        std::fs::File::open(entry.path())?.read_to_end(&mut buf)?;
        hasher.update(&buf);
        hasher.update([0_u8]);
    }

    return Ok(format!("{:x}", hasher.finalize()));
}
