//! CLI commands: describe, list, units, build.
//!
//! Each command opens the repository containing its file, makes sure the
//! current commit is built, runs one query and prints JSON on stdout.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::build::{self, CommandSteps};
use crate::config::Config;
use crate::describe::{DescribeOptions, PositionResolver};
use crate::error;
use crate::remote::HttpDefinitionService;
use crate::repo::{self, Repository};
use crate::store::ArtifactStore;
use crate::units;

/// Everything a command needs once the repository is open and built.
struct Session {
    /// Project config.
    config: Config,
    /// The opened repository.
    repo: Repository,
    /// Its artifact store.
    store: ArtifactStore,
}

impl Session {
    /// Run the configure and make steps for the current commit.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` if a step fails or the build lock times out.
    fn build(&self) -> Result<(), error::Error> {
        let steps = CommandSteps::new(&self.config.build, &self.repo, &self.store);
        return build::ensure_built(&self.store, &self.repo, &steps, self.config.build.lock_timeout());
    }

    /// Open the repository that contains `file` and build it. The file is
    /// validated against the root before any build step runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for a file the repository cannot hold,
    /// otherwise discovery, config, or build errors.
    fn for_file(file: &Path) -> Result<(Self, PathBuf), error::Error> {
        let file = repo::absolute_clean(file)?;
        let session = Self::open(&file)?;
        session.repo.relative_path(&file)?;
        session.build()?;
        return Ok((session, file));
    }

    /// Open the repository containing `start` without building it.
    ///
    /// # Errors
    ///
    /// Returns discovery or config errors.
    fn open(start: &Path) -> Result<Self, error::Error> {
        let root = repo::discover_root(start)?;
        let config = Config::load(&root)?;
        let repo = Repository::open(&root, &config)?;
        let store = ArtifactStore::new(&repo.root, &config.store.dir);
        return Ok(Self { config, repo, store });
    }

    /// Resolver over this session's artifacts, talking to the configured service.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    fn resolver(self) -> Result<PositionResolver, error::Error> {
        let client = HttpDefinitionService::new(&self.config.remote)?;
        let per_page = self.config.remote.examples_per_page;
        return Ok(PositionResolver::new(self.repo, self.store, Arc::new(client), per_page));
    }
}

/// Ensure the repository containing `dir` is built for its current commit.
///
/// # Errors
///
/// Returns discovery, config, or build errors.
pub fn build(dir: &Path) -> Result<(), error::Error> {
    let session = Session::open(dir)?;
    session.build()?;
    eprintln!("Built {} at {}", session.repo.uri, session.repo.commit_id);
    return Ok(());
}

/// Describe the ref at `start_byte` in `file`.
///
/// # Errors
///
/// Returns path, store, or build errors. Remote failures are not errors.
pub async fn describe(file: &Path, start_byte: u32, no_examples: bool) -> Result<(), error::Error> {
    let (session, file) = Session::for_file(file)?;
    let opts = DescribeOptions { suppress_examples: no_examples || session.config.remote.no_examples };
    let description = session.resolver()?.describe(&file, start_byte, opts).await?;
    return print_json(&description);
}

/// List every ref in `file`.
///
/// # Errors
///
/// Returns path, store, or build errors.
pub fn list(file: &Path) -> Result<(), error::Error> {
    let (session, file) = Session::for_file(file)?;
    let refs = session.resolver()?.list_refs(&file)?;
    return print_json(&refs);
}

/// Write one JSON document and a newline to stdout.
///
/// # Errors
///
/// Returns `Error::Json` or `Error::Io` if writing fails.
fn print_json<T: Serialize>(value: &T) -> Result<(), error::Error> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    return Ok(());
}

/// List the source units whose file list contains `file`.
///
/// # Errors
///
/// Returns path, store, or build errors.
pub fn units(file: &Path) -> Result<(), error::Error> {
    let (session, file) = Session::for_file(file)?;
    let relative = session.repo.relative_path(&file)?;
    let found = units::units_containing(&session.store, &session.repo.commit_id, &relative)?;
    info!("{relative} is in {} source units", found.len());
    return print_json(&found);
}
