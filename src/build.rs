//! Build orchestration: make sure artifacts for the current commit exist.
//!
//! Two states only. A commit with no artifact root is configured first; make
//! runs on every call. There is no staleness analysis here, repeated makes are
//! the make step's concern.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use sha2::{Digest as _, Sha256};
use single_instance::SingleInstance;
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::error::Error;
use crate::repo::Repository;
use crate::store::ArtifactStore;

/// Subdirectory every build is planned for.
pub const SUBDIR: &str = ".";

/// Poll interval while another process holds the build lock.
const LOCK_POLL: Duration = Duration::from_millis(100);

/// The external collaborators that write into the store.
pub trait BuildSteps {
    /// Write a build plan for the repository.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` if the step fails.
    fn configure(&self, repo_uri: &str, subdir: &str) -> Result<(), Error>;

    /// Run the build plan, writing unit and graph artifacts.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` if the step fails.
    fn execute(&self, repo_uri: &str, subdir: &str) -> Result<(), Error>;
}

/// Build steps backed by external programs, run in the repository root.
pub struct CommandSteps {
    /// Commit being built, exported to the children.
    commit_id: String,
    /// Artifact root of that commit, exported to the children.
    commit_path: PathBuf,
    /// Configure program and arguments.
    configure: Vec<String>,
    /// Make program and arguments.
    make: Vec<String>,
    /// Working directory of the children.
    root: PathBuf,
}

impl CommandSteps {
    /// Steps from the `[build]` config for `repo`.
    pub fn new(config: &BuildConfig, repo: &Repository, store: &ArtifactStore) -> Self {
        return Self {
            commit_id: repo.commit_id.clone(),
            commit_path: store.commit_path(&repo.commit_id),
            configure: config.configure.clone(),
            make: config.make.clone(),
            root: repo.root.clone(),
        };
    }

    /// Spawn one step and wait for it. Child output goes to stderr so stdout
    /// stays reserved for the command's JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` on an empty command, spawn failure, or non-zero exit.
    fn run(&self, step: &'static str, argv: &[String], repo_uri: &str, subdir: &str) -> Result<(), Error> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Build { reason: "no command configured".to_string(), step });
        };

        debug!(step, command = %argv.join(" "), "running build step");
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .env("SRCREF_COMMIT_DIR", &self.commit_path)
            .env("SRCREF_COMMIT_ID", &self.commit_id)
            .env("SRCREF_REPO", repo_uri)
            .env("SRCREF_SUBDIR", subdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .status()
            .map_err(|e| return Error::Build { reason: format!("{program}: {e}"), step })?;

        if !status.success() {
            return Err(Error::Build { reason: format!("{program} exited with {status}"), step });
        }
        return Ok(());
    }
}

impl BuildSteps for CommandSteps {
    fn configure(&self, repo_uri: &str, subdir: &str) -> Result<(), Error> {
        return self.run("configure", &self.configure, repo_uri, subdir);
    }

    fn execute(&self, repo_uri: &str, subdir: &str) -> Result<(), Error> {
        return self.run("make", &self.make, repo_uri, subdir);
    }
}

/// Held while a commit is being built. Released on drop.
pub struct BuildLock {
    /// The underlying cross-process instance lock.
    _instance: SingleInstance,
}

impl BuildLock {
    /// Wait until no other process is building the commit rooted at
    /// `commit_path`, then take the lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` if the lock cannot be created or `timeout` elapses.
    pub fn acquire(commit_path: &Path, timeout: Duration) -> Result<Self, Error> {
        let name = lock_name(commit_path);
        let deadline = Instant::now().checked_add(timeout);
        let lock_error = |reason: String| return Error::Build { reason, step: "lock" };

        loop {
            let instance = SingleInstance::new(&name).map_err(|e| return lock_error(e.to_string()))?;
            if instance.is_single() {
                return Ok(Self { _instance: instance });
            }
            drop(instance);

            if deadline.is_some_and(|d| return Instant::now() >= d) {
                return Err(lock_error(format!(
                    "timed out after {}s waiting for another build of {}",
                    timeout.as_secs(),
                    commit_path.display()
                )));
            }
            std::thread::sleep(LOCK_POLL);
        }
    }
}

/// Lock name unique to a commit root. Linux binds it as an abstract socket
/// name; macOS needs a filesystem path.
fn lock_name(commit_path: &Path) -> String {
    let digest = Sha256::digest(commit_path.to_string_lossy().as_bytes());
    let short: String = format!("{digest:x}").chars().take(16).collect();
    let name = format!("srcref-build-{short}");
    if cfg!(target_os = "macos") {
        return std::env::temp_dir().join(name).to_string_lossy().into_owned();
    }
    return name;
}

/// Ensure artifacts for the repository's commit exist: configure if the
/// commit was never built, then always make. Either step failing aborts and
/// leaves the store as the step left it.
///
/// # Errors
///
/// Returns `Error::Build` from either step or from lock acquisition.
pub fn ensure_built(
    store: &ArtifactStore,
    repo: &Repository,
    steps: &dyn BuildSteps,
    lock_timeout: Duration,
) -> Result<(), Error> {
    let _lock = BuildLock::acquire(&store.commit_path(&repo.commit_id), lock_timeout)?;

    if store.exists(&repo.commit_id) {
        debug!(commit = %repo.commit_id, "commit already configured");
    } else {
        info!(commit = %repo.commit_id, "configuring {}", repo.uri);
        steps.configure(&repo.uri, SUBDIR)?;
    }

    // TODO: skip make when no source file changed since the last make of this commit.
    steps.execute(&repo.uri, SUBDIR)?;
    return Ok(());
}
