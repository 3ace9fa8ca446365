/// Crate-level error types for srcref diagnostics.
use std::path::PathBuf;

/// All errors in srcref carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the artifact, build step, or locator
/// that failed.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored artifact does not exist for the current commit.
    #[error("artifact not found: {}", path.display())]
    ArtifactNotFound {
        /// Path of the missing artifact.
        path: PathBuf,
    },

    /// A configure or make collaborator failed. Always fatal for the query.
    #[error("build step `{step}` failed: {reason}")]
    Build {
        /// Description of the failure (exit status, spawn error, lock timeout).
        reason: String,
        /// Name of the failing step.
        step: &'static str,
    },

    /// A stored artifact exists but cannot be decoded.
    #[error("{}: {source}", path.display())]
    Decode {
        /// Artifact that failed to decode.
        path: PathBuf,
        /// The wrapped JSON error.
        source: serde_json::Error,
    },

    /// The remote service has no definition for the locator.
    #[error("definition not found: {locator}")]
    DefinitionNotFound {
        /// Display form of the four-part locator.
        locator: String,
    },

    /// A file argument cannot be reconciled with the repository root.
    #[error("invalid path {}: {reason}", path.display())]
    InvalidPath {
        /// The offending input path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization of command output failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// The remote resolution service could not be reached or answered badly.
    #[error("network: {reason}")]
    Network {
        /// Description of the transport or protocol failure.
        reason: String,
    },

    /// No repository root marker was found above the starting directory.
    #[error("no repository found at or above {}", path.display())]
    RepositoryNotFound {
        /// Directory the search started from.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}

impl Error {
    /// Whether a failure loading one candidate unit may be skipped so the
    /// remaining units are still searched.
    pub const fn is_skippable_unit_failure(&self) -> bool {
        return matches!(self, Self::ArtifactNotFound { .. } | Self::Decode { .. });
    }
}
