use std::path::PathBuf;

use thiserror::Error;

/// Failures that callers are expected to classify.
///
/// Library functions return `anyhow::Result`; these values travel inside the
/// `anyhow::Error` and can be recovered with `downcast_ref::<LauncherError>()`.
/// Detection quality problems (irrelevant samples, empty consensus) are data,
/// not errors, and never show up here.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// A camera, transport or persisted file could not be opened.
    #[error("{resource} unavailable at {location}: {detail}")]
    ResourceUnavailable {
        resource: &'static str,
        location: String,
        detail: String,
    },

    /// A required tunable is absent from the configuration.
    #[error("required configuration value `{0}` is missing")]
    ConfigurationMissing(String),

    /// A tunable is present but cannot be used.
    #[error("invalid configuration value `{key}`: {reason}")]
    InvalidConfiguration { key: String, reason: String },

    /// A persisted Q-table exists but cannot be parsed.
    #[error("malformed persisted state in {}: {reason}", path.display())]
    MalformedPersistedState { path: PathBuf, reason: String },
}

impl LauncherError {
    pub(crate) fn unavailable(
        resource: &'static str,
        location: impl Into<String>,
        detail: impl ToString,
    ) -> Self {
        Self::ResourceUnavailable {
            resource,
            location: location.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedPersistedState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
