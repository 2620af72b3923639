use std::{io, path::PathBuf};

use thiserror::Error;

use crate::catalog::PageId;
use crate::task::TaskKind;

/// A value was rejected at the field boundary; the field keeps its prior value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid value for `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A snapshot was attempted while a field is unset or invalid.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("`{field}` is not ready: {reason}")]
pub struct IncompleteConfigurationError {
    pub field: String,
    pub reason: String,
}

impl IncompleteConfigurationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The external toolkit raised or reported failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{task} failed: {message}")]
pub struct TaskInvocationError {
    pub task: TaskKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{feature} is not implemented")]
pub struct UnsupportedFeatureError {
    pub feature: String,
}

impl UnsupportedFeatureError {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
        }
    }
}

/// Why a `TaskResult` is a failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Invocation(#[from] TaskInvocationError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeatureError),
    #[error(transparent)]
    Incomplete(#[from] IncompleteConfigurationError),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a submission is already in flight for {0}")]
    InFlight(PageId),
    #[error(transparent)]
    Incomplete(#[from] IncompleteConfigurationError),
}

#[derive(Debug, Error)]
pub enum ProjectConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{}: expected a mapping at the top level", .path.display())]
    NotAMapping { path: PathBuf },
}
