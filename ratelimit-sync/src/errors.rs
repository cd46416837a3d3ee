use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Errors raised while turning user-facing rate-limit config into descriptors
/// or actions. They are always attributed to a resource and never abort a
/// sync pass on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("missing required name for rate limit config")]
    MissingName,
    #[error("the virtual host or route name [{0}] is already used by another basic rate limit config")]
    DuplicateName(String),
    #[error("basic rate limits depend on the auth state of a request and cannot run before auth")]
    AuthOrderingConflict,
    #[error("could not find RateLimitConfig resource with name [{name}] in namespace [{namespace}]")]
    ConfigNotFound { namespace: String, name: String },
    #[error(
        "failed to get rate limit configuration from RateLimitConfig resource with name [{name}] in namespace [{namespace}]: {source}"
    )]
    ReferencedConfig {
        source: Box<TranslationError>,
        namespace: String,
        name: String,
    },
    #[error("RateLimitConfig resource with name [{name}] in namespace [{namespace}] does not specify a config type")]
    MissingConfigType { namespace: String, name: String },
    #[error("unspecified unit in rate limit for descriptor '{0}'")]
    UnknownUnit(String),
    #[error("illegal descriptors: {0}")]
    IllegalDescriptors(String),
    #[error("invalid rate limit action: {0}")]
    InvalidAction(String),
    #[error("failed to convert rate limit config: {0}")]
    Serialization(String),
}

impl TranslationError {
    pub fn config_not_found(namespace: &str, name: &str) -> Self {
        Self::ConfigNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn referenced_config(source: TranslationError, namespace: &str, name: &str) -> Self {
        Self::ReferencedConfig {
            source: Box::new(source),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("unknown config collector type: {0}")]
    UnknownCollectorType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("overlapping types found")]
    OverlappingTypes,
    #[error("required {type_url} resource {name} not in snapshot")]
    MissingReference { type_url: String, name: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RlCacheError {
    #[error("RateLimitConfig {namespace}.{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("snapshot {0} has not been indexed yet")]
    NotCached(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("invalid rate limit config for domain '{domain}': {reason}")]
    Validation { domain: String, reason: String },
    #[error("failed to publish snapshot: {0}")]
    Publish(String),
    #[error("failed to write reports: {0}")]
    Report(String),
}

/// A typed list of errors: everything gets collected, the caller decides at
/// the end whether the list turns into a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorList<E> {
    errors: Vec<E>,
}

impl<E> Default for ErrorList<E> {
    fn default() -> Self {
        Self { errors: Vec::new() }
    }
}

impl<E> ErrorList<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Into<E>>(&mut self, error: T) {
        self.errors.push(error.into())
    }

    pub fn append<T: Into<E>>(&mut self, other: ErrorList<T>) {
        self.errors.extend(other.errors.into_iter().map(Into::into))
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.errors.iter()
    }

    /// `Ok(value)` if nothing was collected, the list itself otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl<E> From<E> for ErrorList<E> {
    fn from(error: E) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl<E> FromIterator<E> for ErrorList<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<E> Extend<E> for ErrorList<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.errors.extend(iter)
    }
}

impl<E> IntoIterator for ErrorList<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a ErrorList<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl<E: Display> Display for ErrorList<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.errors.len() {
            1 => write!(f, "1 error occurred:")?,
            n => write!(f, "{n} errors occurred:")?,
        }
        for error in &self.errors {
            write!(f, "\n\t* {error}")?;
        }
        Ok(())
    }
}

impl<E: std::error::Error> std::error::Error for ErrorList<E> {}
