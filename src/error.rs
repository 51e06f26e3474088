//! Error types for staticpage.
//!
//! Validation problems are reported before anything is declared. Provider
//! failures are carried through unchanged so callers see exactly what the
//! storage backend reported.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::provider::ProviderError;
use crate::output::OutputError;

/// Result type alias for staticpage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for staticpage.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// The component name is empty or contains characters that cannot be
    /// used to derive child resource names.
    #[error("Invalid component name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// No pages were supplied.
    #[error("Static page '{0}' requires at least one page")]
    EmptyPageSet(String),

    /// A page key is empty, absolute, or escapes the bucket root.
    #[error("Invalid page key '{key}': {reason}")]
    InvalidPageKey {
        /// Offending key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// A page was declared without a body.
    #[error("Page '{0}' has no content")]
    MissingPageContent(String),

    /// The same key appears more than once.
    #[error("Page '{0}' is declared more than once")]
    DuplicatePageKey(String),

    /// None of the pages is the configured index document.
    #[error("No page is bound to the index document '{0}'")]
    MissingIndexDocument(String),

    // ========================================================================
    // Declaration Errors
    // ========================================================================
    /// Two resources in one stack resolved to the same URN.
    #[error("Resource '{0}' is already registered in this stack")]
    DuplicateResource(String),

    /// A referenced resource was never registered.
    #[error("Resource '{0}' not found")]
    ResourceNotFound(String),

    /// A resource was asked to depend on itself.
    #[error("Resource '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// The declared graph is not acyclic.
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// Outputs were registered twice for one component.
    #[error("Outputs for '{0}' were already registered")]
    OutputsAlreadyRegistered(String),

    // ========================================================================
    // Realization Errors
    // ========================================================================
    /// A deferred value could not be resolved.
    #[error(transparent)]
    Output(#[from] OutputError),

    /// The storage provider rejected an operation.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The scheduler itself failed, e.g. a realization task panicked.
    #[error("Engine error: {0}")]
    Engine(String),

    // ========================================================================
    // Site Manifest / Configuration Errors
    // ========================================================================
    /// Failed to load a site manifest.
    #[error("Failed to load site manifest '{path}': {message}")]
    ManifestLoad {
        /// Manifest path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Wrapped Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid page key error.
    pub fn invalid_page_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPageKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised by local validation, before any
    /// resource was declared.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidName { .. }
                | Error::EmptyPageSet(_)
                | Error::InvalidPageKey { .. }
                | Error::MissingPageContent(_)
                | Error::DuplicatePageKey(_)
                | Error::MissingIndexDocument(_)
        )
    }

    /// Whether this error came from the storage provider.
    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Provider(_))
    }
}
