//! Provider seam
//!
//! A [`Provider`] realizes one resource at a time. The engine hands it the
//! fully resolved inputs of a resource and records the output attributes it
//! reports. Providers never see components.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::resource::{ResourceKind, ResourceUrn};

/// Output attributes reported by a provider.
pub type Outputs = BTreeMap<String, Value>;

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failures reported by the storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The bucket name is taken.
    #[error("BucketAlreadyExists: bucket '{0}' already exists")]
    BucketAlreadyExists(String),

    /// The bucket does not exist.
    #[error("NoSuchBucket: bucket '{0}' does not exist")]
    NoSuchBucket(String),

    /// The bucket still holds objects.
    #[error("BucketNotEmpty: bucket '{0}' is not empty")]
    BucketNotEmpty(String),

    /// The request was refused, e.g. a public policy while public access is blocked.
    #[error("AccessDenied: {0}")]
    AccessDenied(String),

    /// Credentials are missing or invalid.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The resolved inputs are not acceptable.
    #[error("Invalid input for '{resource}': {message}")]
    InvalidInput {
        /// Resource URN
        resource: String,
        /// What is wrong
        message: String,
    },

    /// The provider does not manage this kind of resource.
    #[error("Provider does not support resource type '{0}'")]
    UnsupportedResource(String),

    /// Any other API failure.
    #[error("{operation} failed: {message}")]
    Api {
        /// API operation
        operation: String,
        /// Error message
        message: String,
    },
}

impl ProviderError {
    /// Create an invalid input error.
    pub fn invalid_input(resource: &ResourceUrn, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Everything a provider needs to create one resource.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Resource URN
    pub urn: ResourceUrn,
    /// Resource kind
    pub kind: ResourceKind,
    /// Resolved inputs
    pub inputs: BTreeMap<String, Value>,
}

impl CreateRequest {
    /// A required string input.
    pub fn str_input(&self, name: &str) -> ProviderResult<&str> {
        self.inputs
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::invalid_input(&self.urn, format!("missing string input '{}'", name))
            })
    }

    /// An optional string input.
    pub fn opt_str_input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).and_then(Value::as_str)
    }

    /// A boolean input, false when absent.
    pub fn bool_input(&self, name: &str) -> bool {
        self.inputs
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Everything a provider needs to delete one resource.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// Resource URN
    pub urn: ResourceUrn,
    /// Resource kind
    pub kind: ResourceKind,
    /// Inputs the resource was created with
    pub inputs: BTreeMap<String, Value>,
    /// Outputs reported at creation
    pub outputs: Outputs,
}

impl DeleteRequest {
    /// A string attribute, looked up in outputs first and then inputs.
    pub fn attribute(&self, name: &str) -> ProviderResult<&str> {
        self.outputs
            .get(name)
            .or_else(|| self.inputs.get(name))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::invalid_input(&self.urn, format!("missing attribute '{}'", name))
            })
    }
}

/// A backend that realizes provider resources.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Name of the provider, for logs and output.
    fn name(&self) -> &str;

    /// Create a resource and report its output attributes.
    async fn create(&self, request: &CreateRequest) -> ProviderResult<Outputs>;

    /// Delete a resource created earlier.
    async fn delete(&self, request: &DeleteRequest) -> ProviderResult<()>;
}
