//! S3 resource arguments
//!
//! Typed arguments for the five storage resources a static page declares.
//! Property names follow the provider's camelCase schema so that snapshots
//! read the same way the provider documents them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{PropertyMap, ResourceArgs, ResourceKind};
use crate::output::Input;

/// Regions whose website endpoints use the legacy `s3-website-<region>` form.
const DASH_WEBSITE_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "eu-west-1",
    "sa-east-1",
    "us-gov-west-1",
];

/// Website hosting domain for a region, e.g. `s3-website-us-east-1.amazonaws.com`.
pub fn website_domain(region: &str) -> String {
    if DASH_WEBSITE_REGIONS.contains(&region) {
        format!("s3-website-{}.amazonaws.com", region)
    } else {
        format!("s3-website.{}.amazonaws.com", region)
    }
}

/// Longest prefix kept from a logical name; leaves room for `-` and a
/// 7 character suffix within the 63 character bucket name limit.
pub const MAX_BUCKET_NAME_PREFIX: usize = 55;

/// Bucket name prefix derived from a logical name: lowercase letters,
/// digits and `-`, starting and ending with a letter or digit.
pub fn bucket_name_prefix(logical: &str) -> String {
    let mut prefix: String = logical
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    prefix.truncate(MAX_BUCKET_NAME_PREFIX);

    let trimmed = prefix.trim_matches('-');
    if trimmed.is_empty() {
        "bucket".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Provider-side name for a bucket declared without an explicit name,
/// e.g. `my-site-1a2b3c4` for `my_site`.
pub fn generate_bucket_name(logical: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", bucket_name_prefix(logical), &suffix[..7])
}

/// ARN of a bucket.
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}", bucket)
}

/// Arguments of a bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketArgs {
    /// Explicit bucket name; the provider generates one from the logical
    /// name when unset.
    pub bucket: Option<String>,
    /// Delete all objects when the bucket is destroyed.
    pub force_destroy: bool,
}

impl ResourceArgs for BucketArgs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Bucket
    }

    fn into_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(bucket) = self.bucket {
            props.insert("bucket".into(), Input::Value(Value::String(bucket)));
        }
        props.insert("forceDestroy".into(), Input::Value(Value::Bool(self.force_destroy)));
        props
    }
}

/// Default document served for directory requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Suffix appended to directory requests, e.g. `index.html`.
    pub suffix: String,
}

/// Document served on errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    /// Object key of the error page.
    pub key: String,
}

/// Arguments of a bucket website configuration.
#[derive(Debug, Clone)]
pub struct BucketWebsiteConfigurationArgs {
    /// Bucket name.
    pub bucket: Input<String>,
    /// Index document.
    pub index_document: IndexDocument,
    /// Optional error document.
    pub error_document: Option<ErrorDocument>,
}

impl ResourceArgs for BucketWebsiteConfigurationArgs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BucketWebsiteConfiguration
    }

    fn into_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("bucket".into(), self.bucket.map(Value::String));
        props.insert(
            "indexDocument".into(),
            Input::Value(json!({ "suffix": self.index_document.suffix })),
        );
        if let Some(error_document) = self.error_document {
            props.insert(
                "errorDocument".into(),
                Input::Value(json!({ "key": error_document.key })),
            );
        }
        props
    }
}

/// Arguments of a bucket object.
#[derive(Debug, Clone)]
pub struct BucketObjectArgs {
    /// Bucket name.
    pub bucket: Input<String>,
    /// Object key.
    pub key: String,
    /// Object body.
    pub content: String,
    /// MIME type.
    pub content_type: String,
}

impl ResourceArgs for BucketObjectArgs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BucketObject
    }

    fn into_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("bucket".into(), self.bucket.map(Value::String));
        props.insert("key".into(), Input::Value(Value::String(self.key)));
        props.insert("content".into(), Input::Value(Value::String(self.content)));
        props.insert(
            "contentType".into(),
            Input::Value(Value::String(self.content_type)),
        );
        props
    }
}

/// Arguments of a bucket public access block.
#[derive(Debug, Clone)]
pub struct BucketPublicAccessBlockArgs {
    /// Bucket id.
    pub bucket: Input<String>,
    /// Reject requests that carry public ACLs.
    pub block_public_acls: bool,
    /// Reject bucket policies that grant public access.
    pub block_public_policy: bool,
    /// Ignore public ACLs on the bucket and its objects.
    pub ignore_public_acls: bool,
    /// Restrict access to buckets with public policies.
    pub restrict_public_buckets: bool,
}

impl BucketPublicAccessBlockArgs {
    /// Relax every guard so that a public policy can take effect.
    pub fn allow_public(bucket: Input<String>) -> Self {
        Self {
            bucket,
            block_public_acls: false,
            block_public_policy: false,
            ignore_public_acls: false,
            restrict_public_buckets: false,
        }
    }
}

impl ResourceArgs for BucketPublicAccessBlockArgs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BucketPublicAccessBlock
    }

    fn into_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("bucket".into(), self.bucket.map(Value::String));
        props.insert(
            "blockPublicAcls".into(),
            Input::Value(Value::Bool(self.block_public_acls)),
        );
        props.insert(
            "blockPublicPolicy".into(),
            Input::Value(Value::Bool(self.block_public_policy)),
        );
        props.insert(
            "ignorePublicAcls".into(),
            Input::Value(Value::Bool(self.ignore_public_acls)),
        );
        props.insert(
            "restrictPublicBuckets".into(),
            Input::Value(Value::Bool(self.restrict_public_buckets)),
        );
        props
    }
}

/// Arguments of a bucket policy.
#[derive(Debug, Clone)]
pub struct BucketPolicyArgs {
    /// Bucket name.
    pub bucket: Input<String>,
    /// Policy document as JSON text.
    pub policy: Input<String>,
}

impl ResourceArgs for BucketPolicyArgs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BucketPolicy
    }

    fn into_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("bucket".into(), self.bucket.map(Value::String));
        props.insert("policy".into(), self.policy.map(Value::String));
        props
    }
}
