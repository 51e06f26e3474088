//! In-memory object store provider
//!
//! Models the parts of the storage service a static page relies on:
//!
//! - bucket auto-naming (`{name}-{7 hex}`) and global name collisions
//! - website hosting and its region-dependent endpoint
//! - objects with MD5 etags
//! - public access blocks, enabled on every new bucket, which make the
//!   service reject public policies until they are relaxed
//!
//! It also records every successful operation, can inject failures per
//! resource kind, and can answer anonymous reads of the website endpoint.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::provider::{
    CreateRequest, DeleteRequest, Outputs, Provider, ProviderError, ProviderResult,
};
use crate::policy::PolicyDocument;
use crate::resource::s3::{bucket_arn, generate_bucket_name, website_domain};
use crate::resource::{ResourceKind, ResourceUrn};

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Operation recorded by the simulated provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Resource created
    Create,
    /// Resource deleted
    Delete,
}

/// A successful provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    /// What happened
    pub operation: Operation,
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource URN
    pub urn: ResourceUrn,
}

/// Public access guard of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessBlock {
    /// Reject public ACLs
    pub block_public_acls: bool,
    /// Reject public policies
    pub block_public_policy: bool,
    /// Ignore existing public ACLs
    pub ignore_public_acls: bool,
    /// Refuse anonymous access even with a public policy
    pub restrict_public_buckets: bool,
}

impl AccessBlock {
    /// Every guard enabled, as on a new bucket.
    pub fn all_blocked() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Body
    pub content: String,
    /// MIME type
    pub content_type: String,
    /// MD5 of the body, hex encoded
    pub etag: String,
}

#[derive(Debug, Clone)]
struct SimBucket {
    region: String,
    index_suffix: Option<String>,
    objects: BTreeMap<String, StoredObject>,
    access_block: Option<AccessBlock>,
    policy: Option<String>,
}

impl SimBucket {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            index_suffix: None,
            objects: BTreeMap::new(),
            access_block: Some(AccessBlock::all_blocked()),
            policy: None,
        }
    }

    fn blocks_public_policy(&self) -> bool {
        self.access_block.is_some_and(|b| b.block_public_policy)
    }

    fn is_publicly_readable(&self, name: &str) -> bool {
        let restricted = self.access_block.is_some_and(|b| b.restrict_public_buckets);
        !restricted
            && self
                .policy
                .as_deref()
                .and_then(|p| PolicyDocument::parse(p).ok())
                .is_some_and(|doc| doc.allows_public_read(name))
    }
}

#[derive(Debug, Default)]
struct SimState {
    buckets: BTreeMap<String, SimBucket>,
    reserved: HashSet<String>,
    events: Vec<ProviderEvent>,
}

/// In-memory provider used by default and in tests.
#[derive(Debug)]
pub struct SimulatedProvider {
    region: String,
    latency: Option<Duration>,
    state: RwLock<SimState>,
    failures: RwLock<HashMap<ResourceKind, ProviderError>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

impl SimulatedProvider {
    /// A provider for `region`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            latency: None,
            state: RwLock::new(SimState::default()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Delay every call, to exercise concurrent scheduling.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Region of created buckets.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Fail every create of `kind` with `error`.
    pub fn fail_on(&self, kind: ResourceKind, error: ProviderError) {
        self.failures.write().insert(kind, error);
    }

    /// Mark a bucket name as owned by someone else.
    pub fn reserve_bucket(&self, name: impl Into<String>) {
        self.state.write().reserved.insert(name.into());
    }

    /// Successful operations, in completion order.
    pub fn events(&self) -> Vec<ProviderEvent> {
        self.state.read().events.clone()
    }

    /// Names of existing buckets.
    pub fn bucket_names(&self) -> Vec<String> {
        self.state.read().buckets.keys().cloned().collect()
    }

    /// A stored object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .read()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// Keys stored in a bucket.
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .read()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Policy attached to a bucket.
    pub fn policy(&self, bucket: &str) -> Option<String> {
        self.state
            .read()
            .buckets
            .get(bucket)
            .and_then(|b| b.policy.clone())
    }

    /// Public access guard of a bucket.
    pub fn access_block(&self, bucket: &str) -> Option<AccessBlock> {
        self.state
            .read()
            .buckets
            .get(bucket)
            .and_then(|b| b.access_block)
    }

    /// Anonymous HTTP GET against a website endpoint. Returns the body, or
    /// `None` when the request would be refused or nothing is there.
    pub fn fetch(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix("http://")?;
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));

        let state = self.state.read();
        let (name, bucket) = state.buckets.iter().find(|(name, bucket)| {
            host == format!("{}.{}", name, website_domain(&bucket.region))
        })?;

        let suffix = bucket.index_suffix.as_deref()?;
        if !bucket.is_publicly_readable(name) {
            return None;
        }

        let key = if path.is_empty() || path.ends_with('/') {
            format!("{}{}", path, suffix)
        } else {
            path.to_string()
        };
        bucket.objects.get(&key).map(|o| o.content.clone())
    }

    fn record(&self, state: &mut SimState, operation: Operation, kind: &ResourceKind, urn: &ResourceUrn) {
        trace!(?operation, urn = %urn, "Simulated provider event");
        state.events.push(ProviderEvent {
            operation,
            kind: kind.clone(),
            urn: urn.clone(),
        });
    }


    fn create_bucket(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let name = match request.opt_str_input("bucket") {
            Some(name) => name.to_string(),
            None => generate_bucket_name(request.urn.name()),
        };

        let mut state = self.state.write();
        if state.buckets.contains_key(&name) || state.reserved.contains(&name) {
            return Err(ProviderError::BucketAlreadyExists(name));
        }
        state
            .buckets
            .insert(name.clone(), SimBucket::new(&self.region));
        self.record(&mut state, Operation::Create, &request.kind, &request.urn);

        debug!(bucket = %name, region = %self.region, "Created bucket");
        Ok(Outputs::from([
            ("id".to_string(), json!(name)),
            ("bucket".to_string(), json!(name)),
            ("arn".to_string(), json!(bucket_arn(&name))),
            ("region".to_string(), json!(self.region)),
            (
                "bucketDomainName".to_string(),
                json!(format!("{}.s3.amazonaws.com", name)),
            ),
        ]))
    }

    fn with_bucket<T>(
        &self,
        request: &CreateRequest,
        f: impl FnOnce(&str, &mut SimBucket) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        let name = request.str_input("bucket")?;
        let mut state = self.state.write();
        let bucket = state
            .buckets
            .get_mut(name)
            .ok_or_else(|| ProviderError::NoSuchBucket(name.to_string()))?;
        let result = f(name, bucket)?;
        self.record(&mut state, Operation::Create, &request.kind, &request.urn);
        Ok(result)
    }

    fn create_website(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let suffix = request
            .inputs
            .get("indexDocument")
            .and_then(|d| d.get("suffix"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::invalid_input(&request.urn, "missing index document suffix"))?
            .to_string();

        self.with_bucket(request, |name, bucket| {
            bucket.index_suffix = Some(suffix);
            let domain = website_domain(&bucket.region);
            Ok(Outputs::from([
                ("id".to_string(), json!(name)),
                (
                    "websiteEndpoint".to_string(),
                    json!(format!("{}.{}", name, domain)),
                ),
                ("websiteDomain".to_string(), json!(domain)),
            ]))
        })
    }

    fn create_object(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let key = request.str_input("key")?.to_string();
        let content = request.str_input("content")?.to_string();
        let content_type = request
            .opt_str_input("contentType")
            .unwrap_or("binary/octet-stream")
            .to_string();
        let etag = format!("{:x}", md5::compute(content.as_bytes()));

        self.with_bucket(request, |_, bucket| {
            bucket.objects.insert(
                key.clone(),
                StoredObject {
                    content,
                    content_type,
                    etag: etag.clone(),
                },
            );
            Ok(Outputs::from([
                ("id".to_string(), json!(key)),
                ("key".to_string(), json!(key)),
                ("etag".to_string(), json!(etag)),
            ]))
        })
    }

    fn create_access_block(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let block = AccessBlock {
            block_public_acls: request.bool_input("blockPublicAcls"),
            block_public_policy: request.bool_input("blockPublicPolicy"),
            ignore_public_acls: request.bool_input("ignorePublicAcls"),
            restrict_public_buckets: request.bool_input("restrictPublicBuckets"),
        };
        self.with_bucket(request, |name, bucket| {
            bucket.access_block = Some(block);
            Ok(Outputs::from([("id".to_string(), json!(name))]))
        })
    }

    fn create_policy(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let text = request.str_input("policy")?.to_string();
        let document = PolicyDocument::parse(&text).map_err(|e| {
            ProviderError::invalid_input(&request.urn, format!("malformed policy: {}", e))
        })?;

        self.with_bucket(request, |name, bucket| {
            if document.is_public() && bucket.blocks_public_policy() {
                return Err(ProviderError::AccessDenied(format!(
                    "public policies are blocked by the public access block of bucket '{}'",
                    name
                )));
            }
            bucket.policy = Some(text);
            Ok(Outputs::from([("id".to_string(), json!(name))]))
        })
    }

    fn delete_resource(&self, request: &DeleteRequest) -> ProviderResult<()> {
        let mut state = self.state.write();

        if request.kind == ResourceKind::Bucket {
            let name = request.attribute("bucket")?;
            let force = request
                .inputs
                .get("forceDestroy")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let bucket = state
                .buckets
                .get(name)
                .ok_or_else(|| ProviderError::NoSuchBucket(name.to_string()))?;
            if !bucket.objects.is_empty() && !force {
                return Err(ProviderError::BucketNotEmpty(name.to_string()));
            }
            state.buckets.remove(name);
        } else {
            let name = request.attribute("bucket")?;
            let bucket = state
                .buckets
                .get_mut(name)
                .ok_or_else(|| ProviderError::NoSuchBucket(name.to_string()))?;
            match &request.kind {
                ResourceKind::BucketWebsiteConfiguration => bucket.index_suffix = None,
                ResourceKind::BucketObject => {
                    let key = request.attribute("key")?;
                    bucket.objects.remove(key);
                }
                ResourceKind::BucketPublicAccessBlock => bucket.access_block = None,
                ResourceKind::BucketPolicy => bucket.policy = None,
                other => {
                    return Err(ProviderError::UnsupportedResource(other.to_string()));
                }
            }
        }

        self.record(&mut state, Operation::Delete, &request.kind, &request.urn);
        Ok(())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        self.simulate_latency().await;

        if let Some(error) = self.failures.read().get(&request.kind).cloned() {
            return Err(error);
        }

        match &request.kind {
            ResourceKind::Bucket => self.create_bucket(request),
            ResourceKind::BucketWebsiteConfiguration => self.create_website(request),
            ResourceKind::BucketObject => self.create_object(request),
            ResourceKind::BucketPublicAccessBlock => self.create_access_block(request),
            ResourceKind::BucketPolicy => self.create_policy(request),
            ResourceKind::Component(token) => {
                Err(ProviderError::UnsupportedResource(token.clone()))
            }
        }
    }

    async fn delete(&self, request: &DeleteRequest) -> ProviderResult<()> {
        self.simulate_latency().await;
        self.delete_resource(request)
    }
}
