//! AWS S3 provider
//!
//! Realizes static page resources against the real S3 API. Credentials and
//! the default region come from the standard AWS configuration chain.
//!
//! Only the calls a static page needs are implemented. There are no retries
//! beyond what the SDK does on its own.

use std::fmt;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, IndexDocument,
    PublicAccessBlockConfiguration, WebsiteConfiguration,
};
use aws_sdk_s3::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::{
    CreateRequest, DeleteRequest, Outputs, Provider, ProviderError, ProviderResult,
};
use crate::resource::s3::{bucket_arn, generate_bucket_name, website_domain};
use crate::resource::ResourceKind;

/// Region without a location constraint.
const US_EAST_1: &str = "us-east-1";

/// Provider backed by `aws-sdk-s3`.
pub struct AwsProvider {
    client: Client,
    region: String,
}

impl fmt::Debug for AwsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsProvider")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsProvider {
    /// Load AWS configuration, optionally pinning the region.
    pub async fn new(region: Option<&str>) -> ProviderResult<Self> {
        let config = if let Some(region_str) = region {
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::defaults(BehaviorVersion::latest()).load().await
        };

        let region = config
            .region()
            .map(ToString::to_string)
            .ok_or_else(|| ProviderError::Authentication("no AWS region configured".to_string()))?;

        Ok(Self {
            client: Client::new(&config),
            region,
        })
    }

    /// Region buckets are created in.
    pub fn region(&self) -> &str {
        &self.region
    }

    async fn create_bucket(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let name = match request.opt_str_input("bucket") {
            Some(name) => name.to_string(),
            None => generate_bucket_name(request.urn.name()),
        };

        let mut call = self.client.create_bucket().bucket(&name);
        if self.region != US_EAST_1 {
            call = call.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        call.send()
            .await
            .map_err(|e| map_sdk_error("CreateBucket", &name, e))?;

        debug!(bucket = %name, region = %self.region, "Created S3 bucket");
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

    async fn create_website(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let bucket = request.str_input("bucket")?;
        let suffix = request
            .inputs
            .get("indexDocument")
            .and_then(|d| d.get("suffix"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::invalid_input(&request.urn, "missing index document suffix"))?;

        let index = IndexDocument::builder()
            .suffix(suffix)
            .build()
            .map_err(|e| ProviderError::invalid_input(&request.urn, e.to_string()))?;
        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(WebsiteConfiguration::builder().index_document(index).build())
            .send()
            .await
            .map_err(|e| map_sdk_error("PutBucketWebsite", bucket, e))?;

        let domain = website_domain(&self.region);
        Ok(Outputs::from([
            ("id".to_string(), json!(bucket)),
            (
                "websiteEndpoint".to_string(),
                json!(format!("{}.{}", bucket, domain)),
            ),
            ("websiteDomain".to_string(), json!(domain)),
        ]))
    }

    async fn create_object(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let bucket = request.str_input("bucket")?;
        let key = request.str_input("key")?;
        let content = request.str_input("content")?;

        let mut call = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content.as_bytes().to_vec()));
        if let Some(content_type) = request.opt_str_input("contentType") {
            call = call.content_type(content_type);
        }
        let response = call
            .send()
            .await
            .map_err(|e| map_sdk_error("PutObject", bucket, e))?;

        let etag = response
            .e_tag()
            .map(|t| t.trim_matches('"').to_string())
            .unwrap_or_default();
        Ok(Outputs::from([
            ("id".to_string(), json!(key)),
            ("key".to_string(), json!(key)),
            ("etag".to_string(), json!(etag)),
        ]))
    }

    async fn create_access_block(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let bucket = request.str_input("bucket")?;
        let configuration = PublicAccessBlockConfiguration::builder()
            .block_public_acls(request.bool_input("blockPublicAcls"))
            .block_public_policy(request.bool_input("blockPublicPolicy"))
            .ignore_public_acls(request.bool_input("ignorePublicAcls"))
            .restrict_public_buckets(request.bool_input("restrictPublicBuckets"))
            .build();

        self.client
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(configuration)
            .send()
            .await
            .map_err(|e| map_sdk_error("PutPublicAccessBlock", bucket, e))?;

        Ok(Outputs::from([("id".to_string(), json!(bucket))]))
    }

    async fn create_policy(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        let bucket = request.str_input("bucket")?;
        let policy = request.str_input("policy")?;

        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| map_sdk_error("PutBucketPolicy", bucket, e))?;

        Ok(Outputs::from([("id".to_string(), json!(bucket))]))
    }
}

#[async_trait]
impl Provider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        match &request.kind {
            ResourceKind::Bucket => self.create_bucket(request).await,
            ResourceKind::BucketWebsiteConfiguration => self.create_website(request).await,
            ResourceKind::BucketObject => self.create_object(request).await,
            ResourceKind::BucketPublicAccessBlock => self.create_access_block(request).await,
            ResourceKind::BucketPolicy => self.create_policy(request).await,
            ResourceKind::Component(token) => {
                Err(ProviderError::UnsupportedResource(token.clone()))
            }
        }
    }

    async fn delete(&self, request: &DeleteRequest) -> ProviderResult<()> {
        let bucket = request.attribute("bucket")?;
        match &request.kind {
            ResourceKind::Bucket => self
                .client
                .delete_bucket()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("DeleteBucket", bucket, e)),
            ResourceKind::BucketWebsiteConfiguration => self
                .client
                .delete_bucket_website()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("DeleteBucketWebsite", bucket, e)),
            ResourceKind::BucketObject => {
                let key = request.attribute("key")?;
                self.client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| map_sdk_error("DeleteObject", bucket, e))
            }
            ResourceKind::BucketPublicAccessBlock => self
                .client
                .delete_public_access_block()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("DeletePublicAccessBlock", bucket, e)),
            ResourceKind::BucketPolicy => self
                .client
                .delete_bucket_policy()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("DeleteBucketPolicy", bucket, e)),
            ResourceKind::Component(token) => {
                Err(ProviderError::UnsupportedResource(token.clone()))
            }
        }
    }
}

/// Translate an SDK failure into a provider error, keeping the service's
/// error code where it has a dedicated variant.
fn map_sdk_error<E, R>(operation: &str, bucket: &str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let message = err
        .message()
        .map(ToString::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    match err.code() {
        Some("BucketAlreadyExists") | Some("BucketAlreadyOwnedByYou") => {
            ProviderError::BucketAlreadyExists(bucket.to_string())
        }
        Some("NoSuchBucket") => ProviderError::NoSuchBucket(bucket.to_string()),
        Some("BucketNotEmpty") => ProviderError::BucketNotEmpty(bucket.to_string()),
        Some("AccessDenied") => ProviderError::AccessDenied(message),
        Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") | Some("ExpiredToken") => {
            ProviderError::Authentication(message)
        }
        _ => ProviderError::api(operation, message),
    }
}
