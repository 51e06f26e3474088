//! Static Page Component
//!
//! Provisions a bucket configured for public static website hosting, uploads
//! a set of HTML pages into it, and publishes the public URL as the
//! component output `endpoint`.
//!
//! # Resources
//!
//! | Logical name                  | Kind                          | Depends on                  |
//! |-------------------------------|-------------------------------|-----------------------------|
//! | `{name}`                      | bucket                        | component                   |
//! | `{name}-website`              | bucket website configuration  | bucket                      |
//! | `{name}-index-object`         | bucket object (index page)    | bucket                      |
//! | `{name}-object-{key}`         | bucket object (other pages)   | bucket                      |
//! | `{name}-public-access-block`  | bucket public access block    | bucket                      |
//! | `{name}-bucket-policy`        | bucket policy                 | bucket, public access block |
//!
//! # Public exposure
//!
//! Every object in the bucket becomes readable by anyone on the internet,
//! and the bucket is billed to the deploying account. A warning is logged
//! each time a static page is declared.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut stack = Stack::new("site", "dev");
//! let page = StaticPage::new(
//!     &mut stack,
//!     "demo",
//!     StaticPageArgs::from_index_content("<h1>Hello</h1>"),
//!     ResourceOptions::new(),
//! )?;
//! stack.export("url", page.endpoint().apply(serde_json::Value::String));
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::output::Output;
use crate::policy::public_read_policy;
use crate::resource::{
    BucketArgs, BucketObjectArgs, BucketPolicyArgs, BucketPublicAccessBlockArgs,
    BucketWebsiteConfigurationArgs, IndexDocument, RegisteredResource, ResourceKind,
    ResourceOptions, ResourceUrn, STATIC_PAGE_TYPE,
};
use crate::state::Stack;

/// Index document used when none is configured.
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";

/// Content type of every uploaded page.
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// One page to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Object key, relative to the bucket root
    pub key: String,
    /// HTML body
    pub content: Option<String>,
}

impl Page {
    /// A page with a body.
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: Some(content.into()),
        }
    }
}

/// Arguments of a static page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPageArgs {
    /// Pages to upload, in declaration order
    pub pages: Vec<Page>,
    /// Key served for directory requests
    pub index_document: String,
}

impl Default for StaticPageArgs {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticPageArgs {
    /// Arguments with no pages and the default index document.
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
        }
    }

    /// A single page bound to `index.html`.
    pub fn from_index_content(content: impl Into<String>) -> Self {
        Self::new().page(DEFAULT_INDEX_DOCUMENT, content)
    }

    /// Add a page.
    pub fn page(mut self, key: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages.push(Page::new(key, content));
        self
    }

    /// Add a page that may lack a body.
    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.push(page);
        self
    }

    /// Serve a different key for directory requests.
    pub fn with_index_document(mut self, index_document: impl Into<String>) -> Self {
        self.index_document = index_document.into();
        self
    }

    /// Check the page set of component `name`.
    pub fn validate(&self, name: &str) -> Result<PageSet> {
        validate_page_key(&self.index_document)?;
        if self.index_document.contains('/') {
            return Err(Error::invalid_page_key(
                &self.index_document,
                "the index document must not contain '/'",
            ));
        }
        if self.pages.is_empty() {
            return Err(Error::EmptyPageSet(name.to_string()));
        }

        let mut pages = IndexMap::with_capacity(self.pages.len());
        for page in &self.pages {
            validate_page_key(&page.key)?;
            let content = page
                .content
                .as_ref()
                .ok_or_else(|| Error::MissingPageContent(page.key.clone()))?;
            if pages.insert(page.key.clone(), content.clone()).is_some() {
                return Err(Error::DuplicatePageKey(page.key.clone()));
            }
        }

        if !pages.contains_key(&self.index_document) {
            return Err(Error::MissingIndexDocument(self.index_document.clone()));
        }

        Ok(PageSet {
            index_document: self.index_document.clone(),
            pages,
        })
    }
}

impl<K, V> FromIterator<(K, V)> for StaticPageArgs
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |args, (key, content)| args.page(key, content))
    }
}

/// A validated set of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    index_document: String,
    pages: IndexMap<String, String>,
}

impl PageSet {
    /// Key served for directory requests.
    pub fn index_document(&self) -> &str {
        &self.index_document
    }

    /// Pages in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Body of a page.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pages.get(key).map(String::as_str)
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always false for a validated set.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Check a component name before any resource is derived from it.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "name must not be empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::invalid_name(
            name,
            format!("character '{}' is not allowed", c.escape_default()),
        ));
    }
    Ok(())
}

/// Check that a page key is a relative path inside the bucket.
pub fn validate_page_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_page_key(key, "key must not be empty"));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(Error::invalid_page_key(key, "keys must be relative"));
    }
    if key.chars().any(char::is_control) {
        return Err(Error::invalid_page_key(key, "keys must not contain control characters"));
    }
    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => {
                return Err(Error::invalid_page_key(key, "keys must not contain '..'"));
            }
            _ => {
                return Err(Error::invalid_page_key(
                    key,
                    "keys must be plain relative paths",
                ));
            }
        }
    }
    Ok(())
}

fn object_name(name: &str, key: &str, index_document: &str) -> String {
    if key == index_document {
        format!("{}-index-object", name)
    } else {
        format!("{}-object-{}", name, key)
    }
}

/// Fail if any resource of the page would collide with one already in
/// `stack`, so a rejected page leaves nothing behind.
fn ensure_undeclared(
    stack: &Stack,
    name: &str,
    pages: &PageSet,
    opts: &ResourceOptions,
) -> Result<()> {
    let urn_of = |parent: Option<&ResourceUrn>, kind: &ResourceKind, child: &str| {
        ResourceUrn::new(stack.name(), stack.project(), parent, kind, child)
    };

    let component = urn_of(
        opts.parent.as_ref(),
        &ResourceKind::Component(STATIC_PAGE_TYPE.to_string()),
        name,
    );
    let bucket = urn_of(Some(&component), &ResourceKind::Bucket, name);

    let mut planned = vec![
        urn_of(
            Some(&bucket),
            &ResourceKind::BucketWebsiteConfiguration,
            &format!("{}-website", name),
        ),
        urn_of(
            Some(&bucket),
            &ResourceKind::BucketPublicAccessBlock,
            &format!("{}-public-access-block", name),
        ),
        urn_of(
            Some(&bucket),
            &ResourceKind::BucketPolicy,
            &format!("{}-bucket-policy", name),
        ),
    ];
    planned.extend(pages.iter().map(|(key, _)| {
        urn_of(
            Some(&bucket),
            &ResourceKind::BucketObject,
            &object_name(name, key, pages.index_document()),
        )
    }));

    for urn in [component, bucket].into_iter().chain(planned) {
        if stack.resource(&urn).is_some() {
            return Err(Error::DuplicateResource(urn.to_string()));
        }
    }
    Ok(())
}

/// A bucket serving HTML pages to the public internet.
#[derive(Debug, Clone)]
pub struct StaticPage {
    urn: ResourceUrn,
    bucket: RegisteredResource,
    website: RegisteredResource,
    objects: Vec<RegisteredResource>,
    access_block: RegisteredResource,
    policy: RegisteredResource,
    endpoint: Output<String>,
}

impl StaticPage {
    /// Declare a static page named `name` in `stack`.
    ///
    /// The arguments are validated first; on error nothing is declared.
    #[instrument(skip(stack, args, opts), fields(pages = args.pages.len()))]
    pub fn new(
        stack: &mut Stack,
        name: &str,
        args: StaticPageArgs,
        opts: ResourceOptions,
    ) -> Result<Self> {
        validate_name(name)?;
        let pages = args.validate(name)?;
        ensure_undeclared(stack, name, &pages, &opts)?;

        warn!(
            component = name,
            "Static page '{}' makes every uploaded object publicly readable and creates billable resources",
            name
        );

        let urn = stack.register_component(STATIC_PAGE_TYPE, name, &opts)?;

        let bucket = stack.register_resource(
            name,
            BucketArgs::default(),
            &ResourceOptions::new().parent(&urn),
        )?;
        let bucket_name = bucket.string_output("bucket");
        let in_bucket = ResourceOptions::new().parent(&bucket.urn);

        let website = stack.register_resource(
            &format!("{}-website", name),
            BucketWebsiteConfigurationArgs {
                bucket: bucket_name.clone().into(),
                index_document: IndexDocument {
                    suffix: pages.index_document().to_string(),
                },
                error_document: None,
            },
            &in_bucket,
        )?;

        let mut objects = Vec::with_capacity(pages.len());
        for (key, content) in pages.iter() {
            objects.push(stack.register_resource(
                &object_name(name, key, pages.index_document()),
                BucketObjectArgs {
                    bucket: bucket_name.clone().into(),
                    key: key.to_string(),
                    content: content.to_string(),
                    content_type: HTML_CONTENT_TYPE.to_string(),
                },
                &in_bucket,
            )?);
        }

        let access_block = stack.register_resource(
            &format!("{}-public-access-block", name),
            BucketPublicAccessBlockArgs::allow_public(bucket.string_output("id").into()),
            &in_bucket,
        )?;

        // The provider rejects a public policy while the block is active.
        let policy = stack.register_resource(
            &format!("{}-bucket-policy", name),
            BucketPolicyArgs {
                bucket: bucket_name.clone().into(),
                policy: bucket_name.apply(|b| public_read_policy(&b)).into(),
            },
            &in_bucket.clone().depends_on(&access_block.urn),
        )?;

        let endpoint = website
            .string_output("websiteEndpoint")
            .apply(|host| format!("http://{}", host));

        stack.register_outputs(
            &urn,
            BTreeMap::from([("endpoint".to_string(), endpoint.apply(Value::String))]),
        )?;

        debug!(urn = %urn, objects = objects.len(), "Declared static page");

        Ok(Self {
            urn,
            bucket,
            website,
            objects,
            access_block,
            policy,
            endpoint,
        })
    }

    /// Component URN.
    pub fn urn(&self) -> &ResourceUrn {
        &self.urn
    }

    /// Public website URL, known once the website configuration exists.
    pub fn endpoint(&self) -> &Output<String> {
        &self.endpoint
    }

    /// The bucket.
    pub fn bucket(&self) -> &RegisteredResource {
        &self.bucket
    }

    /// Provider-assigned bucket name.
    pub fn bucket_name(&self) -> Output<String> {
        self.bucket.string_output("bucket")
    }

    /// The website configuration.
    pub fn website(&self) -> &RegisteredResource {
        &self.website
    }

    /// Uploaded objects, in page order.
    pub fn objects(&self) -> &[RegisteredResource] {
        &self.objects
    }

    /// The public access block.
    pub fn access_block(&self) -> &RegisteredResource {
        &self.access_block
    }

    /// The bucket policy.
    pub fn policy(&self) -> &RegisteredResource {
        &self.policy
    }
}
