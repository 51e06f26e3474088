//! Site manifests
//!
//! A manifest describes one static page in TOML, YAML, or JSON:
//!
//! ```toml
//! name = "demo"
//! index_document = "index.html"   # optional
//!
//! [pages."index.html"]
//! content = "<h1>Hello</h1>"
//!
//! [pages."about.html"]
//! file = "pages/about.html"       # relative to the manifest
//! ```
//!
//! A single page can be given as `index_content = "<h1>Hello</h1>"`
//! instead of `pages`.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::components::{Page, StaticPage, StaticPageArgs};
use crate::error::{Error, Result};
use crate::resource::ResourceOptions;
use crate::state::Stack;

/// Name of the stack output holding the site URL.
pub const URL_EXPORT: &str = "url";

/// Body of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageSource {
    /// Inline HTML
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// File holding the HTML, relative to the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// A page entry: inline HTML or a [`PageSource`] table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageEntry {
    /// Inline HTML
    Inline(String),
    /// Inline content or a file reference
    Source(PageSource),
}

/// Supported manifest formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// TOML
    Toml,
    /// YAML
    Yaml,
    /// JSON
    Json,
}

impl ManifestFormat {
    /// Format implied by a file extension; TOML when unknown.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => ManifestFormat::Yaml,
            Some("json") => ManifestFormat::Json,
            _ => ManifestFormat::Toml,
        }
    }
}

/// A static page described in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteManifest {
    /// Component name
    pub name: String,
    /// Key served for directory requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_document: Option<String>,
    /// Single page bound to the index document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_content: Option<String>,
    /// Pages keyed by object key
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub pages: IndexMap<String, PageEntry>,
    /// Directory file references are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
    /// File the manifest was loaded from
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl SiteManifest {
    /// Load a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ManifestLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut manifest = Self::parse(&content, ManifestFormat::from_path(path)).map_err(
            |message| Error::ManifestLoad {
                path: path.to_path_buf(),
                message,
            },
        )?;
        manifest.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        manifest.source = Some(path.to_path_buf());

        debug!(path = %path.display(), name = %manifest.name, "Loaded site manifest");
        Ok(manifest)
    }

    /// Parse manifest text. File references resolve against the current
    /// directory unless [`SiteManifest::with_base_dir`] is used.
    pub fn parse(content: &str, format: ManifestFormat) -> std::result::Result<Self, String> {
        match format {
            ManifestFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Resolve file references against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Build component arguments, reading referenced files.
    pub fn to_args(&self) -> Result<StaticPageArgs> {
        let mut args = StaticPageArgs::new();
        if let Some(index_document) = &self.index_document {
            args = args.with_index_document(index_document.clone());
        }

        match (&self.index_content, self.pages.is_empty()) {
            (Some(_), false) => Err(self.error("use either 'index_content' or 'pages', not both")),
            (Some(content), true) => {
                let key = args.index_document.clone();
                Ok(args.page(key, content.clone()))
            }
            (None, _) => {
                for (key, entry) in &self.pages {
                    args = args.with_page(Page {
                        key: key.clone(),
                        content: self.read_entry(key, entry)?,
                    });
                }
                Ok(args)
            }
        }
    }

    fn read_entry(&self, key: &str, entry: &PageEntry) -> Result<Option<String>> {
        match entry {
            PageEntry::Inline(content) => Ok(Some(content.clone())),
            PageEntry::Source(PageSource {
                content: Some(_),
                file: Some(_),
            }) => Err(self.error(format!(
                "page '{}' sets both 'content' and 'file'",
                key
            ))),
            PageEntry::Source(PageSource {
                content: Some(content),
                file: None,
            }) => Ok(Some(content.clone())),
            PageEntry::Source(PageSource {
                content: None,
                file: Some(file),
            }) => {
                let path = self.base_dir.join(file);
                std::fs::read_to_string(&path)
                    .map(Some)
                    .map_err(|e| Error::ManifestLoad {
                        path,
                        message: format!("cannot read page '{}': {}", key, e),
                    })
            }
            PageEntry::Source(PageSource {
                content: None,
                file: None,
            }) => Ok(None),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::ManifestLoad {
            path: self.source.clone().unwrap_or_else(|| self.base_dir.clone()),
            message: message.into(),
        }
    }

    /// Declare the static page in `stack` and export its URL.
    pub fn declare(&self, stack: &mut Stack) -> Result<StaticPage> {
        let page = StaticPage::new(stack, &self.name, self.to_args()?, ResourceOptions::new())?;
        stack.export(URL_EXPORT, page.endpoint().apply(Value::String));
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_toml_pages() {
        let manifest = SiteManifest::parse(
            r#"
name = "demo"

[pages]
"index.html" = "<h1>Hello</h1>"
"about.html" = { content = "<p>About</p>" }
"#,
            ManifestFormat::Toml,
        )
        .unwrap();

        let args = manifest.to_args().unwrap();
        assert_eq!(args.pages.len(), 2);
        let pages = args.validate("demo").unwrap();
        assert_eq!(pages.get("about.html"), Some("<p>About</p>"));
    }

    #[test]
    fn test_parse_yaml_index_content() {
        let manifest = SiteManifest::parse(
            "name: demo\nindex_content: \"<h1>Hello</h1>\"\n",
            ManifestFormat::Yaml,
        )
        .unwrap();
        let args = manifest.to_args().unwrap();
        assert_eq!(args, StaticPageArgs::from_index_content("<h1>Hello</h1>"));
    }

    #[test]
    fn test_both_forms_rejected() {
        let manifest = SiteManifest::parse(
            r#"{"name": "demo", "index_content": "a", "pages": {"index.html": "b"}}"#,
            ManifestFormat::Json,
        )
        .unwrap();
        assert!(matches!(manifest.to_args(), Err(Error::ManifestLoad { .. })));
    }

    #[test]
    fn test_empty_page_source_is_missing_content() {
        let manifest = SiteManifest::parse(
            r#"{"name": "demo", "pages": {"index.html": {}}}"#,
            ManifestFormat::Json,
        )
        .unwrap();
        let args = manifest.to_args().unwrap();
        assert!(matches!(
            args.validate("demo"),
            Err(Error::MissingPageContent(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(SiteManifest::parse("name = \"demo\"\nbucket = \"x\"\n", ManifestFormat::Toml).is_err());
    }

    #[test]
    fn test_load_reads_files_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pages")).unwrap();
        fs::write(dir.path().join("pages/index.html"), "<h1>From file</h1>").unwrap();
        let manifest_path = dir.path().join("site.toml");
        fs::write(
            &manifest_path,
            "name = \"demo\"\n[pages.\"index.html\"]\nfile = \"pages/index.html\"\n",
        )
        .unwrap();

        let manifest = SiteManifest::load(&manifest_path).unwrap();
        let pages = manifest.to_args().unwrap().validate("demo").unwrap();
        assert_eq!(pages.get("index.html"), Some("<h1>From file</h1>"));
    }

    #[test]
    fn test_missing_file_is_manifest_error() {
        let err = SiteManifest::load("/nonexistent/site.toml").unwrap_err();
        assert!(matches!(err, Error::ManifestLoad { .. }));
    }

    #[test]
    fn test_content_errors_name_the_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("site.toml");
        fs::write(
            &manifest_path,
            "name = \"demo\"\nindex_content = \"x\"\n[pages]\n\"about.html\" = \"y\"\n",
        )
        .unwrap();

        let manifest = SiteManifest::load(&manifest_path).unwrap();
        match manifest.to_args().unwrap_err() {
            Error::ManifestLoad { path, message } => {
                assert_eq!(path, manifest_path);
                assert!(message.contains("not both"));
            }
            other => panic!("expected manifest error, got {:?}", other),
        }
    }

    #[test]
    fn test_declare_exports_url() {
        let manifest =
            SiteManifest::parse("name = \"demo\"\nindex_content = \"<h1>Hi</h1>\"\n", ManifestFormat::Toml)
                .unwrap();
        let mut stack = Stack::new("site", "dev");
        manifest.declare(&mut stack).unwrap();
        assert!(stack.exports().contains_key(URL_EXPORT));
        assert_eq!(stack.len(), 6);
    }
}
