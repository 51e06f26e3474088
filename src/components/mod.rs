//! Reusable components built from provider resources.

pub mod static_page;

pub use static_page::{
    Page, PageSet, StaticPage, StaticPageArgs, DEFAULT_INDEX_DOCUMENT, HTML_CONTENT_TYPE,
};
