//! Shared test utilities and fixtures for the staticpage test suite.
//!
//! This module provides:
//! - Stack fixtures declaring static pages
//! - Providers that gate, observe, or count provider calls
//! - Manifest helpers for CLI tests
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use staticpage::components::{StaticPage, StaticPageArgs};
use staticpage::engine::{
    CreateRequest, DeleteRequest, Outputs, Provider, ProviderResult, SimulatedProvider,
};
use staticpage::resource::{ResourceKind, ResourceOptions};
use staticpage::state::Stack;

/// Body of the canonical single-page site.
pub const HELLO: &str = "<h1>Hello</h1>";

/// A stack holding one static page named `name` with `pages`.
pub fn stack_with_pages(name: &str, pages: &[(&str, &str)]) -> (Stack, StaticPage) {
    let mut stack = Stack::new("site", "test");
    let args: StaticPageArgs = pages.iter().map(|(k, v)| (*k, *v)).collect();
    let page = StaticPage::new(&mut stack, name, args, ResourceOptions::new())
        .expect("static page declares");
    (stack, page)
}

/// The canonical `{"index.html": "<h1>Hello</h1>"}` site.
pub fn hello_stack() -> (Stack, StaticPage) {
    stack_with_pages("demo", &[("index.html", HELLO)])
}

/// Wraps a [`SimulatedProvider`], holding creates of one kind until
/// released, and tracking how many creates run at once.
#[derive(Debug)]
pub struct GatedProvider {
    inner: Arc<SimulatedProvider>,
    gated: Option<ResourceKind>,
    gate: Notify,
    started: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    starts: Mutex<Vec<ResourceKind>>,
}

impl GatedProvider {
    /// A provider that never gates.
    pub fn new(inner: Arc<SimulatedProvider>) -> Self {
        Self {
            inner,
            gated: None,
            gate: Notify::new(),
            started: Notify::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: None,
            starts: Mutex::new(Vec::new()),
        }
    }

    /// Hold creates of `kind` until [`GatedProvider::release`].
    pub fn gate(mut self, kind: ResourceKind) -> Self {
        self.gated = Some(kind);
        self
    }

    /// Sleep inside every create.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Let gated creates proceed.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Wait until a gated create has started.
    pub async fn wait_for_gated(&self) {
        self.started.notified().await;
    }

    /// Largest number of creates observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Kinds in the order their creates started.
    pub fn starts(&self) -> Vec<ResourceKind> {
        self.starts.lock().clone()
    }

    /// The wrapped simulation.
    pub fn inner(&self) -> &Arc<SimulatedProvider> {
        &self.inner
    }
}

#[async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        self.starts.lock().push(request.kind.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.gated.as_ref() == Some(&request.kind) {
            self.started.notify_one();
            self.gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.inner.create(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, request: &DeleteRequest) -> ProviderResult<()> {
        self.inner.delete(request).await
    }
}

/// Counts provider calls per kind.
#[derive(Debug, Default)]
pub struct CountingProvider {
    inner: SimulatedProvider,
    creates: Mutex<HashMap<String, usize>>,
}

impl CountingProvider {
    /// Creates seen for `kind`.
    pub fn creates_of(&self, kind: &ResourceKind) -> usize {
        self.creates
            .lock()
            .get(kind.type_token())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<Outputs> {
        *self
            .creates
            .lock()
            .entry(request.kind.type_token().to_string())
            .or_default() += 1;
        self.inner.create(request).await
    }

    async fn delete(&self, request: &DeleteRequest) -> ProviderResult<()> {
        self.inner.delete(request).await
    }
}

/// Write a manifest file into `dir`.
pub fn write_manifest(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, contents).expect("manifest written");
    path
}

/// A TOML manifest for a single-page site.
pub fn hello_manifest(dir: &Path) -> PathBuf {
    write_manifest(
        dir,
        "site.toml",
        "name = \"demo\"\nindex_content = \"<h1>Hello</h1>\"\n",
    )
}
