//! # staticpage - Public Static Websites on Object Storage
//!
//! staticpage declares a bucket configured for static website hosting,
//! uploads a set of HTML pages into it, opens it to anonymous reads, and
//! reports the public URL. A small standalone engine realizes the
//! declaration against a provider: an in-memory simulation by default, or
//! AWS S3 with the `aws` feature.
//!
//! ## Public exposure
//!
//! **Every object a static page uploads is readable by anyone on the
//! internet, and the resources are billed to the deploying account.** The
//! component relaxes the bucket's public access block and attaches a policy
//! granting `s3:GetObject` to `*`. Do not put anything in a static page you
//! would not publish.
//!
//! ## Core Concepts
//!
//! - **Stack**: the declaration scope; owns the resource graph
//! - **Resources**: bucket, website configuration, objects, public access
//!   block, and bucket policy, each with typed arguments
//! - **Outputs**: deferred values such as the generated bucket name or the
//!   website endpoint, combined with [`Output::apply`](output::Output::apply)
//! - **Engine**: realizes a stack in dependency order, running independent
//!   resources concurrently
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │            (preview, up, graph, export, validate)                    │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    StaticPage component + Stack                      │
//! │        (validation, resource declaration, dependency graph)          │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              Engine                                  │
//! │          (ready-queue scheduling, output resolution, destroy)        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                   ┌────────────────┴────────────────┐
//!                   ▼                                 ▼
//!        ┌─────────────────────┐          ┌─────────────────────┐
//!        │  SimulatedProvider  │          │     AwsProvider     │
//!        │    (in-memory)      │          │  (feature = "aws")  │
//!        └─────────────────────┘          └─────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use staticpage::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut stack = Stack::new("site", "dev");
//!     let page = StaticPage::new(
//!         &mut stack,
//!         "demo",
//!         StaticPageArgs::from_index_content("<h1>Hello</h1>"),
//!         ResourceOptions::new(),
//!     )?;
//!
//!     let engine = Engine::new(Arc::new(SimulatedProvider::default()));
//!     engine.up(stack).await?;
//!     println!("{}", page.endpoint().resolve().await?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use std::sync::Arc;

    pub use crate::components::{Page, StaticPage, StaticPageArgs};
    pub use crate::engine::{Deployment, Engine, Provider, ProviderError, SimulatedProvider};
    pub use crate::error::{Error, Result};
    pub use crate::output::{Input, Output};
    pub use crate::resource::{ResourceKind, ResourceOptions, ResourceUrn};
    pub use crate::site::SiteManifest;
    pub use crate::state::{DiffEngine, Stack, StateSnapshot};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Deferred values produced by resources.
pub mod output;

/// Resource identities, kinds, and typed arguments.
pub mod resource;

/// Bucket policy documents.
pub mod policy;

// ============================================================================
// Declaration
// ============================================================================

/// Declaration scope, dependency graph, snapshots, and diffs.
pub mod state;

/// Reusable components, such as the static page.
pub mod components;

/// Site manifests describing a static page in a file.
pub mod site;

// ============================================================================
// Execution Engine
// ============================================================================

/// Standalone engine and providers.
///
/// The [`Engine`](engine::Engine) schedules each resource once everything
/// it depends on is realized, bounded by a configurable parallelism.
pub mod engine;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration file loading and environment overrides.
pub mod config;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build details of this binary.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Target architecture
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "staticpage {} ({}, {})",
            self.version, self.target, self.profile
        )
    }
}
