// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-loader
//!
//! Resolve and load hooks that let a Node.js-compatible module loader run
//! TypeScript sources directly.
//!
//! The loader sits in front of the host's native stages and:
//!
//! - resolves bare specifiers through the `paths` / `baseUrl` aliases of the
//!   importer's `tsconfig.json`
//! - falls back from `./x.js` to `./x.ts` (and `.jsx`/`.mjs`/`.cjs` to their
//!   TypeScript twins) when the compiled file does not exist
//! - decides CommonJS vs ESM from the extension and the nearest
//!   `package.json`, the same way Node.js does
//! - compiles with the first installed of `@swc/core`, `esbuild`, `sucrase`
//!   and `typescript`, or the one named by `TS_COMPILER`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_loader::{LoaderConfig, TsLoader};
//! use spacey_loader::hooks::{LoadContext, ResolveContext};
//! use spacey_loader::module_system::{FsLoader, NodeResolver};
//!
//! #[tokio::main]
//! async fn main() -> spacey_loader::Result<()> {
//!     let loader = TsLoader::new(&LoaderConfig::from_env());
//!     let native = FsLoader::new(loader.formats().clone());
//!
//!     let context = ResolveContext::from_parent("file:///app/src/main.ts");
//!     let resolved = loader.resolve("./util.js", &context, &NodeResolver::new()).await?;
//!     let loaded = loader.load(&resolved.url, &LoadContext::default(), &native).await?;
//!     println!("{}", loaded.source.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Caches
//!
//! Parsed tsconfig files, package types and the detected compiler live for
//! as long as the [`TsLoader`]. [`TsLoader::clear_caches`] drops them all.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod format;
pub mod hooks;
pub mod module_system;
pub mod path;
pub mod tsconfig;
pub mod typescript;

// Re-exports
pub use compiler::{Backend, Compile, CompileFn, CompilerDescriptor, CompilerRegistry};
pub use config::{LoaderConfig, COMPILER_ENV};
pub use error::{LoaderError, Result};
pub use format::{FormatDetector, ModuleFormat};
pub use hooks::{LoadHook, ResolveHook, TransformPipeline, Transformed};
pub use tsconfig::{AliasRule, CompilerOptions, ConfigEntry, ConfigStore};
pub use typescript::{is_declaration_file, is_jsx_file};

use hooks::{LoadContext, Loaded, NextLoad, NextResolve, ResolveContext, Resolved};
use std::sync::Arc;

/// The TypeScript loader: both hooks over one set of process-wide caches.
#[derive(Debug)]
pub struct TsLoader {
    configs: Arc<ConfigStore>,
    formats: Arc<FormatDetector>,
    compilers: Arc<CompilerRegistry>,
    resolve_hook: ResolveHook,
    load_hook: LoadHook,
}

impl TsLoader {
    /// Create a loader compiling with the npm backends
    pub fn new(config: &LoaderConfig) -> Self {
        Self::with_registry(CompilerRegistry::new(config))
    }

    /// Create a loader compiling with `registry`
    pub fn with_registry(registry: CompilerRegistry) -> Self {
        let configs = Arc::new(ConfigStore::new());
        let formats = Arc::new(FormatDetector::new());
        let compilers = Arc::new(registry);
        let pipeline = TransformPipeline::new(configs.clone(), formats.clone(), compilers.clone());

        Self {
            resolve_hook: ResolveHook::new(configs.clone()),
            load_hook: LoadHook::new(pipeline),
            configs,
            formats,
            compilers,
        }
    }

    /// Resolve hook entry point
    pub async fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolved> {
        self.resolve_hook.resolve(specifier, context, next).await
    }

    /// Load hook entry point
    pub async fn load(&self, url: &str, context: &LoadContext, next: &dyn NextLoad) -> Result<Loaded> {
        self.load_hook.load(url, context, next).await
    }

    /// The transform pipeline behind [`load`](Self::load)
    pub fn pipeline(&self) -> &TransformPipeline {
        self.load_hook.pipeline()
    }

    /// Parsed tsconfig cache
    pub fn configs(&self) -> &Arc<ConfigStore> {
        &self.configs
    }

    /// Package type cache
    pub fn formats(&self) -> &Arc<FormatDetector> {
        &self.formats
    }

    /// Compiler selection
    pub fn compilers(&self) -> &Arc<CompilerRegistry> {
        &self.compilers
    }

    /// Drop every cache and forget the detected compiler
    pub fn clear_caches(&self) {
        self.configs.clear();
        self.formats.clear();
        self.compilers.clear();
    }
}
