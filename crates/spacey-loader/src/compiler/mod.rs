// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! TypeScript compiler backends
//!
//! The loader does not compile TypeScript itself. It drives one of several
//! third-party compilers, fastest first:
//!
//! | name      | package      |
//! |-----------|--------------|
//! | `swc`     | `@swc/core`  |
//! | `esbuild` | `esbuild`    |
//! | `sucrase` | `sucrase`    |
//! | `tsc`     | `typescript` |
//!
//! Each backend receives the same normalized [`CompilerOptions`] and must
//! strip types, honor CommonJS vs ESM output, honor `removeComments`, and
//! switch to JSX parsing for `.tsx` files.

mod backend;
mod bridge;
mod registry;

pub use backend::{Backend, DriverOutput};
pub use bridge::{BackendDescriptor, NodeCompiler};
pub use registry::CompilerRegistry;

use crate::error::Result;
use crate::tsconfig::CompilerOptions;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Compile a module from TypeScript to JavaScript.
#[async_trait]
pub trait Compile: Send + Sync {
    /// Transform `code` read from `filename` with normalized `options`
    async fn compile(&self, code: &str, filename: &Path, options: &CompilerOptions)
    -> Result<String>;
}

/// Shared handle to an instantiated compiler
pub type CompileFn = Arc<dyn Compile>;

/// A named, lazily instantiated compiler backend.
#[async_trait]
pub trait CompilerDescriptor: Send + Sync {
    /// Stable name used for explicit selection
    fn name(&self) -> &str;

    /// Produce a compiler.
    ///
    /// Fails with [`LoaderError::BackendUnavailable`](crate::LoaderError::BackendUnavailable)
    /// when the backend is not installed; any other error aborts detection.
    async fn instantiate(&self) -> Result<CompileFn>;
}
