// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host loader extension points
//!
//! A host loader runs a chain of `resolve` and `load` stages. Each stage gets
//! the next one as a [`NextResolve`] / [`NextLoad`] value and may delegate to
//! it, retry it with a different input, or answer on its own.
//!
//! ## Resolve
//! [`ResolveHook`] tries tsconfig path aliases first, then the specifier as
//! written, then the `.js` → `.ts` rewrite of a missing local file.
//!
//! ## Load
//! [`LoadHook`] compiles `file:` URLs ending in `.ts`, `.tsx`, `.mts` or
//! `.cts` through the [`TransformPipeline`]; every other URL is passed on.

mod load;
mod resolve;
mod transform;

pub use load::LoadHook;
pub use resolve::ResolveHook;
pub use transform::{TransformPipeline, Transformed};

use crate::error::Result;
use crate::format::ModuleFormat;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// `with { type: "json" }` and friends
pub type ImportAttributes = BTreeMap<String, String>;

/// Context of one resolve request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveContext {
    /// URL of the importing module; absent for the entry point
    pub parent_url: Option<String>,
    /// Export conditions (`import`, `require`, `node`, ...)
    pub conditions: Vec<String>,
    /// Import attributes of the request
    pub import_attributes: ImportAttributes,
}

impl ResolveContext {
    /// Context for a request made by `parent_url`
    pub fn from_parent(parent_url: impl Into<String>) -> Self {
        Self {
            parent_url: Some(parent_url.into()),
            ..Default::default()
        }
    }
}

/// Outcome of a successful resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Absolute URL of the module
    pub url: String,
    /// Format, when resolution already knows it
    pub format: Option<ModuleFormat>,
    /// Import attributes to load the module with
    pub import_attributes: ImportAttributes,
}

impl Resolved {
    /// A resolution with no format or attributes
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: None,
            import_attributes: ImportAttributes::new(),
        }
    }
}

/// Context of one load request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContext {
    /// Format hint from resolution
    pub format: Option<ModuleFormat>,
    /// Export conditions
    pub conditions: Vec<String>,
    /// Import attributes of the request
    pub import_attributes: ImportAttributes,
}

/// Outcome of a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    /// Module text; absent for builtins
    pub source: Option<String>,
    /// Format the host must evaluate the module as
    pub format: Option<ModuleFormat>,
    /// Skip any stage after this one
    pub short_circuit: bool,
}

/// The next resolve stage in the chain
#[async_trait]
pub trait NextResolve: Send + Sync {
    /// Resolve `specifier`; misses fail with
    /// [`LoaderError::ModuleNotFound`](crate::LoaderError::ModuleNotFound)
    async fn resolve(&self, specifier: &str, context: &ResolveContext) -> Result<Resolved>;
}

/// The next load stage in the chain
#[async_trait]
pub trait NextLoad: Send + Sync {
    /// Load the module at `url`
    async fn load(&self, url: &str, context: &LoadContext) -> Result<Loaded>;
}
