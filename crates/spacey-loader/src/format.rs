// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module format detection
//!
//! Decides whether a TypeScript file runs as CommonJS or as an ES module:
//! - `.mts` / `.mjs` are always ESM, `.cts` / `.cjs` always CommonJS
//! - otherwise the nearest `package.json` "type" field decides
//! - no manifest up to `node_modules` or the file system root means CommonJS

use crate::error::{LoaderError, Result};
use crate::path;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Format of a loaded module, as understood by the host loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// CommonJS module (require/module.exports)
    CommonJs,
    /// ECMAScript module (import/export)
    Module,
    /// JSON file
    Json,
    /// Built-in module (`node:fs`, ...)
    Builtin,
    /// WebAssembly module
    Wasm,
}

impl ModuleFormat {
    /// Name used by the host loader
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleFormat::CommonJs => "commonjs",
            ModuleFormat::Module => "module",
            ModuleFormat::Json => "json",
            ModuleFormat::Builtin => "builtin",
            ModuleFormat::Wasm => "wasm",
        }
    }

    /// Format forced by the file extension alone, if any
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mts" | "mjs" => Some(ModuleFormat::Module),
            "cts" | "cjs" => Some(ModuleFormat::CommonJs),
            "json" => Some(ModuleFormat::Json),
            "wasm" => Some(ModuleFormat::Wasm),
            _ => None,
        }
    }

    /// Format implied by a package.json "type" field
    pub fn from_package_type(type_field: Option<&str>) -> Self {
        match type_field {
            Some("module") => ModuleFormat::Module,
            _ => ModuleFormat::CommonJs,
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the format of TypeScript files, caching package types per directory
#[derive(Debug, Default)]
pub struct FormatDetector {
    /// Directory -> format of the package it belongs to
    cache: DashMap<PathBuf, ModuleFormat>,
}

impl FormatDetector {
    /// Create a detector with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Determine whether `path` is CommonJS or ESM
    pub async fn detect(&self, path: &Path) -> Result<ModuleFormat> {
        let path = path::absolute(path)?;
        match ModuleFormat::from_extension(&path) {
            Some(format @ (ModuleFormat::Module | ModuleFormat::CommonJs)) => Ok(format),
            _ => match path.parent() {
                Some(dir) => self.package_type(dir).await,
                None => Ok(ModuleFormat::CommonJs),
            },
        }
    }

    /// Find the package type governing `dir`.
    ///
    /// Every directory visited on the way up is cached with the final answer.
    pub async fn package_type(&self, dir: &Path) -> Result<ModuleFormat> {
        let dir = path::absolute(dir)?;
        let mut visited = Vec::new();
        let mut current = Some(dir.as_path());

        let format = loop {
            let Some(dir) = current else {
                break ModuleFormat::CommonJs;
            };
            if let Some(cached) = self.cache.get(dir) {
                trace!(dir = %dir.display(), format = %cached.value(), "package type cache hit");
                break *cached;
            }
            visited.push(dir.to_path_buf());

            if let Some(format) = read_package_type(&dir.join("package.json")).await? {
                break format;
            }
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                break ModuleFormat::CommonJs;
            }
            current = dir.parent();
        };

        for dir in visited {
            self.cache.entry(dir).or_insert(format);
        }
        Ok(format)
    }

    /// Cached format of a directory, if it has been looked up
    pub fn cached(&self, dir: &Path) -> Option<ModuleFormat> {
        self.cache.get(dir).map(|entry| *entry)
    }

    /// Forget every cached package type
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached directories
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Read the "type" of a package.json; `None` if there is no such file.
async fn read_package_type(path: &Path) -> Result<Option<ModuleFormat>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let manifest: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| LoaderError::MalformedManifest {
            path: path.to_path_buf(),
            source,
        })?;
    let type_field = manifest.get("type").and_then(serde_json::Value::as_str);
    Ok(Some(ModuleFormat::from_package_type(type_field)))
}
