// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Project configuration (tsconfig.json) lookup and caching
//!
//! [`ConfigStore::get`] finds the closest tsconfig.json for a file, follows
//! its `extends` chain and normalizes the result once:
//! - `inlineSourceMap` and `removeComments` are forced on
//! - `outDir` is dropped, it would rewrite source paths in the source map
//! - `target` and `module` are lowercased
//! - `paths` is compiled into [`AliasRule`]s, longest prefix first
//!
//! Entries are shared: every file governed by the same tsconfig.json gets
//! the same `Arc<ConfigEntry>`.

pub mod alias;
mod parse;

pub use alias::{compile_rules, is_bare_specifier, resolve_alias, AliasRule};
pub use parse::TSCONFIG_NAME;

use crate::error::{LoaderError, Result};
use crate::path;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

/// `compilerOptions` fields the loader and the compiler backends read.
///
/// Everything else is carried in `extra` and handed to backends that accept
/// raw tsconfig options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Language level, lowercased
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Module system, lowercased
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Module resolution strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_resolution: Option<String>,
    /// Absolute base directory for non-relative imports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Path mapping table, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<IndexMap<String, Vec<String>>>,
    /// Output directory; always removed by normalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    /// JSX emit mode (`react`, `react-jsx`, `react-jsxdev`, `preserve`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx: Option<String>,
    /// Classic JSX factory (`React.createElement`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_factory: Option<String>,
    /// Classic JSX fragment factory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_fragment_factory: Option<String>,
    /// Module providing the automatic JSX runtime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_import_source: Option<String>,
    /// Legacy decorators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_decorators: Option<bool>,
    /// Emit `design:type` metadata for decorators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_decorator_metadata: Option<bool>,
    /// `[[Define]]` class field semantics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_define_for_class_fields: Option<bool>,
    /// CommonJS default-import interop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_module_interop: Option<bool>,
    /// Import helpers from `tslib`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_helpers: Option<bool>,
    /// Keep imports that are only used as types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbatim_module_syntax: Option<bool>,
    /// Strip comments; always on after normalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_comments: Option<bool>,
    /// Inline source maps; always on after normalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_source_map: Option<bool>,
    /// Options the loader does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CompilerOptions {
    /// Whether `module` names an ECMAScript module kind (`es2015` ... `esnext`, `preserve`)
    pub fn is_esm_module(&self) -> bool {
        self.module
            .as_deref()
            .is_some_and(|m| m.starts_with("es") || m == "preserve")
    }

    /// Whether `module` is one of the Node-aware kinds that need a whole
    /// program to pick between CommonJS and ESM output
    pub fn is_node_module(&self) -> bool {
        matches!(
            self.module.as_deref(),
            Some("node16" | "node18" | "node20" | "nodenext")
        )
    }

    /// Whether the output should be CommonJS
    pub fn is_commonjs(&self) -> bool {
        self.module.as_deref() == Some("commonjs")
    }
}

/// One parsed and normalized tsconfig.json
#[derive(Debug)]
pub struct ConfigEntry {
    /// Absolute path of the tsconfig.json, the cache key
    pub config_path: PathBuf,
    /// Base directory for `baseUrl`-relative lookups
    pub root: PathBuf,
    /// Normalized compiler options
    pub options: CompilerOptions,
    /// Compiled `paths`, longest prefix first
    pub alias_rules: Vec<AliasRule>,
}

impl ConfigEntry {
    /// Parse and normalize a tsconfig.json
    pub async fn load(config_path: &Path) -> Result<Self> {
        let raw = parse::load_config(config_path).await?;
        let options: CompilerOptions =
            serde_json::from_value(serde_json::Value::Object(raw.compiler_options)).map_err(
                |e| LoaderError::MalformedConfig {
                    path: config_path.to_path_buf(),
                    reason: e.to_string(),
                },
            )?;
        let dir = config_path.parent().unwrap_or(Path::new("/"));
        Ok(Self::normalize(config_path, dir, raw.paths_base, options))
    }

    fn normalize(
        config_path: &Path,
        dir: &Path,
        paths_base: Option<PathBuf>,
        mut options: CompilerOptions,
    ) -> Self {
        let root = match &options.base_url {
            Some(base_url) => path::join(dir, base_url),
            None => dir.to_path_buf(),
        };

        options.inline_source_map = Some(true);
        options.remove_comments = Some(true);
        options.out_dir = None;
        options.target = options.target.map(|t| t.to_lowercase());
        options.module = options.module.map(|m| m.to_lowercase());

        let alias_rules = match &options.paths {
            Some(paths) => {
                // `paths` without `baseUrl` are relative to the config declaring them.
                let base = match (&options.base_url, paths_base) {
                    (Some(_), _) | (None, None) => root.clone(),
                    (None, Some(paths_base)) => paths_base,
                };
                compile_rules(&base, paths)
            }
            None => Vec::new(),
        };

        Self {
            config_path: config_path.to_path_buf(),
            root,
            options,
            alias_rules,
        }
    }
}

/// Cache of parsed tsconfig.json files
#[derive(Debug, Default)]
pub struct ConfigStore {
    /// tsconfig.json path -> entry, initialized once even under concurrent lookups
    entries: DashMap<PathBuf, Arc<OnceCell<Arc<ConfigEntry>>>>,
    /// Directory -> closest tsconfig.json
    lookups: DashMap<PathBuf, Option<PathBuf>>,
}

impl ConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Closest tsconfig.json governing `file`, or `None` when there is none
    pub async fn get(&self, file: &Path) -> Result<Option<Arc<ConfigEntry>>> {
        let file = path::absolute(file)?;
        let dir = file.parent().unwrap_or(&file);

        let Some(config_path) = self.find(dir).await? else {
            return Ok(None);
        };
        let cell = self.entries.entry(config_path.clone()).or_default().value().clone();
        let entry = cell
            .get_or_try_init(|| async {
                debug!(config = %config_path.display(), "parsing tsconfig");
                ConfigEntry::load(&config_path).await.map(Arc::new)
            })
            .await?;
        Ok(Some(Arc::clone(entry)))
    }

    /// Closest tsconfig.json at or above `dir`, caching every visited directory
    async fn find(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if let Some(found) = self.lookups.get(dir) {
            trace!(dir = %dir.display(), "tsconfig lookup cache hit");
            return Ok(found.value().clone());
        }
        let found = parse::find_config(dir).await?;

        let stop = found.as_deref().and_then(Path::parent);
        let mut current = Some(dir);
        while let Some(visited) = current {
            self.lookups
                .entry(visited.to_path_buf())
                .or_insert_with(|| found.clone());
            if Some(visited) == stop {
                break;
            }
            current = visited.parent();
        }
        Ok(found)
    }

    /// Forget every parsed config and lookup
    pub fn clear(&self) {
        self.entries.clear();
        self.lookups.clear();
    }

    /// Number of parsed configs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no config has been parsed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
