// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable selecting a compiler backend by name
pub const COMPILER_ENV: &str = "TS_COMPILER";

/// Configuration for the TypeScript loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Backend to use (`swc`, `esbuild`, `sucrase`, `tsc`); auto-detected if unset
    pub compiler: Option<String>,

    /// Directory whose `node_modules` (or an ancestor's) holds the backends
    pub package_root: PathBuf,

    /// Node.js executable driving the backends; looked up on `PATH` if unset
    pub node: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            compiler: None,
            package_root: PathBuf::from("."),
            node: None,
        }
    }
}

impl LoaderConfig {
    /// Default configuration overridden by environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Apply environment overrides.
    ///
    /// The compiler name is only validated when a backend is detected.
    fn load_from_env(&mut self) {
        if let Ok(name) = std::env::var(COMPILER_ENV) {
            if !name.is_empty() {
                self.compiler = Some(name);
            }
        }
    }

    /// Select a backend by name
    pub fn with_compiler(mut self, name: impl Into<String>) -> Self {
        self.compiler = Some(name.into());
        self
    }

    /// Search for backends from `root`
    pub fn with_package_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.package_root = root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.compiler, None);
        assert_eq!(config.package_root, PathBuf::from("."));
        assert_eq!(config.node, None);
    }

    #[test]
    fn test_builders() {
        let config = LoaderConfig::default()
            .with_compiler("esbuild")
            .with_package_root("/work");
        assert_eq!(config.compiler.as_deref(), Some("esbuild"));
        assert_eq!(config.package_root, PathBuf::from("/work"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LoaderConfig = serde_json::from_str(r#"{ "compiler": "tsc" }"#).unwrap();
        assert_eq!(config.compiler.as_deref(), Some("tsc"));
        assert_eq!(config.package_root, PathBuf::from("."));
    }
}
