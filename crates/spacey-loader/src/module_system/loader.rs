// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - reads module sources from disk

use crate::error::{LoaderError, Result};
use crate::format::{FormatDetector, ModuleFormat};
use crate::hooks::{LoadContext, Loaded, NextLoad};
use crate::path;
use async_trait::async_trait;
use std::sync::Arc;

/// Terminal load stage: reads `file:` URLs and answers `node:` builtins.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    formats: Arc<FormatDetector>,
}

impl FsLoader {
    /// Loader sharing `formats` with the rest of the chain
    pub fn new(formats: Arc<FormatDetector>) -> Self {
        Self { formats }
    }
}

#[async_trait]
impl NextLoad for FsLoader {
    async fn load(&self, url: &str, context: &LoadContext) -> Result<Loaded> {
        if url.starts_with("node:") {
            return Ok(Loaded {
                source: None,
                format: Some(ModuleFormat::Builtin),
                short_circuit: true,
            });
        }

        let filename = path::file_url_to_path(url)?;
        let source = match tokio::fs::read_to_string(&filename).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoaderError::module_not_found(url, None));
            }
            Err(e) => return Err(e.into()),
        };

        let format = match context.format {
            Some(format) => format,
            None => match ModuleFormat::from_extension(&filename) {
                Some(format) => format,
                None => self.formats.detect(&filename).await?,
            },
        };
        Ok(Loaded {
            source: Some(source),
            format: Some(format),
            short_circuit: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_file_and_detects_format() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("package.json"), r#"{ "type": "module" }"#).unwrap();
        fs::write(tmp.path().join("a.js"), "export {};").unwrap();
        let url = path::path_to_file_url(&tmp.path().join("a.js")).unwrap();

        let loaded = FsLoader::default().load(&url, &LoadContext::default()).await.unwrap();
        assert_eq!(loaded.source.as_deref(), Some("export {};"));
        assert_eq!(loaded.format, Some(ModuleFormat::Module));
    }

    #[tokio::test]
    async fn test_context_format_wins() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), "{}").unwrap();
        let url = path::path_to_file_url(&tmp.path().join("a.json")).unwrap();
        let context = LoadContext {
            format: Some(ModuleFormat::Json),
            ..Default::default()
        };

        let loaded = FsLoader::default().load(&url, &context).await.unwrap();
        assert_eq!(loaded.format, Some(ModuleFormat::Json));
    }

    #[tokio::test]
    async fn test_builtins_and_errors() {
        let loader = FsLoader::default();
        let loaded = loader.load("node:fs", &LoadContext::default()).await.unwrap();
        assert_eq!(loaded.source, None);
        assert_eq!(loaded.format, Some(ModuleFormat::Builtin));

        let err = loader
            .load("https://example.com/a.js", &LoadContext::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "ERR_INVALID_URL");

        let tmp = TempDir::new().unwrap();
        let url = path::path_to_file_url(&tmp.path().join("gone.ts")).unwrap();
        let err = loader.load(&url, &LoadContext::default()).await.err().unwrap();
        assert!(err.is_not_found());
    }
}
