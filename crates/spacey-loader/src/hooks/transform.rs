// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! TypeScript source to executable JavaScript

use crate::compiler::CompilerRegistry;
use crate::error::{LoaderError, Result};
use crate::format::{FormatDetector, ModuleFormat};
use crate::tsconfig::{CompilerOptions, ConfigStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Result of compiling one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// JavaScript text
    pub source: String,
    /// Format the host must evaluate it as
    pub format: ModuleFormat,
    /// Always `true`: no later load stage may touch the output
    pub short_circuit: bool,
}

/// Combines the config store, the format detector and the active compiler
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    configs: Arc<ConfigStore>,
    formats: Arc<FormatDetector>,
    compilers: Arc<CompilerRegistry>,
}

impl TransformPipeline {
    /// Create a pipeline over shared process state
    pub fn new(
        configs: Arc<ConfigStore>,
        formats: Arc<FormatDetector>,
        compilers: Arc<CompilerRegistry>,
    ) -> Self {
        Self {
            configs,
            formats,
            compilers,
        }
    }

    /// Compile `code` read from `filename`.
    ///
    /// `format_hint` forces CommonJS or ESM output; without one the format
    /// comes from the extension and the nearest package.json.
    pub async fn transform(
        &self,
        code: &str,
        filename: &Path,
        format_hint: Option<ModuleFormat>,
    ) -> Result<Transformed> {
        let compile = self.compilers.detect().await?;
        let entry = self
            .configs
            .get(filename)
            .await?
            .ok_or_else(|| LoaderError::ConfigMissing(filename.to_path_buf()))?;

        let mut options = entry.options.clone();
        let format = match format_hint {
            Some(ModuleFormat::Module) => {
                if !options.is_esm_module() {
                    options.module = Some("esnext".to_string());
                }
                ModuleFormat::Module
            }
            Some(ModuleFormat::CommonJs) => {
                options.module = Some("commonjs".to_string());
                ModuleFormat::CommonJs
            }
            _ => self.formats.detect(filename).await?,
        };
        single_file_options(&mut options, format);

        debug!(
            file = %filename.display(),
            %format,
            module = options.module.as_deref().unwrap_or_default(),
            "compiling TypeScript"
        );
        let source = compile.compile(code, filename, &options).await?;

        Ok(Transformed {
            source,
            format,
            short_circuit: true,
        })
    }
}

/// Replace the Node-aware `module` / `moduleResolution` kinds, which need a
/// whole program, with their single-file equivalent for `format`.
fn single_file_options(options: &mut CompilerOptions, format: ModuleFormat) {
    let esm = format == ModuleFormat::Module;

    if options.is_node_module() {
        options.module = Some(if esm { "esnext" } else { "commonjs" }.to_string());
    }
    let resolution = options.module_resolution.as_deref().map(str::to_ascii_lowercase);
    if let Some("node16" | "nodenext") = resolution.as_deref() {
        options.module_resolution = Some(if esm { "bundler" } else { "node10" }.to_string());
    }
}
