// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loading: compiles TypeScript, passes everything else on

use super::{LoadContext, Loaded, NextLoad, TransformPipeline};
use crate::error::Result;
use crate::format::ModuleFormat;
use crate::path;
use crate::typescript::typescript_extension;
use tracing::trace;

/// Load hook in front of the host's native loader
#[derive(Debug, Clone)]
pub struct LoadHook {
    pipeline: TransformPipeline,
}

impl LoadHook {
    /// Hook compiling through `pipeline`
    pub fn new(pipeline: TransformPipeline) -> Self {
        Self { pipeline }
    }

    /// The pipeline TypeScript modules go through
    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// Load `url`
    pub async fn load(&self, url: &str, context: &LoadContext, next: &dyn NextLoad) -> Result<Loaded> {
        // The host drops the attribute for JSON modules reached through this hook.
        if context.format == Some(ModuleFormat::Json) {
            let mut context = context.clone();
            context
                .import_attributes
                .insert("type".to_string(), "json".to_string());
            return next.load(url, &context).await;
        }

        if !url.starts_with("file:") || typescript_extension(url).is_none() {
            return next.load(url, context).await;
        }

        let format_hint = match context.format {
            Some(format @ (ModuleFormat::Module | ModuleFormat::CommonJs)) => Some(format),
            _ => None,
        };
        let loaded = next.load(url, context).await?;
        let code = loaded.source.unwrap_or_default();
        let filename = path::file_url_to_path(url)?;

        trace!(%url, ?format_hint, "transforming");
        let transformed = self.pipeline.transform(&code, &filename, format_hint).await?;
        Ok(Loaded {
            source: Some(transformed.source),
            format: Some(transformed.format),
            short_circuit: transformed.short_circuit,
        })
    }
}
