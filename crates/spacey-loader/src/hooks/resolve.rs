// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier resolution with path aliases and the `.js` → `.ts` fallback

use super::{NextResolve, ResolveContext, Resolved};
use crate::error::Result;
use crate::path;
use crate::tsconfig::{resolve_alias, ConfigStore};
use crate::typescript::to_typescript_specifier;
use std::sync::Arc;
use tracing::{debug, trace};

/// Resolve hook: alias candidates, then the native resolver, then the
/// TypeScript extension fallback.
///
/// It never invents a file, it only changes which specifier is asked for,
/// so repeated calls against an unchanged file system give the same answer.
#[derive(Debug, Clone)]
pub struct ResolveHook {
    configs: Arc<ConfigStore>,
}

impl ResolveHook {
    /// Hook reading aliases from `configs`
    pub fn new(configs: Arc<ConfigStore>) -> Self {
        Self { configs }
    }

    /// Resolve `specifier` imported from `context.parent_url`
    pub async fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolved> {
        let candidates =
            resolve_alias(&self.configs, specifier, context.parent_url.as_deref()).await?;

        for candidate in candidates {
            let url = path::path_to_file_url(&candidate)?;
            match self.resolve_local(&url, context, next).await {
                Ok(resolved) => {
                    debug!(specifier, url = %resolved.url, "resolved through path alias");
                    return Ok(resolved);
                }
                Err(e) if e.is_not_found() => trace!(specifier, %url, "alias candidate missing"),
                Err(e) => return Err(e),
            }
        }

        self.resolve_local(specifier, context, next).await
    }

    /// Native resolution, retried once with the TypeScript extension when a
    /// local `.js`-family file is missing.
    async fn resolve_local(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolved> {
        let err = match next.resolve(specifier, context).await {
            Err(e) if e.is_not_found() => e,
            other => return other,
        };
        let Some(rewritten) = to_typescript_specifier(specifier) else {
            return Err(err);
        };

        debug!(specifier, %rewritten, "retrying with TypeScript extension");
        match next.resolve(&rewritten, context).await {
            Err(retry) if retry.missing_specifier() == Some(rewritten.as_str()) => Err(err),
            other => other,
        }
    }
}
