// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tsconfig.json reading: JSON with comments and the `extends` chain

use crate::error::{LoaderError, Result};
use crate::module_system::parse_package_specifier;
use crate::path;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::trace;

/// Name of the project configuration file
pub const TSCONFIG_NAME: &str = "tsconfig.json";

/// `compilerOptions` of a config after its `extends` chain was applied
#[derive(Debug, Clone, Default)]
pub(crate) struct RawConfig {
    /// Merged compiler options, `baseUrl` already absolute
    pub compiler_options: Map<String, Value>,
    /// Directory of the config that declared the effective `paths`
    pub paths_base: Option<PathBuf>,
}

impl RawConfig {
    /// Apply `other` on top of `self`, key by key
    fn merge(&mut self, other: RawConfig) {
        self.compiler_options.extend(other.compiler_options);
        if other.paths_base.is_some() {
            self.paths_base = other.paths_base;
        }
    }
}

/// Find the nearest tsconfig.json at or above `dir`
pub(crate) async fn find_config(dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = Some(dir);
    while let Some(dir) = current {
        let candidate = dir.join(TSCONFIG_NAME);
        if is_file(&candidate).await? {
            return Ok(Some(candidate));
        }
        current = dir.parent();
    }
    Ok(None)
}

async fn is_file(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> LoaderError {
    LoaderError::MalformedConfig {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read a tsconfig.json and everything it extends
pub(crate) async fn load_config(path: &Path) -> Result<RawConfig> {
    let mut chain = Vec::new();
    load_config_inner(path.to_path_buf(), &mut chain).await
}

fn load_config_inner<'a>(
    path: PathBuf,
    chain: &'a mut Vec<PathBuf>,
) -> Pin<Box<dyn Future<Output = Result<RawConfig>> + Send + 'a>> {
    Box::pin(async move {
        if chain.contains(&path) {
            return Err(malformed(&path, "circular extends"));
        }
        trace!(config = %path.display(), "reading tsconfig");

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| malformed(&path, e.to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let json: Value = json5::from_str(text).map_err(|e| malformed(&path, e.to_string()))?;
        let Value::Object(mut json) = json else {
            return Err(malformed(&path, "expected an object"));
        };
        let dir = path.parent().unwrap_or(Path::new("/")).to_path_buf();

        let extends = match json.remove("extends") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![s],
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(malformed(&path, "\"extends\" entries must be strings")),
                })
                .collect::<Result<_>>()?,
            Some(_) => return Err(malformed(&path, "\"extends\" must be a string or an array")),
        };

        chain.push(path.clone());
        let mut config = RawConfig::default();
        for reference in &extends {
            let parent = resolve_extends(reference, &dir)
                .await?
                .ok_or_else(|| malformed(&path, format!("cannot resolve extends '{reference}'")))?;
            config.merge(load_config_inner(parent, chain).await?);
        }
        chain.pop();

        let own = match json.remove("compilerOptions") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(options)) => options,
            Some(_) => return Err(malformed(&path, "\"compilerOptions\" must be an object")),
        };
        config.merge(rebase(own, &dir));
        Ok(config)
    })
}

/// Make directory-relative options of one config file absolute
fn rebase(mut options: Map<String, Value>, dir: &Path) -> RawConfig {
    if let Some(Value::String(base_url)) = options.get("baseUrl") {
        let absolute = path::join(dir, base_url);
        options.insert(
            "baseUrl".to_string(),
            Value::String(absolute.to_string_lossy().into_owned()),
        );
    }
    let paths_base = options.contains_key("paths").then(|| dir.to_path_buf());
    RawConfig {
        compiler_options: options,
        paths_base,
    }
}

/// Locate the file an `extends` entry refers to
async fn resolve_extends(reference: &str, from_dir: &Path) -> Result<Option<PathBuf>> {
    if reference.starts_with('.') || Path::new(reference).is_absolute() {
        let target = path::join(from_dir, reference);
        if is_file(&target).await? || reference.ends_with(".json") {
            return Ok(Some(target));
        }
        let mut with_ext = target.into_os_string();
        with_ext.push(".json");
        return Ok(Some(PathBuf::from(with_ext)));
    }

    // Package reference, e.g. "@tsconfig/node20/tsconfig.json" or "@company/config"
    let (name, subpath) = parse_package_specifier(reference);
    let mut current = Some(from_dir);
    while let Some(dir) = current {
        let modules = dir.join("node_modules");
        if let Some(target) = manifest_entry(&modules.join(name), subpath).await? {
            return Ok(Some(target));
        }
        let target = modules.join(reference);
        if is_file(&target).await? {
            return Ok(Some(target));
        }
        let mut with_ext = target.clone().into_os_string();
        with_ext.push(".json");
        let with_ext = PathBuf::from(with_ext);
        if is_file(&with_ext).await? {
            return Ok(Some(with_ext));
        }
        let nested = target.join(TSCONFIG_NAME);
        if is_file(&nested).await? {
            return Ok(Some(nested));
        }
        current = dir.parent();
    }
    Ok(None)
}

/// Config file a package names in its manifest: `exports` first, then `tsconfig`
async fn manifest_entry(package_dir: &Path, subpath: Option<&str>) -> Result<Option<PathBuf>> {
    let manifest_path = package_dir.join("package.json");
    if !is_file(&manifest_path).await? {
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(&manifest_path).await?;
    let Ok(Value::Object(manifest)) = serde_json::from_str::<Value>(&text) else {
        trace!(manifest = %manifest_path.display(), "ignoring unreadable package.json");
        return Ok(None);
    };

    let key = subpath.map_or_else(|| ".".to_string(), |sub| format!("./{sub}"));
    let exported = match manifest.get("exports") {
        Some(Value::Object(map)) if map.keys().any(|k| k.starts_with('.')) => map.get(&key),
        Some(exports) if key == "." => Some(exports),
        _ => None,
    };
    let target = match (exported.and_then(export_target), subpath, manifest.get("tsconfig")) {
        (Some(target), _, _) => target,
        (None, None, Some(Value::String(target))) => target.as_str(),
        _ => return Ok(None),
    };

    let candidate = path::join(package_dir, target);
    Ok(is_file(&candidate).await?.then_some(candidate))
}

/// Follow export conditions to a path, the way `require` resolution would
fn export_target(value: &Value) -> Option<&str> {
    match value {
        Value::String(target) => Some(target),
        Value::Object(conditions) => conditions
            .iter()
            .filter(|(condition, _)| {
                matches!(condition.as_str(), "node" | "require" | "types" | "default")
            })
            .find_map(|(_, value)| export_target(value)),
        Value::Array(items) => items.iter().find_map(export_target),
        _ => None,
    }
}
