// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native module path resolution (Node.js algorithm)

use crate::error::{LoaderError, Result};
use crate::format::ModuleFormat;
use crate::hooks::{NextResolve, ResolveContext, Resolved};
use crate::path;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Built-in module names
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "events",
    "fs",
    "fs/promises",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "querystring",
    "readline",
    "stream",
    "string_decoder",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Extensions appended to extensionless paths, in order
const EXTENSIONS: &[&str] = &[".js", ".json", ".node"];

/// Terminal resolve stage: what the host does when no hook answers.
///
/// Misses fail with [`LoaderError::ModuleNotFound`] carrying the specifier
/// exactly as asked, which is what the fallbacks in
/// [`ResolveHook`](crate::hooks::ResolveHook) compare against.
#[derive(Debug, Clone, Default)]
pub struct NodeResolver;

impl NodeResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self
    }

    /// Check if a module is a built-in
    pub fn is_builtin(name: &str) -> bool {
        let name = name.strip_prefix("node:").unwrap_or(name);
        BUILTIN_MODULES.contains(&name)
    }

    /// Resolve `specifier` relative to `parent_url`
    pub async fn resolve_specifier(&self, specifier: &str, parent_url: Option<&str>) -> Result<Resolved> {
        let not_found = || LoaderError::module_not_found(specifier, parent_url);

        if Self::is_builtin(specifier) {
            let name = specifier.strip_prefix("node:").unwrap_or(specifier);
            return Ok(Resolved {
                format: Some(ModuleFormat::Builtin),
                ..Resolved::url(format!("node:{name}"))
            });
        }

        let found = if specifier.starts_with("file:") {
            let path = path::file_url_to_path(specifier)?;
            self.resolve_file(&path).await?
        } else if specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/')
        {
            let parent_dir = parent_dir(parent_url)?;
            self.resolve_file(&path::join(&parent_dir, specifier)).await?
        } else if specifier.starts_with("node:") || specifier.contains("://") {
            return Err(not_found());
        } else {
            let parent_dir = parent_dir(parent_url)?;
            self.resolve_node_modules(specifier, &parent_dir).await?
        };

        let found = found.ok_or_else(not_found)?;
        trace!(specifier, path = %found.display(), "resolved");
        Ok(Resolved {
            format: ModuleFormat::from_extension(&found),
            ..Resolved::url(path::path_to_file_url(&found)?)
        })
    }

    /// Exact file, then appended extensions, then a directory entry point
    async fn resolve_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        if is_file(path).await {
            return Ok(Some(path.to_path_buf()));
        }
        for ext in EXTENSIONS {
            let mut with_ext = path.as_os_str().to_owned();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if is_file(&with_ext).await {
                return Ok(Some(with_ext));
            }
        }
        if is_dir(path).await {
            return self.resolve_directory(path).await;
        }
        Ok(None)
    }

    /// package.json `exports` / `main`, then `index.*`
    async fn resolve_directory(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let manifest_path = dir.join("package.json");
        if let Some(manifest) = read_manifest(&manifest_path).await? {
            if let Some(entry) = manifest.entry_point() {
                let main = path::join(dir, entry);
                if is_file(&main).await {
                    return Ok(Some(main));
                }
                for ext in EXTENSIONS {
                    let mut with_ext = main.as_os_str().to_owned();
                    with_ext.push(ext);
                    let with_ext = PathBuf::from(with_ext);
                    if is_file(&with_ext).await {
                        return Ok(Some(with_ext));
                    }
                }
            }
        }

        for ext in EXTENSIONS {
            let index = dir.join(format!("index{ext}"));
            if is_file(&index).await {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Walk up from `parent_dir` through every `node_modules`
    async fn resolve_node_modules(&self, specifier: &str, parent_dir: &Path) -> Result<Option<PathBuf>> {
        let (package_name, subpath) = parse_package_specifier(specifier);

        for dir in parent_dir.ancestors() {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                continue;
            }
            let package_dir = dir.join("node_modules").join(package_name);
            if !is_dir(&package_dir).await {
                continue;
            }
            return match subpath {
                Some(sub) => self.resolve_file(&package_dir.join(sub)).await,
                None => self.resolve_directory(&package_dir).await,
            };
        }
        Ok(None)
    }
}

#[async_trait]
impl NextResolve for NodeResolver {
    async fn resolve(&self, specifier: &str, context: &ResolveContext) -> Result<Resolved> {
        self.resolve_specifier(specifier, context.parent_url.as_deref())
            .await
    }
}

/// Directory of the importer, or the working directory for entry points
fn parent_dir(parent_url: Option<&str>) -> Result<PathBuf> {
    match parent_url {
        Some(url) => {
            let parent = path::file_url_to_path(url)?;
            Ok(parent.parent().map(Path::to_path_buf).unwrap_or(parent))
        }
        None => path::absolute(Path::new(".")),
    }
}

/// Split a package specifier into name and optional subpath
pub(crate) fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(index, _)| index)
    } else {
        specifier.find('/')
    };
    match name_end {
        Some(end) => (&specifier[..end], Some(&specifier[end + 1..])),
        None => (specifier, None),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
    #[serde(default)]
    exports: Option<Value>,
}

impl PackageJson {
    /// The `"."` export for `import`, falling back to `main`
    fn entry_point(&self) -> Option<&str> {
        let root = match &self.exports {
            Some(Value::Object(map)) => map.get(".").unwrap_or(&Value::Null),
            Some(other) => other,
            None => &Value::Null,
        };
        let export = match root {
            Value::String(target) => Some(target.as_str()),
            Value::Object(conditions) => ["import", "node", "default"]
                .iter()
                .find_map(|c| conditions.get(*c).and_then(Value::as_str)),
            _ => None,
        };
        export.or(self.main.as_deref())
    }
}

async fn read_manifest(path: &Path) -> Result<Option<PackageJson>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| LoaderError::MalformedManifest {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn url(path: &Path) -> String {
        path::path_to_file_url(path).unwrap()
    }

    #[test]
    fn test_is_builtin() {
        assert!(NodeResolver::is_builtin("fs"));
        assert!(NodeResolver::is_builtin("node:path"));
        assert!(NodeResolver::is_builtin("fs/promises"));
        assert!(!NodeResolver::is_builtin("lodash"));
    }

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/get"), ("lodash", Some("get")));
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[tokio::test]
    async fn test_builtins() {
        let resolved = NodeResolver::new().resolve_specifier("fs", None).await.unwrap();
        assert_eq!(resolved.url, "node:fs");
        assert_eq!(resolved.format, Some(ModuleFormat::Builtin));
    }

    #[tokio::test]
    async fn test_relative_and_file_urls() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/a.ts", "");
        write(tmp.path(), "src/data.json", "{}");
        let parent = url(&tmp.path().join("src/main.ts"));
        let resolver = NodeResolver::new();

        let resolved = resolver.resolve_specifier("./a.ts", Some(&parent)).await.unwrap();
        assert_eq!(resolved.url, url(&tmp.path().join("src/a.ts")));
        assert_eq!(resolved.format, None);

        let resolved = resolver.resolve_specifier("./data", Some(&parent)).await.unwrap();
        assert_eq!(resolved.format, Some(ModuleFormat::Json));

        let target = url(&tmp.path().join("src/a.ts"));
        let resolved = resolver.resolve_specifier(&target, None).await.unwrap();
        assert_eq!(resolved.url, target);
    }

    #[tokio::test]
    async fn test_missing_file_reports_specifier() {
        let tmp = TempDir::new().unwrap();
        let parent = url(&tmp.path().join("main.ts"));

        let err = NodeResolver::new()
            .resolve_specifier("./x.js", Some(&parent))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "ERR_MODULE_NOT_FOUND");
        assert_eq!(err.missing_specifier(), Some("./x.js"));
        assert!(err.to_string().contains(&parent));
    }

    #[tokio::test]
    async fn test_node_modules_packages() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "node_modules/dep/package.json", r#"{ "main": "lib/main" }"#);
        write(tmp.path(), "node_modules/dep/lib/main.js", "");
        write(tmp.path(), "node_modules/dep/util.js", "");
        write(
            tmp.path(),
            "node_modules/@scope/esm/package.json",
            r#"{ "exports": { ".": { "import": "./dist/index.mjs" } } }"#,
        );
        write(tmp.path(), "node_modules/@scope/esm/dist/index.mjs", "");
        let parent = url(&tmp.path().join("src/deep/main.ts"));
        let resolver = NodeResolver::new();

        let resolved = resolver.resolve_specifier("dep", Some(&parent)).await.unwrap();
        assert_eq!(resolved.url, url(&tmp.path().join("node_modules/dep/lib/main.js")));

        let resolved = resolver.resolve_specifier("dep/util", Some(&parent)).await.unwrap();
        assert_eq!(resolved.url, url(&tmp.path().join("node_modules/dep/util.js")));

        let resolved = resolver.resolve_specifier("@scope/esm", Some(&parent)).await.unwrap();
        assert_eq!(resolved.format, Some(ModuleFormat::Module));

        let err = resolver.resolve_specifier("nope", Some(&parent)).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_package_manifest() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "node_modules/bad/package.json", "{ oops");
        let parent = url(&tmp.path().join("main.ts"));

        let err = NodeResolver::new()
            .resolve_specifier("bad", Some(&parent))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "ERR_INVALID_PACKAGE_CONFIG");
    }
}
