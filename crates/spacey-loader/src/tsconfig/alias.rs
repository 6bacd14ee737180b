// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Path aliases from the `paths` and `baseUrl` compiler options
//!
//! See <https://www.typescriptlang.org/docs/handbook/modules/reference.html#paths>

use super::ConfigStore;
use crate::error::Result;
use crate::path;
use crate::typescript::is_declaration_file;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One entry of the `paths` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRule {
    /// Text before the `*` wildcard, or the whole pattern
    prefix: String,
    /// Text after the wildcard; `None` for exact-match patterns
    suffix: Option<String>,
    /// Absolute path templates, each with at most one `*`
    targets: Vec<String>,
}

impl AliasRule {
    /// Build a rule from a `paths` entry, resolving templates against `base`
    pub fn new(base: &Path, pattern: &str, templates: &[String]) -> Self {
        let (prefix, suffix) = match pattern.split_once('*') {
            Some((prefix, rest)) => (prefix, Some(rest.split('*').next().unwrap_or(rest))),
            None => (pattern, None),
        };
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.map(str::to_string),
            targets: templates
                .iter()
                .map(|t| path::join(base, t).to_string_lossy().into_owned())
                .collect(),
        }
    }

    /// The part of the pattern before the wildcard
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The part of the pattern after the wildcard
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Resolved path templates
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Check if the specifier matches this pattern
    pub fn matches(&self, specifier: &str) -> bool {
        match &self.suffix {
            None => specifier == self.prefix,
            Some(suffix) => {
                specifier.len() >= self.prefix.len() + suffix.len()
                    && specifier.starts_with(&self.prefix)
                    && specifier.ends_with(suffix.as_str())
            }
        }
    }

    /// Candidate paths for a matching specifier, in declaration order
    pub fn candidates(&self, specifier: &str) -> Vec<PathBuf> {
        let Some(suffix) = &self.suffix else {
            return self.targets.iter().map(PathBuf::from).collect();
        };
        let captured = &specifier[self.prefix.len()..specifier.len() - suffix.len()];
        self.targets
            .iter()
            .map(|t| path::normalize(Path::new(&t.replacen('*', captured, 1))))
            .collect()
    }
}

/// Compile a `paths` table into rules, longest prefix first.
///
/// The sort is stable, so patterns with equally long prefixes keep their
/// declaration order.
pub fn compile_rules(base: &Path, paths: &IndexMap<String, Vec<String>>) -> Vec<AliasRule> {
    let mut rules: Vec<AliasRule> = paths
        .iter()
        .map(|(pattern, templates)| AliasRule::new(base, pattern, templates))
        .collect();
    rules.sort_by_key(|rule| std::cmp::Reverse(rule.prefix.len()));
    rules
}

/// Whether a specifier is bare, i.e. neither relative, absolute nor a URL
pub fn is_bare_specifier(specifier: &str) -> bool {
    if specifier.is_empty()
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier == "."
        || specifier == ".."
    {
        return false;
    }
    !has_url_scheme(specifier)
}

/// `scheme:` per RFC 3986; single letters are left alone for Windows drives
fn has_url_scheme(specifier: &str) -> bool {
    let Some((scheme, _)) = specifier.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    scheme.len() > 1
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Candidate files for a bare specifier, from the importer's tsconfig.
///
/// Empty when aliasing does not apply: the specifier is not bare, the
/// importer is not a local file, the importer lives in `node_modules`, or no
/// tsconfig governs it. Declaration files are dropped from the result.
pub async fn resolve_alias(
    configs: &ConfigStore,
    specifier: &str,
    importer: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let Some(importer) = importer else {
        return Ok(Vec::new());
    };
    if !is_bare_specifier(specifier)
        || !importer.starts_with("file:")
        || importer.contains("/node_modules/")
    {
        return Ok(Vec::new());
    }
    let Ok(importer_path) = path::file_url_to_path(importer) else {
        return Ok(Vec::new());
    };
    let Some(entry) = configs.get(&importer_path).await? else {
        return Ok(Vec::new());
    };

    let candidates = match entry.alias_rules.iter().find(|rule| rule.matches(specifier)) {
        Some(rule) => rule.candidates(specifier),
        None if entry.options.base_url.is_some() => vec![path::join(&entry.root, specifier)],
        None => return Ok(Vec::new()),
    };
    let candidates: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|candidate| !is_declaration_file(candidate))
        .collect();

    debug!(specifier, ?candidates, "alias candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(entries: &[(&str, &str)]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(pattern, target)| (pattern.to_string(), vec![target.to_string()]))
            .collect()
    }

    #[test]
    fn test_exact_rule() {
        let rule = AliasRule::new(Path::new("/proj"), "config", &["./src/config.ts".to_string()]);
        assert_eq!(rule.prefix(), "config");
        assert_eq!(rule.suffix(), None);
        assert!(rule.matches("config"));
        assert!(!rule.matches("config/x"));
        assert_eq!(rule.candidates("config"), vec![PathBuf::from("/proj/src/config.ts")]);
    }

    #[test]
    fn test_wildcard_rule() {
        let rule = AliasRule::new(
            Path::new("/proj"),
            "@app/*.js",
            &["./src/*.ts".to_string(), "./gen/*.ts".to_string()],
        );
        assert_eq!(rule.prefix(), "@app/");
        assert_eq!(rule.suffix(), Some(".js"));
        assert!(rule.matches("@app/util/strings.js"));
        assert!(!rule.matches("@app/util.ts"));
        assert!(!rule.matches("@lib/util.js"));
        assert_eq!(
            rule.candidates("@app/util/strings.js"),
            vec![
                PathBuf::from("/proj/src/util/strings.ts"),
                PathBuf::from("/proj/gen/util/strings.ts"),
            ]
        );
    }

    #[test]
    fn test_overlapping_prefix_and_suffix() {
        let rule = AliasRule::new(Path::new("/p"), "a*a", &["./x/*".to_string()]);
        assert!(!rule.matches("a"));
        assert!(rule.matches("aa"));
        assert_eq!(rule.candidates("aba"), vec![PathBuf::from("/p/x/b")]);
    }

    #[test]
    fn test_longest_prefix_first_then_declaration_order() {
        let rules = compile_rules(
            Path::new("/p"),
            &paths(&[
                ("*", "./any/*"),
                ("@a/*", "./first/*"),
                ("@lib/deep/*", "./deep/*"),
                ("@b/*", "./second/*"),
            ]),
        );
        let prefixes: Vec<_> = rules.iter().map(AliasRule::prefix).collect();
        assert_eq!(prefixes, ["@lib/deep/", "@a/", "@b/", ""]);
    }

    #[test]
    fn test_equal_prefix_keeps_declaration_order() {
        let rules = compile_rules(
            Path::new("/p"),
            &paths(&[("@x/*.js", "./js/*"), ("@x/*", "./plain/*")]),
        );
        let found = rules.iter().find(|r| r.matches("@x/a.js")).unwrap();
        assert_eq!(found.targets(), ["/p/js/*"]);
    }

    #[test]
    fn test_is_bare_specifier() {
        assert!(is_bare_specifier("lodash"));
        assert!(is_bare_specifier("@scope/pkg/sub"));
        assert!(is_bare_specifier("~/utils"));
        assert!(!is_bare_specifier("./a"));
        assert!(!is_bare_specifier("../a"));
        assert!(!is_bare_specifier("/abs"));
        assert!(!is_bare_specifier("node:fs"));
        assert!(!is_bare_specifier("file:///a.ts"));
        assert!(!is_bare_specifier("data:text/javascript,1"));
    }

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("tsconfig.json"),
            r#"{
                "compilerOptions": {
                    "baseUrl": ".",
                    "paths": {
                        "@/*": ["./src/*", "./types/*.d.ts"],
                        "@/lib/*": ["./lib/*"],
                        "exact": ["./exact.ts", "./fallback.ts"]
                    }
                }
            }"#,
        )
        .unwrap();
        tmp
    }

    fn importer(tmp: &TempDir, rel: &str) -> String {
        path::path_to_file_url(&tmp.path().join(rel)).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_alias() {
        let tmp = project();
        let configs = ConfigStore::new();
        let parent = importer(&tmp, "src/main.ts");

        let got = resolve_alias(&configs, "exact", Some(&parent)).await.unwrap();
        assert_eq!(got, vec![tmp.path().join("exact.ts"), tmp.path().join("fallback.ts")]);

        let got = resolve_alias(&configs, "@/lib/x", Some(&parent)).await.unwrap();
        assert_eq!(got, vec![tmp.path().join("lib/x")]);

        // Declaration-file templates are never candidates.
        let got = resolve_alias(&configs, "@/util", Some(&parent)).await.unwrap();
        assert_eq!(got, vec![tmp.path().join("src/util")]);

        // baseUrl fallback
        let got = resolve_alias(&configs, "shared/x", Some(&parent)).await.unwrap();
        assert_eq!(got, vec![tmp.path().join("shared/x")]);
    }

    #[tokio::test]
    async fn test_alias_preconditions() {
        let tmp = project();
        let configs = ConfigStore::new();
        let parent = importer(&tmp, "src/main.ts");

        assert!(resolve_alias(&configs, "./exact", Some(&parent)).await.unwrap().is_empty());
        assert!(resolve_alias(&configs, "node:fs", Some(&parent)).await.unwrap().is_empty());
        assert!(resolve_alias(&configs, "exact", None).await.unwrap().is_empty());
        assert!(
            resolve_alias(&configs, "exact", Some("data:text/javascript,1"))
                .await
                .unwrap()
                .is_empty()
        );

        let dependency = importer(&tmp, "node_modules/dep/index.ts");
        assert!(resolve_alias(&configs, "exact", Some(&dependency)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_paths_no_base_url_means_no_alias() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("tsconfig.json"), r#"{ "compilerOptions": {} }"#).unwrap();
        let configs = ConfigStore::new();
        let parent = importer(&tmp, "main.ts");

        assert!(resolve_alias(&configs, "lodash", Some(&parent)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paths_without_base_url() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("app")).unwrap();
        fs::write(
            tmp.path().join("app/tsconfig.json"),
            r#"{ "compilerOptions": { "paths": { "~/*": ["./src/*"] } } }"#,
        )
        .unwrap();
        let configs = ConfigStore::new();
        let parent = importer(&tmp, "app/main.ts");

        let got = resolve_alias(&configs, "~/a.js", Some(&parent)).await.unwrap();
        assert_eq!(got, vec![tmp.path().join("app/src/a.js")]);
        assert!(resolve_alias(&configs, "lodash", Some(&parent)).await.unwrap().is_empty());
    }
}
