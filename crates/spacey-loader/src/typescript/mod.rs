// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! TypeScript file recognition.
//!
//! Every stage of the loader decides on extensions alone before it touches
//! the file system, so these checks work on plain strings (URLs and
//! specifiers) as well as paths. Matching is ASCII case-insensitive, like
//! the host does for `file:` URLs.
//!
//! | compiled  | typed source | forced format |
//! |-----------|--------------|---------------|
//! | `.js`     | `.ts`        | package.json  |
//! | `.jsx`    | `.tsx`       | package.json  |
//! | `.mjs`    | `.mts`       | module        |
//! | `.cjs`    | `.cts`       | commonjs      |

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static TS_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.[cm]?tsx?$").expect("valid extension pattern"));

static JS_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.[cm]?jsx?$").expect("valid extension pattern"));

/// Declaration-only files, never executable.
static DECLARATION_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.d\.[cm]?ts$").expect("valid extension pattern"));

/// Check if a file extension indicates a JSX/TSX file.
///
/// Returns `true` for `.jsx` and `.tsx` files.
pub fn is_jsx_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case("jsx") || ext.eq_ignore_ascii_case("tsx"),
        None => false,
    }
}

/// Check if a path is a declaration file (`.d.ts`, `.d.mts`, `.d.cts`).
pub fn is_declaration_file(path: &Path) -> bool {
    DECLARATION_EXTENSION.is_match(&path.to_string_lossy())
}

/// TypeScript extension (`.ts`, `.tsx`, `.mts`, `.cts`) a URL or path ends with.
pub fn typescript_extension(s: &str) -> Option<&str> {
    TS_EXTENSION.find(s).map(|m| m.as_str())
}

/// JavaScript extension (`.js`, `.jsx`, `.mjs`, `.cjs`) a URL or path ends with.
pub fn javascript_extension(s: &str) -> Option<&str> {
    JS_EXTENSION.find(s).map(|m| m.as_str())
}

/// Whether a specifier names a local file: relative, or a `file:` URL.
pub fn is_local_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier
            .get(..5)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("file:"))
}

/// Rewrite a local compiled-extension specifier to its TypeScript source.
///
/// `./a.js` becomes `./a.ts`, `./a.mjs` becomes `./a.mts`, `./a.jsx` becomes
/// `./a.tsx`. Returns `None` for anything else.
pub fn to_typescript_specifier(specifier: &str) -> Option<String> {
    if !is_local_specifier(specifier) {
        return None;
    }
    let ext = javascript_extension(specifier)?;
    let stem = &specifier[..specifier.len() - ext.len()];
    let mut rewritten = String::with_capacity(specifier.len());
    rewritten.push_str(stem);
    rewritten.push('.');
    match ext.len() {
        4 | 5 if !ext[1..2].eq_ignore_ascii_case("j") => rewritten.push_str(&ext[1..2]),
        _ => {}
    }
    rewritten.push_str("ts");
    if ext.ends_with(['x', 'X']) {
        rewritten.push('x');
    }
    Some(rewritten)
}
