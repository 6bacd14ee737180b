// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The known compiler backends and their option mapping

use crate::error::Result;
use crate::tsconfig::CompilerOptions;
use crate::typescript::is_jsx_file;
use base64::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;

/// A supported TypeScript compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// `@swc/core`
    Swc,
    /// `esbuild`
    Esbuild,
    /// `sucrase`
    Sucrase,
    /// `typescript` (`transpileModule`)
    Tsc,
}

/// What the driver script writes back
#[derive(Debug, Clone, Deserialize)]
pub struct DriverOutput {
    /// Compiled JavaScript
    pub code: String,
    /// Source map, for backends that return it separately
    #[serde(default)]
    pub map: Option<Value>,
}

impl Backend {
    /// All backends, fastest first
    pub const ALL: [Backend; 4] = [Backend::Swc, Backend::Esbuild, Backend::Sucrase, Backend::Tsc];

    /// Name used for explicit selection
    pub fn name(self) -> &'static str {
        match self {
            Backend::Swc => "swc",
            Backend::Esbuild => "esbuild",
            Backend::Sucrase => "sucrase",
            Backend::Tsc => "tsc",
        }
    }

    /// Look a backend up by its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|backend| backend.name() == name)
    }

    /// npm package providing the backend
    pub fn package(self) -> &'static str {
        match self {
            Backend::Swc => "@swc/core",
            Backend::Esbuild => "esbuild",
            Backend::Sucrase => "sucrase",
            Backend::Tsc => "typescript",
        }
    }

    /// Translate normalized compiler options into the backend's own options
    pub fn options(self, filename: &Path, options: &CompilerOptions) -> Result<Value> {
        let mut value = match self {
            Backend::Swc => swc_options(filename, options),
            Backend::Esbuild => esbuild_options(filename, options)?,
            Backend::Sucrase => sucrase_options(filename, options),
            Backend::Tsc => tsc_options(filename, options)?,
        };
        strip_nulls(&mut value);
        Ok(value)
    }

    /// Whether comments have to be blanked out of the output after compiling.
    /// Sucrase has no option to drop them itself.
    pub fn strips_comments(self, options: &CompilerOptions) -> bool {
        self == Backend::Sucrase && options.remove_comments == Some(true)
    }

    /// Turn driver output into the final module text
    pub fn finish(self, output: DriverOutput) -> Result<String> {
        match (self, output.map) {
            (Backend::Sucrase, Some(map)) => {
                let encoded = BASE64_STANDARD.encode(serde_json::to_vec(&map)?);
                Ok(format!(
                    "{}\n//# sourceMappingURL=data:application/json;base64,{encoded}",
                    output.code
                ))
            }
            _ => Ok(output.code),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn jsx_runtime(options: &CompilerOptions) -> &'static str {
    match options.jsx.as_deref() {
        Some(jsx) if jsx.starts_with("react-") => "automatic",
        _ => "classic",
    }
}

fn swc_options(filename: &Path, opts: &CompilerOptions) -> Value {
    let target = match opts.target.as_deref() {
        None | Some("esnext") => "es2022",
        Some(target) => target,
    };
    let decorators = opts.experimental_decorators.unwrap_or(false);

    json!({
        "filename": filename,
        "swcrc": false,
        "sourceMaps": "inline",
        "inlineSourcesContent": false,
        "module": {
            "type": if opts.is_commonjs() { "commonjs" } else { "es6" },
            "importInterop": if opts.es_module_interop == Some(true) { "swc" } else { "none" },
        },
        "jsc": {
            "target": target,
            "externalHelpers": opts.import_helpers.unwrap_or(false),
            "preserveAllComments": !opts.remove_comments.unwrap_or(false),
            "minify": { "compress": false, "mangle": false },
            "parser": {
                "syntax": "typescript",
                "tsx": is_jsx_file(filename),
                "decorators": decorators,
            },
            "transform": {
                "useDefineForClassFields": opts.use_define_for_class_fields,
                "legacyDecorator": decorators,
                "decoratorMetadata": opts.emit_decorator_metadata.unwrap_or(false),
                "react": {
                    "runtime": jsx_runtime(opts),
                    "pragma": opts.jsx_factory,
                    "pragmaFrag": opts.jsx_fragment_factory,
                    "importSource": opts.jsx_import_source.as_deref().unwrap_or("react"),
                    "development": opts.jsx.as_deref() == Some("react-jsxdev"),
                },
            },
        },
    })
}

fn esbuild_options(filename: &Path, opts: &CompilerOptions) -> Result<Value> {
    Ok(json!({
        "sourcefile": filename,
        "loader": if is_jsx_file(filename) { "tsx" } else { "ts" },
        "target": opts.target,
        "format": opts.is_commonjs().then_some("cjs"),
        "sourcemap": "inline",
        "sourcesContent": false,
        "legalComments": if opts.remove_comments == Some(true) { "none" } else { "inline" },
        "tsconfigRaw": { "compilerOptions": serde_json::to_value(opts)? },
    }))
}

fn sucrase_options(filename: &Path, opts: &CompilerOptions) -> Value {
    let mut transforms = vec!["typescript"];
    if is_jsx_file(filename) {
        transforms.push("jsx");
    }
    if opts.is_commonjs() {
        transforms.push("imports");
    }

    json!({
        "filePath": filename,
        "transforms": transforms,
        "keepUnusedImports": opts.verbatim_module_syntax.unwrap_or(false),
        "sourceMapOptions": { "compiledFilename": filename },
        "preserveDynamicImport": true,
        "disableESTransforms": true,
        "injectCreateRequireForImportRequire": true,
        "enableLegacyTypeScriptModuleInterop": !opts.es_module_interop.unwrap_or(false),
        "jsxRuntime": jsx_runtime(opts),
        "production": opts.jsx.as_deref() != Some("react-jsxdev"),
        "jsxImportSource": opts.jsx_import_source,
        "jsxPragma": opts.jsx_factory,
        "jsxFragmentPragma": opts.jsx_fragment_factory,
    })
}

fn tsc_options(filename: &Path, opts: &CompilerOptions) -> Result<Value> {
    let mut compiler_options = opts.clone();
    if is_jsx_file(filename) && compiler_options.jsx.is_none() {
        compiler_options.jsx = Some("react".to_string());
    }
    Ok(json!({
        "fileName": filename,
        "compilerOptions": serde_json::to_value(&compiler_options)?,
    }))
}

/// Remove `null` members so backends see unset options as absent
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
