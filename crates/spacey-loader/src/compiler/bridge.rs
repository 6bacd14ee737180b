// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Driving the npm compilers through a Node.js child process

use super::backend::{Backend, DriverOutput};
use super::{Compile, CompileFn, CompilerDescriptor};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::path;
use crate::tsconfig::CompilerOptions;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

/// Reads one request from stdin, writes `{code, map?}` to stdout.
///
/// `stripComments` blanks comments out of the result without moving any
/// other character, so a returned source map stays valid.
const DRIVER: &str = r##"
const REGEX_AFTER = new Set([
  'return', 'typeof', 'case', 'do', 'else', 'in', 'of', 'new',
  'delete', 'void', 'throw', 'yield', 'await', 'instanceof',
]);

function stripComments(code) {
  let out = '';
  let i = 0;
  let regexAllowed = true;
  const templates = [];
  while (i < code.length) {
    const c = code[i];
    const next = code[i + 1];
    let j = i + 1;
    if (c === '/' && next === '/') {
      while (j < code.length && code[j] !== '\n' && code[j] !== '\r') j++;
      out += ' '.repeat(j - i);
      i = j;
      continue;
    }
    if (c === '/' && next === '*') {
      const end = code.indexOf('*/', i + 2);
      j = end < 0 ? code.length : end + 2;
      out += code.slice(i, j).replace(/[^\r\n\u2028\u2029]/g, ' ');
      i = j;
      continue;
    }
    if (c === '"' || c === "'") {
      while (j < code.length && code[j] !== c && code[j] !== '\n') j += code[j] === '\\' ? 2 : 1;
      j++;
      regexAllowed = false;
    } else if (c === '`' || (c === '}' && templates[templates.length - 1] === 0)) {
      if (c === '}') templates.pop();
      let open = false;
      while (j < code.length) {
        if (code[j] === '\\') { j += 2; continue; }
        if (code[j] === '`') { j++; break; }
        if (code[j] === '$' && code[j + 1] === '{') { j += 2; open = true; break; }
        j++;
      }
      if (open) templates.push(0);
      regexAllowed = open;
    } else if (c === '/' && regexAllowed) {
      let inClass = false;
      while (j < code.length && code[j] !== '\n') {
        const r = code[j++];
        if (r === '\\') j++;
        else if (r === '[') inClass = true;
        else if (r === ']') inClass = false;
        else if (r === '/' && !inClass) break;
      }
      while (j < code.length && /[\w$]/.test(code[j])) j++;
      regexAllowed = false;
    } else if (/[\w$]/.test(c)) {
      while (j < code.length && /[\w$]/.test(code[j])) j++;
      regexAllowed = REGEX_AFTER.has(code.slice(i, j));
    } else if (!/\s/.test(c)) {
      if (templates.length && c === '{') templates[templates.length - 1]++;
      if (templates.length && c === '}') templates[templates.length - 1]--;
      regexAllowed = c !== ')' && c !== ']';
    }
    out += code.slice(i, j);
    i = j;
  }
  return out;
}

const chunks = [];
process.stdin.on('data', (chunk) => chunks.push(chunk));
process.stdin.on('end', async () => {
  const request = JSON.parse(Buffer.concat(chunks).toString('utf8'));
  const { backend, package: pkg, code, options } = request;
  try {
    const lib = require(pkg);
    let out;
    switch (backend) {
      case 'swc':
      case 'esbuild':
        out = { code: (await lib.transform(code, options)).code };
        break;
      case 'sucrase': {
        const result = lib.transform(code, options);
        out = { code: result.code, map: result.sourceMap };
        break;
      }
      case 'tsc':
        out = { code: (lib.transpileModule ? lib : lib.default).transpileModule(code, options).outputText };
        break;
      default:
        throw new Error('unknown backend ' + backend);
    }
    if (request.stripComments) out.code = stripComments(out.code);
    process.stdout.write(JSON.stringify(out));
  } catch (e) {
    process.stderr.write(String((e && e.message) || e));
    process.exitCode = 1;
  }
});
"##;

/// Locates one backend's package and a Node executable.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    backend: Backend,
    package_root: PathBuf,
    node: Option<PathBuf>,
}

impl BackendDescriptor {
    /// Descriptor for `backend` with packages searched from `config.package_root`
    pub fn new(backend: Backend, config: &LoaderConfig) -> Self {
        Self {
            backend,
            package_root: config.package_root.clone(),
            node: config.node.clone(),
        }
    }

    /// Descriptors for every backend, in detection order
    pub fn all(config: &LoaderConfig) -> Vec<Arc<dyn CompilerDescriptor>> {
        Backend::ALL
            .into_iter()
            .map(|backend| Arc::new(Self::new(backend, config)) as Arc<dyn CompilerDescriptor>)
            .collect()
    }

    fn unavailable(&self) -> LoaderError {
        LoaderError::BackendUnavailable(self.backend.name().to_string())
    }

    /// Walk up from the package root looking for `node_modules/<package>`
    async fn find_package(&self) -> Result<PathBuf> {
        let root = path::absolute(&self.package_root)?;
        let package = self.backend.package();

        for dir in root.ancestors() {
            let package_dir = dir.join("node_modules").join(package);
            let manifest = package_dir.join("package.json");
            let content = match tokio::fs::read_to_string(&manifest).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            serde_json::from_str::<serde_json::Value>(&content).map_err(|source| {
                LoaderError::MalformedManifest {
                    path: manifest.clone(),
                    source,
                }
            })?;
            return Ok(package_dir);
        }

        debug!(package, root = %root.display(), "compiler package not installed");
        Err(self.unavailable())
    }

    async fn find_node(&self) -> Result<PathBuf> {
        match &self.node {
            Some(node) => match tokio::fs::metadata(node).await {
                Ok(meta) if meta.is_file() => Ok(node.clone()),
                _ => {
                    debug!(node = %node.display(), "configured node executable missing");
                    Err(self.unavailable())
                }
            },
            None => which::which("node").map_err(|_| {
                debug!("node not found on PATH");
                self.unavailable()
            }),
        }
    }
}

#[async_trait]
impl CompilerDescriptor for BackendDescriptor {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn instantiate(&self) -> Result<CompileFn> {
        let package_dir = self.find_package().await?;
        let node = self.find_node().await?;
        debug!(
            backend = %self.backend,
            package = %package_dir.display(),
            node = %node.display(),
            "instantiated compiler"
        );
        Ok(Arc::new(NodeCompiler {
            backend: self.backend,
            node,
            package_dir,
        }))
    }
}

/// Compiles one file per `node` invocation.
#[derive(Debug, Clone)]
pub struct NodeCompiler {
    backend: Backend,
    node: PathBuf,
    package_dir: PathBuf,
}

impl NodeCompiler {
    fn failure(&self, filename: &Path, message: impl Into<String>) -> LoaderError {
        LoaderError::Compile {
            backend: self.backend.name(),
            filename: filename.to_path_buf(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Compile for NodeCompiler {
    async fn compile(
        &self,
        code: &str,
        filename: &Path,
        options: &CompilerOptions,
    ) -> Result<String> {
        let request = json!({
            "backend": self.backend.name(),
            "package": self.package_dir,
            "code": code,
            "filename": filename,
            "options": self.backend.options(filename, options)?,
            "stripComments": self.backend.strips_comments(options),
        });
        let request = serde_json::to_vec(&request)?;
        trace!(backend = %self.backend, file = %filename.display(), "spawning compiler");

        let mut child = Command::new(&self.node)
            .arg("-e")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // A child that dies early closes its stdin; its stderr says why.
        let written = match child.stdin.take() {
            Some(mut stdin) => match stdin.write_all(&request).await {
                Ok(()) => stdin.shutdown().await,
                Err(e) => Err(e),
            },
            None => Ok(()),
        };

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(filename, stderr.trim()));
        }
        written?;

        let output: DriverOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| self.failure(filename, format!("unreadable compiler output: {e}")))?;
        self.backend.finish(output)
    }
}
