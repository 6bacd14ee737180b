// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native resolve and load stages
//!
//! These end a hook chain the way the host's own loader does, so the hooks
//! can run outside a Node.js process:
//! - [`NodeResolver`]: builtins, relative paths, `file:` URLs, `node_modules`
//! - [`FsLoader`]: reads `file:` URLs, answers `node:` builtins

mod loader;
mod resolver;

pub use loader::FsLoader;
pub use resolver::{NodeResolver, BUILTIN_MODULES};
pub(crate) use resolver::parse_package_specifier;
