// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the TypeScript loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving or loading TypeScript modules
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Module not found by the resolver chain
    #[error(
        "Cannot find module '{specifier}'{}",
        .importer.as_deref().map(|i| format!(" imported from {i}")).unwrap_or_default()
    )]
    ModuleNotFound {
        /// Specifier exactly as it was asked for
        specifier: String,
        /// URL of the importing module, if any
        importer: Option<String>,
    },

    /// No tsconfig.json governs a file that has to be compiled
    #[error("Cannot find tsconfig.json for {}", .0.display())]
    ConfigMissing(PathBuf),

    /// tsconfig.json could not be read or merged
    #[error("Invalid tsconfig {}: {reason}", .path.display())]
    MalformedConfig {
        /// Path of the offending config file
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// package.json is not valid JSON
    #[error("Invalid package config {}: {source}", .path.display())]
    MalformedManifest {
        /// Path of the offending manifest
        path: PathBuf,
        /// Parser error
        source: serde_json::Error,
    },

    /// A compiler backend is not installed
    #[error("TypeScript compiler '{0}' is not available")]
    BackendUnavailable(String),

    /// The backend selector names no known compiler
    #[error("Unknown TypeScript compiler '{0}', expected one of: swc, esbuild, sucrase, tsc")]
    UnknownCompiler(String),

    /// None of the compiler backends could be instantiated
    #[error("No supported TypeScript compiler found")]
    NoCompilerAvailable,

    /// A backend failed to compile a file
    #[error("{backend} failed to compile {}: {message}", .filename.display())]
    Compile {
        /// Backend name
        backend: &'static str,
        /// File being compiled
        filename: PathBuf,
        /// Message reported by the backend
        message: String,
    },

    /// URL is not usable where a file URL is required
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoaderError {
    /// Create a module not found error
    pub fn module_not_found(specifier: impl Into<String>, importer: Option<&str>) -> Self {
        Self::ModuleNotFound {
            specifier: specifier.into(),
            importer: importer.map(str::to_string),
        }
    }

    /// Host-style error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModuleNotFound { .. } => "ERR_MODULE_NOT_FOUND",
            Self::ConfigMissing(_) => "ERR_TSCONFIG_NOT_FOUND",
            Self::MalformedConfig { .. } => "ERR_INVALID_TSCONFIG",
            Self::MalformedManifest { .. } => "ERR_INVALID_PACKAGE_CONFIG",
            Self::BackendUnavailable(_) => "ERR_COMPILER_UNAVAILABLE",
            Self::UnknownCompiler(_) => "ERR_UNKNOWN_COMPILER",
            Self::NoCompilerAvailable => "ERR_NO_COMPILER",
            Self::Compile { .. } => "ERR_COMPILE",
            Self::InvalidUrl(_) => "ERR_INVALID_URL",
            Self::Io(_) => "ERR_IO",
            Self::Json(_) => "ERR_JSON",
        }
    }

    /// Whether this is the "module not found" condition resolvers fall back on
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }

    /// The specifier a not-found error refers to
    pub fn missing_specifier(&self) -> Option<&str> {
        match self {
            Self::ModuleNotFound { specifier, .. } => Some(specifier),
            _ => None,
        }
    }
}
