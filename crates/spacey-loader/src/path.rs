// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical path helpers shared by the config store and resolvers

use crate::error::{LoaderError, Result};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Normalize a path without touching the file system.
///
/// `.` segments are dropped and `..` pops the previous segment; a `..` that
/// would climb above the root of an absolute path is discarded.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => result.push(component.as_os_str()),
            Component::CurDir => continue,
            Component::ParentDir => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                } else if !path.is_absolute() {
                    result.push("..");
                }
            }
            Component::Normal(name) => {
                result.push(name);
                depth += 1;
            }
        }
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Join `rel` onto `base` and normalize the result
pub fn join(base: &Path, rel: impl AsRef<Path>) -> PathBuf {
    normalize(&base.join(rel))
}

/// Make a path absolute against the current directory
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Convert a `file:` URL string into a path
pub fn file_url_to_path(url: &str) -> Result<PathBuf> {
    Url::parse(url)
        .ok()
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
        .ok_or_else(|| LoaderError::InvalidUrl(url.to_string()))
}

/// Convert an absolute path into a `file:` URL string
pub fn path_to_file_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|_| LoaderError::InvalidUrl(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/foo/bar//baz/asdf/quux/..")),
            PathBuf::from("/foo/bar/baz/asdf")
        );
        assert_eq!(normalize(Path::new("foo/bar/../baz")), PathBuf::from("foo/baz"));
        assert_eq!(normalize(Path::new("/proj/./src/*")), PathBuf::from("/proj/src/*"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_join() {
        assert_eq!(join(Path::new("/proj"), "./src/*"), PathBuf::from("/proj/src/*"));
        assert_eq!(join(Path::new("/proj/a"), "../b"), PathBuf::from("/proj/b"));
        assert_eq!(join(Path::new("/proj"), "/abs"), PathBuf::from("/abs"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_urls() {
        let path = file_url_to_path("file:///home/user/app.ts").unwrap();
        assert_eq!(path, PathBuf::from("/home/user/app.ts"));
        assert_eq!(
            path_to_file_url(Path::new("/home/user/my app.ts")).unwrap(),
            "file:///home/user/my%20app.ts"
        );
        assert!(file_url_to_path("data:text/javascript,1").is_err());
        assert!(file_url_to_path("./relative.ts").is_err());
    }
}
