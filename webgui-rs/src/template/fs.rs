//! Read-only embedded file system for pages and fragments

use std::collections::BTreeMap;

/// Read-only file lookup by absolute path (`/index.html`)
pub trait EmbeddedFs: Send + Sync {
    fn open(&self, path: &str) -> Option<&[u8]>;

    fn exists(&self, path: &str) -> bool {
        self.open(path).is_some()
    }
}

/// File system over data compiled into the binary
#[derive(Debug, Default, Clone)]
pub struct StaticFs {
    files: BTreeMap<&'static str, &'static [u8]>,
}

impl StaticFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; `path` must start with `/`
    pub fn with_file(mut self, path: &'static str, data: &'static [u8]) -> Self {
        self.files.insert(path, data);
        self
    }

    pub fn insert(&mut self, path: &'static str, data: &'static [u8]) {
        self.files.insert(path, data);
    }

    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files.keys().copied()
    }
}

impl EmbeddedFs for StaticFs {
    fn open(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).copied()
    }
}

/// MIME type for a file name, by extension
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "text/plain",
    }
}

/// Path part of a request URI, without query string or fragment
pub fn path_from_uri(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}

/// Query string of a request URI, if any
pub fn query_from_uri(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once('?')?;
    Some(rest.split('#').next().unwrap_or(rest))
}
