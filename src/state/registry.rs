// src/state/registry.rs
//! Registered origin URLs and internal plugins
//!
//! Both sets are loaded once at startup from plain text files and never
//! change afterwards; every scheduler task and every release upsert is
//! validated against them. Blank lines and `#` comments are skipped.

use std::path::Path;

use tracing::info;
use url::Url;

use crate::error::{Error, Result};

/// A GitHub-backed plugin whose releases the service polls directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalPlugin {
    /// `owner/repo` identity, as GitHub names it
    pub name: String,
    /// Private repositories need the API token and the download proxy
    pub private: bool,
}

/// The closed set of sources the service aggregates from
#[derive(Debug, Default)]
pub struct Registry {
    origins: Vec<String>,
    plugins: Vec<InternalPlugin>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest origin URL; duplicates are skipped
    pub fn add_origin(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid origin URL '{}': {}", url, e)))?;

        if !self.origins.iter().any(|existing| existing == url) {
            self.origins.push(url.to_string());
        }
        Ok(())
    }

    /// Register an internal plugin by its `owner/repo` name
    pub fn add_plugin(&mut self, name: &str, private: bool) -> Result<()> {
        let name = name.trim();
        if name.len() < 4 || !name.contains('/') {
            return Err(Error::Config(format!(
                "Invalid plugin name '{}': expected owner/repo",
                name
            )));
        }

        if !self.plugins.iter().any(|existing| existing.name == name) {
            self.plugins.push(InternalPlugin {
                name: name.to_string(),
                private,
            });
        }
        Ok(())
    }

    /// Load origin URLs from a file, one per line
    pub fn load_origins(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read origins file {}: {}", path.display(), e))
        })?;

        for line in registry_lines(&content) {
            self.add_origin(line)?;
        }

        info!("Registered {} origin URLs from {}", self.origins.len(), path.display());
        Ok(self.origins.len())
    }

    /// Load internal plugins from a file
    ///
    /// Each line is `owner/repo`, optionally followed by whitespace and
    /// the word `private`.
    pub fn load_plugins(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read plugins file {}: {}", path.display(), e))
        })?;

        for line in registry_lines(&content) {
            let mut parts = line.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let private = match parts.next() {
                None => false,
                Some(flag) if flag.eq_ignore_ascii_case("private") => true,
                Some(flag) => {
                    return Err(Error::Config(format!(
                        "Invalid plugin flag '{}' on line '{}'",
                        flag, line
                    )));
                }
            };
            self.add_plugin(name, private)?;
        }

        info!("Registered {} internal plugins from {}", self.plugins.len(), path.display());
        Ok(self.plugins.len())
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn plugins(&self) -> &[InternalPlugin] {
        &self.plugins
    }

    pub fn plugin(&self, name: &str) -> Option<&InternalPlugin> {
        self.plugins.iter().find(|plugin| plugin.name == name)
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}

fn registry_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.trim_matches(['\r', ' ', '\t']))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}
