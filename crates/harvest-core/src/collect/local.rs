//! Repositories checked out on local disk, described by a JSON manifest.
//!
//! ```json
//! {"repositories": [
//!   {"name": "acme/widgets", "license": "mit", "path": "checkouts/widgets",
//!    "commit_sha": "3f2a...", "file_commits": {"src/A.java": "91bc..."}}
//! ]}
//! ```
//!
//! Relative `path`s resolve against the manifest's directory. The per-file
//! SHA comes from `file_commits`, falling back to the checkout's
//! `commit_sha`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Deserialize;

use crate::collect::{AllowedLicenses, FileSource, RepositorySource};
use crate::config::HarvestConfig;
use crate::errors::{HarvestError, HarvestResult};
use crate::models::{RepositoryMeta, SourceFile};

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Deserialize)]
struct Manifest {
    repositories: Vec<ManifestEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    license: Option<String>,
    path: PathBuf,
    #[serde(default)]
    commit_sha: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    file_commits: HashMap<String, String>,
}

impl ManifestEntry {
    fn meta(&self) -> RepositoryMeta {
        RepositoryMeta {
            name: self.name.clone(),
            url: self
                .url
                .clone()
                .unwrap_or_else(|| format!("https://github.com/{}", self.name)),
            license: self.license.clone(),
            default_branch: self.default_branch.clone(),
        }
    }

    fn commit_for(&self, path: &str) -> Option<&str> {
        self.file_commits
            .get(path)
            .or(self.commit_sha.as_ref())
            .map(String::as_str)
            .filter(|sha| !sha.trim().is_empty())
    }
}

/// Discovery and retrieval over local checkouts.
#[derive(Clone, Debug)]
pub struct LocalCheckouts {
    entries: Vec<ManifestEntry>,
    allowed: AllowedLicenses,
    extension: String,
    max_files: usize,
}

impl LocalCheckouts {
    pub fn from_manifest(path: &Path, config: &HarvestConfig) -> HarvestResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_manifest_str(&raw, base, config)
    }

    pub fn from_manifest_str(raw: &str, base: &Path, config: &HarvestConfig) -> HarvestResult<Self> {
        let manifest: Manifest = serde_json::from_str(raw)?;
        let entries = manifest
            .repositories
            .into_iter()
            .map(|mut entry| {
                if entry.path.is_relative() {
                    entry.path = base.join(&entry.path);
                }
                entry
            })
            .collect();
        Ok(Self {
            entries,
            allowed: AllowedLicenses::new(&config.allowed_licenses),
            extension: config.file_extension.to_lowercase(),
            max_files: config.max_files_per_repo,
        })
    }

    fn entry(&self, repo: &RepositoryMeta) -> HarvestResult<&ManifestEntry> {
        self.entries
            .iter()
            .find(|e| e.name == repo.name)
            .ok_or_else(|| HarvestError::Collaborator(format!("unknown repository {}", repo.name)))
    }
}

impl RepositorySource for LocalCheckouts {
    fn repositories(&self) -> HarvestResult<Vec<RepositoryMeta>> {
        let mut repos = Vec::new();
        for entry in &self.entries {
            if !self.allowed.permits(entry.license.as_deref()) {
                tracing::info!(
                    repo = %entry.name,
                    license = entry.license.as_deref().unwrap_or("none"),
                    "skipping repository with disallowed license"
                );
                continue;
            }
            repos.push(entry.meta());
        }
        Ok(repos)
    }

    fn skipped_by_license(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !self.allowed.permits(entry.license.as_deref()))
            .count()
    }
}

impl FileSource for LocalCheckouts {
    fn list_files(&self, repo: &RepositoryMeta) -> HarvestResult<Vec<String>> {
        let entry = self.entry(repo)?;
        let root = &entry.path;
        if !root.is_dir() {
            return Err(HarvestError::Collaborator(format!(
                "checkout of {} not found at {}",
                repo.name,
                root.display()
            )));
        }

        let walker = WalkBuilder::new(root)
            .standard_filters(true)
            .git_global(false)
            .parents(false)
            .require_git(false)
            .build();

        let mut files = Vec::new();
        for result in walker {
            let dir_entry = match result {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(repo = %repo.name, error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !dir_entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let rel = dir_entry
                .path()
                .strip_prefix(root)
                .unwrap_or(dir_entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            if rel.to_lowercase().ends_with(&self.extension) {
                files.push(rel);
            }
        }
        files.sort();
        files.truncate(self.max_files);
        Ok(files)
    }

    fn fetch(&self, repo: &RepositoryMeta, path: &str) -> HarvestResult<Option<SourceFile>> {
        let entry = self.entry(repo)?;
        let Some(commit_sha) = entry.commit_for(path) else {
            tracing::debug!(repo = %repo.name, path, "no commit SHA for file");
            return Ok(None);
        };
        let bytes = match std::fs::read(entry.path.join(path)) {
            Ok(b) => b,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let text = String::from_utf8(bytes).map_err(|_| HarvestError::Encoding {
            path: path.to_string(),
        })?;
        let text = match text.strip_prefix(UTF8_BOM) {
            Some(rest) => rest.to_string(),
            None => text,
        };
        Ok(Some(SourceFile {
            path: path.to_string(),
            commit_sha: commit_sha.to_string(),
            text,
        }))
    }
}
