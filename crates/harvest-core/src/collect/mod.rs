//! Collaborator seams: where repositories and source files come from.
//!
//! The pipeline only sees these traits. Remote discovery and download live
//! outside this crate; `local` reads checkouts listed in a manifest and
//! `memory` serves fixed data.

pub mod local;
pub mod memory;

use std::collections::HashSet;

use crate::errors::HarvestResult;
use crate::models::{RepositoryMeta, SourceFile};

/// Supplies repositories, already filtered to the allowed licenses.
pub trait RepositorySource {
    fn repositories(&self) -> HarvestResult<Vec<RepositoryMeta>>;

    /// Repositories left out of [`repositories`](Self::repositories) because
    /// their license is not allowed.
    fn skipped_by_license(&self) -> usize {
        0
    }
}

/// Supplies the source files of one repository.
pub trait FileSource {
    /// Repository-relative paths in enumeration order.
    fn list_files(&self, repo: &RepositoryMeta) -> HarvestResult<Vec<String>>;

    /// `Ok(None)` when the collaborator has no usable data for the file
    /// (missing file, no commit SHA).
    fn fetch(&self, repo: &RepositoryMeta, path: &str) -> HarvestResult<Option<SourceFile>>;
}

/// Case-insensitive license allow-list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedLicenses {
    keys: HashSet<String>,
}

impl AllowedLicenses {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Repositories without a license are never permitted.
    pub fn permits(&self, license: Option<&str>) -> bool {
        license
            .map(|l| self.keys.contains(&l.trim().to_lowercase()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALLOWED_LICENSES;

    #[test]
    fn license_check_is_case_insensitive() {
        let allowed = AllowedLicenses::new(DEFAULT_ALLOWED_LICENSES);
        assert!(allowed.permits(Some("MIT")));
        assert!(allowed.permits(Some(" Apache-2.0 ")));
        assert!(allowed.permits(Some("bsd-3-clause")));
        assert!(!allowed.permits(Some("gpl-3.0")));
        assert!(!allowed.permits(None));
    }
}
