//! Fixed, in-memory repositories and files.

use crate::collect::{FileSource, RepositorySource};
use crate::errors::HarvestResult;
use crate::models::{RepositoryMeta, SourceFile};

#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    repos: Vec<(RepositoryMeta, Vec<SourceFile>)>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, repo: RepositoryMeta, files: Vec<SourceFile>) -> Self {
        self.repos.push((repo, files));
        self
    }

    fn files_of(&self, repo: &RepositoryMeta) -> Option<&[SourceFile]> {
        self.repos
            .iter()
            .find(|(r, _)| r.name == repo.name)
            .map(|(_, files)| files.as_slice())
    }
}

impl RepositorySource for StaticSource {
    fn repositories(&self) -> HarvestResult<Vec<RepositoryMeta>> {
        Ok(self.repos.iter().map(|(r, _)| r.clone()).collect())
    }
}

impl FileSource for StaticSource {
    fn list_files(&self, repo: &RepositoryMeta) -> HarvestResult<Vec<String>> {
        Ok(self
            .files_of(repo)
            .map(|files| files.iter().map(|f| f.path.clone()).collect())
            .unwrap_or_default())
    }

    fn fetch(&self, repo: &RepositoryMeta, path: &str) -> HarvestResult<Option<SourceFile>> {
        Ok(self
            .files_of(repo)
            .and_then(|files| files.iter().find(|f| f.path == path))
            .cloned())
    }
}
