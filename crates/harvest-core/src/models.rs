//! Shared typed models used across extraction, cleaning, and output layers.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use serde::Serialize;

use crate::extract::parser::CallableKind;

// ---------------------------------------------------------------------------
// Output schema
// ---------------------------------------------------------------------------

/// Column order of every dataset sink.
pub const DATASET_COLUMNS: [&str; 10] = [
    "repo_name",
    "repo_url",
    "commit_sha",
    "file_path",
    "method_name",
    "start_line",
    "end_line",
    "signature",
    "original_code",
    "code_tokens",
];

// ---------------------------------------------------------------------------
// 1. RepositoryMeta
// ---------------------------------------------------------------------------

/// A repository handed over by a discovery collaborator. The license has
/// already been checked against the allowed set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RepositoryMeta {
    /// `owner/name`.
    pub name: String,
    pub url: String,
    pub license: Option<String>,
    pub default_branch: Option<String>,
}

// ---------------------------------------------------------------------------
// 2. SourceFile
// ---------------------------------------------------------------------------

/// One decoded source file of a repository, consumed by a single extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// Repository-relative, `/`-separated.
    pub path: String,
    /// Last commit touching this file; shared by every method in it.
    pub commit_sha: String,
    pub text: String,
}

// ---------------------------------------------------------------------------
// 3. CandidateRecord
// ---------------------------------------------------------------------------

/// A method as extracted, before cleaning and deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub method_name: String,
    pub kind: CallableKind,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
    pub original_code: String,
    pub code_tokens: Vec<String>,
    /// Decided on the parsed body, so code sharing the first line is ignored.
    pub body_has_code: bool,
    /// The declaration's syntax subtree had no error nodes.
    pub well_formed: bool,
}

impl CandidateRecord {
    pub fn line_count(&self) -> usize {
        (self.end_line + 1).saturating_sub(self.start_line)
    }
}

// ---------------------------------------------------------------------------
// 4. MethodRecord
// ---------------------------------------------------------------------------

/// One dataset row: a cleaned candidate joined with its file's metadata.
#[cfg_attr(feature = "python", pyclass(frozen, get_all))]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MethodRecord {
    pub repo_name: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub file_path: String,
    pub method_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
    pub original_code: String,
    pub code_tokens: Vec<String>,
}

impl MethodRecord {
    pub fn assemble(candidate: CandidateRecord, repo: &RepositoryMeta, file: &SourceFile) -> Self {
        Self {
            repo_name: repo.name.clone(),
            repo_url: repo.url.clone(),
            commit_sha: file.commit_sha.clone(),
            file_path: file.path.clone(),
            method_name: candidate.method_name,
            start_line: candidate.start_line,
            end_line: candidate.end_line,
            signature: candidate.signature,
            original_code: candidate.original_code,
            code_tokens: candidate.code_tokens,
        }
    }

    /// Field values in [`DATASET_COLUMNS`] order; `code_tokens` as a JSON array.
    pub fn to_row(&self) -> serde_json::Result<[String; 10]> {
        Ok([
            self.repo_name.clone(),
            self.repo_url.clone(),
            self.commit_sha.clone(),
            self.file_path.clone(),
            self.method_name.clone(),
            self.start_line.to_string(),
            self.end_line.to_string(),
            self.signature.clone(),
            self.original_code.clone(),
            serde_json::to_string(&self.code_tokens)?,
        ])
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl MethodRecord {
    fn __repr__(&self) -> String {
        format!(
            "MethodRecord(repo_name={:?}, file_path={:?}, method_name={:?}, start_line={}, end_line={})",
            self.repo_name, self.file_path, self.method_name, self.start_line, self.end_line,
        )
    }
}

// ---------------------------------------------------------------------------
// 5. HarvestStats
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub too_short: usize,
    pub too_long: usize,
    pub empty_body: usize,
    pub unparsed: usize,
}

impl RejectionCounts {
    pub fn total(&self) -> usize {
        self.too_short + self.too_long + self.empty_body + self.unparsed
    }
}

/// Counters for one pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    pub repositories_seen: usize,
    pub repositories_failed: usize,
    /// Reported by the repository source; never attempted.
    pub repositories_skipped_license: usize,
    pub files_seen: usize,
    pub files_parsed: usize,
    pub files_failed_parse: usize,
    pub files_failed_encoding: usize,
    pub files_without_data: usize,
    pub candidates: usize,
    pub malformed: usize,
    pub rejected: RejectionCounts,
    pub duplicates: usize,
    pub rows_written: usize,
    pub sample_cap_reached: bool,
    pub elapsed_ms: u64,
}

impl HarvestStats {
    pub fn files_failed(&self) -> usize {
        self.files_failed_parse + self.files_failed_encoding + self.files_without_data
    }
}
