//! The harvest run: repositories to files to candidates to dataset rows.
//!
//! Per repository, files are fetched in listing order, extracted (on a
//! worker pool when configured), then cleaned, assembled and deduplicated
//! in that same order, so output never depends on scheduling. A failing
//! file or record is counted and skipped; a repository whose listing fails,
//! or whose every file fails, counts as a failed repository.

use std::time::Instant;

use rayon::prelude::*;

use crate::clean::dedup::{Deduplicator, SeenKeys};
use crate::clean::filter::{check_span, MethodFilter, Rejection};
use crate::collect::{FileSource, RepositorySource};
use crate::config::HarvestConfig;
use crate::errors::{HarvestError, HarvestResult};
use crate::extract::methods::{extract_methods, ExtractOptions};
use crate::models::{CandidateRecord, HarvestStats, MethodRecord, RepositoryMeta, SourceFile};
use crate::store::RowSink;

pub struct Harvester {
    config: HarvestConfig,
    filter: MethodFilter,
    options: ExtractOptions,
    pool: Option<rayon::ThreadPool>,
}

/// What happened to one repository.
enum RepoOutcome {
    Done,
    Failed,
    CapReached,
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> HarvestResult<Self> {
        config.validate()?;
        let pool = if config.workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!(error = %err, "worker pool unavailable, extracting sequentially");
                    None
                }
            }
        } else {
            None
        };
        Ok(Self {
            filter: MethodFilter::from_config(&config),
            options: ExtractOptions {
                include_constructors: config.include_constructors,
            },
            config,
            pool,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn run(
        &self,
        repos: &dyn RepositorySource,
        files: &dyn FileSource,
        sink: &mut dyn RowSink,
    ) -> HarvestResult<HarvestStats> {
        self.run_with_seen(repos, files, sink, SeenKeys::new())
            .map(|(stats, _)| stats)
    }

    /// Run with a deduplication accumulator carried over from earlier
    /// output; returns it grown by this run's rows.
    pub fn run_with_seen(
        &self,
        repos: &dyn RepositorySource,
        files: &dyn FileSource,
        sink: &mut dyn RowSink,
        seen: SeenKeys,
    ) -> HarvestResult<(HarvestStats, SeenKeys)> {
        sink.check_key_mode(self.config.dedup_key)?;
        let started = Instant::now();
        let mut stats = HarvestStats::default();
        let mut dedup = Deduplicator::with_seen(self.config.dedup_key, seen);

        let repositories = repos.repositories()?;
        stats.repositories_skipped_license = repos.skipped_by_license();
        tracing::info!(
            repositories = repositories.len(),
            skipped_license = stats.repositories_skipped_license,
            "harvest started"
        );

        for repo in &repositories {
            if self.cap_reached(&stats) {
                stats.sample_cap_reached = true;
                break;
            }
            stats.repositories_seen += 1;
            let outcome = self.harvest_repository(repo, files, sink, &mut dedup, &mut stats)?;
            sink.flush()?;
            match outcome {
                RepoOutcome::Done => {}
                RepoOutcome::Failed => stats.repositories_failed += 1,
                RepoOutcome::CapReached => {
                    stats.sample_cap_reached = true;
                    break;
                }
            }
        }
        sink.finish()?;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            repositories = stats.repositories_seen,
            failed = stats.repositories_failed,
            files = stats.files_seen,
            rows = stats.rows_written,
            duplicates = stats.duplicates,
            rejected = stats.rejected.total(),
            elapsed_ms = stats.elapsed_ms,
            "harvest finished"
        );

        if stats.repositories_seen > 0 && stats.repositories_failed == stats.repositories_seen {
            return Err(HarvestError::AllRepositoriesFailed {
                attempted: stats.repositories_seen,
            });
        }
        Ok((stats, dedup.into_seen()))
    }

    fn cap_reached(&self, stats: &HarvestStats) -> bool {
        self.config
            .max_samples
            .is_some_and(|cap| stats.rows_written >= cap)
    }

    fn harvest_repository(
        &self,
        repo: &RepositoryMeta,
        files: &dyn FileSource,
        sink: &mut dyn RowSink,
        dedup: &mut Deduplicator,
        stats: &mut HarvestStats,
    ) -> HarvestResult<RepoOutcome> {
        let mut paths = match files.list_files(repo) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!(repo = %repo.name, error = %err, "listing failed");
                return Ok(RepoOutcome::Failed);
            }
        };
        paths.truncate(self.config.max_files_per_repo);
        let attempted = paths.len();
        let mut failed = 0usize;

        let mut fetched = Vec::with_capacity(paths.len());
        for path in &paths {
            stats.files_seen += 1;
            match files.fetch(repo, path) {
                Ok(Some(file)) => fetched.push(file),
                Ok(None) => {
                    stats.files_without_data += 1;
                    failed += 1;
                }
                Err(err @ HarvestError::Encoding { .. }) => {
                    tracing::warn!(repo = %repo.name, error = %err, "skipping file");
                    stats.files_failed_encoding += 1;
                    failed += 1;
                }
                Err(err) => {
                    tracing::warn!(repo = %repo.name, path = %path, error = %err, "fetch failed");
                    stats.files_without_data += 1;
                    failed += 1;
                }
            }
        }

        let extracted = self.extract_all(&fetched);
        let rows_before = stats.rows_written;
        let mut outcome = RepoOutcome::Done;

        'files: for (file, result) in fetched.iter().zip(extracted) {
            let candidates = match result {
                Ok(candidates) => candidates,
                Err(err) => {
                    tracing::warn!(repo = %repo.name, error = %err, "skipping file");
                    stats.files_failed_parse += 1;
                    failed += 1;
                    continue;
                }
            };
            stats.files_parsed += 1;
            tracing::debug!(repo = %repo.name, path = %file.path, candidates = candidates.len(), "parsed");

            for candidate in candidates {
                stats.candidates += 1;
                let Some(record) = self.clean(candidate, repo, file, stats) else {
                    continue;
                };
                if self.cap_reached(stats) {
                    outcome = RepoOutcome::CapReached;
                    break 'files;
                }
                if !dedup.admit(&record) {
                    stats.duplicates += 1;
                    continue;
                }
                sink.append(&record)?;
                stats.rows_written += 1;
            }
        }

        tracing::info!(
            repo = %repo.name,
            files = attempted,
            failed,
            rows = stats.rows_written - rows_before,
            "repository harvested"
        );

        if attempted > 0 && failed == attempted {
            return Ok(RepoOutcome::Failed);
        }
        if matches!(outcome, RepoOutcome::Done) && self.cap_reached(stats) {
            outcome = RepoOutcome::CapReached;
        }
        Ok(outcome)
    }

    /// Span check, acceptance rules, then assembly with file metadata.
    fn clean(
        &self,
        candidate: CandidateRecord,
        repo: &RepositoryMeta,
        file: &SourceFile,
        stats: &mut HarvestStats,
    ) -> Option<MethodRecord> {
        if let Err(err) = check_span(&candidate, &file.path) {
            tracing::warn!(repo = %repo.name, error = %err, "dropping record");
            stats.malformed += 1;
            return None;
        }
        if let Err(rejection) = self.filter.evaluate(&candidate) {
            match rejection {
                Rejection::TooShort { .. } => stats.rejected.too_short += 1,
                Rejection::TooLong { .. } => stats.rejected.too_long += 1,
                Rejection::EmptyBody => stats.rejected.empty_body += 1,
                Rejection::Unparsed => stats.rejected.unparsed += 1,
            }
            return None;
        }
        Some(MethodRecord::assemble(candidate, repo, file))
    }

    /// Results come back in `files` order whether or not a pool is used.
    fn extract_all(&self, files: &[SourceFile]) -> Vec<HarvestResult<Vec<CandidateRecord>>> {
        let options = self.options;
        let work = move |file: &SourceFile| extract_methods(&file.text, &file.path, options);
        match &self.pool {
            Some(pool) if files.len() > 1 => pool.install(|| files.par_iter().map(work).collect()),
            _ => files.iter().map(work).collect(),
        }
    }
}
