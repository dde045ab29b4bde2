//! Exact-match deduplication of dataset rows.
//!
//! The first record carrying a given key wins; later ones are dropped. Keys
//! are kept as SHA-256 digests so the accumulator grows with the number of
//! unique records, not with their size.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::MethodRecord;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupKeyMode {
    /// Normalized `original_code` alone; collapses copies across files and
    /// repositories.
    #[default]
    Code,
    /// Signature plus code, so identical bodies of different overloads stay.
    SignatureAndCode,
    /// Repository, file, method name and code: only repeats inside one file
    /// collapse.
    Location,
}

impl FromStr for DedupKeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "code" => Ok(DedupKeyMode::Code),
            "signature-and-code" => Ok(DedupKeyMode::SignatureAndCode),
            "location" => Ok(DedupKeyMode::Location),
            other => Err(format!("unknown dedup key: {other}")),
        }
    }
}

impl fmt::Display for DedupKeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DedupKeyMode::Code => "code",
            DedupKeyMode::SignatureAndCode => "signature-and-code",
            DedupKeyMode::Location => "location",
        })
    }
}

pub type KeyDigest = [u8; 32];

/// Keys admitted so far. Passed into and returned from [`dedupe`] so one
/// run can deduplicate batch after batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeenKeys {
    keys: HashSet<KeyDigest>,
}

impl SeenKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &KeyDigest) -> bool {
        self.keys.contains(key)
    }

    /// Returns `true` if the key was not present.
    pub fn insert(&mut self, key: KeyDigest) -> bool {
        self.keys.insert(key)
    }
}

/// Unify line endings and drop trailing whitespace on every line.
pub fn normalize_code(code: &str) -> String {
    code.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

pub fn dedup_key(record: &MethodRecord, mode: DedupKeyMode) -> KeyDigest {
    let mut hasher = Sha256::new();
    let mut feed = |part: &str| {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    };
    match mode {
        DedupKeyMode::Code => {}
        DedupKeyMode::SignatureAndCode => feed(&record.signature),
        DedupKeyMode::Location => {
            feed(&record.repo_name);
            feed(&record.file_path);
            feed(&record.method_name);
        }
    }
    feed(&normalize_code(&record.original_code));

    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Order-preserving filter keeping the first record per key.
pub fn dedupe(
    records: Vec<MethodRecord>,
    mut seen: SeenKeys,
    mode: DedupKeyMode,
) -> (Vec<MethodRecord>, SeenKeys) {
    let kept = records
        .into_iter()
        .filter(|record| seen.insert(dedup_key(record, mode)))
        .collect();
    (kept, seen)
}

/// Streaming form of [`dedupe`] for one consumer admitting rows one by one.
#[derive(Clone, Debug, Default)]
pub struct Deduplicator {
    mode: DedupKeyMode,
    seen: SeenKeys,
}

impl Deduplicator {
    pub fn new(mode: DedupKeyMode) -> Self {
        Self::with_seen(mode, SeenKeys::new())
    }

    pub fn with_seen(mode: DedupKeyMode, seen: SeenKeys) -> Self {
        Self { mode, seen }
    }

    pub fn mode(&self) -> DedupKeyMode {
        self.mode
    }

    /// `true` the first time a key is offered.
    pub fn admit(&mut self, record: &MethodRecord) -> bool {
        self.seen.insert(dedup_key(record, self.mode))
    }

    pub fn unique(&self) -> usize {
        self.seen.len()
    }

    pub fn into_seen(self) -> SeenKeys {
        self.seen
    }
}
