//! Code fingerprinting for cross-repository plagiarism detection.
//!
//! Normalised source is hashed into k-grams with FNV-1a, thinned with the
//! winnowing scheme of Schleimer-Wilkerson-Aiken (SIGMOD 2003), and
//! compared with Jaccard similarity over the resulting fingerprint sets.

pub mod normalize;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

pub use normalize::normalize;

/// Default k-gram length in characters.
pub const DEFAULT_K: usize = 25;

/// Default winnowing window size.
pub const DEFAULT_WINDOW: usize = 4;

/// Files larger than this are excluded from cross-repo scans.
pub const MAX_FILE_BYTES: usize = 100_000;

/// Path fragments excluded from cross-repo scans.
pub const SKIP_PATH_FRAGMENTS: [&str; 5] = [
    "node_modules/",
    "package-lock.json",
    ".min.",
    "vendor/",
    "dist/",
];

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit over raw bytes.
fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A file's identity for similarity purposes: exact-content digest plus the
/// winnowed fingerprint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// SHA-256 hex of the normalised text.
    pub digest: String,
    /// Winnowed FNV-1a k-gram hashes; unordered, duplicate-free.
    pub fingerprints: HashSet<u32>,
    /// Length of the normalised text in bytes.
    pub normalized_len: usize,
}

/// Outcome of a direct two-text comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOutcome {
    pub similarity: f64,
    pub identical_content: bool,
}

/// One file inside a candidate repository.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

/// A repository participating in a cross-repo scan.
#[derive(Debug, Clone)]
pub struct CandidateRepo {
    /// Opaque stable key, compared lexically for deterministic output
    /// ordering.
    pub key: String,
    pub files: Vec<RepoFile>,
}

/// A cross-repository file pair at or above the similarity threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMatch {
    pub repo_a: String,
    pub repo_b: String,
    pub file_a: String,
    pub file_b: String,
    pub similarity: f64,
}

/// Winnowing fingerprinter with configurable k-gram and window sizes.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    k: usize,
    window: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            window: DEFAULT_WINDOW,
        }
    }
}

impl Fingerprinter {
    pub fn new(k: usize, window: usize) -> Self {
        Self {
            k: k.max(1),
            window: window.max(1),
        }
    }

    /// Fingerprint raw source text.
    pub fn fingerprint(&self, source: &str) -> Fingerprint {
        let normalized = normalize(source);
        let digest = format!("{:x}", Sha256::digest(normalized.as_bytes()));
        let fingerprints = self.winnowed_hashes(&normalized);
        Fingerprint {
            digest,
            fingerprints,
            normalized_len: normalized.len(),
        }
    }

    fn winnowed_hashes(&self, normalized: &str) -> HashSet<u32> {
        let bytes = normalized.as_bytes();
        if bytes.is_empty() {
            return HashSet::new();
        }
        if bytes.len() < self.k {
            // Too short for a full k-gram: hash the whole text once.
            return HashSet::from([fnv1a(bytes)]);
        }

        let hashes: Vec<u32> = bytes.windows(self.k).map(fnv1a).collect();
        winnow(&hashes, self.window)
    }

    /// Jaccard similarity of two fingerprints. Matching digests short-cut
    /// to 1.0 regardless of set contents.
    pub fn similarity(&self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        if a.digest == b.digest {
            return 1.0;
        }
        jaccard(&a.fingerprints, &b.fingerprints)
    }

    /// Compare two raw texts directly.
    pub fn compare(&self, a: &str, b: &str) -> CompareOutcome {
        let fp_a = self.fingerprint(a);
        let fp_b = self.fingerprint(b);
        CompareOutcome {
            similarity: self.similarity(&fp_a, &fp_b),
            identical_content: fp_a.digest == fp_b.digest,
        }
    }

    /// Scan every repository pair for file pairs whose similarity meets the
    /// threshold. Files are fingerprinted once per repo; pairs are only
    /// compared when their extensions match. Matches come back sorted by
    /// similarity descending with a stable lexical tiebreak.
    pub fn cross_repo_matches(&self, repos: &[CandidateRepo], threshold: f64) -> Vec<CrossMatch> {
        let printed: Vec<(String, Vec<(String, String, Fingerprint)>)> = repos
            .iter()
            .map(|repo| {
                let files: Vec<(String, String, Fingerprint)> = repo
                    .files
                    .par_iter()
                    .filter(|f| eligible_file(&f.path, f.content.len()))
                    .map(|f| {
                        (
                            f.path.clone(),
                            extension(&f.path),
                            self.fingerprint(&f.content),
                        )
                    })
                    .collect();
                (repo.key.clone(), files)
            })
            .collect();

        let mut matches = Vec::new();
        for i in 0..printed.len() {
            for j in (i + 1)..printed.len() {
                let (repo_a, files_a) = &printed[i];
                let (repo_b, files_b) = &printed[j];
                for (path_a, ext_a, fp_a) in files_a {
                    for (path_b, ext_b, fp_b) in files_b {
                        if ext_a != ext_b {
                            continue;
                        }
                        let similarity = self.similarity(fp_a, fp_b);
                        if similarity >= threshold {
                            matches.push(CrossMatch {
                                repo_a: repo_a.clone(),
                                repo_b: repo_b.clone(),
                                file_a: path_a.clone(),
                                file_b: path_b.clone(),
                                similarity,
                            });
                        }
                    }
                }
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    (&a.repo_a, &a.repo_b, &a.file_a, &a.file_b).cmp(&(
                        &b.repo_a,
                        &b.repo_b,
                        &b.file_a,
                        &b.file_b,
                    ))
                })
        });
        matches
    }
}

/// Select the minimum hash of each sliding window, leftmost on ties, and
/// emit it only when it differs from the previously emitted minimum.
fn winnow(hashes: &[u32], window: usize) -> HashSet<u32> {
    if hashes.is_empty() {
        return HashSet::new();
    }
    if hashes.len() <= window {
        // Fewer hashes than one full window: the whole sequence is the
        // window.
        return HashSet::from([*hashes.iter().min().expect("non-empty")]);
    }

    let mut selected = HashSet::new();
    let mut previous: Option<u32> = None;
    for win in hashes.windows(window) {
        let mut min = win[0];
        for &h in &win[1..] {
            if h < min {
                min = h;
            }
        }
        if previous != Some(min) {
            selected.insert(min);
            previous = Some(min);
        }
    }
    selected
}

/// Jaccard index with the degenerate cases pinned: both empty is 1, exactly
/// one empty is 0.
fn jaccard(a: &HashSet<u32>, b: &HashSet<u32>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Last `.`-separated path segment, lowercased.
fn extension(path: &str) -> String {
    path.rsplit('.').next().unwrap_or(path).to_lowercase()
}

/// Whether a file participates in cross-repo scanning, by path fragment
/// and size.
pub fn eligible_file(path: &str, size: usize) -> bool {
    if size > MAX_FILE_BYTES {
        return false;
    }
    !SKIP_PATH_FRAGMENTS
        .iter()
        .any(|fragment| path.contains(fragment))
}
