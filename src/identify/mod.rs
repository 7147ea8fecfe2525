//! Ranking a query signature against a database snapshot by NCD.

pub mod evaluate;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::oracle::{CompressedSizes, Oracle, OracleError};
use crate::signature::store::{self, StoreError};
use crate::signature::Signature;

#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("query signature is empty (audio shorter than one analysis window)")]
    EmptyQuery,

    #[error("failed to measure the query: {0}")]
    Query(#[source] OracleError),

    #[error("comparison against '{name}' failed: {source}")]
    Comparison {
        name: String,
        #[source]
        source: OracleError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What to do when one database comparison fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave the entry out and report it with the result.
    #[default]
    Skip,
    /// Fail the whole ranking.
    Abort,
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub name: String,
    pub signature: Signature,
}

/// Immutable set of named signatures, shared read-only between rankings.
#[derive(Clone, Debug, Default)]
pub struct Database {
    entries: Vec<Entry>,
}

impl Database {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Load every `.freq` file in `dir`. Empty signatures cannot be compared
    /// and are left out.
    pub fn load_dir(dir: &Path, num_freqs: usize) -> Result<Self, StoreError> {
        let mut entries = Vec::new();
        for (name, path) in store::list_signatures(dir)? {
            let signature = store::read_signature(&path, num_freqs)?;
            if signature.is_empty() {
                log::warn!("Skipping empty signature {}", path.display());
                continue;
            }
            entries.push(Entry { name, signature });
        }
        log::info!("Loaded {} signatures from {}", entries.len(), dir.display());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateScore {
    pub name: String,
    pub ncd: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Omission {
    pub name: String,
    pub reason: String,
}

/// Best candidates, ascending by NCD, plus the entries that could not be scored.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RankedResult {
    pub backend: String,
    pub candidates: Vec<CandidateScore>,
    pub omitted: Vec<Omission>,
}

impl RankedResult {
    pub fn best(&self) -> Option<&CandidateScore> {
        self.candidates.first()
    }
}

/// Scores of every database entry for one query.
#[derive(Clone, Debug, Default)]
pub struct Scores {
    pub scores: Vec<CandidateScore>,
    pub omitted: Vec<Omission>,
}

impl Scores {
    pub fn of(&self, name: &str) -> Option<f64> {
        self.scores.iter().find(|s| s.name == name).map(|s| s.ncd)
    }
}

/// Scores queries against a database with one compressor backend.
///
/// The compressed size of every database entry is measured once when the
/// ranker is built; only the query and the concatenations are compressed
/// per query.
pub struct Ranker {
    database: Arc<Database>,
    oracle: Oracle,
    entry_sizes: Vec<Option<usize>>,
    policy: FailurePolicy,
}

impl Ranker {
    pub fn new(database: Arc<Database>, oracle: Oracle) -> Self {
        let entry_sizes: Vec<Option<usize>> = database
            .entries()
            .par_iter()
            .map(|entry| match oracle.size(entry.signature.as_bytes()) {
                Ok(size) => Some(size),
                Err(err) => {
                    log::warn!("Could not pre-measure '{}': {}", entry.name, err);
                    None
                }
            })
            .collect();

        log::debug!(
            "Pre-measured {}/{} database entries with {}",
            entry_sizes.iter().filter(|s| s.is_some()).count(),
            database.len(),
            oracle.name()
        );

        Self {
            database,
            oracle,
            entry_sizes,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backend(&self) -> &str {
        self.oracle.name()
    }

    /// Score the query against every entry, in database order.
    pub fn score_all(&self, query: &Signature) -> Result<Scores, IdentifyError> {
        if query.is_empty() {
            return Err(IdentifyError::EmptyQuery);
        }
        let x = query.as_bytes();
        let cx = self.oracle.size(x).map_err(IdentifyError::Query)?;

        let measured: Vec<Result<f64, OracleError>> = self
            .database
            .entries()
            .par_iter()
            .zip(self.entry_sizes.par_iter())
            .map(|(entry, cached)| {
                let y = entry.signature.as_bytes();
                let cy = match cached {
                    Some(size) => *size,
                    None => self.oracle.size(y)?,
                };
                let sizes = CompressedSizes {
                    cx,
                    cy,
                    cxy: self.oracle.concat_size(x, y)?,
                };
                log::debug!(
                    "{}: C(x)={} C(y)={} C(xy)={}",
                    entry.name,
                    sizes.cx,
                    sizes.cy,
                    sizes.cxy
                );
                sizes.ncd().ok_or_else(|| OracleError::EmptyOutput {
                    backend: self.oracle.name().to_string(),
                })
            })
            .collect();

        let mut out = Scores::default();
        for (entry, result) in self.database.entries().iter().zip(measured) {
            match result {
                Ok(ncd) => out.scores.push(CandidateScore {
                    name: entry.name.clone(),
                    ncd,
                }),
                Err(source) => match self.policy {
                    FailurePolicy::Abort => {
                        return Err(IdentifyError::Comparison {
                            name: entry.name.clone(),
                            source,
                        })
                    }
                    FailurePolicy::Skip => {
                        log::warn!("Omitting '{}': {}", entry.name, source);
                        out.omitted.push(Omission {
                            name: entry.name.clone(),
                            reason: source.to_string(),
                        });
                    }
                },
            }
        }
        Ok(out)
    }

    /// The `k` closest entries, ascending by NCD.
    pub fn rank(&self, query: &Signature, k: usize) -> Result<RankedResult, IdentifyError> {
        let Scores { scores, omitted } = self.score_all(query)?;
        Ok(RankedResult {
            backend: self.backend().to_string(),
            candidates: top_k(scores, k),
            omitted,
        })
    }
}

fn by_score(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    a.ncd.total_cmp(&b.ncd).then_with(|| a.name.cmp(&b.name))
}

/// Partial selection of the `k` lowest scores, returned sorted.
pub fn top_k(mut scores: Vec<CandidateScore>, k: usize) -> Vec<CandidateScore> {
    if k == 0 {
        return Vec::new();
    }
    if scores.len() > k {
        scores.select_nth_unstable_by(k - 1, by_score);
        scores.truncate(k);
    }
    scores.sort_unstable_by(by_score);
    scores
}
