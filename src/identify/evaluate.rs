//! Top-1 accuracy of a backend over labelled query segments.
//!
//! Segment files are named `<track>_<tag>.freq`; the part before the last
//! underscore is the database entry the segment was cut from, so track
//! names may contain underscores but tags may not.

use serde::Serialize;
use std::path::Path;

use super::Ranker;
use crate::signature::store::{self, StoreError};
use crate::signature::Signature;

#[derive(Clone, Debug)]
pub struct Segment {
    pub name: String,
    pub truth: String,
    pub signature: Signature,
}

pub fn ground_truth(stem: &str) -> &str {
    stem.rsplit_once('_').map_or(stem, |(track, _)| track)
}

pub fn load_segments(dir: &Path, num_freqs: usize) -> Result<Vec<Segment>, StoreError> {
    store::list_signatures(dir)?
        .into_iter()
        .map(|(name, path)| {
            let signature = store::read_signature(&path, num_freqs)?;
            Ok(Segment {
                truth: ground_truth(&name).to_string(),
                name,
                signature,
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Misclassification {
    pub segment: String,
    pub truth: String,
    pub predicted: String,
    pub ncd_predicted: f64,
    /// `None` when the true track is missing from the database or was omitted.
    pub ncd_truth: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackendReport {
    pub backend: String,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
    /// Segments that produced no ranking at all.
    pub failed: usize,
    pub misclassified: Vec<Misclassification>,
}

/// Rank every segment and tally how often the true track comes first.
///
/// A segment that cannot be ranked counts against accuracy; `on_segment`
/// runs once per segment so callers can drive a progress display.
pub fn evaluate(
    ranker: &Ranker,
    segments: &[Segment],
    on_segment: impl Fn(&Segment),
) -> BackendReport {
    let mut correct = 0;
    let mut failed = 0;
    let mut misclassified = Vec::new();

    for segment in segments {
        on_segment(segment);
        let scores = match ranker.score_all(&segment.signature) {
            Ok(scores) => scores,
            Err(err) => {
                log::warn!("{}: {}", segment.name, err);
                failed += 1;
                continue;
            }
        };
        let Some(best) = super::top_k(scores.scores.clone(), 1).into_iter().next() else {
            failed += 1;
            continue;
        };
        if best.name == segment.truth {
            correct += 1;
        } else {
            misclassified.push(Misclassification {
                segment: segment.name.clone(),
                truth: segment.truth.clone(),
                predicted: best.name.clone(),
                ncd_predicted: best.ncd,
                ncd_truth: scores.of(&segment.truth),
            });
        }
    }

    let total = segments.len();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    log::info!(
        "{}: {}/{} correct ({:.2}%)",
        ranker.backend(),
        correct,
        total,
        accuracy * 100.0
    );

    BackendReport {
        backend: ranker.backend().to_string(),
        correct,
        total,
        accuracy,
        failed,
        misclassified,
    }
}
