//! Choosing one representative spectrum per peptide ion.
use std::collections::HashMap;

use super::dot_product::compare;
use super::score_types::ScoreDirection;
use crate::models::{
    Peak,
    RefSpectrum,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Consensus {
    Selected {
        index: usize,
        /// Only set when pairwise scores were computed.
        average_score: Option<f64>,
    },
    /// The best spectrum did not agree well enough with the rest.
    Rejected { best_index: usize, average_score: f64 },
}

/// Each spectrum's summed dot product against every other spectrum.
pub fn aggregate_scores(processed: &[&[Peak]]) -> Vec<f64> {
    let mut scores = vec![0.0; processed.len()];
    for i in 0..processed.len() {
        for j in (i + 1)..processed.len() {
            let score = compare(processed[i], processed[j]).score;
            scores[i] += score;
            scores[j] += score;
        }
    }
    scores
}

/// Index of the largest value, the first one wins ties.
pub fn first_argmax<T: PartialOrd + Copy>(values: impl IntoIterator<Item = T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, value) in values.into_iter().enumerate() {
        // NaN never wins
        if value.partial_cmp(&value).is_none() {
            continue;
        }
        if best.map_or(true, |(_, best_value)| value > best_value) {
            best = Some((i, value));
        }
    }
    best.map(|(i, _)| i)
}

/// Of two spectra, the one with more peaks, the first on equal counts.
pub fn pick_by_peak_count(first: &RefSpectrum, second: &RefSpectrum) -> usize {
    if second.num_raw_peaks() > first.num_raw_peaks() {
        1
    } else {
        0
    }
}

/// Consensus by spectral similarity.
///
/// Groups of three or more need `processed_peaks` filled in; their
/// representative is the spectrum with the highest summed similarity to the
/// others, and the group is rejected when that sum divided by the group size
/// is below `min_average_score`.
pub fn select_by_dot_product(group: &[RefSpectrum], min_average_score: f64) -> Option<Consensus> {
    match group.len() {
        0 => None,
        1 => Some(Consensus::Selected {
            index: 0,
            average_score: None,
        }),
        2 => Some(Consensus::Selected {
            index: pick_by_peak_count(&group[0], &group[1]),
            average_score: None,
        }),
        n => {
            let processed: Vec<&[Peak]> =
                group.iter().map(|s| s.processed_peaks.as_slice()).collect();
            let scores = aggregate_scores(&processed);
            let best_index = first_argmax(scores.iter().copied())?;
            let average_score = scores[best_index] / n as f64;
            if average_score < min_average_score {
                Some(Consensus::Rejected {
                    best_index,
                    average_score,
                })
            } else {
                Some(Consensus::Selected {
                    index: best_index,
                    average_score: Some(average_score),
                })
            }
        }
    }
}

/// Consensus by search score.
///
/// Within every score type the spectra with the best score are candidates.
/// A single candidate wins outright, otherwise the candidate with the highest
/// total ion current does. `directions` must cover every score type in the
/// group, spectra of unlisted types are never candidates.
pub fn select_by_best_score(
    group: &[RefSpectrum],
    directions: &HashMap<i64, ScoreDirection>,
) -> Option<usize> {
    match group.len() {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }

    // Keep the partitions in first-seen order so candidates stay in group order.
    let mut partitions: Vec<(Option<i64>, Vec<usize>)> = Vec::new();
    for (i, spectrum) in group.iter().enumerate() {
        match partitions.iter_mut().find(|(t, _)| *t == spectrum.score_type) {
            Some((_, members)) => members.push(i),
            None => partitions.push((spectrum.score_type, vec![i])),
        }
    }

    let mut candidates: Vec<usize> = Vec::new();
    for (score_type, members) in &partitions {
        let Some(direction) = (*score_type).and_then(|t| directions.get(&t)) else {
            continue;
        };
        let scored = members
            .iter()
            .filter_map(|&i| group[i].score.filter(|s| !s.is_nan()).map(|s| (i, s)));
        let best = scored.clone().fold(None, |acc: Option<f64>, (_, s)| match acc {
            Some(b) if !direction.is_better(s, b) => Some(b),
            _ => Some(s),
        });
        match best {
            Some(best) => candidates.extend(scored.filter(|(_, s)| *s == best).map(|(i, _)| i)),
            None => candidates.extend(members.iter().copied()),
        }
    }
    candidates.sort_unstable();

    match candidates.len() {
        0 => first_argmax(group.iter().map(|s| s.total_ion_current.unwrap_or(0.0))),
        1 => Some(candidates[0]),
        _ => {
            let best = first_argmax(
                candidates
                    .iter()
                    .map(|&i| group[i].total_ion_current.unwrap_or(0.0)),
            )?;
            Some(candidates[best])
        }
    }
}
