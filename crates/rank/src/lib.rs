//! MuscleMap Leaderboard Ranking Module
//!
//! Competition/dense ranking with tie handling, percentile computation,
//! and summary statistics. Optimized for sorting and ranking large
//! leaderboards (10,000+ users).
//!
//! Compiled to WebAssembly for universal runtime support.

use musclemap_core::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// One entry of a full rank/percentile zip, as returned by
/// [`rank_calculate_full`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct RankEntry {
    pub id: String,
    pub score: f64,
    pub rank: u32,
    pub percentile: f64,
}

/// One entry of a [`rank_top_n`] result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct TopNEntry {
    pub index: u32,
    pub score: f64,
    pub rank: u32,
    pub percentile: f64,
}

/// Summary statistics over a score distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct SummaryStats {
    pub count: u32,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Sort indices by score descending, stable on original index for ties.
fn sorted_indices_desc(scores: &[f64]) -> Vec<usize> {
    let mut indexed: Vec<usize> = (0..scores.len()).collect();
    indexed.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    indexed
}

/// Competition ranks (1, 2, 2, 4, ...), one per input position, in input
/// order. Ties share the higher rank; the rank skips to match the count of
/// strictly-better entries.
#[wasm_bindgen]
pub fn rank_calculate(scores: &[f64]) -> Vec<u32> {
    let n = scores.len();
    if n == 0 {
        return vec![];
    }

    let order = sorted_indices_desc(scores);
    let mut ranks = vec![0u32; n];

    for (i, &idx) in order.iter().enumerate() {
        let rank = if i > 0 && scores[idx] == scores[order[i - 1]] {
            ranks[order[i - 1]]
        } else {
            (i + 1) as u32
        };
        ranks[idx] = rank;
    }

    ranks
}

/// Dense ranks (1, 2, 2, 3, ...), incrementing by exactly 1 on a strict
/// decrease.
#[wasm_bindgen]
pub fn rank_dense(scores: &[f64]) -> Vec<u32> {
    let n = scores.len();
    if n == 0 {
        return vec![];
    }

    let order = sorted_indices_desc(scores);
    let mut ranks = vec![0u32; n];
    let mut current_rank = 1u32;

    for (i, &idx) in order.iter().enumerate() {
        if i > 0 && scores[idx] == scores[order[i - 1]] {
            ranks[idx] = ranks[order[i - 1]];
        } else {
            ranks[idx] = current_rank;
            current_rank += 1;
        }
    }

    ranks
}

/// Same ranking as [`rank_calculate`], named for leaderboards that present
/// "competition rank" explicitly rather than implicitly.
#[wasm_bindgen]
pub fn rank_competition(scores: &[f64]) -> Vec<u32> {
    rank_calculate(scores)
}

/// Percentile of each score: `100 * count(x < s) / (n - 1)` for `n >= 2`,
/// rounded to 2 decimals. `n = 1` yields `100.00`; `n = 0` yields `[]`.
#[wasm_bindgen]
pub fn rank_percentiles(scores: &[f64]) -> Vec<f64> {
    let n = scores.len();
    if n == 0 {
        return vec![];
    }
    if n == 1 {
        return vec![100.0];
    }

    scores
        .iter()
        .map(|&s| {
            let below = scores.iter().filter(|&&x| x < s).count();
            round2(100.0 * below as f64 / (n as f64 - 1.0))
        })
        .collect()
}

/// Zip `ids`/`scores` with computed ranks and percentiles, in input order.
/// Fails with `InvalidInput` if `ids` and `scores` differ in length.
#[wasm_bindgen]
pub fn rank_calculate_full(ids: Vec<String>, scores: &[f64]) -> Result<Vec<RankEntry>, JsValue> {
    if ids.len() != scores.len() {
        return Err(KernelError::invalid_input("ids and scores must have the same length").into());
    }

    let ranks = rank_calculate(scores);
    let percentiles = rank_percentiles(scores);

    Ok(ids
        .into_iter()
        .zip(scores)
        .zip(ranks)
        .zip(percentiles)
        .map(|(((id, &score), rank), percentile)| RankEntry {
            id,
            score,
            rank,
            percentile,
        })
        .collect())
}

/// Rank of `target` within a descending-sorted array: `1 + count(x >
/// target)`, found in `O(log n)`.
#[wasm_bindgen]
pub fn rank_find(sorted_scores: &[f64], target_score: f64) -> u32 {
    if sorted_scores.is_empty() {
        return 0;
    }

    let mut lo = 0usize;
    let mut hi = sorted_scores.len();

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if sorted_scores[mid] > target_score {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    (lo + 1) as u32
}

/// Indices in descending-score order (ties broken by input order).
#[wasm_bindgen]
pub fn rank_sort_indices(scores: &[f64]) -> Vec<u32> {
    sorted_indices_desc(scores).into_iter().map(|i| i as u32).collect()
}

/// The `n` lowest (best) ranks. Implemented by filtering on
/// `rank <= nth smallest rank` rather than truncating the sorted order, so
/// every entry tied at the `n`-th boundary is included — the result can
/// have more than `n` entries when a tie straddles the cutoff. Returns
/// `(original_index, score, rank, percentile)` entries sorted by rank
/// ascending, ties broken by input order.
#[wasm_bindgen]
pub fn rank_top_n(scores: &[f64], n: u32) -> Vec<TopNEntry> {
    if scores.is_empty() || n == 0 {
        return vec![];
    }

    let ranks = rank_calculate(scores);
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| (ranks[i], i));

    let cutoff_pos = (n as usize).min(order.len()) - 1;
    let nth_smallest_rank = ranks[order[cutoff_pos]];
    let percentiles = rank_percentiles(scores);

    order
        .into_iter()
        .filter(|&i| ranks[i] <= nth_smallest_rank)
        .map(|i| TopNEntry {
            index: i as u32,
            score: scores[i],
            rank: ranks[i],
            percentile: percentiles[i],
        })
        .collect()
}

fn summary_stats_inner(scores: &[f64]) -> KernelResult<SummaryStats> {
    if scores.is_empty() {
        return Err(KernelError::invalid_input("scores must not be empty"));
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    let sum: f64 = sorted.iter().sum();
    let mean = sum / n as f64;

    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let variance: f64 = sorted.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    Ok(SummaryStats {
        count: n as u32,
        min,
        max,
        mean: round2(mean),
        median: round2(median),
        std_dev: round2(std_dev),
    })
}

/// Summary statistics over `scores`: count, min, max, mean, median
/// (average of two middles on even `n`), population standard deviation
/// (divisor `n`). Fails with `InvalidInput` on an empty array.
#[wasm_bindgen]
pub fn summary_stats(scores: &[f64]) -> Result<SummaryStats, JsValue> {
    summary_stats_inner(scores).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_calculate_competition() {
        let scores = [100.0, 80.0, 90.0, 80.0, 70.0];
        let ranks = rank_calculate(&scores);
        assert_eq!(ranks, vec![1, 3, 2, 3, 5]);
    }

    #[test]
    fn test_rank_dense_no_gaps() {
        let scores = [100.0, 80.0, 90.0, 80.0, 70.0];
        let ranks = rank_dense(&scores);
        assert_eq!(ranks, vec![1, 3, 2, 3, 4]);
    }

    #[test]
    fn test_rank_percentiles_worked_example() {
        // spec.md §8: [100, 90, 90, 80] -> [100.00, 33.33, 33.33, 0.00]
        let scores = [100.0, 90.0, 90.0, 80.0];
        let percentiles = rank_percentiles(&scores);
        assert!((percentiles[0] - 100.0).abs() < 0.01);
        assert!((percentiles[1] - 33.33).abs() < 0.01);
        assert!((percentiles[2] - 33.33).abs() < 0.01);
        assert!((percentiles[3] - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_rank_percentiles_single_element() {
        assert_eq!(rank_percentiles(&[42.0]), vec![100.0]);
    }

    #[test]
    fn test_rank_percentiles_empty() {
        let scores: [f64; 0] = [];
        assert!(rank_percentiles(&scores).is_empty());
    }

    #[test]
    fn test_rank_find() {
        let sorted = [100.0, 90.0, 80.0, 70.0, 60.0];
        assert_eq!(rank_find(&sorted, 100.0), 1);
        assert_eq!(rank_find(&sorted, 85.0), 3);
        assert_eq!(rank_find(&sorted, 60.0), 5);
    }

    #[test]
    fn test_rank_calculate_full_zips_in_order() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scores = [100.0, 80.0, 90.0];
        let entries = rank_calculate_full(ids, &scores).unwrap();
        assert_eq!(entries[0].id, "a");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[2].rank, 2);
    }

    #[test]
    fn test_rank_calculate_full_rejects_mismatched_lengths() {
        let ids = vec!["a".to_string()];
        let scores = [100.0, 80.0];
        let err = rank_calculate_full(ids, &scores).unwrap_err();
        assert!(err.as_string().unwrap().starts_with("InvalidInput"));
    }

    #[test]
    fn test_rank_top_n_ties_broken_by_input_order() {
        let scores = [80.0, 100.0, 80.0, 90.0];
        let top = rank_top_n(&scores, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[1].rank, 2);
        assert_eq!(top[0].index, 1);
    }

    #[test]
    fn test_rank_top_n_includes_boundary_ties() {
        // ranks are [1, 2, 2, 4]; asking for n=2 must include both rank-2
        // entries instead of truncating to the first two by sort order.
        let scores = [100.0, 80.0, 80.0, 70.0];
        let top = rank_top_n(&scores, 2);
        let indices: Vec<u32> = top.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(top.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 2]);
    }

    #[test]
    fn test_summary_stats() {
        let scores = [10.0, 20.0, 30.0, 40.0];
        let stats = summary_stats_inner(&scores).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.median, 25.0);
    }

    #[test]
    fn test_summary_stats_rejects_empty() {
        let scores: [f64; 0] = [];
        assert!(summary_stats_inner(&scores).is_err());
    }

    #[test]
    fn test_empty_scores() {
        let scores: [f64; 0] = [];
        assert!(rank_calculate(&scores).is_empty());
        assert!(rank_percentiles(&scores).is_empty());
        assert_eq!(rank_find(&scores, 50.0), 0);
    }
}
