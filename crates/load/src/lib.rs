//! MuscleMap Load Prescription Calculator
//!
//! 1RM estimation (Brzybki/Epley blend), RPE↔%1RM tables (Reactive
//! Training Systems lineage), and phase/experience-aware load
//! prescription: weight, sets, rest, and tempo for a target rep/RPE.
//!
//! Compiled to WebAssembly for universal runtime support.

use musclemap_core::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// RPE↔%1RM table: `RPE_TABLE[reps - 1][rpe_index]`, `rpe_index` 0..4 maps
/// to whole RPE `6.0, 7.0, 8.0, 9.0, 10.0`. Values are `%1RM / 100`.
/// Reactive Training Systems lineage chart, reps 1..12.
const RPE_TABLE: [[f32; 5]; 12] = [
    [0.84, 0.88, 0.92, 0.96, 1.00], // 1 rep
    [0.82, 0.86, 0.89, 0.92, 0.96], // 2
    [0.81, 0.84, 0.86, 0.89, 0.92], // 3
    [0.79, 0.81, 0.84, 0.86, 0.89], // 4
    [0.76, 0.79, 0.81, 0.84, 0.86], // 5
    [0.73, 0.76, 0.79, 0.81, 0.84], // 6
    [0.71, 0.74, 0.76, 0.79, 0.81], // 7
    [0.68, 0.71, 0.74, 0.76, 0.79], // 8
    [0.65, 0.68, 0.71, 0.74, 0.76], // 9
    [0.62, 0.65, 0.68, 0.71, 0.74], // 10
    [0.59, 0.62, 0.65, 0.68, 0.71], // 11
    [0.56, 0.59, 0.62, 0.65, 0.68], // 12
];

const MIN_RPE: f32 = 6.0;
const MAX_RPE: f32 = 10.0;
const MIN_REPS: u32 = 1;
const MAX_TABLE_REPS: u32 = 12;

/// Training phase, drives tempo/rest/percentage-range/set defaults.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingPhase {
    Hypertrophy,
    Strength,
    Power,
    Peaking,
    Deload,
}

/// Lifter experience, drives rounding increment and set-count bias.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Beginner,
    Novice,
    Intermediate,
    Advanced,
    Elite,
}

impl ExperienceLevel {
    fn rounding_increment(self) -> f32 {
        match self {
            ExperienceLevel::Beginner => 2.5,
            ExperienceLevel::Novice => 2.5,
            ExperienceLevel::Intermediate => 2.5,
            ExperienceLevel::Advanced => 1.25,
            ExperienceLevel::Elite => 0.5,
        }
    }

    fn set_bias(self) -> i32 {
        match self {
            ExperienceLevel::Beginner => -1,
            ExperienceLevel::Novice => 0,
            ExperienceLevel::Intermediate => 0,
            ExperienceLevel::Advanced => 1,
            ExperienceLevel::Elite => 1,
        }
    }
}

impl TrainingPhase {
    fn percentage_range(self) -> (f32, f32) {
        match self {
            TrainingPhase::Hypertrophy => (0.65, 0.80),
            TrainingPhase::Strength => (0.80, 0.92),
            TrainingPhase::Power => (0.55, 0.75),
            TrainingPhase::Peaking => (0.85, 0.95),
            TrainingPhase::Deload => (0.40, 0.60),
        }
    }

    fn tempo_default(self) -> &'static str {
        match self {
            TrainingPhase::Hypertrophy => "3-1-2-0",
            TrainingPhase::Strength => "2-1-1-0",
            TrainingPhase::Power => "X-0-X-0",
            TrainingPhase::Peaking => "1-0-1-0",
            TrainingPhase::Deload => "3-2-3-0",
        }
    }

    fn rest_seconds_default(self) -> u16 {
        match self {
            TrainingPhase::Hypertrophy => 90,
            TrainingPhase::Strength => 180,
            TrainingPhase::Power => 240,
            TrainingPhase::Peaking => 300,
            TrainingPhase::Deload => 60,
        }
    }

    fn base_sets(self) -> i32 {
        match self {
            TrainingPhase::Hypertrophy => 4,
            TrainingPhase::Strength => 5,
            TrainingPhase::Power => 5,
            TrainingPhase::Peaking => 3,
            TrainingPhase::Deload => 3,
        }
    }

    fn rep_range(self) -> (u32, u32) {
        match self {
            TrainingPhase::Hypertrophy => (6, 12),
            TrainingPhase::Strength => (1, 6),
            TrainingPhase::Power => (1, 5),
            TrainingPhase::Peaking => (1, 3),
            TrainingPhase::Deload => (5, 10),
        }
    }

    fn rpe_range(self) -> (f32, f32) {
        match self {
            TrainingPhase::Hypertrophy => (6.0, 9.0),
            TrainingPhase::Strength => (7.0, 10.0),
            TrainingPhase::Power => (6.0, 8.0),
            TrainingPhase::Peaking => (8.0, 10.0),
            TrainingPhase::Deload => (5.0, 7.0),
        }
    }
}

/// 1RM estimate with a formula label and a `[0,100]` confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct OneRMResult {
    pub estimated_1rm: f32,
    pub confidence: f32,
    pub formula: String,
}

/// A prescribed working set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct LoadPrescription {
    pub weight_kg: f32,
    pub reps: u32,
    pub rpe: f32,
    pub percentage: f32,
    pub tempo: String,
    pub rest_seconds: u16,
    pub sets: u32,
}

fn round_to_increment(value: f32, increment: f32) -> f32 {
    (value / increment).round() * increment
}

/// Look up `%1RM` for `(reps, rpe)`, bilinearly interpolating between
/// whole reps/RPE grid points. Inputs are clamped into `[1,12]` reps and
/// `[6.0,10.0]` RPE before interpolation, per spec.
pub fn rpe_to_percentage(reps: f32, rpe: f32) -> f32 {
    let reps_clamped = reps.clamp(MIN_REPS as f32, MAX_TABLE_REPS as f32);
    let rpe_clamped = rpe.clamp(MIN_RPE, MAX_RPE);

    let reps_floor = reps_clamped.floor().max(1.0);
    let reps_ceil = reps_clamped.ceil().min(MAX_TABLE_REPS as f32);
    let reps_frac = reps_clamped - reps_floor;

    let rpe_idx_f = (rpe_clamped - MIN_RPE).max(0.0); // 0..4
    let rpe_floor_idx = rpe_idx_f.floor().min(4.0) as usize;
    let rpe_ceil_idx = rpe_idx_f.ceil().min(4.0) as usize;
    let rpe_frac = rpe_idx_f - rpe_floor_idx as f32;

    let r0 = (reps_floor as usize - 1).min(11);
    let r1 = (reps_ceil as usize - 1).min(11);

    let v00 = RPE_TABLE[r0][rpe_floor_idx];
    let v01 = RPE_TABLE[r0][rpe_ceil_idx];
    let v10 = RPE_TABLE[r1][rpe_floor_idx];
    let v11 = RPE_TABLE[r1][rpe_ceil_idx];

    let v0 = v00 + (v01 - v00) * rpe_frac;
    let v1 = v10 + (v11 - v10) * rpe_frac;

    v0 + (v1 - v0) * reps_frac
}

/// Invert the RPE table: given a target `%1RM` at a rep count, find the
/// implied RPE via binary search over the table's monotonic RPE axis.
pub fn percentage_to_rpe(reps: f32, percentage: f32) -> f32 {
    let mut lo = MIN_RPE;
    let mut hi = MAX_RPE;
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        if rpe_to_percentage(reps, mid) < percentage {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

fn validate_1rm_inputs(weight: f32, reps: u32, rpe: Option<f32>) -> KernelResult<()> {
    if weight <= 0.0 {
        return Err(KernelError::invalid_input("weight must be positive"));
    }
    if reps < MIN_REPS || reps > 20 {
        return Err(KernelError::invalid_input("reps must be in [1, 20]"));
    }
    if let Some(r) = rpe {
        if !(MIN_RPE..=MAX_RPE).contains(&r) {
            return Err(KernelError::invalid_input("rpe must be in [6.0, 10.0]"));
        }
    }
    Ok(())
}

fn estimate_1rm_inner(weight: f32, reps: u32, rpe: Option<f32>) -> KernelResult<OneRMResult> {
    validate_1rm_inputs(weight, reps, rpe)?;

    if reps == 1 && rpe.map_or(true, |r| r >= MAX_RPE) {
        return Ok(OneRMResult {
            estimated_1rm: weight,
            confidence: 100.0,
            formula: "exact".to_string(),
        });
    }

    if let Some(r) = rpe {
        let pct = rpe_to_percentage(reps as f32, r);
        let estimated = weight / pct;
        let reps_penalty = ((reps as f32 - 5.0).abs() * 5.0).min(50.0);
        let rpe_penalty = ((r - 9.0).abs() * 10.0).min(30.0);
        let confidence = (100.0 - reps_penalty - rpe_penalty).clamp(0.0, 100.0);
        return Ok(OneRMResult {
            estimated_1rm: estimated,
            confidence,
            formula: "blend".to_string(),
        });
    }

    let reps_f = reps as f32;
    let brzycki = weight * 36.0 / (37.0 - reps_f);
    let epley = weight * (1.0 + reps_f / 30.0);
    let estimated = (brzycki + epley) / 2.0;
    let confidence = 100.0 - (4.0 * (reps_f - 10.0).max(0.0)).min(50.0);

    Ok(OneRMResult {
        estimated_1rm: estimated,
        confidence,
        formula: "blend".to_string(),
    })
}

#[wasm_bindgen]
pub fn estimate_1rm(weight: f32, reps: u32, rpe: Option<f32>) -> Result<OneRMResult, JsValue> {
    estimate_1rm_inner(weight, reps, rpe).map_err(Into::into)
}

fn calculate_load_inner(
    e1rm: f32,
    target_reps: u32,
    target_rpe: f32,
    phase: TrainingPhase,
    experience: ExperienceLevel,
) -> KernelResult<LoadPrescription> {
    if e1rm <= 0.0 {
        return Err(KernelError::invalid_input("e1rm must be positive"));
    }
    if target_reps < MIN_REPS || target_reps > 20 {
        return Err(KernelError::invalid_input("target_reps must be in [1, 20]"));
    }
    if !(MIN_RPE..=MAX_RPE).contains(&target_rpe) {
        return Err(KernelError::invalid_input("target_rpe must be in [6.0, 10.0]"));
    }

    let raw_percentage = rpe_to_percentage(target_reps as f32, target_rpe);
    let (lo, hi) = phase.percentage_range();
    let percentage = raw_percentage.clamp(lo, hi);

    let increment = experience.rounding_increment();
    let weight_kg = round_to_increment(e1rm * percentage, increment);

    let sets = (phase.base_sets() + experience.set_bias()).clamp(3, 6) as u32;

    Ok(LoadPrescription {
        weight_kg,
        reps: target_reps,
        rpe: target_rpe,
        percentage,
        tempo: phase.tempo_default().to_string(),
        rest_seconds: phase.rest_seconds_default(),
        sets,
    })
}

#[wasm_bindgen]
pub fn calculate_load(
    e1rm: f32,
    target_reps: u32,
    target_rpe: f32,
    phase: TrainingPhase,
    experience: ExperienceLevel,
) -> Result<LoadPrescription, JsValue> {
    calculate_load_inner(e1rm, target_reps, target_rpe, phase, experience).map_err(Into::into)
}

/// Rep range `(min, max)` typical of a phase, for UI hints.
#[wasm_bindgen]
pub fn get_phase_rep_range(phase: TrainingPhase) -> Vec<u32> {
    let (lo, hi) = phase.rep_range();
    vec![lo, hi]
}

/// RPE range `(min, max)` typical of a phase, for UI hints.
#[wasm_bindgen]
pub fn get_phase_rpe_range(phase: TrainingPhase) -> Vec<f32> {
    let (lo, hi) = phase.rpe_range();
    vec![lo, hi]
}

/// Parse an `"E-I-C-P"` tempo string (eccentric-isometric-concentric-pause)
/// into total seconds per rep. Each field is `0..=9` or the literal `"X"`
/// (explosive, interpreted as `0`). Returns `None` on any other shape.
pub fn parse_tempo(tempo: &str) -> Option<u32> {
    let parts: Vec<&str> = tempo.split('-').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut total = 0u32;
    for part in parts {
        let value = if part.eq_ignore_ascii_case("x") {
            0
        } else {
            let digit: u32 = part.parse().ok()?;
            if digit > 9 {
                return None;
            }
            digit
        };
        total += value;
    }
    Some(total)
}

#[wasm_bindgen]
pub fn time_under_tension(tempo: &str, reps: u32) -> u32 {
    parse_tempo(tempo).unwrap_or(0) * reps
}

/// Suggest the next working weight from the last set's observed RPE.
///
/// `last_rpe < target_rpe - 0.5` (easier than planned): add `2 *
/// min_increment`. `last_rpe <= target_rpe + 0.5` (on target): add
/// `min_increment`. Otherwise (harder than planned): subtract
/// `min_increment`. The result is rounded to the nearest `min_increment`
/// and never returned at or below zero.
#[wasm_bindgen]
pub fn progressive_overload(
    current_weight: f32,
    last_rpe: f32,
    target_rpe: f32,
    min_increment: f32,
) -> f32 {
    let delta = if last_rpe < target_rpe - 0.5 {
        2.0 * min_increment
    } else if last_rpe <= target_rpe + 0.5 {
        min_increment
    } else {
        -min_increment
    };

    let suggested = round_to_increment(current_weight + delta, min_increment);
    suggested.max(min_increment)
}

#[wasm_bindgen]
pub fn calculate_loads_batch(
    e1rms: &[f32],
    target_reps: Vec<u32>,
    target_rpes: Vec<f32>,
    phase: TrainingPhase,
    experience: ExperienceLevel,
) -> Result<Vec<LoadPrescription>, JsValue> {
    if e1rms.len() != target_reps.len() || e1rms.len() != target_rpes.len() {
        return Err(KernelError::invalid_shape(
            "e1rms, target_reps and target_rpes must have the same length",
        )
        .into());
    }

    e1rms
        .iter()
        .zip(target_reps)
        .zip(target_rpes)
        .map(|((&e1rm, reps), rpe)| {
            calculate_load_inner(e1rm, reps, rpe, phase, experience).map_err(Into::into)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpe_table_exact_lookup() {
        // reps=5, rpe=8.0 -> 0.81 (spec.md §8.c worked example)
        let pct = rpe_to_percentage(5.0, 8.0);
        assert!((pct - 0.81).abs() < 1e-6);
    }

    #[test]
    fn test_calculate_load_worked_example() {
        let result =
            calculate_load_inner(200.0, 5, 8.0, TrainingPhase::Strength, ExperienceLevel::Intermediate)
                .unwrap();
        assert!((result.percentage - 0.81).abs() < 1e-4);
        assert!((result.weight_kg - 162.5).abs() < 1e-4);
        assert_eq!(result.tempo, "2-1-1-0");
        assert_eq!(result.rest_seconds, 180);
    }

    #[test]
    fn test_estimate_1rm_exact_single() {
        let result = estimate_1rm_inner(100.0, 1, None).unwrap();
        assert_eq!(result.estimated_1rm, 100.0);
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.formula, "exact");

        let result = estimate_1rm_inner(100.0, 1, Some(10.0)).unwrap();
        assert_eq!(result.estimated_1rm, 100.0);
        assert_eq!(result.formula, "exact");
    }

    #[test]
    fn test_estimate_1rm_with_rpe_blend() {
        let result = estimate_1rm_inner(100.0, 5, Some(8.0)).unwrap();
        assert!((result.estimated_1rm - 100.0 / 0.81).abs() < 1e-3);
        assert_eq!(result.formula, "blend");
    }

    #[test]
    fn test_estimate_1rm_without_rpe_uses_brzycki_epley_blend() {
        let result = estimate_1rm_inner(100.0, 5, None).unwrap();
        let brzycki = 100.0 * 36.0 / 32.0;
        let epley = 100.0 * (1.0 + 5.0 / 30.0);
        let expected = (brzycki + epley) / 2.0;
        assert!((result.estimated_1rm - expected).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_1rm_rejects_invalid_input() {
        assert!(estimate_1rm_inner(0.0, 5, None).is_err());
        assert!(estimate_1rm_inner(100.0, 0, None).is_err());
        assert!(estimate_1rm_inner(100.0, 21, None).is_err());
        assert!(estimate_1rm_inner(100.0, 5, Some(5.9)).is_err());
        assert!(estimate_1rm_inner(100.0, 5, Some(10.1)).is_err());
    }

    #[test]
    fn test_parse_tempo() {
        assert_eq!(parse_tempo("3-1-2-0"), Some(6));
        assert_eq!(parse_tempo("X-0-X-0"), Some(0));
        assert_eq!(parse_tempo("bad"), None);
        assert_eq!(parse_tempo("3-1-2"), None);
        assert_eq!(parse_tempo("3-1-2-10"), None);
    }

    #[test]
    fn test_time_under_tension() {
        assert_eq!(time_under_tension("3-1-2-0", 8), 48);
        assert_eq!(time_under_tension("garbage", 8), 0);
    }

    #[test]
    fn test_progressive_overload_branches() {
        // easier than planned
        assert!(progressive_overload(100.0, 6.0, 8.0, 2.5) > 100.0 + 2.5);
        // on target
        let on_target = progressive_overload(100.0, 8.0, 8.0, 2.5);
        assert!((on_target - 102.5).abs() < 1e-4);
        // harder than planned
        let harder = progressive_overload(100.0, 9.5, 8.0, 2.5);
        assert!(harder < 100.0);
        // never zero or negative
        assert!(progressive_overload(1.0, 9.9, 8.0, 2.5) > 0.0);
    }

    #[test]
    fn test_batch_length_mismatch_is_invalid_shape() {
        let err = calculate_loads_batch(
            &[200.0, 150.0],
            vec![5],
            vec![8.0, 8.0],
            TrainingPhase::Strength,
            ExperienceLevel::Intermediate,
        )
        .unwrap_err();
        assert!(err.as_string().unwrap().starts_with("InvalidShape"));
    }

    #[test]
    fn test_batch_matches_single_calls() {
        let results = calculate_loads_batch(
            &[200.0, 150.0],
            vec![5, 3],
            vec![8.0, 9.0],
            TrainingPhase::Strength,
            ExperienceLevel::Intermediate,
        )
        .unwrap();
        assert_eq!(results.len(), 2);
        let single =
            calculate_load_inner(200.0, 5, 8.0, TrainingPhase::Strength, ExperienceLevel::Intermediate)
                .unwrap();
        assert_eq!(results[0].weight_kg, single.weight_kg);
    }
}
