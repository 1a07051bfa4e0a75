//! MuscleMap Training Unit (TU) Calculator
//!
//! TU (Training Unit) is a normalized, dimensionless measure of per-muscle
//! workout dosage.
//!
//! Formula: `TU = Σ_e sets[e] · Σ_m (activation[e,m] / 100) · bias[m]`
//!
//! Compiled to WebAssembly for universal runtime support.

mod ffi;

use musclemap_core::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

/// Muscle activation data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct MuscleActivation {
    pub muscle_id: String,
    /// Activation percentage (0-100)
    pub activation: f32,
}

#[wasm_bindgen]
impl MuscleActivation {
    #[wasm_bindgen(constructor)]
    pub fn new(muscle_id: String, activation: f32) -> MuscleActivation {
        MuscleActivation {
            muscle_id,
            activation: activation.clamp(0.0, 100.0),
        }
    }
}

/// Exercise input for TU calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct ExerciseInput {
    pub exercise_id: String,
    pub sets: u32,
}

#[wasm_bindgen]
impl ExerciseInput {
    #[wasm_bindgen(constructor)]
    pub fn new(exercise_id: String, sets: u32) -> ExerciseInput {
        ExerciseInput {
            exercise_id,
            sets,
        }
    }
}

/// Result of TU calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct TUResult {
    /// Total Training Units
    pub total_tu: f32,
}

#[wasm_bindgen]
impl TUResult {
    #[wasm_bindgen(constructor)]
    pub fn new(total_tu: f32) -> TUResult {
        TUResult { total_tu }
    }
}

/// Per-muscle breakdown entry in a detailed TU result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct MuscleTU {
    pub muscle_id: String,
    /// Unweighted accumulated TU for this muscle, rounded to 2 decimals.
    pub tu: f32,
    /// `tu * bias_weight`, rounded to 2 decimals.
    pub weighted_tu: f32,
}

/// Detailed TU calculation result with per-muscle breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct DetailedTUResult {
    pub total_tu: f32,
    #[wasm_bindgen(skip)]
    pub muscles: Vec<MuscleTU>,
}

#[wasm_bindgen]
impl DetailedTUResult {
    #[wasm_bindgen(getter)]
    pub fn muscles(&self) -> Vec<MuscleTU> {
        self.muscles.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn muscle_count(&self) -> u32 {
        self.muscles.len() as u32
    }
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}

/// Validate the flat-buffer shape shared by `simple`/`detailed`: the
/// activation matrix must be exactly `exercise_count * muscle_count`
/// entries, sets one per exercise, bias one per muscle, and no negative
/// set count (per spec.md §4.1's `InvalidShape` contract).
fn validate_shape(
    activations_len: usize,
    sets: &[i32],
    bias_len: usize,
    exercise_count: usize,
    muscle_count: usize,
) -> KernelResult<()> {
    if activations_len != exercise_count * muscle_count {
        return Err(KernelError::invalid_shape(format!(
            "activations length {activations_len} != exercise_count({exercise_count}) * muscle_count({muscle_count})"
        )));
    }
    if sets.len() != exercise_count {
        return Err(KernelError::invalid_shape(format!(
            "sets length {} != exercise_count({exercise_count})",
            sets.len()
        )));
    }
    if bias_len != muscle_count {
        return Err(KernelError::invalid_shape(format!(
            "bias_weights length {bias_len} != muscle_count({muscle_count})"
        )));
    }
    if let Some(&negative) = sets.iter().find(|&&s| s < 0) {
        return Err(KernelError::invalid_shape(format!(
            "sets must be non-negative, found {negative}"
        )));
    }
    Ok(())
}

fn tu_simple_inner(
    activations: &[f32],
    sets: &[i32],
    bias_weights: &[f32],
    exercise_count: usize,
    muscle_count: usize,
) -> KernelResult<f32> {
    if exercise_count == 0 || muscle_count == 0 {
        return Ok(0.0);
    }
    validate_shape(
        activations.len(),
        sets,
        bias_weights.len(),
        exercise_count,
        muscle_count,
    )?;

    let mut total = 0.0f32;
    for e in 0..exercise_count {
        let s = sets[e] as f32;
        if s == 0.0 {
            continue;
        }
        let mut exercise_tu = 0.0f32;
        for m in 0..muscle_count {
            let activation = activations[e * muscle_count + m];
            exercise_tu += (activation / 100.0) * bias_weights[m];
        }
        total += s * exercise_tu;
    }

    Ok(total)
}

/// Calculate TU directly without caching (simple interface)
///
/// `activations` is the flat row-major matrix `[ex0_m0, ex0_m1, ...,
/// ex1_m0, ...]` of `[0,100]` values. Returns `0.0` for `exercise_count ==
/// 0` or `muscle_count == 0`; fails with `InvalidShape` on any array-length
/// mismatch and `InvalidInput` on a negative set count.
#[wasm_bindgen]
pub fn tu_calculate_simple(
    activations: &[f32],
    sets: &[i32],
    bias_weights: &[f32],
    exercise_count: i32,
    muscle_count: i32,
) -> Result<f32, JsValue> {
    let tu = tu_simple_inner(
        activations,
        sets,
        bias_weights,
        exercise_count.max(0) as usize,
        muscle_count.max(0) as usize,
    )?;
    Ok(tu)
}

/// Batch calculate TU for multiple workouts.
///
/// `all_activations`/`all_sets` are the concatenation of each workout's
/// flat activations/sets in order; `workout_sizes` holds the exercise count
/// per workout and its entries must sum to the total exercise count implied
/// by `all_activations`/`muscle_count`.
#[wasm_bindgen]
pub fn tu_calculate_batch(
    all_activations: &[f32],
    all_sets: &[i32],
    bias_weights: &[f32],
    workout_sizes: &[i32],
    muscle_count: i32,
) -> Result<Vec<f32>, JsValue> {
    let m_count = muscle_count.max(0) as usize;
    let mut results = Vec::with_capacity(workout_sizes.len());

    let mut act_offset = 0usize;
    let mut set_offset = 0usize;

    for &size in workout_sizes {
        let ex_count = size.max(0) as usize;
        let act_len = ex_count * m_count;

        if act_offset + act_len > all_activations.len() || set_offset + ex_count > all_sets.len() {
            return Err(KernelError::invalid_shape(
                "workout_sizes imply more exercises than all_activations/all_sets contain",
            )
            .into());
        }

        let activations = &all_activations[act_offset..act_offset + act_len];
        let sets = &all_sets[set_offset..set_offset + ex_count];

        let tu = tu_simple_inner(activations, sets, bias_weights, ex_count, m_count)?;
        results.push(tu);

        act_offset += act_len;
        set_offset += ex_count;
    }

    Ok(results)
}

/// Calculate TU with a full per-muscle breakdown.
#[wasm_bindgen]
pub fn tu_calculate_detailed(
    activations: &[f32],
    sets: &[i32],
    bias_weights: &[f32],
    muscle_ids: Vec<String>,
    exercise_count: i32,
) -> Result<DetailedTUResult, JsValue> {
    let ex_count = exercise_count.max(0) as usize;
    let m_count = muscle_ids.len();

    validate_shape(activations.len(), sets, bias_weights.len(), ex_count, m_count)?;

    let mut muscle_totals = vec![0.0f32; m_count];
    for e in 0..ex_count {
        let s = sets[e] as f32;
        if s == 0.0 {
            continue;
        }
        for m in 0..m_count {
            let activation = activations[e * m_count + m];
            muscle_totals[m] += (activation / 100.0) * s;
        }
    }

    let mut total = 0.0f32;
    let mut muscles: Vec<MuscleTU> = Vec::with_capacity(m_count);

    for (m, muscle_id) in muscle_ids.iter().enumerate() {
        let tu = muscle_totals[m];
        let weighted = tu * bias_weights[m];
        total += weighted;

        if tu > 0.0 {
            muscles.push(MuscleTU {
                muscle_id: muscle_id.clone(),
                tu: round2(tu),
                weighted_tu: round2(weighted),
            });
        }
    }

    Ok(DetailedTUResult {
        total_tu: round2(total),
        muscles,
    })
}

/// TU Calculator with exercise/muscle caching.
///
/// Owns its interned exercise and muscle-bias tables exclusively; mutated
/// only by [`TUCalculator::add_exercise`], [`TUCalculator::set_muscle_bias`]
/// and [`TUCalculator::clear`]. A failed `add_exercise` call leaves the
/// calculator unchanged (no partial mutation on error, per spec.md §7).
#[wasm_bindgen]
pub struct TUCalculator {
    exercise_cache: HashMap<String, Vec<(String, f32)>>,
    muscle_bias: HashMap<String, f32>,
}

#[wasm_bindgen]
impl TUCalculator {
    #[wasm_bindgen(constructor)]
    pub fn new() -> TUCalculator {
        TUCalculator {
            exercise_cache: HashMap::new(),
            muscle_bias: HashMap::new(),
        }
    }

    /// Clear all cached data. The emptied calculator remains usable.
    pub fn clear(&mut self) {
        self.exercise_cache.clear();
        self.muscle_bias.clear();
    }

    /// Intern an exercise's muscle activations.
    ///
    /// Fails with `InvalidShape` if `muscle_ids` and `activations` differ
    /// in length, or `InvalidInput` if `muscle_ids` contains a duplicate —
    /// in either case the calculator is left unchanged.
    pub fn add_exercise(
        &mut self,
        exercise_id: String,
        muscle_ids: Vec<String>,
        activations: Vec<f32>,
    ) -> Result<(), JsValue> {
        if muscle_ids.len() != activations.len() {
            return Err(KernelError::invalid_shape(
                "muscle_ids and activations must have the same length",
            )
            .into());
        }

        let mut seen = std::collections::HashSet::with_capacity(muscle_ids.len());
        for id in &muscle_ids {
            if !seen.insert(id.as_str()) {
                return Err(KernelError::invalid_input(format!(
                    "duplicate muscle id within exercise: {id}"
                ))
                .into());
            }
        }

        let pairs: Vec<(String, f32)> = muscle_ids
            .into_iter()
            .zip(activations)
            .map(|(id, act)| (id, act.clamp(0.0, 100.0)))
            .collect();

        self.exercise_cache.insert(exercise_id, pairs);
        Ok(())
    }

    /// Set the bias weight for a muscle. Muscles with no explicit bias
    /// default to `1.0` in [`TUCalculator::calculate_cached`].
    pub fn set_muscle_bias(&mut self, muscle_id: String, bias_weight: f32) {
        self.muscle_bias.insert(muscle_id, bias_weight);
    }

    pub fn exercise_count(&self) -> usize {
        self.exercise_cache.len()
    }

    pub fn muscle_count(&self) -> usize {
        self.muscle_bias.len()
    }

    /// Calculate TU for a workout using previously interned exercise data.
    ///
    /// Fails with `UnknownExercise` if any `exercise_ids` entry was never
    /// registered via `add_exercise` — the lookup does not mutate state.
    pub fn calculate_cached(
        &self,
        exercise_ids: Vec<String>,
        sets: Vec<u32>,
    ) -> Result<TUResult, JsValue> {
        if exercise_ids.len() != sets.len() {
            return Err(KernelError::invalid_shape(
                "exercise_ids and sets must have the same length",
            )
            .into());
        }

        let mut muscle_totals: HashMap<&str, f32> = HashMap::new();

        for (exercise_id, &set_count) in exercise_ids.iter().zip(sets.iter()) {
            let activations = self
                .exercise_cache
                .get(exercise_id)
                .ok_or_else(|| KernelError::unknown_exercise(exercise_id))?;

            let s = set_count as f32;
            for (muscle_id, activation) in activations {
                if *activation > 0.0 {
                    *muscle_totals.entry(muscle_id.as_str()).or_insert(0.0) +=
                        (*activation / 100.0) * s;
                }
            }
        }

        let mut total = 0.0f32;
        for (muscle_id, tu) in muscle_totals.iter() {
            let bias = self.muscle_bias.get(*muscle_id).copied().unwrap_or(1.0);
            total += tu * bias;
        }

        Ok(TUResult {
            total_tu: round2(total),
        })
    }
}

impl Default for TUCalculator {
    fn default() -> Self {
        Self::new()
    }
}
