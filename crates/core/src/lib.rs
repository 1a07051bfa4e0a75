//! MuscleMap Core Types
//!
//! Shared value types, the kernel-wide error taxonomy, and the ABI-boundary
//! helpers every other crate in the workspace builds on.

pub mod error;

pub use error::{ErrorKind, KernelError, KernelResult};

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Result type for WASM operations
pub type WasmResult<T> = Result<T, JsValue>;

/// Convert a Rust error to JsValue
pub fn to_js_error<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Compare two byte slices in time linear in `max(len(a), len(b))`.
///
/// Unlike a short-circuiting `==`, this always walks the longer slice so a
/// caller timing many comparisons can't learn a common-prefix length. A
/// length mismatch is still reported as "not equal" — only its *timing*
/// stays independent of where the mismatch lives within the common length.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff: u8 = (a.len() != b.len()) as u8;
    for i in 0..len {
        let byte_a = a.get(i).copied().unwrap_or(0);
        let byte_b = b.get(i).copied().unwrap_or(0);
        diff |= byte_a ^ byte_b;
    }
    diff == 0
}

/// Muscle activation data for a single muscle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuscleActivation {
    pub muscle_id: String,
    pub activation: f32, // 0-100
}

/// Exercise data with muscle activations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub activations: Vec<MuscleActivation>,
}

/// Coordinates for geo operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Performance timing helper, used by host-side benchmarking of batch calls.
#[wasm_bindgen]
pub struct Timer {
    start: f64,
}

#[wasm_bindgen]
impl Timer {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Timer {
        Timer {
            start: js_sys::Date::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        js_sys::Date::now() - self.start
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.start = js_sys::Date::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize panic hook for better error messages in WASM
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
