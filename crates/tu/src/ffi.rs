//! C ABI façade over [`TUCalculator`] for native hosts that can't call
//! `wasm-bindgen`-generated bindings — the long-lived `buildnet` process is
//! the main such caller. One handle table is enough here: `TUCalculator` is
//! the only type in this crate with lifetime beyond a single call.

use crate::TUCalculator;
use musclemap_dispatch::{copy_out_f32, Handle, HandleRegistry};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::slice;
use std::sync::{Mutex, OnceLock};

fn registry() -> &'static Mutex<HandleRegistry<TUCalculator>> {
    static REGISTRY: OnceLock<Mutex<HandleRegistry<TUCalculator>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HandleRegistry::new()))
}

/// Allocate a new calculator, returning its handle.
#[no_mangle]
pub extern "C" fn tu_calculator_create() -> Handle {
    registry().lock().unwrap().alloc(TUCalculator::new())
}

/// Release a calculator. Freeing an unknown or already-freed handle is a
/// no-op.
#[no_mangle]
pub extern "C" fn tu_calculator_free(handle: Handle) {
    registry().lock().unwrap().free(handle);
}

/// Intern an exercise's muscle activations.
///
/// `muscle_ids` and `activations` must have `muscle_count` entries each.
/// Returns `0` on success, `-1` if the handle is unknown, `-2` on a shape
/// or duplicate-id error.
///
/// # Safety
/// `exercise_id` must be a valid NUL-terminated C string; `muscle_ids` must
/// point to `muscle_count` valid NUL-terminated C strings; `activations`
/// must point to `muscle_count` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn tu_calculator_add_exercise(
    handle: Handle,
    exercise_id: *const c_char,
    muscle_ids: *const *const c_char,
    activations: *const f32,
    muscle_count: usize,
) -> i32 {
    let mut reg = registry().lock().unwrap();
    let Some(calc) = reg.get_mut(handle) else {
        return -1;
    };

    let exercise_id = match CStr::from_ptr(exercise_id).to_str() {
        Ok(s) => s.to_string(),
        Err(_) => return -2,
    };

    let id_ptrs = slice::from_raw_parts(muscle_ids, muscle_count);
    let mut ids = Vec::with_capacity(muscle_count);
    for &ptr in id_ptrs {
        match CStr::from_ptr(ptr).to_str() {
            Ok(s) => ids.push(s.to_string()),
            Err(_) => return -2,
        }
    }

    let activations = slice::from_raw_parts(activations, muscle_count).to_vec();

    match calc.add_exercise(exercise_id, ids, activations) {
        Ok(()) => 0,
        Err(_) => -2,
    }
}

/// Copy each interned exercise's total TU (one `sets = 1` pass) into `out`
/// in an unspecified but stable-per-call order, for host-side diagnostics.
/// Returns the number of entries written, or `0` if the handle is unknown.
///
/// # Safety
/// `out` must point to at least `out_len` valid `f32` slots.
#[no_mangle]
pub unsafe extern "C" fn tu_calculator_debug_dump(handle: Handle, out: *mut f32, out_len: usize) -> usize {
    let reg = registry().lock().unwrap();
    let Some(calc) = reg.get(handle) else {
        return 0;
    };

    let totals: Vec<f32> = calc
        .exercise_cache
        .values()
        .map(|pairs| pairs.iter().map(|(_, activation)| activation / 100.0).sum())
        .collect();

    let out_slice = slice::from_raw_parts_mut(out, out_len);
    copy_out_f32(&totals, out_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_free_roundtrip() {
        let h = tu_calculator_create();
        assert!(h > 0);
        tu_calculator_free(h);
        // second free is a no-op, not a crash
        tu_calculator_free(h);
    }

    #[test]
    fn add_exercise_via_ffi() {
        let h = tu_calculator_create();

        let exercise_id = std::ffi::CString::new("bench").unwrap();
        let muscle_a = std::ffi::CString::new("chest").unwrap();
        let muscle_b = std::ffi::CString::new("triceps").unwrap();
        let ids = [muscle_a.as_ptr(), muscle_b.as_ptr()];
        let activations = [80.0f32, 30.0];

        let rc = unsafe {
            tu_calculator_add_exercise(h, exercise_id.as_ptr(), ids.as_ptr(), activations.as_ptr(), 2)
        };
        assert_eq!(rc, 0);

        let mut out = [0.0f32; 4];
        let written = unsafe { tu_calculator_debug_dump(h, out.as_mut_ptr(), out.len()) };
        assert_eq!(written, 1);

        tu_calculator_free(h);
    }

    #[test]
    fn unknown_handle_is_safe() {
        let rc = unsafe {
            let exercise_id = std::ffi::CString::new("x").unwrap();
            tu_calculator_add_exercise(9999, exercise_id.as_ptr(), std::ptr::null(), std::ptr::null(), 0)
        };
        assert_eq!(rc, -1);
    }
}
