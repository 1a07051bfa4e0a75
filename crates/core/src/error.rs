//! Error taxonomy shared by every kernel crate.
//!
//! All fallible kernel functions return `Result<T, KernelError>` on the Rust
//! side; the `#[wasm_bindgen]` wrappers convert the error to a `JsValue` at
//! the ABI boundary via [`crate::to_js_error`]. Infallible functions accept
//! any input shape and produce a defined output per their own module, per
//! the ABI contract — they never reach for these variants.

use wasm_bindgen::JsValue;

/// Machine-readable error kind. Kept as a tagged enum rather than a bare
/// string so host glue can match on it instead of parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A scalar argument was outside its documented range.
    InvalidInput,
    /// Two or more array arguments had inconsistent lengths.
    InvalidShape,
    /// A `TUCalculator` lookup missed an interned exercise id.
    UnknownExercise,
    /// Base64/hex/geohash input failed to decode.
    DecodeError,
    /// Signature verification or key-material failure.
    CryptoError,
    /// Should-not-happen; indicates a kernel bug rather than bad input.
    InternalError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InvalidShape => "InvalidShape",
            ErrorKind::UnknownExercise => "UnknownExercise",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::CryptoError => "CryptoError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

/// A kernel error: a machine-readable [`ErrorKind`] plus a human-readable
/// message. Host-facing user messages are assembled by the host, not here.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct KernelError {
    pub kind: ErrorKind,
    pub message: String,
}

impl KernelError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        KernelError {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidShape, message)
    }

    pub fn unknown_exercise(id: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownExercise, format!("unknown exercise: {id}"))
    }

    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DecodeError, message)
    }

    pub fn crypto_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CryptoError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

impl From<KernelError> for JsValue {
    fn from(e: KernelError) -> Self {
        JsValue::from_str(&format!("{}: {}", e.kind.as_str(), e.message))
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
