//! Status Types - Level 1 Foundation Types
//!
//! Pure data structures describing "status errors": uniquely keyed,
//! numerically coded error values declared as constants of a designated
//! integer type. The catalog scanner produces [`ErrorDescriptor`] values and
//! code/documentation generators consume them.
//!
//! ## Contents
//!
//! - [`ErrorDescriptor`] - one catalog entry (key, code, message, talkable)
//! - [`StatusError`] - accessor interface implemented by status error values
//! - [`ServiceCode`] - per-type namespace offset for error codes
//!
//! ## Rules
//!
//! 1. **NO SCANNING LOGIC** - only data structures and accessors
//! 2. **NO WORKSPACE DEPENDENCIES**
//! 3. **SERIALIZABLE** - descriptors cross the generator boundary via serde

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR DESCRIPTOR
// ============================================================================

/// A single status error extracted from source.
///
/// `key` is the declared constant name, `code` the final numeric code
/// (raw value plus the type's service code), `message` the first doc line
/// and `talkable` whether the message may be shown to external callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[error("[{key}][{code}] {message}")]
pub struct ErrorDescriptor {
    pub key: String,
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub talkable: bool,
}

impl ErrorDescriptor {
    /// Create a non-talkable descriptor
    pub fn new(key: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code,
            message: message.into(),
            talkable: false,
        }
    }

    /// Mark the descriptor as safe to surface to external callers
    pub fn enable_talk(mut self) -> Self {
        self.talkable = true;
        self
    }

    /// Transport-level status derived from the code, see [`status_code_from_code`]
    pub fn status_code(&self) -> u16 {
        status_code_from_code(self.code)
    }
}

/// Derive a transport status (e.g. HTTP) from an error code.
///
/// Codes are laid out as `<status><detail>`, so the status is the leading
/// three decimal digits: `404001 -> 404`, `5000 -> 500`. Codes with fewer
/// than three digits, and negative codes, carry no status and yield `0`.
pub fn status_code_from_code(code: i64) -> u16 {
    if code < 100 {
        return 0;
    }
    let digits = code.to_string();
    digits[..3].parse().unwrap_or(0)
}

// ============================================================================
// INTERFACES
// ============================================================================

/// Accessors shared by every status error value.
pub trait StatusError {
    fn key(&self) -> &str;
    fn code(&self) -> i64;
    fn message(&self) -> &str;
    fn can_be_talk_error(&self) -> bool;

    fn status_code(&self) -> u16 {
        status_code_from_code(self.code())
    }

    fn to_descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            key: self.key().to_string(),
            code: self.code(),
            message: self.message().to_string(),
            talkable: self.can_be_talk_error(),
        }
    }
}

/// Trait name the scanner recognises on `impl ... for T` blocks.
pub const SERVICE_CODE_TRAIT: &str = "ServiceCode";

/// Method name of [`ServiceCode`], also the default configured method name.
pub const SERVICE_CODE_METHOD: &str = "service_code";

/// Namespace offset added to every code of one error type.
///
/// The scanner reads a zero-argument method returning one integer constant.
/// The method name is configurable; an `impl ServiceCode for T` is
/// recognised whatever name is configured.
pub trait ServiceCode {
    fn service_code(&self) -> i64;
}

impl StatusError for ErrorDescriptor {
    fn key(&self) -> &str {
        &self.key
    }

    fn code(&self) -> i64 {
        self.code
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn can_be_talk_error(&self) -> bool {
        self.talkable
    }
}
