//! Parse configuration
//!
//! The decoder itself only rejects input it cannot read: truncated buffers and unknown optional
//! header formats. Everything else a loader would refuse is opt-in or opt-out through
//! [`ValidationConfig`], handed to [`crate::Image::parse_with`] as part of [`ParseOptions`].

use std::{fmt, sync::Arc};

use crate::pe::DecodeObserver;

/// Configuration for the checks applied after the headers have been decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationConfig {
    /// Require `MZ` in the DOS header and `PE\0\0` in the NT headers
    pub enable_signature_validation: bool,

    /// Require the raw data of every section to lie inside the input buffer
    pub enable_section_bounds_validation: bool,

    /// Reject sections whose aligned virtual ranges overlap
    /// Address resolution picks the first matching section either way
    pub enable_section_overlap_validation: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable_signature_validation: true,
            enable_section_bounds_validation: false,
            enable_section_overlap_validation: false,
        }
    }
}

impl ValidationConfig {
    /// Creates a disabled validation configuration
    ///
    /// Decodes anything that is structurally readable, including images with broken
    /// signatures. Mismatches are still reported through `log::warn!`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enable_signature_validation: false,
            enable_section_bounds_validation: false,
            enable_section_overlap_validation: false,
        }
    }

    /// Creates a validation configuration with all checks enabled
    ///
    /// **Warning**: Packed and hand crafted images frequently carry overlapping or truncated
    /// sections that the Windows loader accepts.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            enable_signature_validation: true,
            enable_section_bounds_validation: true,
            enable_section_overlap_validation: true,
        }
    }
}

/// Everything [`crate::Image::parse_with`] can be configured with
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Checks to run on the decoded headers
    pub validation: ValidationConfig,
    /// Receives a callback at each decoding milestone
    pub observer: Option<Arc<dyn DecodeObserver>>,
}

impl ParseOptions {
    /// Options with the given validation and no observer
    #[must_use]
    pub fn new(validation: ValidationConfig) -> Self {
        Self {
            validation,
            observer: None,
        }
    }

    /// Attaches an observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DecodeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("validation", &self.validation)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
