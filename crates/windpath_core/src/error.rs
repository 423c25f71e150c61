//! Error kinds surfaced across component boundaries.
//!
//! Only conditions the caller must act on become errors; everything else is
//! recovered locally (simulator fallbacks) or reported in-band
//! (`PathResult { success: false }` for unreachable goals).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
  /// Start/end position out of bounds or inside geometry. The session
  /// reports it and keeps serving.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// A wind field cannot be built from zero samples; nearest-neighbor
  /// lookups would be undefined everywhere.
  #[error("wind field has no samples")]
  WindFieldEmpty,

  /// Mismatched parallel arrays handed to a constructor.
  #[error("mismatched input arrays: {0}")]
  MismatchedInput(String),
}
