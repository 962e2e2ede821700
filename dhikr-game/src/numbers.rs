//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a u32 to f32, allowing precision loss in a single location.
#[must_use]
pub fn u32_to_f32(value: u32) -> f32 {
    cast::<u32, f32>(value).unwrap_or(0.0)
}

/// Whole seconds contained in a millisecond count.
#[must_use]
pub const fn ms_to_secs(ms: u64) -> u64 {
    ms / 1_000
}
