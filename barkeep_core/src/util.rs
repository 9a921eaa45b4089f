//! Small numeric helpers for raw-count averaging.

/// Integer division rounding to nearest, ties away from zero.
/// `den` must be positive.
#[inline]
pub fn div_round_nearest_i64(num: i64, den: i64) -> i64 {
    debug_assert!(den > 0);
    if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}
