//! 26.6 fixed point: 26 integer bits, 6 fractional bits, as produced by
//! freetype and harfbuzz for subpixel positions and advances.

/// `I26F6` is exactly the layout freetype/harfbuzz call "26.6": a 32-bit
/// signed integer with 6 fractional bits.
pub type Fixed26_6 = fixed::types::I26F6;

/// `(VALUE) * 64` from the original `TO_26_6` macro.
pub fn to_26_6(pixels: f32) -> Fixed26_6 {
    Fixed26_6::from_num(pixels)
}

/// `(float)(VALUE) / 64.0f` from the original `FROM_26_6` macro.
pub fn from_26_6(value: Fixed26_6) -> f32 {
    value.to_num()
}

/// Harfbuzz reports advances/offsets as plain `i32` already scaled by
/// 64 (its own 26.6 convention); wrap that raw integer directly instead
/// of going through a float round-trip.
pub fn from_raw_26_6(value: i32) -> Fixed26_6 {
    Fixed26_6::from_bits(value)
}

pub fn to_raw_26_6(value: Fixed26_6) -> i32 {
    value.to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_round_trip() {
        let v = to_26_6(12.5);
        assert_eq!(from_26_6(v), 12.5);
    }

    #[test]
    fn raw_round_trip_matches_macro_semantics() {
        // TO_26_6(2) == 128 in the original macro.
        let raw = 2 * 64;
        let v = from_raw_26_6(raw);
        assert_eq!(to_raw_26_6(v), raw);
        assert_eq!(from_26_6(v), 2.0);
    }
}
