//! Commutation table.
//!
//! One electrical cycle is [`SINE_VAL_COUNT`] indices long and is served from a quarter-wave
//! table, so any index can be masked with `SINE_VAL_COUNT - 1` instead of reduced with a modulo.

use crate::MAX_MICROSTEP_DIVISOR;

/// Amplitude of the table; phase currents are scaled by `value / SINE_MAX`.
pub const SINE_MAX: i32 = 16384;

/// Indices per quarter of an electrical cycle.
pub const QUARTER: usize = MAX_MICROSTEP_DIVISOR as usize;

/// Indices per electrical cycle. Always a power of two.
pub const SINE_VAL_COUNT: usize = 4 * QUARTER;

/// `sin(i * 90° / QUARTER) * SINE_MAX` for `i` in `0..=QUARTER`.
const QUARTER_WAVE: [i16; QUARTER + 1] = [
    0, 804, 1606, 2404, 3196, 3981, 4756, 5520, 6270, 7005, 7723, 8423, 9102, 9760, 10394, 11003,
    11585, 12140, 12665, 13160, 13623, 14053, 14449, 14811, 15137, 15426, 15679, 15893, 16069,
    16207, 16305, 16364, 16384,
];

const _: () = assert!(SINE_VAL_COUNT.is_power_of_two());

/// Sine of `index`, wrapping every [`SINE_VAL_COUNT`] indices.
#[must_use]
pub const fn fast_sin(index: usize) -> i32 {
    let index = index & (SINE_VAL_COUNT - 1);
    let offset = index % QUARTER;
    let value = match index / QUARTER {
        0 => QUARTER_WAVE[offset],
        1 => QUARTER_WAVE[QUARTER - offset],
        2 => -QUARTER_WAVE[offset],
        _ => -QUARTER_WAVE[QUARTER - offset],
    };
    value as i32
}

/// Cosine of `index`, a quarter cycle ahead of [`fast_sin`].
#[must_use]
pub const fn fast_cos(index: usize) -> i32 {
    fast_sin(index.wrapping_add(QUARTER))
}
