//! Shared DSP primitives.
//!
//! Every module's signal path is built from the pieces in this directory:
//! the delay line, the one-pole family, the state-variable filter, the LFO,
//! and the numeric helpers below. All primitives are pure per-instance state
//! machines with `prepare`/`reset`/`process` and no shared state, so one
//! instance per module (or per voice) is always safe.

pub mod delay_line;
pub mod lfo;
pub mod one_pole;
pub mod svf;

pub use delay_line::DelayLine;
pub use lfo::{Lfo, LfoWave};
pub use one_pole::{Accumulator, DcBlocker, OnePole, OnePoleHighPass};
pub use svf::{StateVariableFilter, SvfOutput};

/// A mathematically accurate (and much faster) stand-in for `fmod`.
#[inline]
pub fn modulo(a: f64, b: f64) -> f64 {
    a - b * (a / b).floor()
}

/// Returns the fractional part of `x`.
#[inline]
pub fn frac(x: f32) -> f32 {
    x - x.floor()
}

/// Clips `value` between `min` and `max`, both bounds inclusive.
#[inline]
pub fn clip(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// A mirrored power function, where `bipow(-x, e) == -bipow(x, e)`.
#[inline]
pub fn bipow(base: f32, exponent: f32) -> f32 {
    let sign = if base < 0.0 { -1.0 } else { 1.0 };
    (base * sign).powf(exponent) * sign
}

/// Converts a MIDI note number into a frequency in Hz (note 69 = 440 Hz).
#[inline]
pub fn midi_to_freq(note_number: f32) -> f32 {
    2.0f32.powf((note_number - 69.0) / 12.0) * 440.0
}

/// Converts dB into an amplitude factor.
#[inline]
pub fn db_to_amp(db: f32) -> f32 {
    10.0f32.powf(db * 0.05)
}

/// Converts an amplitude factor into dB.
#[inline]
pub fn amp_to_db(amp: f32) -> f32 {
    20.0 * amp.log10()
}

/// Linear interpolation between `a` (at `t == 0`) and `b` (at `t == 1`),
/// with `t` clipped to [0, 1].
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    let t = clip(t, 0.0, 1.0);
    b * t + a * (1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulo_matches_wrapped_range() {
        assert!((modulo(2.5, 1.0) - 0.5).abs() < 1e-12);
        assert!((modulo(-0.25, 1.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn clip_bounds_are_inclusive() {
        assert_eq!(clip(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clip(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clip(0.5, 0.0, 1.0), 0.5);
    }

    #[test]
    fn bipow_is_mirrored() {
        let pos = bipow(0.5, 2.0);
        let neg = bipow(-0.5, 2.0);
        assert!((pos + neg).abs() < 1e-6);
    }

    #[test]
    fn db_round_trip() {
        let amp = db_to_amp(-6.0);
        assert!((amp_to_db(amp) + 6.0).abs() < 1e-4);
    }

    #[test]
    fn midi_69_is_a440() {
        assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-3);
        assert!((midi_to_freq(81.0) - 880.0).abs() < 1e-2);
    }
}
