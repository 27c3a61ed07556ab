//! One-pole filters: low-pass, derived high-pass, DC blocker, accumulator.

use super::{clip, lerp};

/// One-pole low-pass with an exponential cutoff-to-coefficient mapping.
///
/// The smoothing coefficient is `exp(-2π · cutoff / sample_rate)`, clipped
/// just below 1.0 so the filter always leaks. `set_coefficient` bypasses the
/// Hz mapping for callers that drive the pole with a raw 0..1 damping amount
/// (the waveguide string does this).
#[derive(Debug, Clone)]
pub struct OnePole {
    previous: f32,
    cutoff: f32,
    sample_factor: f32,
    mix_factor: f32,
}

impl Default for OnePole {
    fn default() -> Self {
        Self {
            previous: 0.0,
            cutoff: 20_000.0,
            sample_factor: 0.0,
            mix_factor: 0.0,
        }
    }
}

impl OnePole {
    pub fn prepare(&mut self, sample_rate: f64) {
        self.previous = 0.0;
        self.sample_factor = (-std::f64::consts::TAU / sample_rate) as f32;
        let cutoff = self.cutoff;
        self.cutoff = f32::NAN; // force the coefficient to recompute
        self.set_cutoff(cutoff);
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        if cutoff_hz == self.cutoff {
            return;
        }
        self.mix_factor = clip((cutoff_hz * self.sample_factor).exp(), 0.0, 0.99999);
        self.cutoff = cutoff_hz;
    }

    /// Sets the smoothing coefficient directly (0 = pass-through, 1 = hold).
    pub fn set_coefficient(&mut self, coefficient: f32) {
        self.mix_factor = clip(coefficient, 0.0, 0.99999);
        self.cutoff = f32::NAN;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.previous = lerp(input, self.previous, self.mix_factor);
        self.previous
    }

    pub fn reset(&mut self) {
        self.previous = 0.0;
    }
}

/// High-pass derived from the one-pole: input minus its low-passed self.
#[derive(Debug, Clone, Default)]
pub struct OnePoleHighPass {
    low: OnePole,
}

impl OnePoleHighPass {
    pub fn prepare(&mut self, sample_rate: f64) {
        self.low.prepare(sample_rate);
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.low.set_cutoff(cutoff_hz);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        input - self.low.process(input)
    }

    pub fn reset(&mut self) {
        self.low.reset();
    }
}

/// DC blocker: the one-pole high-pass fixed near 10 Hz.
#[derive(Debug, Clone, Default)]
pub struct DcBlocker {
    high: OnePoleHighPass,
}

impl DcBlocker {
    const CUTOFF_HZ: f32 = 10.0;

    pub fn prepare(&mut self, sample_rate: f64) {
        self.high.prepare(sample_rate);
        self.high.set_cutoff(Self::CUTOFF_HZ);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.high.process(input)
    }

    pub fn reset(&mut self) {
        self.high.reset();
    }
}

/// Running sum of every sample seen since the last reset.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    previous: f32,
}

impl Accumulator {
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.previous += input;
        self.previous
    }

    pub fn reset(&mut self) {
        self.previous = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pole_converges_to_dc_input() {
        let mut pole = OnePole::default();
        pole.prepare(44_100.0);
        pole.set_cutoff(1_000.0);

        let mut out = 0.0;
        for _ in 0..44_100 {
            out = pole.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-3, "settled at {out}");
    }

    #[test]
    fn high_pass_rejects_dc() {
        let mut hp = OnePoleHighPass::default();
        hp.prepare(44_100.0);
        hp.set_cutoff(100.0);

        let mut out = 1.0;
        for _ in 0..44_100 {
            out = hp.process(1.0);
        }
        assert!(out.abs() < 1e-3, "settled at {out}");
    }

    #[test]
    fn dc_blocker_removes_offset_from_sine() {
        let mut dc = DcBlocker::default();
        dc.prepare(44_100.0);

        let mut sum = 0.0;
        let n = 44_100;
        for i in 0..n {
            let x = 0.5 + (i as f32 * 440.0 * std::f32::consts::TAU / 44_100.0).sin();
            sum += dc.process(x);
        }
        assert!((sum / n as f32).abs() < 0.05);
    }

    #[test]
    fn accumulator_sums_and_resets() {
        let mut acc = Accumulator::default();
        assert_eq!(acc.process(1.0), 1.0);
        assert_eq!(acc.process(2.0), 3.0);
        acc.reset();
        assert_eq!(acc.process(4.0), 4.0);
    }
}
