//! Two-stage trapezoidal state-variable filter.
//!
//! One stage produces low, band and high outputs simultaneously from each
//! input sample; notch and peaking-EQ responses are derived from the same
//! stage rather than from a second filter. Frequency modulation scales the
//! base frequency as `freq · 5^mod`, matching the CV convention used across
//! the modules.

use super::{clip, db_to_amp};

/// The three simultaneous outputs of one filter step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SvfOutput {
    pub low: f32,
    pub band: f32,
    pub high: f32,
}

/// The integrator core. Two trapezoidal runs per sample; the second run
/// uses the raw input while the first averages it with the previous input.
#[derive(Debug, Clone, Default)]
struct Stage {
    last_input: f32,
    low: f32,
    band: f32,
}

impl Stage {
    fn reset(&mut self) {
        self.last_input = 0.0;
        self.low = 0.0;
        self.band = 0.0;
    }

    #[inline]
    fn process(&mut self, sample: f32, freq_factor: f32, res: f32) -> SvfOutput {
        // Run 1
        self.low += freq_factor * self.band;
        let mut high = 0.5 * (sample + self.last_input) - self.low - res * self.band;
        self.band += freq_factor * high;

        // Run 2
        self.low += freq_factor * self.band;
        high = sample - self.low - res * self.band;
        self.band += freq_factor * high;

        self.last_input = sample;

        SvfOutput {
            low: self.low,
            band: self.band,
            high,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    freq_limit: f32,
    theta_factor: f32,
    frequency: f32,
    resonance: f32,
    stage: Stage,
}

impl Default for StateVariableFilter {
    fn default() -> Self {
        Self {
            freq_limit: 20_000.0,
            theta_factor: 0.000_035_618_964,
            frequency: 20.0,
            resonance: 0.85,
            stage: Stage::default(),
        }
    }
}

impl StateVariableFilter {
    pub fn reset(&mut self) {
        self.stage.reset();
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        let sample_rate = sample_rate as f32;
        self.freq_limit = sample_rate * 0.454;
        self.theta_factor = std::f32::consts::PI / (sample_rate * 2.0);
        self.reset();
    }

    /// [20.0 - SR/2] - the cutoff/peak frequency of the filter.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    /// [0.0 - 1.0] - the feedback resonance of the filter.
    pub fn set_resonance(&mut self, resonance: f32) {
        self.resonance = resonance;
    }

    /// Runs one sample through the stage. `freq_mod` scales the frequency as
    /// `5^freq_mod`, `res_mod` adds to the resonance amount.
    #[inline]
    pub fn process_sample(&mut self, sample: f32, freq_mod: f32, res_mod: f32) -> SvfOutput {
        let freq_factor = self.modded_freq_factor(freq_mod);
        let res = Self::damping(self.resonance + res_mod);
        self.stage.process(sample, freq_factor, res)
    }

    /// Notch response derived from the same stage: input minus band.
    pub fn process_notch(&mut self, sample: f32, freq_mod: f32) -> f32 {
        let freq_factor = self.modded_freq_factor(freq_mod);
        let res = Self::damping(self.resonance);
        sample - self.stage.process(sample, freq_factor, res).band
    }

    /// Bell/peaking-EQ response derived from the same stage.
    pub fn process_peak(&mut self, sample: f32, gain_db: f32, freq_mod: f32) -> f32 {
        let freq_factor = self.modded_freq_factor(freq_mod);
        let res = Self::damping(self.resonance);
        let out = self.stage.process(sample, freq_factor, res);

        out.low + out.high + out.band * Self::peak_band_gain(gain_db, res)
    }

    fn freq_factor(&self, freq: f32) -> f32 {
        2.0 * (clip(freq, 20.0, self.freq_limit) * self.theta_factor).sin()
    }

    fn modded_freq_factor(&self, freq_mod: f32) -> f32 {
        self.freq_factor(self.frequency * 5.0f32.powf(freq_mod))
    }

    fn peak_band_gain(gain_db: f32, res: f32) -> f32 {
        db_to_amp(gain_db) / (1.204_819 * res - 0.024_096_38)
    }

    /// Maps the public 0..1 resonance amount onto the stage's damping term.
    fn damping(res: f32) -> f32 {
        0.85 - clip(res, 0.0, 1.0) * 0.83
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(frequency: f32, resonance: f32) -> StateVariableFilter {
        let mut filter = StateVariableFilter::default();
        filter.prepare(44_100.0);
        filter.set_frequency(frequency);
        filter.set_resonance(resonance);
        filter
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut filter = prepared(1_000.0, 0.0);
        let mut out = SvfOutput::default();
        for _ in 0..44_100 {
            out = filter.process_sample(1.0, 0.0, 0.0);
        }
        assert!((out.low - 1.0).abs() < 0.01, "low settled at {}", out.low);
        assert!(out.high.abs() < 0.01);
    }

    #[test]
    fn output_stays_bounded_at_full_resonance() {
        let mut filter = prepared(2_000.0, 1.0);
        let mut peak: f32 = 0.0;
        for i in 0..44_100 {
            let x = (i as f32 * 220.0 * std::f32::consts::TAU / 44_100.0).sin();
            let out = filter.process_sample(x, 0.0, 0.0);
            peak = peak.max(out.low.abs().max(out.band.abs()).max(out.high.abs()));
        }
        assert!(peak.is_finite());
        assert!(peak < 100.0, "peak {peak}");
    }

    #[test]
    fn notch_attenuates_centre_frequency() {
        let mut filter = prepared(1_000.0, 0.25);
        let mut in_power = 0.0;
        let mut out_power = 0.0;
        for i in 0..44_100 {
            let x = (i as f32 * 1_000.0 * std::f32::consts::TAU / 44_100.0).sin();
            let y = filter.process_notch(x, 0.0);
            in_power += x * x;
            out_power += y * y;
        }
        assert!(out_power < in_power * 0.5);
    }
}
