//! Low-frequency oscillator with four waveform shapes and two rate modes.
//!
//! Shapes: sine with a symmetric tanh/power warp, triangle with a movable
//! skew point, pulse with variable duty, and sample-and-hold noise with a
//! power-law interpolation between held values. The rate is either
//! free-running (a 0..1 knob skewed onto Hz) or synced to a musical note
//! division of the current tempo. Phase can be set directly, including in
//! quarter-note units for host-transport sync.

use super::{bipow, clip, frac, modulo};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const NOTE_STRINGS: [&str; 15] = [
    "8", "4", "3", "2", "3 / 2", "1", "3 / 4", "1 / 2", "1 / 4", "1 / 6", "1 / 8", "1 / 12",
    "1 / 16", "1 / 32", "1 / 64",
];

pub const NOTE_VALUES: [f64; 15] = [
    32.0,
    16.0,
    12.0,
    8.0,
    6.0,
    4.0,
    3.0,
    2.0,
    1.0,
    2.0 / 3.0,
    1.0 / 2.0,
    1.0 / 3.0,
    1.0 / 4.0,
    1.0 / 8.0,
    1.0 / 16.0,
];

pub const WAVE_NAMES: [&str; 4] = ["Sine", "Triangle", "Pulse", "Random"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoWave {
    #[default]
    Sine,
    Triangle,
    Pulse,
    Random,
}

impl LfoWave {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => LfoWave::Triangle,
            2 => LfoWave::Pulse,
            3 => LfoWave::Random,
            _ => LfoWave::Sine,
        }
    }
}

/// Maps a 0..1 rate knob onto the note-division table index.
pub fn rate_to_note_index(rate: f64) -> usize {
    ((rate * NOTE_VALUES.len() as f64).floor() as usize).min(NOTE_VALUES.len() - 1)
}

pub fn rate_to_note_string(rate: f64) -> &'static str {
    NOTE_STRINGS[rate_to_note_index(rate)]
}

/// Free-running mode: skews the 0..1 rate knob onto roughly 0.07..100 Hz.
pub fn rate_to_hz(rate: f64) -> f64 {
    let rate = rate + 0.1;
    (rate * rate * rate * rate) * 68.301_345_536_5
}

/// Synced mode: the note division of `rate` at `bpm`, in Hz.
pub fn note_rate_to_hz(rate: f64, bpm: f64) -> f64 {
    bpm / (NOTE_VALUES[rate_to_note_index(rate)] * 60.0)
}

#[derive(Debug)]
pub struct Lfo {
    increment: f64,
    position: f64,
    rate: f64,
    bpm: f64,
    freq: f64,
    note_mode: bool,
    wave: LfoWave,
    shape: f32,
    phase: f32,
    random_value: f32,
    next_random_value: f32,
    rng: StdRng,
}

impl Default for Lfo {
    fn default() -> Self {
        Self {
            increment: 0.0,
            position: 0.0,
            rate: 0.0,
            bpm: 120.0,
            freq: 0.0,
            note_mode: false,
            wave: LfoWave::Sine,
            shape: 0.0,
            phase: 0.0,
            random_value: 0.0,
            next_random_value: 0.0,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Lfo {
    pub fn prepare(&mut self, sample_rate: f64) {
        self.increment = 1.0 / sample_rate;
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
    }

    pub fn set_note_mode(&mut self, note_mode: bool) {
        self.note_mode = note_mode;
        self.update_freq();
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = if bpm > 1.0 { bpm } else { 1.0 };
        self.update_freq();
    }

    /// [0 - 1]
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        self.update_freq();
    }

    pub fn set_wave(&mut self, wave: LfoWave) {
        self.wave = wave;
    }

    /// [-1 - 1]
    pub fn set_shape(&mut self, shape: f32) {
        self.shape = shape;
    }

    /// [0 - 1]
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase;
    }

    /// Sets the position in phase units. Render context only.
    pub fn set_position(&mut self, position: f64) {
        self.position = modulo(position, 1.0);
    }

    /// Sets the position in quarter-note units. Render context only.
    pub fn set_ppq_position(&mut self, ppq_position: f64) {
        self.set_position((ppq_position / 4.0 / 60.0) * self.bpm * self.freq);
    }

    pub fn next(&mut self) -> f32 {
        let pos = self.position as f32 + self.phase;
        let next_position = self.position + self.freq * self.increment;

        let value = match self.wave {
            LfoWave::Sine => Self::sine(pos, self.shape),
            LfoWave::Triangle => Self::triangle(pos, self.shape),
            LfoWave::Pulse => Self::pulse(pos, self.shape),
            LfoWave::Random => {
                let value =
                    Self::random(self.random_value, self.next_random_value, pos, self.shape);
                if next_position >= 1.0 {
                    self.advance_random();
                }
                value
            }
        };

        self.position = modulo(next_position, 1.0);
        value
    }

    /// Advances the position by `num_samples` without producing output.
    pub fn skip(&mut self, num_samples: usize) {
        let next_position = self.position + self.freq * self.increment * num_samples as f64;
        if self.wave == LfoWave::Random && next_position >= 1.0 {
            self.advance_random();
        }
        self.position = modulo(next_position, 1.0);
    }

    /// Sine with a symmetric warp: positive shape drives a tanh squash
    /// toward square, negative shape raises the wave to an odd power toward
    /// a narrow pulse shape.
    pub fn sine(pos: f32, shape: f32) -> f32 {
        let sine = (pos * std::f32::consts::TAU).sin();
        if shape > 0.0 {
            let warped = (sine * (shape.powf(10.0) + 0.2) * 20.0).tanh();
            sine * (1.0 - shape.abs()) + warped * shape.abs()
        } else {
            let sign = if sine >= 0.0 { 1.0 } else { -1.0 };
            let exponent = shape * shape * shape * shape * 100.0 + 1.0;
            sign * sine.abs().powf(exponent)
        }
    }

    /// Triangle with a movable skew point: shape slides the apex between
    /// sawtooth (-1), triangle (0) and ramp (+1).
    pub fn triangle(pos: f32, shape: f32) -> f32 {
        let pos = frac(pos);
        let a = 0.5 + shape * 0.5;
        let y = if pos < a {
            pos / a
        } else {
            (1.0 - pos) / (1.0 - a)
        };
        y * 2.0 - 1.0
    }

    /// Pulse with variable duty: shape sweeps the duty cycle 0.01..0.99.
    pub fn pulse(pos: f32, shape: f32) -> f32 {
        if frac(pos) < shape * 0.49 + 0.5 {
            1.0
        } else {
            -1.0
        }
    }

    /// Sample-and-hold noise with a power-law interpolation between the held
    /// value and the next one; shape sweeps from stepped to smoothly glided.
    pub fn random(value: f32, next_value: f32, pos: f32, shape: f32) -> f32 {
        let pos = frac(pos);
        let shape = bipow(shape, 2.0);

        let mix = if shape >= 0.0 {
            1.0 - (1.0 - pos).powf(1.0 / shape.max(f32::MIN_POSITIVE))
        } else {
            pos.powf(-shape)
        };

        value * (1.0 - clip(mix, 0.0, 1.0)) + next_value * clip(mix, 0.0, 1.0)
    }

    fn advance_random(&mut self) {
        self.random_value = self.next_random_value;
        self.next_random_value = self.rng.gen::<f32>() * 2.0 - 1.0;
    }

    fn update_freq(&mut self) {
        self.freq = if self.note_mode {
            note_rate_to_hz(self.rate, self.bpm)
        } else {
            rate_to_hz(self.rate)
        };
    }
}
