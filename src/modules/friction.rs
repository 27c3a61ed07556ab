//! Friction module: a PolyBLEP sawtooth whose period wobbles.
//!
//! Jitter rescales the frequency of each new period by a random factor,
//! drift walks the frequency with a folded random walk. Both are meant
//! to mimic the stick-slip of a bowed or scraped surface.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dsp::clip;
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

static PARAMS: [ParamSpec; 3] = [
    ParamSpec::float("freq", "Freq", 0.1, 10_000.0, 30.0)
        .with_skew(0.2)
        .with_unit("Hz"),
    ParamSpec::float("jitter", "Jitter", 0.0, 100.0, 0.0)
        .with_skew(0.3)
        .with_unit("%"),
    ParamSpec::float("drift", "Drift", 0.0, 95.0, 0.0)
        .with_skew(0.5)
        .with_unit("%"),
];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "Friction",
    inlets: &["freq cv", "jitter cv", "drift cv"],
    outlets: &["out"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(Friction::new(params)),
};

// 3rd-order polynomial BLEP, applied at the wrap discontinuity.
fn blep(dt: f32, mut t: f32) -> f32 {
    if t < dt {
        t /= dt;
        t * (2.0 - t) - 1.0
    } else if t > 1.0 - dt {
        t = (t - 1.0) / dt;
        t * (t + 2.0) + 1.0
    } else {
        0.0
    }
}

struct Sawtooth {
    rng: StdRng,
    phase: f64,
    incr_factor: f64,
    jitter_factor: f64,
    drift_value: f64,
}

impl Sawtooth {
    fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            phase: 0.0,
            incr_factor: 0.01,
            jitter_factor: 1.0,
            drift_value: 1.0,
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.incr_factor = 1.0 / sample_rate;
        self.phase = 0.0;
    }

    fn next_drift_value(&mut self) -> f64 {
        let f = self.drift_value + (self.rng.gen::<f64>() - 0.5) * 0.1;
        // Fold back into [-1, 1].
        if f >= 1.0 {
            1.0 - (f - 1.0)
        } else if f <= -1.0 {
            -1.0 - (f + 1.0)
        } else {
            f
        }
    }

    fn process(&mut self, freq: f32, jitter: f32, drift: f32) -> f32 {
        let increment =
            freq as f64 * self.incr_factor * self.jitter_factor * (1.0 + self.drift_value * drift as f64);

        let mut saw = 2.0 * self.phase as f32 - 1.0;
        saw -= blep(increment as f32, self.phase as f32);

        self.phase += increment;

        if self.phase >= 1.0 {
            // jitter changes the frequency of the next period
            self.jitter_factor =
                4.0_f64.powf(jitter as f64 * (self.rng.gen::<f64>() - 0.5));
            // drift shifts the frequency in a random walk
            self.drift_value = self.next_drift_value();
            self.phase -= 1.0;
        }

        saw
    }
}

struct Friction {
    sawtooth: Sawtooth,
    freq: Arc<ParamCell>,
    jitter: Arc<ParamCell>,
    drift: Arc<ParamCell>,
}

impl Friction {
    fn new(params: &ParamSet) -> Self {
        Self {
            sawtooth: Sawtooth::new(),
            freq: params.cell("freq"),
            jitter: params.cell("jitter"),
            drift: params.cell("drift"),
        }
    }
}

impl ModuleProcessor for Friction {
    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize) {
        self.sawtooth.prepare(sample_rate);
    }

    fn process(&mut self, buffer: &mut BlockBuffer, _events: &ControlEvents) {
        let freq = self.freq.get();
        let jitter = self.jitter.get() * 0.01;
        let drift = self.drift.get() * 0.01;

        let [out, jitter_cv, drift_cv] = buffer.channels_mut() else {
            return;
        };

        for n in 0..out.len() {
            out[n] = self.sawtooth.process(
                (freq * 5.0_f32.powf(out[n])).min(20_000.0),
                clip(jitter + jitter_cv[n], 0.0, 1.0),
                clip(drift + drift_cv[n], 0.0, 1.0),
            );
        }
    }
}
