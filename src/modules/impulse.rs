//! Shaped-impulse oscillator.
//!
//! Produces a sine-of-scaled-sine impulse whose harmonic content is swept by
//! the shape control, plus a unipolar ramp tracking the phase (useful as an
//! envelope or sync source). Retriggered by an edge on the trigger inlet or
//! by the momentary trigger parameter.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::dsp::clip;
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

static PARAMS: [ParamSpec; 3] = [
    ParamSpec::float("freq", "Frequency", 20.0, 20_000.0, 1_000.0)
        .with_skew(0.2)
        .with_unit("Hz"),
    ParamSpec::float("shape", "Shape", 0.0, 100.0, 0.0).with_unit("%"),
    ParamSpec::toggle("trigger", "Trigger", false),
];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "Impulse",
    inlets: &["trigger", "freq cv", "shape cv"],
    outlets: &["out", "ramp"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(Impulse::new(params)),
};

/// The impulse waveshape at `phase` (radians, 0..inf) for `shape` in 0..1.
///
/// Shared so UI collaborators can draw a faithful preview of the waveform.
pub fn process_impulse(phase: f32, shape: f32) -> f32 {
    let shape_factor = -shape.max(0.88) + 1.01;
    let fundamental_attenuator = -0.5 * (phase * shape_factor - 1.0).tanh() + 0.5;

    if phase == PI {
        0.0
    } else {
        (phase.sin() / ((-shape + 1.006) * (phase - PI))).sin() * fundamental_attenuator
    }
}

struct Impulse {
    incr_factor: f64,
    phase: f64,
    previous_trigger: f32,
    freq: Arc<ParamCell>,
    shape: Arc<ParamCell>,
    trigger: Arc<ParamCell>,
}

impl Impulse {
    const INV_TWO_PI: f32 = 1.0 / std::f32::consts::TAU;

    fn new(params: &ParamSet) -> Self {
        Self {
            incr_factor: 1.0,
            phase: 0.0,
            previous_trigger: 0.0,
            freq: params.cell("freq"),
            shape: params.cell("shape"),
            trigger: params.cell("trigger"),
        }
    }
}

impl ModuleProcessor for Impulse {
    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize) {
        self.incr_factor = std::f64::consts::TAU / sample_rate;
    }

    fn process(&mut self, buffer: &mut BlockBuffer, _events: &ControlEvents) {
        let increment = self.freq.get() as f64 * self.incr_factor;
        let shape = (self.shape.get() * 0.01).powf(0.2);

        if self.trigger.exchange(0.0) > 0.5 {
            self.phase = 0.0;
        }

        let [trigger_out, freq_ramp, shape_cv] = buffer.channels_mut() else {
            return;
        };

        for n in 0..trigger_out.len() {
            let trigger = trigger_out[n];
            if (self.previous_trigger - trigger) > 0.5 {
                self.phase = 0.0;
            }

            let next_phase = self.phase + increment * 5.0f64.powf(freq_ramp[n] as f64);

            trigger_out[n] = process_impulse(
                self.phase as f32,
                clip(shape + shape_cv[n], 0.0, 1.0),
            );
            freq_ramp[n] = (self.phase as f32 * Self::INV_TWO_PI).min(1.0);

            self.phase = next_phase;
            self.previous_trigger = trigger;
        }
    }
}
