//! Gain module: a dB fader with a linear CV offset on top.

use std::sync::Arc;

use crate::dsp::{clip, db_to_amp};
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

static PARAMS: [ParamSpec; 1] =
    [ParamSpec::float("gain", "Gain", -70.0, 12.0, 0.0).with_unit("dB")];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "Gain",
    inlets: &["in", "gain cv"],
    outlets: &["out"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(Gain::new(params)),
};

struct Gain {
    gain: Arc<ParamCell>,
}

impl Gain {
    fn new(params: &ParamSet) -> Self {
        Self {
            gain: params.cell("gain"),
        }
    }
}

impl ModuleProcessor for Gain {
    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize) {}

    fn process(&mut self, buffer: &mut BlockBuffer, _events: &ControlEvents) {
        let gain = db_to_amp(self.gain.get());

        let [in_out, gain_cv] = buffer.channels_mut() else {
            return;
        };

        for n in 0..in_out.len() {
            in_out[n] *= clip(gain + gain_cv[n], 0.0, 4.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn unity_at_zero_db() {
        let (mut processor, _params) = registry::create("Gain").unwrap();
        processor.prepare(44_100.0, 64);

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 64);
        buffer.channel_mut(0).fill(0.25);
        processor.process(&mut buffer, &ControlEvents::default());
        assert!(buffer.channel(0).iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn cv_adds_linear_gain_and_clips() {
        let (mut processor, params) = registry::create("Gain").unwrap();
        processor.prepare(44_100.0, 64);
        params.set("gain", -70.0);

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 64);
        buffer.channel_mut(0).fill(1.0);
        buffer.channel_mut(1).fill(10.0); // way past the 4x ceiling
        processor.process(&mut buffer, &ControlEvents::default());
        assert!(buffer.channel(0).iter().all(|&s| (s - 4.0).abs() < 1e-3));
    }
}
