//! LFO module: one modulation output, rate and shape CV inlets.

use std::sync::Arc;

use crate::dsp::clip;
use crate::dsp::lfo::{rate_to_hz, Lfo, LfoWave, WAVE_NAMES};
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

fn display_rate(rate: f32) -> String {
    format!("{:.2} Hz", rate_to_hz(rate as f64))
}

static PARAMS: [ParamSpec; 3] = [
    ParamSpec::float("rate", "Rate", 0.0, 1.0, 0.3).with_display(display_rate),
    ParamSpec::choice("wave", "Wave", &WAVE_NAMES),
    ParamSpec::float("shape", "Shape", -100.0, 100.0, 0.0).with_unit("%"),
];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "LFO",
    inlets: &["rate cv", "shape cv"],
    outlets: &["out"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(LfoModule::new(params)),
};

struct LfoModule {
    lfo: Lfo,
    rate: Arc<ParamCell>,
    wave: Arc<ParamCell>,
    shape: Arc<ParamCell>,
}

impl LfoModule {
    fn new(params: &ParamSet) -> Self {
        Self {
            lfo: Lfo::default(),
            rate: params.cell("rate"),
            wave: params.cell("wave"),
            shape: params.cell("shape"),
        }
    }
}

impl ModuleProcessor for LfoModule {
    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize) {
        self.lfo.prepare(sample_rate);
    }

    fn process(&mut self, buffer: &mut BlockBuffer, events: &ControlEvents) {
        self.lfo.set_bpm(events.tempo_bpm);
        self.lfo.set_wave(LfoWave::from_index(self.wave.get() as usize));
        if let Some(ppq) = events.ppq_position {
            self.lfo.set_ppq_position(ppq);
        }

        let rate = self.rate.get();
        let shape = self.shape.get() * 0.01;

        let [rate_out, shape_cv] = buffer.channels_mut() else {
            return;
        };

        for n in 0..rate_out.len() {
            self.lfo.set_rate(clip(rate + rate_out[n], 0.0, 1.0) as f64);
            self.lfo.set_shape(clip(shape + shape_cv[n], -1.0, 1.0));
            rate_out[n] = self.lfo.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn output_is_bipolar_and_moving() {
        let (mut processor, params) = registry::create("LFO").unwrap();
        processor.prepare(1_000.0, 256);
        params.set("rate", 0.8);

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 256);
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for _ in 0..8 {
            buffer.clear();
            processor.process(&mut buffer, &ControlEvents::default());
            for &s in buffer.channel(0) {
                min = min.min(s);
                max = max.max(s);
            }
        }
        assert!(min < -0.5 && max > 0.5, "range was {min}..{max}");
    }

    #[test]
    fn wave_choice_switches_shape() {
        let (mut processor, params) = registry::create("LFO").unwrap();
        processor.prepare(1_000.0, 128);
        params.set("rate", 0.9);
        params.set("wave", 2.0); // pulse

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 128);
        processor.process(&mut buffer, &ControlEvents::default());
        assert!(buffer
            .channel(0)
            .iter()
            .all(|&s| s == 1.0 || s == -1.0));
    }
}
