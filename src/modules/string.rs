//! String module: two coupled waveguide delay lines with damped feedback.
//!
//! Both lines are excited from the first inlet. Line 1 runs its feedback
//! node through a sine warp to liven the sound up; line 2 is a plain
//! damped loop. Outputs are integrated and DC-blocked pickup reads at a
//! position along each line. Mode B halves the loop interval and flips
//! the line 1 node for a brighter, bell-like register.

use std::sync::Arc;

use crate::dsp::delay_line::DelayLine;
use crate::dsp::one_pole::{Accumulator, DcBlocker, OnePole};
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

fn display_percent(value: f32) -> String {
    format!("{:.0}", (value * 100.0).floor())
}

static PARAMS: [ParamSpec; 5] = [
    ParamSpec::float("freq", "Frequency", 20.0, 10_000.0, 440.0)
        .with_skew(0.3)
        .with_unit("Hz"),
    ParamSpec::float("damp", "Damping", 0.0, 1.0, 0.0).with_display(display_percent),
    ParamSpec::float("pos", "Position", 0.0, 1.0, 0.0).with_display(display_percent),
    ParamSpec::float("decay", "Decay", 0.0, 1.0, 0.0).with_display(display_percent),
    ParamSpec::toggle("mode", "Mode", false),
];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "String",
    inlets: &["exciter l", "exciter r"],
    outlets: &["out l", "out r"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(StringModule::new(params)),
};

struct StringModule {
    sample_rate: f64,

    line1: DelayLine,
    line2: DelayLine,
    one_pole1: OnePole,
    one_pole2: OnePole,
    dc_block1: DcBlocker,
    dc_block2: DcBlocker,
    accum1: Accumulator,
    accum2: Accumulator,

    freq: Arc<ParamCell>,
    damp: Arc<ParamCell>,
    pos: Arc<ParamCell>,
    decay: Arc<ParamCell>,
    mode: Arc<ParamCell>,
}

impl StringModule {
    fn new(params: &ParamSet) -> Self {
        Self {
            sample_rate: 44_100.0,
            line1: DelayLine::default(),
            line2: DelayLine::default(),
            one_pole1: OnePole::default(),
            one_pole2: OnePole::default(),
            dc_block1: DcBlocker::default(),
            dc_block2: DcBlocker::default(),
            accum1: Accumulator::default(),
            accum2: Accumulator::default(),
            freq: params.cell("freq"),
            damp: params.cell("damp"),
            pos: params.cell("pos"),
            decay: params.cell("decay"),
            mode: params.cell("mode"),
        }
    }

    // Line 1 gets a sine warp on its node to liven the sound up a bit.
    // In mode B, inverting the node changes the sound.
    fn process_line1_node(&mut self, decay: f32, interval: f32, mode: bool) -> f32 {
        let node = (self.one_pole1.process(self.line1.get_interpolated(interval))
            * std::f32::consts::TAU
            * 1.5)
            .sin()
            * decay
            * (0.1063 + if mode { 0.00005 } else { 0.0 });
        if mode {
            -node
        } else {
            node
        }
    }

    // Normal case for line 2: read, low-pass, apply feedback gain.
    fn process_line2_node(&mut self, decay: f32, interval: f32) -> f32 {
        self.one_pole2.process(self.line2.get_interpolated(interval)) * decay
    }

    fn read_output1(&mut self, pickup: f32) -> f32 {
        let sample = self.line1.get_interpolated(pickup);
        self.dc_block1.process(self.accum1.process(sample))
    }

    fn read_output2(&mut self, pickup: f32) -> f32 {
        let sample = -self.line2.get_interpolated(pickup);
        self.dc_block2.process(self.accum2.process(sample))
    }

    fn scale_decay(decay: f32, mode: bool) -> f32 {
        decay.powf(if mode { 0.0005 } else { 0.05 })
    }
}

impl ModuleProcessor for StringModule {
    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize) {
        self.sample_rate = sample_rate;

        self.line1.resize(sample_rate as usize);
        self.line2.resize(sample_rate as usize);
        self.line1.clear();
        self.line2.clear();

        self.one_pole1.reset();
        self.one_pole2.reset();
        self.dc_block1.prepare(sample_rate);
        self.dc_block2.prepare(sample_rate);
        self.accum1.reset();
        self.accum2.reset();
    }

    fn process(&mut self, buffer: &mut BlockBuffer, _events: &ControlEvents) {
        let mode = self.mode.get() > 0.5;
        let damp = self.damp.get();
        self.one_pole1.set_coefficient(damp);
        self.one_pole2.set_coefficient(damp);

        let period = (self.sample_rate / self.freq.get() as f64) as f32;
        let decay = Self::scale_decay(self.decay.get(), mode)
            .powf(period * (0.01 + if mode { 0.52 } else { 0.0 }))
            * 0.997;

        // Mode B doubles the perceived interval so the loop length halves.
        let interval = period / if mode { 2.0 } else { 1.0 };
        let pickup = interval * self.pos.get();

        for n in 0..buffer.len() {
            let input = buffer.channel(0)[n];

            let node1 = self.process_line1_node(decay, interval, mode);
            self.line1.push(input * 0.05 + node1);
            let node2 = self.process_line2_node(decay, interval);
            self.line2.push(-input * 0.05 + node2);

            buffer.channel_mut(0)[n] = self.read_output1(interval - pickup);
            buffer.channel_mut(1)[n] = self.read_output2(pickup);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn excite_and_render(decay: f32) -> (Vec<f32>, Vec<f32>) {
        let (mut processor, params) = registry::create("String").unwrap();
        processor.prepare(8_000.0, 512);
        params.set("freq", 200.0);
        params.set("decay", decay);

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 512);
        buffer.channel_mut(0)[0] = 1.0; // single impulse excitation
        processor.process(&mut buffer, &ControlEvents::default());
        (buffer.channel(0).to_vec(), buffer.channel(1).to_vec())
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn impulse_rings_on_both_outputs() {
        let (out1, out2) = excite_and_render(0.9);
        // The impulse takes one loop period (40 samples) to reach the pickup.
        assert!(energy(&out1[40..]) > 0.0);
        assert!(energy(&out2[40..]) > 0.0);
    }

    #[test]
    fn higher_decay_sustains_longer() {
        let (short, _) = excite_and_render(0.1);
        let (long, _) = excite_and_render(0.99);
        assert!(energy(&long[256..]) > energy(&short[256..]));
    }

    #[test]
    fn silence_in_silence_out() {
        let (mut processor, _params) = registry::create("String").unwrap();
        processor.prepare(8_000.0, 256);
        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 256);
        processor.process(&mut buffer, &ControlEvents::default());
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }
}
