//! Filter module: a state-variable filter with low, band and high outputs.

use std::sync::Arc;

use crate::dsp::svf::StateVariableFilter;
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

static PARAMS: [ParamSpec; 2] = [
    ParamSpec::float("freq", "Freq", 20.0, 20_000.0, 1_000.0)
        .with_skew(0.2)
        .with_unit("Hz"),
    ParamSpec::float("res", "Res", 0.0, 100.0, 25.0).with_unit("%"),
];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "Filter",
    inlets: &["in", "freq cv", "res cv"],
    outlets: &["low", "band", "high"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(Filter::new(params)),
};

struct Filter {
    svf: StateVariableFilter,
    freq: Arc<ParamCell>,
    res: Arc<ParamCell>,
}

impl Filter {
    fn new(params: &ParamSet) -> Self {
        Self {
            svf: StateVariableFilter::default(),
            freq: params.cell("freq"),
            res: params.cell("res"),
        }
    }
}

impl ModuleProcessor for Filter {
    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize) {
        self.svf.prepare(sample_rate);
    }

    fn process(&mut self, buffer: &mut BlockBuffer, _events: &ControlEvents) {
        self.svf.set_frequency(self.freq.get());
        self.svf.set_resonance(self.res.get() * 0.01);

        let [low, band, high] = buffer.channels_mut() else {
            return;
        };

        for n in 0..low.len() {
            let out = self.svf.process_sample(low[n], band[n], high[n]);
            low[n] = out.low;
            band[n] = out.band;
            high[n] = out.high;
        }
    }
}
