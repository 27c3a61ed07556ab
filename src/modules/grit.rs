//! Grit module: multiplies the input with sparse bipolar noise.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dsp::clip;
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamCell, ParamSet, ParamSpec};
use crate::registry::ModuleSpec;

static PARAMS: [ParamSpec; 2] = [
    ParamSpec::float("amount", "Amount", 0.0, 100.0, 50.0)
        .with_skew(0.5)
        .with_unit("%"),
    ParamSpec::float("density", "Density", 0.0, 100.0, 50.0)
        .with_skew(0.3)
        .with_unit("%"),
];

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "Grit",
    inlets: &["in", "amount cv", "density cv"],
    outlets: &["out"],
    is_output: false,
    params: &PARAMS,
    build: |params| Box::new(Grit::new(params)),
};

struct Grit {
    rng: StdRng,
    amount: Arc<ParamCell>,
    density: Arc<ParamCell>,
}

impl Grit {
    fn new(params: &ParamSet) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            amount: params.cell("amount"),
            density: params.cell("density"),
        }
    }
}

impl ModuleProcessor for Grit {
    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize) {}

    fn process(&mut self, buffer: &mut BlockBuffer, _events: &ControlEvents) {
        let amount = self.amount.get() * 0.01;
        let density = self.density.get() * 0.01;

        let [in_out, amount_cv, density_cv] = buffer.channels_mut() else {
            return;
        };

        for n in 0..in_out.len() {
            let thresh = density + density_cv[n];
            let mut noise = if self.rng.gen::<f32>() < thresh {
                if self.rng.gen::<bool>() {
                    0.5
                } else {
                    -0.5
                }
            } else {
                0.0
            };

            let gain = clip(amount + amount_cv[n], 0.0, 1.0);
            noise = noise * gain + (1.0 - gain);

            in_out[n] *= noise;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn render(amount: f32, density: f32) -> Vec<f32> {
        let (mut processor, params) = registry::create("Grit").unwrap();
        processor.prepare(44_100.0, 256);
        params.set("amount", amount);
        params.set("density", density);

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 256);
        buffer.channel_mut(0).fill(1.0);
        processor.process(&mut buffer, &ControlEvents::default());
        buffer.channel(0).to_vec()
    }

    #[test]
    fn zero_amount_passes_input_through() {
        assert!(render(0.0, 100.0).iter().all(|&s| s == 1.0));
    }

    #[test]
    fn full_amount_full_density_gates_to_half_scale() {
        assert!(render(100.0, 100.0).iter().all(|&s| s == 0.5 || s == -0.5));
    }

    #[test]
    fn zero_density_full_amount_silences() {
        assert!(render(100.0, 0.0).iter().all(|&s| s == 0.0));
    }
}
