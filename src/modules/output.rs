//! Output module: the stereo sink the engine taps for the device stream.
//!
//! The processor itself is a no-op; the runtime wires this module's
//! channels straight to the device outputs.

use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamSet};
use crate::registry::ModuleSpec;

pub static SPEC: ModuleSpec = ModuleSpec {
    name: "Output",
    inlets: &["left", "right"],
    outlets: &["left", "right"],
    is_output: true,
    params: &[],
    build: |params| Box::new(Output::new(params)),
};

struct Output;

impl Output {
    fn new(_params: &ParamSet) -> Self {
        Self
    }
}

impl ModuleProcessor for Output {
    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize) {}

    fn process(&mut self, _buffer: &mut BlockBuffer, _events: &ControlEvents) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn passes_its_inputs_through_untouched() {
        let (mut processor, _params) = registry::create("Output").unwrap();
        processor.prepare(44_100.0, 32);

        let mut buffer = BlockBuffer::new(SPEC.channel_count(), 32);
        buffer.channel_mut(0).fill(0.5);
        buffer.channel_mut(1).fill(-0.5);
        processor.process(&mut buffer, &ControlEvents::default());
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));
        assert!(buffer.channel(1).iter().all(|&s| s == -0.5));
    }

    #[test]
    fn is_flagged_as_the_graph_sink() {
        assert!(registry::find("Output").unwrap().is_output);
    }
}
