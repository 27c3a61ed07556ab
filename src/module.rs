//! The contract every processing unit implements, plus the buffer and
//! parameter plumbing shared between the document/control context and the
//! render context.
//!
//! A module processes audio in place over a single channel array: inlet
//! channels are read, outlet channels written, and a channel index may serve
//! as both (the buffer is as wide as the larger of the two port lists).
//! Parameters cross from the control context to the render context through
//! one lock-free atomic cell each; the render side never blocks, locks or
//! allocates to read them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Per-block control data handed to every processor.
///
/// This is the engine's control bus: tempo for synced LFO rates and an
/// optional transport position (in quarter notes) for phase sync. It is
/// published by the control context as an immutable snapshot and loaded
/// once per block.
#[derive(Debug, Clone)]
pub struct ControlEvents {
    /// Tempo in beats per minute.
    pub tempo_bpm: f64,
    /// Host/transport position in quarter notes, when a transport exists.
    pub ppq_position: Option<f64>,
}

impl Default for ControlEvents {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            ppq_position: None,
        }
    }
}

/// A block of channels processed in place.
///
/// Channel vectors are allocated once at the maximum block size; `set_len`
/// only moves the working length and never reallocates on the render path.
#[derive(Debug)]
pub struct BlockBuffer {
    channels: Vec<Vec<f32>>,
    max_len: usize,
}

impl BlockBuffer {
    pub fn new(num_channels: usize, max_len: usize) -> Self {
        Self {
            channels: vec![vec![0.0; max_len]; num_channels],
            max_len,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples in the current block.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the working block length. `len` must not exceed the size given
    /// at construction.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.max_len);
        for channel in &mut self.channels {
            channel.resize(len, 0.0);
        }
    }

    /// Zero-fills every channel.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// All channels at once, for modules that read some channels while
    /// writing others (slice patterns keep the borrows disjoint).
    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }
}

/// The base contract for all modules' DSP implementations.
pub trait ModuleProcessor: Send {
    /// Called before the first render and on sample-rate change.
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize);

    /// Renders the next block in place.
    fn process(&mut self, buffer: &mut BlockBuffer, events: &ControlEvents);

    /// Teardown hook. Most modules have nothing to release.
    fn release_resources(&mut self) {}
}

/// How a parameter value is interpreted and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Continuous,
    /// 0.0 / 1.0, displayed Off / On. Momentary toggles (triggers) are
    /// consumed with [`ParamCell::exchange`].
    Toggle,
    /// Index into a fixed choice list.
    Choice(&'static [&'static str]),
}

/// Static descriptor of one named, range-bounded parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Display skew exponent; 1.0 is linear. Kept as metadata for UI
    /// collaborators, the engine itself stores plain values.
    pub skew: f32,
    pub unit: &'static str,
    pub kind: ParamKind,
    display: Option<fn(f32) -> String>,
}

impl ParamSpec {
    pub const fn float(
        id: &'static str,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            id,
            name,
            min,
            max,
            default,
            skew: 1.0,
            unit: "",
            kind: ParamKind::Continuous,
            display: None,
        }
    }

    pub const fn toggle(id: &'static str, name: &'static str, default_on: bool) -> Self {
        Self {
            id,
            name,
            min: 0.0,
            max: 1.0,
            default: if default_on { 1.0 } else { 0.0 },
            skew: 1.0,
            unit: "",
            kind: ParamKind::Toggle,
            display: None,
        }
    }

    pub const fn choice(
        id: &'static str,
        name: &'static str,
        choices: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            name,
            min: 0.0,
            max: (choices.len() - 1) as f32,
            default: 0.0,
            skew: 1.0,
            unit: "",
            kind: ParamKind::Choice(choices),
            display: None,
        }
    }

    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub const fn with_skew(mut self, skew: f32) -> Self {
        self.skew = skew;
        self
    }

    pub const fn with_display(mut self, display: fn(f32) -> String) -> Self {
        self.display = Some(display);
        self
    }

    /// Maps a value onto its display text.
    pub fn display_text(&self, value: f32) -> String {
        if let Some(display) = self.display {
            return display(value);
        }
        match self.kind {
            ParamKind::Toggle => (if value > 0.5 { "On" } else { "Off" }).to_string(),
            ParamKind::Choice(choices) => {
                let index = (value.round() as usize).min(choices.len() - 1);
                choices[index].to_string()
            }
            ParamKind::Continuous => default_display(value, self.unit),
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Default numeric formatting: up to two decimals, switching to a "k" prefix
/// above 1000 when the parameter carries a unit.
fn default_display(value: f32, unit: &str) -> String {
    let magnitude = value.abs();
    let number = if magnitude < 10.0 {
        format!("{value:.2}")
    } else if magnitude < 100.0 {
        format!("{value:.1}")
    } else if magnitude > 1_000.0 && !unit.is_empty() {
        return format!("{:.2} k{}", value * 0.001, unit);
    } else {
        format!("{}", value.round() as i64)
    };

    if unit.is_empty() {
        number
    } else {
        format!("{number} {unit}")
    }
}

/// A single parameter value shared between contexts.
///
/// Stored as f32 bits in an `AtomicU32`; one writer (control), one reader
/// (render), relaxed ordering.
#[derive(Debug)]
pub struct ParamCell(AtomicU32);

impl ParamCell {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Swaps in a new value and returns the previous one. Momentary
    /// triggers use `exchange(0.0)` so one write fires exactly once.
    pub fn exchange(&self, value: f32) -> f32 {
        f32::from_bits(self.0.swap(value.to_bits(), Ordering::Relaxed))
    }
}

/// The full parameter bank of one live module.
///
/// Cells are `Arc`-shared with the processor; cloning the set clones the
/// handles, not the values.
#[derive(Debug, Clone)]
pub struct ParamSet {
    specs: &'static [ParamSpec],
    cells: Vec<Arc<ParamCell>>,
}

impl ParamSet {
    pub fn new(specs: &'static [ParamSpec]) -> Self {
        let cells = specs
            .iter()
            .map(|spec| Arc::new(ParamCell::new(spec.default)))
            .collect();
        Self { specs, cells }
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    /// The shared cell for `id`. Factories call this for parameters they
    /// declared themselves, so a miss is a programmer error.
    pub fn cell(&self, id: &str) -> Arc<ParamCell> {
        let index = self
            .specs
            .iter()
            .position(|spec| spec.id == id)
            .unwrap_or_else(|| panic!("module declared no parameter {id:?}"));
        Arc::clone(&self.cells[index])
    }

    /// Sets a parameter, clamped to its declared range. Returns false when
    /// `id` is unknown.
    pub fn set(&self, id: &str, value: f32) -> bool {
        match self.specs.iter().position(|spec| spec.id == id) {
            Some(index) => {
                self.cells[index].set(self.specs[index].clamp(value));
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.specs
            .iter()
            .position(|spec| spec.id == id)
            .map(|index| self.cells[index].get())
    }

    /// Current (id, value) pairs, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.specs
            .iter()
            .zip(&self.cells)
            .map(|(spec, cell)| (spec.id, cell.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_buffer_set_len_keeps_channel_count() {
        let mut buffer = BlockBuffer::new(3, 512);
        buffer.set_len(128);
        assert_eq!(buffer.num_channels(), 3);
        assert_eq!(buffer.len(), 128);
        buffer.set_len(512);
        assert_eq!(buffer.len(), 512);
    }

    #[test]
    fn param_cell_exchange_consumes_trigger() {
        let cell = ParamCell::new(0.0);
        cell.set(1.0);
        assert!(cell.exchange(0.0) > 0.5);
        assert!(cell.exchange(0.0) < 0.5);
    }

    #[test]
    fn param_set_clamps_to_range() {
        static SPECS: [ParamSpec; 1] = [ParamSpec::float("gain", "Gain", -70.0, 12.0, 0.0)];
        let params = ParamSet::new(&SPECS);
        assert!(params.set("gain", 100.0));
        assert_eq!(params.get("gain"), Some(12.0));
        assert!(!params.set("nope", 1.0));
    }

    #[test]
    fn display_text_formats_by_kind() {
        static WAVES: [&str; 2] = ["Sine", "Triangle"];
        let freq = ParamSpec::float("freq", "Frequency", 20.0, 20_000.0, 1_000.0).with_unit("Hz");
        assert_eq!(freq.display_text(5_000.0), "5.00 kHz");
        assert_eq!(freq.display_text(440.0), "440 Hz");
        assert_eq!(freq.display_text(55.5), "55.5 Hz");

        let wave = ParamSpec::choice("wave", "Wave", &WAVES);
        assert_eq!(wave.display_text(1.0), "Triangle");

        let mode = ParamSpec::toggle("mode", "Mode", false);
        assert_eq!(mode.display_text(1.0), "On");
    }
}
