//! Ring-buffer delay line with integer and fractional reads.

use super::lerp;

/// A resizable circular delay line.
///
/// `push` overwrites the least recently added sample; `get(n)` reads the
/// sample written `n` pushes ago. `get_interpolated` reads a fractional
/// delay with linear interpolation, which is what the waveguide string
/// uses to tune between integer sample periods.
#[derive(Debug, Default, Clone)]
pub struct DelayLine {
    data: Vec<f32>,
    least_recent: usize,
}

impl DelayLine {
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
            least_recent: 0,
        }
    }

    /// Zero-fills the line without changing its length.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resizes the line, zero-filling it and resetting the write position.
    pub fn resize(&mut self, new_len: usize) {
        self.data.clear();
        self.data.resize(new_len, 0.0);
        self.least_recent = 0;
    }

    /// The least recently written sample.
    pub fn back(&self) -> f32 {
        self.data[self.least_recent]
    }

    /// Reads the sample `delay_in_samples` pushes in the past.
    pub fn get(&self, delay_in_samples: usize) -> f32 {
        debug_assert!(delay_in_samples < self.len());
        self.data[(self.least_recent + 1 + delay_in_samples) % self.len()]
    }

    /// Fractional-delay read with linear interpolation.
    pub fn get_interpolated(&self, delay_in_samples: f32) -> f32 {
        debug_assert!(delay_in_samples >= 0.0 && delay_in_samples < self.len() as f32);

        let position = (self.least_recent + 1) as f32 + delay_in_samples;
        let low_index = position.floor();
        let index = low_index as usize;

        lerp(
            self.data[index % self.len()],
            self.data[(index + 1) % self.len()],
            position - low_index,
        )
    }

    /// Overwrites the sample `delay_in_samples` pushes in the past.
    pub fn set(&mut self, delay_in_samples: usize, value: f32) {
        debug_assert!(delay_in_samples < self.len());
        let index = (self.least_recent + 1 + delay_in_samples) % self.len();
        self.data[index] = value;
    }

    /// Adds a new sample, overwriting the least recently added one.
    pub fn push(&mut self, value: f32) {
        self.data[self.least_recent] = value;
        self.least_recent = if self.least_recent == 0 {
            self.len() - 1
        } else {
            self.least_recent - 1
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_get_recovers_history() {
        let mut line = DelayLine::new(8);
        for v in 1..=8 {
            line.push(v as f32);
        }
        // get(0) is the most recent push, get(7) the oldest
        assert_eq!(line.get(0), 8.0);
        assert_eq!(line.get(3), 5.0);
        assert_eq!(line.get(7), 1.0);
    }

    #[test]
    fn interpolated_read_sits_between_neighbours() {
        let mut line = DelayLine::new(8);
        for v in 1..=8 {
            line.push(v as f32);
        }
        let mid = line.get_interpolated(2.5);
        assert!(mid > line.get(2).min(line.get(3)));
        assert!(mid < line.get(2).max(line.get(3)));
    }

    #[test]
    fn clear_zero_fills() {
        let mut line = DelayLine::new(4);
        line.push(1.0);
        line.clear();
        for i in 0..4 {
            assert_eq!(line.get(i.min(3)), 0.0);
        }
    }

    #[test]
    fn resize_resets_state() {
        let mut line = DelayLine::new(4);
        line.push(1.0);
        line.resize(16);
        assert_eq!(line.len(), 16);
        assert_eq!(line.back(), 0.0);
    }
}
