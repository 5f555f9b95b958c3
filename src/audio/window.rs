use crate::error::{Result, TuneError};

/// Rolling window of the last `frame_size * frames` samples.
///
/// Stored as a ring of whole frames: `head` is the index of the oldest sample
/// and always sits on a frame boundary, so a push never has to split a block.
#[derive(Debug)]
pub struct SampleWindow {
    data: Vec<i16>,
    frame_size: usize,
    head: usize,
    pushed: usize,
}

impl SampleWindow {
    pub fn new(frame_size: usize, frames: usize) -> Self {
        Self {
            data: vec![0; frame_size * frames],
            frame_size,
            head: 0,
            pushed: 0,
        }
    }

    /// Append one block, dropping the oldest `frame_size` samples.
    pub fn push(&mut self, block: &[i16]) -> Result<()> {
        if block.len() != self.frame_size {
            return Err(TuneError::InvalidInput {
                expected: self.frame_size,
                actual: block.len(),
            });
        }

        let start = self.head;
        self.data[start..start + self.frame_size].copy_from_slice(block);
        self.head = (self.head + self.frame_size) % self.data.len();
        self.pushed = self.pushed.saturating_add(1);
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// True once enough blocks have arrived to fill the window.
    pub fn is_warm(&self) -> bool {
        self.pushed * self.frame_size >= self.data.len()
    }

    /// Samples oldest first.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.data[self.head..]
            .iter()
            .chain(self.data[..self.head].iter())
            .copied()
    }

    pub fn as_float_samples(&self) -> Vec<f32> {
        self.samples().map(f32::from).collect()
    }

    pub fn peak_amplitude(&self) -> u16 {
        self.data.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
    }
}
