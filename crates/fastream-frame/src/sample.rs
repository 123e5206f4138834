use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Axes recorded per channel.
pub const AXES: usize = 2;

/// Bytes per value on the wire.
pub const VALUE_SIZE: usize = 4;

/// Bytes per channel per sample (one value for each axis).
pub const CHANNEL_RECORD_SIZE: usize = AXES * VALUE_SIZE;

/// Position axis of a channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal (primary) position, index 0.
    Horizontal = 0,
    /// Vertical (secondary) position, index 1.
    Vertical = 1,
}

impl Axis {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Bytes needed for `samples` samples of `channels` channels.
pub fn block_len(samples: usize, channels: usize) -> Option<usize> {
    samples
        .checked_mul(channels)?
        .checked_mul(CHANNEL_RECORD_SIZE)
}

/// A decoded block of samples, shape `[samples, channels, 2]`.
///
/// Wraps the received bytes without copying; values are little-endian `i32`
/// laid out sample-major, then channel in ascending id order, then axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    data: Bytes,
    samples: usize,
    channels: usize,
}

impl SampleBlock {
    /// Interpret `data` as `samples` × `channels` × 2 values.
    ///
    /// Fails with [`FrameError::Decode`] unless the length is exactly
    /// `8 * samples * channels`.
    pub fn decode(data: Bytes, samples: usize, channels: usize) -> Result<Self> {
        let expected = block_len(samples, channels).ok_or(FrameError::Decode {
            expected: usize::MAX,
            actual: data.len(),
        })?;
        if data.len() != expected {
            return Err(FrameError::Decode {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            samples,
            channels,
        })
    }

    /// `[samples, channels, 2]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.samples, self.channels, AXES]
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One value, or `None` if the index is outside the block.
    pub fn get(&self, sample: usize, channel: usize, axis: Axis) -> Option<i32> {
        if sample >= self.samples || channel >= self.channels {
            return None;
        }
        let index = (sample * self.channels + channel) * AXES + axis.index();
        Some(self.value_at(index))
    }

    /// `(horizontal, vertical)` for one channel of one sample.
    pub fn xy(&self, sample: usize, channel: usize) -> Option<(i32, i32)> {
        Some((
            self.get(sample, channel, Axis::Horizontal)?,
            self.get(sample, channel, Axis::Vertical)?,
        ))
    }

    /// One sample as a `[1, channels, 2]` block sharing this block's buffer.
    pub fn sample(&self, n: usize) -> Option<SampleBlock> {
        if n >= self.samples {
            return None;
        }
        let row = self.channels * CHANNEL_RECORD_SIZE;
        Some(Self {
            data: self.data.slice(n * row..(n + 1) * row),
            samples: 1,
            channels: self.channels,
        })
    }

    /// Every value in logical order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.data
            .chunks_exact(VALUE_SIZE)
            .map(|raw| i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// The waveform of one channel axis across all samples.
    pub fn column(&self, channel: usize, axis: Axis) -> Option<Vec<i32>> {
        if channel >= self.channels {
            return None;
        }
        Some(
            (0..self.samples)
                .map(|s| self.value_at((s * self.channels + channel) * AXES + axis.index()))
                .collect(),
        )
    }

    /// Copy all values out in logical order.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }

    /// The raw little-endian bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    fn value_at(&self, index: usize) -> i32 {
        let at = index * VALUE_SIZE;
        let raw = &self.data[at..at + VALUE_SIZE];
        i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
    }
}
