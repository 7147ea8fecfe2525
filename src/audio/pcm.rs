use super::AudioError;

/// Channel layout and sample rate the signature pipeline accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmFormat {
    /// CD audio: stereo at 44.1 kHz.
    pub const REFERENCE: PcmFormat = PcmFormat {
        channels: 2,
        sample_rate: 44_100,
    };

    pub fn check(&self, channels: u16, sample_rate: u32) -> Result<(), AudioError> {
        if channels != self.channels || sample_rate != self.sample_rate {
            return Err(AudioError::UnsupportedFormat {
                channels,
                sample_rate,
                expected_channels: self.channels,
                expected_rate: self.sample_rate,
            });
        }
        Ok(())
    }
}

/// Interleaved 16-bit PCM, read-only once built.
#[derive(Clone, Debug)]
pub struct PcmBuffer {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Build a buffer, rejecting anything that does not match `format` or holds no frames.
    pub fn new(
        samples: Vec<i16>,
        channels: u16,
        sample_rate: u32,
        format: PcmFormat,
    ) -> Result<Self, AudioError> {
        format.check(channels, sample_rate)?;
        if samples.len() < channels as usize {
            return Err(AudioError::Empty);
        }
        let mut samples = samples;
        // Drop a dangling partial frame rather than reading past it later.
        samples.truncate(samples.len() - samples.len() % channels as usize);
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Stereo buffer at the reference rate from separate channel slices.
    pub fn from_channels(left: &[i16], right: &[i16]) -> Result<Self, AudioError> {
        let samples = left
            .iter()
            .zip(right.iter())
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        Self::new(
            samples,
            PcmFormat::REFERENCE.channels,
            PcmFormat::REFERENCE.sample_rate,
            PcmFormat::REFERENCE,
        )
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sum of all channels at `frame`, widened so stereo peaks cannot overflow.
    pub fn frame_sum(&self, frame: usize) -> i32 {
        let start = frame * self.channels as usize;
        self.samples[start..start + self.channels as usize]
            .iter()
            .map(|&s| s as i32)
            .sum()
    }

    /// Copy out `len` frames starting at `start`, clamped to the buffer end.
    pub fn segment(&self, start: usize, len: usize) -> Result<PcmBuffer, AudioError> {
        let start = start.min(self.frames());
        let end = start.saturating_add(len).min(self.frames());
        let ch = self.channels as usize;
        if start == end {
            return Err(AudioError::Empty);
        }
        Ok(PcmBuffer {
            samples: self.samples[start * ch..end * ch].to_vec(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        })
    }
}
