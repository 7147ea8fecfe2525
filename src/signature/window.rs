use crate::audio::pcm::PcmBuffer;

use super::params::{ParamsError, SignatureParams};

/// Slices a PCM buffer into mono, block-summed analysis windows.
///
/// Window `n` starts at frame `n * shift * downsampling`; sample `k` is the sum
/// of every channel over `downsampling` consecutive frames. The decimation
/// has no low-pass filter.
pub struct WindowSampler<'a> {
    pcm: &'a PcmBuffer,
    params: SignatureParams,
    count: usize,
}

impl<'a> WindowSampler<'a> {
    pub fn new(pcm: &'a PcmBuffer, params: SignatureParams) -> Result<Self, ParamsError> {
        params.validate()?;
        let count = params.window_count(pcm.frames());
        Ok(Self { pcm, params, count })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Fill `out` (length `window_size`) with window `n`.
    pub fn fill(&self, n: usize, out: &mut [f64]) {
        debug_assert!(n < self.count);
        debug_assert_eq!(out.len(), self.params.window_size);

        let ds = self.params.downsampling;
        let start = n * self.params.hop_frames();
        for (k, slot) in out.iter_mut().enumerate() {
            let first = start + k * ds;
            let sum: i64 = (first..first + ds)
                .map(|frame| self.pcm.frame_sum(frame) as i64)
                .sum();
            *slot = sum as f64;
        }
    }

    /// Window `n` as a freshly allocated vector.
    pub fn window(&self, n: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.params.window_size];
        self.fill(n, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> PcmBuffer {
        let left: Vec<i16> = (0..frames as i16).collect();
        let right = vec![1i16; frames];
        PcmBuffer::from_channels(&left, &right).unwrap()
    }

    #[test]
    fn block_sums_channels_and_frames() {
        let pcm = ramp(64);
        let params = SignatureParams {
            window_size: 4,
            shift: 2,
            downsampling: 2,
            num_freqs: 1,
        };
        let sampler = WindowSampler::new(&pcm, params).unwrap();
        assert_eq!(sampler.count(), params.window_count(64));

        // window 0, sample 0: frames 0 and 1 -> (0 + 1) + (1 + 1)
        // window 1 starts at frame 4
        assert_eq!(sampler.window(0), vec![3.0, 7.0, 11.0, 15.0]);
        assert_eq!(sampler.window(1), vec![11.0, 15.0, 19.0, 23.0]);
    }

    #[test]
    fn last_window_stays_in_bounds() {
        let pcm = ramp(100);
        let params = SignatureParams {
            window_size: 8,
            shift: 3,
            downsampling: 3,
            num_freqs: 1,
        };
        let sampler = WindowSampler::new(&pcm, params).unwrap();
        // (100 - 24) / 9 + 1
        assert_eq!(sampler.count(), 9);
        let last = sampler.window(sampler.count() - 1);
        assert_eq!(last.len(), 8);
    }

    #[test]
    fn short_buffer_yields_no_windows() {
        let pcm = ramp(10);
        let sampler = WindowSampler::new(&pcm, SignatureParams::default()).unwrap();
        assert_eq!(sampler.count(), 0);
    }

    #[test]
    fn rejects_invalid_params() {
        let pcm = ramp(64);
        let zero_shift = SignatureParams {
            shift: 0,
            ..SignatureParams::default()
        };
        assert!(matches!(
            WindowSampler::new(&pcm, zero_shift),
            Err(ParamsError::Shift { shift: 0, .. })
        ));
        let zero_ds = SignatureParams {
            downsampling: 0,
            ..SignatureParams::default()
        };
        assert!(matches!(
            WindowSampler::new(&pcm, zero_ds),
            Err(ParamsError::Downsampling(0))
        ));
    }
}
