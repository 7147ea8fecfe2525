use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("window size must be at least 2, got {0}")]
    WindowSize(usize),
    #[error("shift must be between 1 and the window size ({window_size}), got {shift}")]
    Shift { shift: usize, window_size: usize },
    #[error("down-sampling factor must be at least 1, got {0}")]
    Downsampling(usize),
    #[error("frequency count must be between 1 and {max}, got {num_freqs}")]
    NumFreqs { num_freqs: usize, max: usize },
}

/// Slicing and selection knobs for signature extraction.
///
/// Database and query signatures are only comparable when they were produced
/// with the same parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureParams {
    /// FFT length, in down-sampled samples.
    pub window_size: usize,
    /// Window advance, in down-sampled samples.
    pub shift: usize,
    /// Number of consecutive frames block-summed into one sample.
    pub downsampling: usize,
    /// Dominant bins kept per window.
    pub num_freqs: usize,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            window_size: 1024,
            shift: 256,
            downsampling: 4,
            num_freqs: 4,
        }
    }
}

impl SignatureParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.window_size < 2 {
            return Err(ParamsError::WindowSize(self.window_size));
        }
        if self.shift == 0 || self.shift > self.window_size {
            return Err(ParamsError::Shift {
                shift: self.shift,
                window_size: self.window_size,
            });
        }
        if self.downsampling == 0 {
            return Err(ParamsError::Downsampling(self.downsampling));
        }
        let max = self.window_size / 2;
        if self.num_freqs == 0 || self.num_freqs > max {
            return Err(ParamsError::NumFreqs {
                num_freqs: self.num_freqs,
                max,
            });
        }
        Ok(())
    }

    /// Number of power-spectrum bins per window.
    pub fn bins(&self) -> usize {
        self.window_size / 2
    }

    /// PCM frames spanned by one window.
    pub fn window_frames(&self) -> usize {
        self.window_size * self.downsampling
    }

    /// PCM frames between the starts of consecutive windows.
    pub fn hop_frames(&self) -> usize {
        self.shift * self.downsampling
    }

    /// Whole windows that fit in `total_frames`; zero when the hop is zero.
    pub fn window_count(&self, total_frames: usize) -> usize {
        if total_frames < self.window_frames() {
            return 0;
        }
        (total_frames - self.window_frames())
            .checked_div(self.hop_frames())
            .map_or(0, |n| n + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(window_size: usize, shift: usize, downsampling: usize, num_freqs: usize) -> SignatureParams {
        SignatureParams {
            window_size,
            shift,
            downsampling,
            num_freqs,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SignatureParams::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_knobs() {
        assert_eq!(params(1, 1, 1, 1).validate(), Err(ParamsError::WindowSize(1)));
        assert!(matches!(params(8, 0, 1, 1).validate(), Err(ParamsError::Shift { .. })));
        assert!(matches!(params(8, 9, 1, 1).validate(), Err(ParamsError::Shift { .. })));
        assert_eq!(params(8, 2, 0, 1).validate(), Err(ParamsError::Downsampling(0)));
        assert_eq!(
            params(8, 2, 1, 5).validate(),
            Err(ParamsError::NumFreqs { num_freqs: 5, max: 4 })
        );
        assert!(matches!(params(8, 2, 1, 0).validate(), Err(ParamsError::NumFreqs { .. })));
    }

    #[test]
    fn window_count_matches_reference_scenario() {
        let p = params(1024, 256, 1, 4);
        assert_eq!(p.window_count(4096), 13);
        assert_eq!(p.window_count(1024), 1);
        assert_eq!(p.window_count(1023), 0);
    }

    #[test]
    fn window_count_accounts_for_downsampling() {
        let p = params(1024, 256, 4, 4);
        assert_eq!(p.window_count(4096), 1);
        assert_eq!(p.window_count(4096 + 1023), 1);
        assert_eq!(p.window_count(4096 + 1024), 2);
    }

    #[test]
    fn window_count_with_zero_hop_is_zero() {
        assert_eq!(params(1024, 0, 4, 4).window_count(1 << 20), 0);
        assert_eq!(params(1024, 256, 0, 4).window_count(1 << 20), 0);
    }
}
