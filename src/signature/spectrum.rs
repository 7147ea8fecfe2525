use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Forward FFT power spectrum over a rectangular window.
///
/// Holds its plan and scratch buffers so one analyzer can process many
/// windows of the same length without reallocating.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl SpectralAnalyzer {
    pub fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); window_size],
            scratch,
        }
    }

    /// Write `re^2 + im^2` for the first `window.len() / 2` bins into `power`.
    pub fn power_spectrum(&mut self, window: &[f64], power: &mut Vec<f64>) {
        debug_assert_eq!(window.len(), self.buffer.len());

        for (slot, &s) in self.buffer.iter_mut().zip(window) {
            *slot = Complex::new(s, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let half = self.buffer.len() / 2;
        power.clear();
        power.extend(self.buffer[..half].iter().map(|c| c.norm_sqr()));
    }
}
