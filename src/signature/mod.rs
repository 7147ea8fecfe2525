//! Spectral signatures: the N dominant FFT bins of each analysis window,
//! one byte per bin, in window order.

pub mod encode;
pub mod params;
pub mod spectrum;
pub mod store;
pub mod window;

use rayon::prelude::*;

use crate::audio::pcm::PcmBuffer;
use encode::encode_top_bins;
use params::{ParamsError, SignatureParams};
use spectrum::SpectralAnalyzer;
use window::WindowSampler;

/// Byte signature of a track or segment.
///
/// Always a whole number of `num_freqs`-byte windows. An empty signature
/// means the audio was shorter than one window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
    num_freqs: usize,
}

impl Signature {
    /// Wrap raw signature bytes, dropping a trailing partial window.
    pub fn from_bytes(mut bytes: Vec<u8>, num_freqs: usize) -> Self {
        let num_freqs = num_freqs.max(1);
        bytes.truncate(bytes.len() - bytes.len() % num_freqs);
        Self { bytes, num_freqs }
    }

    pub fn empty(num_freqs: usize) -> Self {
        Self::from_bytes(Vec::new(), num_freqs)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn num_freqs(&self) -> usize {
        self.num_freqs
    }

    pub fn window_count(&self) -> usize {
        self.bytes.len() / self.num_freqs
    }

    /// Bins selected for window `n`, strongest first.
    pub fn window(&self, n: usize) -> Option<&[u8]> {
        self.bytes.chunks_exact(self.num_freqs).nth(n)
    }
}

/// Run the sampler, analyzer and encoder over `pcm`.
///
/// Windows are analysed in parallel; the output keeps window order so the
/// same input always yields the same bytes.
pub fn extract(pcm: &PcmBuffer, params: &SignatureParams) -> Result<Signature, ParamsError> {
    let sampler = WindowSampler::new(pcm, *params)?;
    let count = sampler.count();
    if count == 0 {
        log::warn!(
            "Audio has {} frames, fewer than one window ({}); signature is empty",
            pcm.frames(),
            params.window_frames()
        );
        return Ok(Signature::empty(params.num_freqs));
    }

    log::debug!(
        "Extracting {} windows (ws={}, sh={}, ds={}, nf={})",
        count,
        params.window_size,
        params.shift,
        params.downsampling,
        params.num_freqs
    );

    let per_window: Vec<Vec<u8>> = (0..count)
        .into_par_iter()
        .map_init(
            || {
                (
                    SpectralAnalyzer::new(params.window_size),
                    vec![0.0f64; params.window_size],
                    Vec::<f64>::with_capacity(params.bins()),
                    Vec::<usize>::with_capacity(params.bins()),
                )
            },
            |(analyzer, window, power, order), n| {
                sampler.fill(n, window);
                analyzer.power_spectrum(window, power);
                let mut bytes = Vec::with_capacity(params.num_freqs);
                encode_top_bins(power, params.num_freqs, order, &mut bytes);
                bytes
            },
        )
        .collect();

    Ok(Signature::from_bytes(per_window.concat(), params.num_freqs))
}
