//! Audio identification by normalized compression distance (NCD).
//!
//! Tracks are reduced to spectral signatures, the dominant FFT bins of
//! each analysis window packed into bytes. A query is identified by
//! compressing it against every database signature with a general-purpose
//! compressor and ranking the entries by NCD.

pub mod audio;
pub mod config;
pub mod identify;
pub mod oracle;
pub mod signature;
