//! Compressors as black-box complexity estimators.
//!
//! A [`Compressor`] reports how many bytes a general-purpose codec needs for
//! some input. The [`Oracle`] adds bounded retries on top of one backend and
//! derives the compressed-size triple that NCD is computed from. Backends
//! are looked up by name in a [`Registry`].

pub mod archive;
pub mod process;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Backend used when neither the command line nor the config names one.
pub const DEFAULT_BACKEND: &str = "zip-deflate";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("unknown compressor '{name}' (available: {available})")]
    UnknownBackend { name: String, available: String },

    #[error("compressor '{backend}' is unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("compressor '{backend}' timed out after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    #[error("compressor '{backend}' exited with {status}: {stderr}")]
    Failed {
        backend: String,
        status: String,
        stderr: String,
    },

    #[error("compressor '{backend}' I/O error: {source}")]
    Io {
        backend: String,
        source: std::io::Error,
    },

    #[error("compressor '{backend}' archive error: {message}")]
    Archive { backend: String, message: String },

    #[error("compressor '{backend}' produced no output")]
    EmptyOutput { backend: String },
}

impl OracleError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OracleError::Timeout { .. } | OracleError::Failed { .. } | OracleError::Io { .. }
        )
    }
}

/// A general-purpose codec measured by output size only.
///
/// Implementations must be re-entrant: the ranker calls them from many
/// threads at once.
pub trait Compressor: Send + Sync {
    fn name(&self) -> &str;

    /// Short human-readable description for listings.
    fn description(&self) -> String;

    /// Size in bytes of `data` once compressed.
    fn compressed_size(&self, data: &[u8]) -> Result<usize, OracleError>;

    /// Size in bytes of `x` followed by `y`, compressed as one stream.
    fn concat_size(&self, x: &[u8], y: &[u8]) -> Result<usize, OracleError> {
        let mut joined = Vec::with_capacity(x.len() + y.len());
        joined.extend_from_slice(x);
        joined.extend_from_slice(y);
        self.compressed_size(&joined)
    }
}

/// Compressed sizes of X, Y and X followed by Y.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CompressedSizes {
    pub cx: usize,
    pub cy: usize,
    pub cxy: usize,
}

impl CompressedSizes {
    /// `(C(xy) - min(C(x), C(y))) / max(C(x), C(y))`, or `None` when both sizes are zero.
    ///
    /// Codec framing can push the value slightly above 1 or keep identical
    /// inputs slightly above 0; the raw value is returned either way.
    pub fn ncd(&self) -> Option<f64> {
        let max = self.cx.max(self.cy);
        if max == 0 {
            return None;
        }
        let min = self.cx.min(self.cy);
        Some((self.cxy as f64 - min as f64) / max as f64)
    }
}

/// One compressor backend plus a retry budget for transient failures.
#[derive(Clone)]
pub struct Oracle {
    backend: Arc<dyn Compressor>,
    retries: u32,
}

impl Oracle {
    pub fn new(backend: Arc<dyn Compressor>) -> Self {
        Self {
            backend,
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn size(&self, x: &[u8]) -> Result<usize, OracleError> {
        self.retrying(|| self.backend.compressed_size(x))
    }

    pub fn concat_size(&self, x: &[u8], y: &[u8]) -> Result<usize, OracleError> {
        self.retrying(|| self.backend.concat_size(x, y))
    }

    pub fn sizes(&self, x: &[u8], y: &[u8]) -> Result<CompressedSizes, OracleError> {
        Ok(CompressedSizes {
            cx: self.size(x)?,
            cy: self.size(y)?,
            cxy: self.concat_size(x, y)?,
        })
    }

    pub fn ncd(&self, x: &[u8], y: &[u8]) -> Result<f64, OracleError> {
        self.sizes(x, y)?.ncd().ok_or_else(|| OracleError::EmptyOutput {
            backend: self.name().to_string(),
        })
    }

    fn retrying<T>(&self, op: impl Fn() -> Result<T, OracleError>) -> Result<T, OracleError> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!("{} (retry {}/{})", err, attempt, self.retries);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Name-keyed set of compressor backends.
#[derive(Clone, Default)]
pub struct Registry {
    backends: BTreeMap<String, Arc<dyn Compressor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-process zip codecs plus the usual command-line compressors.
    pub fn with_defaults(timeout: Duration) -> Self {
        let mut registry = Self::new();
        for backend in archive::ArchiveCompressor::all() {
            registry.register(Arc::new(backend));
        }
        for backend in process::ProcessCompressor::standard(timeout) {
            registry.register(Arc::new(backend));
        }
        registry
    }

    /// Add a backend, replacing any previous one with the same name.
    pub fn register(&mut self, backend: Arc<dyn Compressor>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn Compressor>> {
        self.backends.values()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Compressor>, OracleError> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| OracleError::UnknownBackend {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn oracle(&self, name: &str, retries: u32) -> Result<Oracle, OracleError> {
        Ok(Oracle::new(self.resolve(name)?).with_retries(retries))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashSet;

    /// Deterministic stand-in codec: one byte per distinct byte pair, plus one.
    ///
    /// Repeating an input adds at most one new pair, so self-distance stays
    /// near zero while inputs over disjoint alphabets score near one.
    pub struct BigramCompressor;

    impl Compressor for BigramCompressor {
        fn name(&self) -> &str {
            "bigram"
        }

        fn description(&self) -> String {
            "distinct byte pairs".into()
        }

        fn compressed_size(&self, data: &[u8]) -> Result<usize, OracleError> {
            let pairs: HashSet<(u8, u8)> = data.windows(2).map(|w| (w[0], w[1])).collect();
            Ok(pairs.len() + 1)
        }
    }
}
