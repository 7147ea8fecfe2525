use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{Compressor, OracleError};

/// In-process codec: writes the input as a single zip entry and reports the
/// entry's compressed size, so archive headers never count.
pub struct ArchiveCompressor {
    name: &'static str,
    method: CompressionMethod,
    level: Option<i32>,
}

impl ArchiveCompressor {
    pub fn deflate() -> Self {
        Self {
            name: "zip-deflate",
            method: CompressionMethod::Deflated,
            level: Some(9),
        }
    }

    pub fn bzip2() -> Self {
        Self {
            name: "zip-bzip2",
            method: CompressionMethod::Bzip2,
            level: Some(9),
        }
    }

    pub fn zstd() -> Self {
        Self {
            name: "zip-zstd",
            method: CompressionMethod::Zstd,
            level: Some(19),
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::deflate(), Self::bzip2(), Self::zstd()]
    }

    fn archive_err(&self, err: impl std::fmt::Display) -> OracleError {
        OracleError::Archive {
            backend: self.name.to_string(),
            message: err.to_string(),
        }
    }
}

impl Compressor for ArchiveCompressor {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> String {
        format!("in-process {:?} (level {:?})", self.method, self.level.unwrap_or_default())
    }

    fn compressed_size(&self, data: &[u8]) -> Result<usize, OracleError> {
        let options = FileOptions::default()
            .compression_method(self.method)
            .compression_level(self.level);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("signature", options)
            .map_err(|e| self.archive_err(e))?;
        writer.write_all(data).map_err(|source| OracleError::Io {
            backend: self.name.to_string(),
            source,
        })?;
        let cursor = writer.finish().map_err(|e| self.archive_err(e))?;

        let mut archive = ZipArchive::new(cursor).map_err(|e| self.archive_err(e))?;
        let entry = archive.by_index(0).map_err(|e| self.archive_err(e))?;
        Ok(entry.compressed_size() as usize)
    }
}
