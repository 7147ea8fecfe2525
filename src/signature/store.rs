//! Flat `.freq` files: raw signature bytes, no header.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Signature;

pub const SIGNATURE_EXTENSION: &str = "freq";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to list {path}: {source}")]
    List {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} has no UTF-8 file name to store a signature under")]
    InvalidName(PathBuf),
    #[error("{first} and {second} would both be stored as '{name}'")]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

pub fn is_signature_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SIGNATURE_EXTENSION)
}

/// `<dir>/<name>.freq`
pub fn signature_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{SIGNATURE_EXTENSION}"))
}

pub fn write_signature(path: &Path, signature: &Signature) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, signature.as_bytes()).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a signature, dropping any trailing partial window.
pub fn read_signature(path: &Path, num_freqs: usize) -> Result<Signature, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let trailing = bytes.len() % num_freqs.max(1);
    if trailing != 0 {
        log::warn!(
            "{}: dropping {} trailing byte(s) of a partial window",
            path.display(),
            trailing
        );
    }
    Ok(Signature::from_bytes(bytes, num_freqs))
}

/// `.freq` files directly under `dir` as `(name, path)` pairs, sorted by name.
pub fn list_signatures(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let list_err = |source| StoreError::List {
        path: dir.to_path_buf(),
        source,
    };
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if !path.is_file() || !is_signature_file(&path) {
            continue;
        }
        if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
            found.push((name.to_string(), path.clone()));
        }
    }
    found.sort();
    Ok(found)
}

/// Pair each input file with the signature name (its file stem) it will be
/// stored under. Inputs that would overwrite each other are rejected.
pub fn signature_names(files: &[PathBuf]) -> Result<Vec<(String, &Path)>, StoreError> {
    let mut seen: BTreeMap<&str, &Path> = BTreeMap::new();
    let mut named = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StoreError::InvalidName(path.clone()))?;
        if let Some(first) = seen.insert(name, path) {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
                first: first.to_path_buf(),
                second: path.clone(),
            });
        }
        named.push((name.to_string(), path.as_path()));
    }
    Ok(named)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = signature_path(&dir.path().join("db"), "song");
        let sig = Signature::from_bytes(vec![3, 1, 4, 1, 5, 9, 2, 6], 4);

        write_signature(&path, &sig).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), sig.as_bytes());
        assert_eq!(read_signature(&path, 4).unwrap(), sig);
    }

    #[test]
    fn partial_trailing_window_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.freq");
        std::fs::write(&path, [1, 2, 3, 4, 5, 6, 7]).unwrap();

        let sig = read_signature(&path, 4).unwrap();
        assert_eq!(sig.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn lists_only_signature_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.freq"), [0; 4]).unwrap();
        std::fs::write(dir.path().join("a.freq"), [0; 4]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("c.freq")).unwrap();

        let names: Vec<String> = list_signatures(dir.path())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_signature(Path::new("/nonexistent/q.freq"), 4).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/q.freq"));
    }

    #[test]
    fn names_inputs_by_stem() {
        let files = vec![PathBuf::from("music/a.mp3"), PathBuf::from("music/b.wav")];
        let named = signature_names(&files).unwrap();
        assert_eq!(named[0], ("a".to_string(), Path::new("music/a.mp3")));
        assert_eq!(named[1].0, "b");
    }

    #[test]
    fn colliding_stems_are_rejected() {
        let files = vec![
            PathBuf::from("music/song.mp3"),
            PathBuf::from("music/other.flac"),
            PathBuf::from("music/song.wav"),
        ];
        match signature_names(&files).unwrap_err() {
            StoreError::DuplicateName { name, first, second } => {
                assert_eq!(name, "song");
                assert_eq!(first, PathBuf::from("music/song.mp3"));
                assert_eq!(second, PathBuf::from("music/song.wav"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
