use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::{Compressor, OracleError};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const STDERR_EXCERPT: usize = 200;

/// Command-line compressor fed on stdin; its stdout length is the size.
///
/// Every call spawns a fresh process, so calls never share state. A call
/// that outlives `timeout` has its process killed.
pub struct ProcessCompressor {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessCompressor {
    pub fn new(name: &str, program: &str, args: &[&str], timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }

    pub fn standard(timeout: Duration) -> Vec<Self> {
        vec![
            Self::new("gzip", "gzip", &["-c", "-9"], timeout),
            Self::new("bzip2", "bzip2", &["-c", "-9"], timeout),
            Self::new("lzma", "lzma", &["-c", "-9"], timeout),
            Self::new("xz", "xz", &["-c", "-9"], timeout),
            Self::new("zstd", "zstd", &["-c", "-19", "-q"], timeout),
        ]
    }

    fn io_err(&self, source: std::io::Error) -> OracleError {
        OracleError::Io {
            backend: self.name.clone(),
            source,
        }
    }

    fn spawn(&self) -> Result<Child, OracleError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OracleError::Unavailable {
                        backend: self.name.clone(),
                        reason: format!("'{}' not found on PATH", self.program),
                    }
                } else {
                    self.io_err(e)
                }
            })
    }
}

impl Compressor for ProcessCompressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("external: {} {}", self.program, self.args.join(" "))
    }

    fn compressed_size(&self, data: &[u8]) -> Result<usize, OracleError> {
        let mut child = self.spawn()?;
        let missing = |stream: &str| {
            self.io_err(std::io::Error::other(format!("{stream} not captured")))
        };
        let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (status, written, size, err_text) = std::thread::scope(|s| {
            let writer = s.spawn(move || {
                let result = stdin.write_all(data);
                drop(stdin);
                result
            });
            let reader = s.spawn(move || std::io::copy(&mut stdout, &mut std::io::sink()));
            let err_reader = s.spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            });

            let status = wait_with_deadline(&mut child, self.timeout);
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            let size = reader
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdout reader panicked")));
            let err_text = err_reader.join().unwrap_or_default();
            (status, written, size, err_text)
        });

        let status = match status.map_err(|e| self.io_err(e))? {
            Some(status) => status,
            None => {
                return Err(OracleError::Timeout {
                    backend: self.name.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if !status.success() {
            let stderr: String = err_text.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(OracleError::Failed {
                backend: self.name.clone(),
                status: status.to_string(),
                stderr,
            });
        }
        written.map_err(|e| self.io_err(e))?;
        let size = size.map_err(|e| self.io_err(e))? as usize;
        if size == 0 {
            return Err(OracleError::EmptyOutput {
                backend: self.name.clone(),
            });
        }

        log::trace!("{}: {} -> {} bytes", self.name, data.len(), size);
        Ok(size)
    }
}

/// Wait for `child`, killing it once `timeout` has elapsed. `None` means it was killed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::oracle::Oracle;
    use std::sync::Arc;

    #[test]
    fn passthrough_program_reports_input_length() {
        let cat = ProcessCompressor::new("cat", "cat", &[], Duration::from_secs(10));
        let data = vec![42u8; 100_000];
        assert_eq!(cat.compressed_size(&data).unwrap(), 100_000);
        assert_eq!(cat.concat_size(b"abc", b"de").unwrap(), 5);
    }

    #[test]
    fn missing_program_is_unavailable() {
        let ghost = ProcessCompressor::new("ghost", "sonid-no-such-compressor", &[], Duration::from_secs(1));
        let err = ghost.compressed_size(b"abc").unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn non_zero_exit_is_a_failure() {
        let fail = ProcessCompressor::new("false", "false", &[], Duration::from_secs(10));
        let err = fail.compressed_size(b"abc").unwrap_err();
        assert!(matches!(err, OracleError::Failed { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn hung_process_is_killed() {
        let slow = ProcessCompressor::new("sleep", "sleep", &["5"], Duration::from_millis(100));
        let started = Instant::now();
        let err = slow.compressed_size(b"abc").unwrap_err();
        assert!(matches!(err, OracleError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn self_distance_is_small_for_every_installed_backend() {
        let mut state = 7u32;
        let x: Vec<u8> = (0..4000)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 26) as u8
            })
            .collect();
        let y: Vec<u8> = x.iter().rev().map(|b| b ^ 0x15).collect();

        for backend in ProcessCompressor::standard(Duration::from_secs(30)) {
            let name = backend.name().to_string();
            let oracle = Oracle::new(Arc::new(backend));
            let same = match oracle.ncd(&x, &x) {
                Ok(ncd) => ncd,
                Err(OracleError::Unavailable { .. }) => {
                    eprintln!("{name} not installed, skipping");
                    continue;
                }
                Err(err) => panic!("{name}: {err}"),
            };
            let different = oracle.ncd(&x, &y).unwrap();
            assert!(same < 0.35, "{name}: ncd(x, x) = {same}");
            assert!(same < different, "{name}: {same} >= {different}");
            assert!(different <= 1.1, "{name}: ncd(x, y) = {different}");
        }
    }
}
