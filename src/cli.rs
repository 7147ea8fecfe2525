use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use sonid::identify::FailurePolicy;
use sonid::signature::params::SignatureParams;

#[derive(Parser, Debug)]
#[command(name = "sonid", about = "Identify audio clips by normalized compression distance")]
pub struct Cli {
    /// Config file (defaults to ./sonid.toml, then the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the database signatures
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(flatten)]
    pub signature: SignatureArgs,

    /// Timeout for one external compressor call, in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Retries for a failed external compressor call
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the signature extraction knobs.
#[derive(Args, Debug, Default)]
pub struct SignatureArgs {
    /// FFT window size
    #[arg(long, global = true)]
    pub window_size: Option<usize>,

    /// Window shift
    #[arg(long, global = true)]
    pub shift: Option<usize>,

    /// Down-sampling factor
    #[arg(long, global = true)]
    pub downsampling: Option<usize>,

    /// Dominant frequencies kept per window
    #[arg(long, global = true)]
    pub num_freqs: Option<usize>,
}

impl SignatureArgs {
    pub fn apply(&self, base: SignatureParams) -> SignatureParams {
        SignatureParams {
            window_size: self.window_size.unwrap_or(base.window_size),
            shift: self.shift.unwrap_or(base.shift),
            downsampling: self.downsampling.unwrap_or(base.downsampling),
            num_freqs: self.num_freqs.unwrap_or(base.num_freqs),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the signature of an audio file (or a segment of it)
    Extract {
        /// Input audio file (WAV, FLAC, MP3, OGG), stereo 44.1 kHz
        input: PathBuf,

        /// Output signature file (default: input with .freq extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Segment start, in seconds
        #[arg(long)]
        offset: Option<f64>,

        /// Segment length, in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Compute signatures for every audio file in a directory into the database
    BuildDb {
        /// Directory containing audio files
        dir: PathBuf,
    },

    /// Rank the database against a query (.freq signature or audio file)
    Identify {
        query: PathBuf,

        /// Compressor backend
        #[arg(short, long)]
        compressor: Option<String>,

        /// Number of candidates to show
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
        num_results: Option<u64>,

        /// What to do when one comparison fails
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// NCD between two signatures (or audio files) for one or more compressors
    Compare {
        a: PathBuf,
        b: PathBuf,

        /// Compressor backends (comma-separated; default: all)
        #[arg(short, long, value_delimiter = ',')]
        compressor: Vec<String>,
    },

    /// List the available compressor backends
    Compressors,

    /// Top-1 accuracy over labelled segments named <track>_<tag>.freq
    ///
    /// The track is everything before the last underscore, so tags must not contain one.
    Evaluate {
        /// Directory of segment signatures
        dir: PathBuf,

        /// Compressor backends (comma-separated; default: the configured one)
        #[arg(short, long, value_delimiter = ',')]
        compressor: Vec<String>,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identify_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "sonid", "identify", "q.freq", "-c", "xz", "-n", "3", "--on-failure", "abort",
            "--num-freqs", "8", "--database", "db",
        ])
        .unwrap();
        assert_eq!(cli.signature.num_freqs, Some(8));
        assert_eq!(cli.database, Some(PathBuf::from("db")));
        match cli.command {
            Command::Identify {
                query,
                compressor,
                num_results,
                on_failure,
                json,
            } => {
                assert_eq!(query, PathBuf::from("q.freq"));
                assert_eq!(compressor.as_deref(), Some("xz"));
                assert_eq!(num_results, Some(3));
                assert_eq!(on_failure, Some(FailurePolicy::Abort));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_results() {
        assert!(Cli::try_parse_from(["sonid", "identify", "q.freq", "-n", "0"]).is_err());
    }

    #[test]
    fn compressor_lists_split_on_commas() {
        let cli = Cli::try_parse_from(["sonid", "evaluate", "segs", "-c", "gzip,zip-zstd"]).unwrap();
        match cli.command {
            Command::Evaluate { compressor, .. } => assert_eq!(compressor, vec!["gzip", "zip-zstd"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn signature_args_override_base() {
        let args = SignatureArgs {
            shift: Some(128),
            ..Default::default()
        };
        let params = args.apply(SignatureParams::default());
        assert_eq!(params.shift, 128);
        assert_eq!(params.window_size, 1024);
    }
}
