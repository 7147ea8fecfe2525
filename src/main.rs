mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, Command};
use sonid::audio::decode::{decode_audio, is_audio_file};
use sonid::audio::pcm::PcmFormat;
use sonid::config::{self, Config};
use sonid::identify::evaluate::{self, BackendReport};
use sonid::identify::{Database, FailurePolicy, RankedResult, Ranker};
use sonid::oracle::Registry;
use sonid::signature::params::SignatureParams;
use sonid::signature::{self, store, Signature};

/// Effective settings after merging built-in defaults, the config file and the command line.
struct Settings {
    params: SignatureParams,
    database: PathBuf,
    compressor: String,
    top_k: usize,
    on_failure: FailurePolicy,
    timeout: Duration,
    retries: u32,
}

impl Settings {
    fn resolve(cli: &Cli, cfg: Config) -> Self {
        Self {
            params: cli.signature.apply(cfg.signature),
            database: cli.database.clone().unwrap_or(cfg.database.dir),
            compressor: cfg.identify.compressor,
            top_k: cfg.identify.top_k,
            on_failure: cfg.identify.on_failure,
            timeout: Duration::from_secs(cli.timeout.unwrap_or(cfg.identify.timeout_secs)),
            retries: cli.retries.unwrap_or(cfg.identify.retries),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    let settings = Settings::resolve(&cli, cfg);
    settings
        .params
        .validate()
        .context("Invalid signature parameters")?;
    let registry = Registry::with_defaults(settings.timeout);

    match &cli.command {
        Command::Extract {
            input,
            output,
            offset,
            duration,
        } => cmd_extract(&settings, input, output.as_deref(), *offset, *duration),
        Command::BuildDb { dir } => cmd_build_db(&settings, dir),
        Command::Identify {
            query,
            compressor,
            num_results,
            on_failure,
            json,
        } => {
            let compressor = compressor.as_deref().unwrap_or(&settings.compressor);
            let k = num_results.map_or(settings.top_k, |n| n as usize);
            let policy = on_failure.unwrap_or(settings.on_failure);
            cmd_identify(&settings, &registry, query, compressor, k, policy, *json)
        }
        Command::Compare { a, b, compressor } => cmd_compare(&settings, &registry, a, b, compressor),
        Command::Compressors => {
            println!("Available compressors:");
            for backend in registry.backends() {
                println!("  {:<12} {}", backend.name(), backend.description());
            }
            Ok(())
        }
        Command::Evaluate {
            dir,
            compressor,
            json,
        } => cmd_evaluate(&settings, &registry, dir, compressor, *json),
    }
}

fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {unit} ({{eta}} remaining)"
            ))?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

fn extract_file(path: &Path, params: &SignatureParams) -> Result<Signature> {
    let pcm = decode_audio(path, PcmFormat::REFERENCE)?;
    Ok(signature::extract(&pcm, params)?)
}

/// Read a `.freq` file as-is, or extract a signature from anything else.
fn load_or_extract(path: &Path, params: &SignatureParams) -> Result<Signature> {
    if store::is_signature_file(path) {
        Ok(store::read_signature(path, params.num_freqs)?)
    } else {
        log::info!("Converting {} to a signature...", path.display());
        extract_file(path, params)
    }
}

fn cmd_extract(
    settings: &Settings,
    input: &Path,
    output: Option<&Path>,
    offset: Option<f64>,
    duration: Option<f64>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let mut pcm = decode_audio(input, PcmFormat::REFERENCE)?;

    if offset.is_some() || duration.is_some() {
        let rate = pcm.sample_rate() as f64;
        let start = (offset.unwrap_or(0.0).max(0.0) * rate) as usize;
        let len = duration.map_or(usize::MAX, |d| (d.max(0.0) * rate) as usize);
        pcm = pcm
            .segment(start, len)
            .with_context(|| format!("Segment lies outside {}", input.display()))?;
        log::info!(
            "Using segment at {:.2}s, {:.2}s long",
            start as f64 / rate,
            pcm.duration_secs()
        );
    }

    let sig = signature::extract(&pcm, &settings.params)?;
    if sig.is_empty() {
        log::warn!("No signature available: audio is shorter than one analysis window");
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(store::SIGNATURE_EXTENSION));
    store::write_signature(&output, &sig)?;
    println!(
        "Wrote {} windows x {} bins ({} bytes) to {}",
        sig.window_count(),
        sig.num_freqs(),
        sig.len(),
        output.display()
    );
    Ok(())
}

fn cmd_build_db(settings: &Settings, dir: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_audio_file(path))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No audio files found in {}", dir.display());
    }
    let named = store::signature_names(&files)?;
    std::fs::create_dir_all(&settings.database).with_context(|| {
        format!("Failed to create database directory {}", settings.database.display())
    })?;

    log::info!(
        "Building signatures for {} files into {}",
        files.len(),
        settings.database.display()
    );
    let pb = progress_bar(files.len(), "files")?;

    let processed = named
        .par_iter()
        .filter(|(name, path)| {
            let result = (|| -> Result<()> {
                let sig = extract_file(path, &settings.params)?;
                if sig.is_empty() {
                    log::warn!("{}: shorter than one analysis window", path.display());
                }
                store::write_signature(&store::signature_path(&settings.database, name), &sig)?;
                Ok(())
            })();
            pb.inc(1);
            match result {
                Ok(()) => true,
                Err(err) => {
                    log::error!("{}: {:#}", path.display(), err);
                    false
                }
            }
        })
        .count();

    pb.finish_and_clear();
    println!(
        "Processed {}/{} files into {}",
        processed,
        files.len(),
        settings.database.display()
    );
    Ok(())
}

fn load_database(settings: &Settings) -> Result<Arc<Database>> {
    let db = Database::load_dir(&settings.database, settings.params.num_freqs)?;
    if db.is_empty() {
        anyhow::bail!("No signatures found in {}", settings.database.display());
    }
    Ok(Arc::new(db))
}

fn cmd_identify(
    settings: &Settings,
    registry: &Registry,
    query: &Path,
    compressor: &str,
    k: usize,
    policy: FailurePolicy,
    json: bool,
) -> Result<()> {
    let oracle = registry.oracle(compressor, settings.retries)?;
    let database = load_database(settings)?;
    let query_sig = load_or_extract(query, &settings.params)?;

    log::info!(
        "Comparing {} with {} database entries using {}...",
        query.display(),
        database.len(),
        compressor
    );
    let ranker = Ranker::new(database, oracle).with_policy(policy);
    let result = ranker.rank(&query_sig, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_ranking(&result, k);
    }
    Ok(())
}

fn print_ranking(result: &RankedResult, k: usize) {
    println!("\nTop {} candidates ({}):", k, result.backend);
    for (i, candidate) in result.candidates.iter().enumerate() {
        println!("{}. {} - NCD: {:.4}", i + 1, candidate.name, candidate.ncd);
    }
    if !result.omitted.is_empty() {
        println!("\nOmitted {} entries:", result.omitted.len());
        for omission in &result.omitted {
            println!("  {} - {}", omission.name, omission.reason);
        }
    }
}

fn cmd_compare(
    settings: &Settings,
    registry: &Registry,
    a: &Path,
    b: &Path,
    compressors: &[String],
) -> Result<()> {
    let x = load_or_extract(a, &settings.params)?;
    let y = load_or_extract(b, &settings.params)?;
    if x.is_empty() || y.is_empty() {
        anyhow::bail!("Cannot compare an empty signature");
    }

    let names: Vec<String> = if compressors.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        compressors.to_vec()
    };

    println!("{} vs {}:", a.display(), b.display());
    for name in &names {
        let oracle = registry.oracle(name, settings.retries)?;
        match oracle.sizes(x.as_bytes(), y.as_bytes()) {
            Ok(sizes) => match sizes.ncd() {
                Some(ncd) => println!(
                    "  {:<12} C(x)={:<8} C(y)={:<8} C(xy)={:<8} NCD={:.4}",
                    name, sizes.cx, sizes.cy, sizes.cxy, ncd
                ),
                None => println!("  {:<12} no output", name),
            },
            Err(err) => println!("  {:<12} error: {}", name, err),
        }
    }
    Ok(())
}

fn cmd_evaluate(
    settings: &Settings,
    registry: &Registry,
    dir: &Path,
    compressors: &[String],
    json: bool,
) -> Result<()> {
    let database = load_database(settings)?;
    let segments = evaluate::load_segments(dir, settings.params.num_freqs)?;
    if segments.is_empty() {
        anyhow::bail!("No segment signatures found in {}", dir.display());
    }

    let names: Vec<String> = if compressors.is_empty() {
        vec![settings.compressor.clone()]
    } else {
        compressors.to_vec()
    };

    let mut reports: Vec<BackendReport> = Vec::with_capacity(names.len());
    for name in &names {
        let oracle = registry.oracle(name, settings.retries)?;
        log::info!("Evaluating {} segments with {}...", segments.len(), name);
        let ranker = Ranker::new(database.clone(), oracle);
        let pb = progress_bar(segments.len(), "segments")?;
        let report = evaluate::evaluate(&ranker, &segments, |_| pb.inc(1));
        pb.finish_and_clear();
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        println!(
            "{}: {}/{} correct ({:.2}%)",
            report.backend,
            report.correct,
            report.total,
            report.accuracy * 100.0
        );
        if report.failed > 0 {
            println!("  {} segment(s) could not be ranked", report.failed);
        }
        for miss in &report.misclassified {
            let truth = miss
                .ncd_truth
                .map_or_else(|| "n/a".to_string(), |ncd| format!("{ncd:.4}"));
            println!(
                "  {} -> {} (NCD {:.4}, truth {} NCD {})",
                miss.segment, miss.predicted, miss.ncd_predicted, miss.truth, truth
            );
        }
    }
    Ok(())
}
