mod audio;
mod classify;
mod cli;
mod config;
mod error;
mod pipeline;
mod spectrogram;
mod timeline;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::AtomicBool;

use classify::RegisterEnergyClassifier;
use cli::Cli;
use pipeline::Progress;
use timeline::Timeline;

#[derive(Serialize)]
struct Report<'a> {
    input: String,
    duration: f32,
    native_duration: f32,
    native_sample_rate: u32,
    chunk_count: usize,
    timeline: &'a Timeline,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect instrumap.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("instrumap.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("instrumap").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    let mut cfg = config::Config::default();
    if let Some(ref path) = config_path {
        if let Some(loaded) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // CLI overrides apply only when the user moved them off their defaults
    if (cli.duration - 1.0).abs() > f32::EPSILON {
        cfg.audio.chunk_duration = cli.duration;
    }
    if (cli.step - 0.5).abs() > f32::EPSILON {
        cfg.audio.chunk_step = cli.step;
    }
    if cli.max_in_flight != 4 {
        cfg.inference.max_in_flight = cli.max_in_flight;
    }
    if cli.peaks_per_column != 7 {
        cfg.display.peaks_per_column = cli.peaks_per_column;
    }

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("instrumap - per-instrument activity timeline");
    log::info!("Input: {}", cli.input.display());
    log::info!(
        "Chunks: {:.2}s every {:.2}s, {} mel bands, fft {}",
        cfg.audio.chunk_duration,
        cfg.audio.chunk_step,
        cfg.spectrogram.n_mels,
        cfg.spectrogram.fft_size
    );

    // 1. Decode
    log::info!("Decoding audio...");
    let decoded = audio::decode::decode_audio(&cli.input, cfg.audio.sample_rate)?;

    // 2. Analyze
    let classifier = RegisterEnergyClassifier::for_taxonomy(&cfg.model.instruments);
    let cancel = AtomicBool::new(false);
    let pb = ProgressBar::hidden();
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    let output = pipeline::analyze(&decoded.samples, &cfg, &classifier, &cancel, |p| match p {
        Progress::Chunked { chunks } => {
            pb.set_length(chunks as u64);
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        Progress::Inference { completed, .. } => pb.set_position(completed as u64),
        Progress::Finalized => pb.finish_and_clear(),
        _ => {}
    })?;

    // 3. Report
    println!(
        "\n{} — {:.1}s, {} chunks of {:.2}s every {:.2}s",
        cli.input.display(),
        decoded.duration(),
        output.chunk_count,
        cfg.audio.chunk_duration,
        cfg.audio.chunk_step
    );

    if cli.show_peaks {
        print_peaks(&output.peaks);
    }
    print_timeline(&output.timeline);

    if let Some(ref path) = cli.json {
        let report = Report {
            input: cli.input.display().to_string(),
            duration: decoded.duration(),
            native_duration: decoded.native_duration,
            native_sample_rate: decoded.native_sample_rate,
            chunk_count: output.chunk_count,
            timeline: &output.timeline,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }

    Ok(())
}

fn print_timeline(timeline: &Timeline) {
    if timeline.n_steps() == 0 {
        println!("(audio shorter than one chunk — nothing to classify)");
        return;
    }

    let name_width = timeline
        .instruments
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(0);

    for (name, row) in timeline.instruments.iter().zip(&timeline.matrix) {
        let strip: String = row.iter().map(|&a| if a { '#' } else { '.' }).collect();
        println!("{:>name_width$} |{}|", name, strip);
    }

    let first = timeline.labels.first().map(String::as_str).unwrap_or("");
    let last = timeline.labels.last().map(String::as_str).unwrap_or("");
    println!(
        "{:>name_width$}  {}s .. {}s ({} steps)",
        "",
        first,
        last,
        timeline.n_steps()
    );
}

fn print_peaks(peaks: &[(f32, f32)]) {
    const GLYPHS: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#'];
    let line: String = peaks
        .iter()
        .map(|&(min, max)| {
            let extent = (max - min).clamp(0.0, 2.0) / 2.0;
            GLYPHS[(extent * (GLYPHS.len() - 1) as f32).round() as usize]
        })
        .collect();
    println!("|{}|", line);
}
