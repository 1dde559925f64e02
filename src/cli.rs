use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "instrumap", about = "Per-instrument activity timeline analyzer for audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Write the timeline report as JSON to this path
    #[arg(short, long)]
    pub json: Option<PathBuf>,

    /// Config file path (default: auto-detect instrumap.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Chunk duration in seconds
    #[arg(long, default_value_t = 1.0)]
    pub duration: f32,

    /// Chunk stride in seconds (smaller than duration = overlapping chunks)
    #[arg(long, default_value_t = 0.5)]
    pub step: f32,

    /// Maximum in-flight classification calls
    #[arg(long, default_value_t = 4)]
    pub max_in_flight: usize,

    /// Display peak bins per timeline column
    #[arg(long, default_value_t = 7)]
    pub peaks_per_column: usize,

    /// Print the waveform peak envelope alongside the timeline
    #[arg(long)]
    pub show_peaks: bool,
}
