use serde::Deserialize;
use std::path::PathBuf;

use crate::error::AnalysisError;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Waveform peak bins rendered per timeline column.
    #[serde(default = "default_peaks_per_column")]
    pub peaks_per_column: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            peaks_per_column: default_peaks_per_column(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate everything downstream assumes (Hz).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Chunk length in seconds (one classification unit).
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration: f32,
    /// Stride between chunk starts in seconds. Smaller than the duration
    /// gives overlapping chunks.
    #[serde(default = "default_chunk_step")]
    pub chunk_step: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpectrogramConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    /// Lower edge of the mel filterbank (Hz).
    #[serde(default)]
    pub fmin: f32,
    /// Upper edge of the mel filterbank (Hz). 0 means Nyquist.
    #[serde(default)]
    pub fmax: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Ordered instrument taxonomy. Score vectors from the oracle follow
    /// this order.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,
    /// Per-instrument decision threshold, same order as `instruments`.
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Upper bound on unconfirmed in-flight classification calls.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            chunk_duration: default_chunk_duration(),
            chunk_step: default_chunk_step(),
        }
    }
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            hop_size: default_hop_size(),
            n_mels: default_n_mels(),
            fmin: 0.0,
            fmax: 0.0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            thresholds: default_thresholds(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_chunk_duration() -> f32 { 1.0 }
fn default_chunk_step() -> f32 { 0.5 }
fn default_fft_size() -> usize { 2048 }
fn default_hop_size() -> usize { 1024 }
fn default_n_mels() -> usize { 128 }
fn default_max_in_flight() -> usize { 4 }
fn default_peaks_per_column() -> usize { 7 }

fn default_instruments() -> Vec<String> {
    ["Piano", "Guitar", "Bass", "Strings", "Drums"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_thresholds() -> Vec<f32> {
    vec![0.5, 0.6, 0.5, 0.3, 0.5]
}

impl Config {
    /// Cross-field invariants checked once at pipeline construction, so the
    /// stages can assume well-formed parameters instead of re-checking.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.audio.chunk_duration <= 0.0 || self.audio.chunk_step <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "chunk duration and step must be positive".into(),
            ));
        }
        // Chunking runs on sample counts; durations that are positive in
        // seconds can still truncate to zero samples.
        let chunk_len = (self.audio.chunk_duration * self.audio.sample_rate as f32) as usize;
        let step_len = (self.audio.chunk_step * self.audio.sample_rate as f32) as usize;
        if step_len == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "chunk step {}s is shorter than one sample at {}Hz",
                self.audio.chunk_step, self.audio.sample_rate
            )));
        }
        if chunk_len == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "chunk duration {}s is shorter than one sample at {}Hz",
                self.audio.chunk_duration, self.audio.sample_rate
            )));
        }
        if self.spectrogram.fft_size == 0 {
            return Err(AnalysisError::InvalidConfig("FFT size must be positive".into()));
        }
        if chunk_len < self.spectrogram.fft_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "chunk length ({} samples) is shorter than the FFT size ({})",
                chunk_len, self.spectrogram.fft_size
            )));
        }
        if self.spectrogram.hop_size == 0 {
            return Err(AnalysisError::InvalidConfig("hop size must be positive".into()));
        }
        if self.model.instruments.is_empty() {
            return Err(AnalysisError::InvalidConfig("instrument taxonomy is empty".into()));
        }
        if self.model.instruments.len() != self.model.thresholds.len() {
            return Err(AnalysisError::InvalidConfig(format!(
                "{} instruments but {} thresholds",
                self.model.instruments.len(),
                self.model.thresholds.len()
            )));
        }
        if self.inference.max_in_flight == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Effective upper filterbank edge: configured fmax, or Nyquist.
    pub fn fmax(&self) -> f32 {
        if self.spectrogram.fmax > 0.0 {
            self.spectrogram.fmax
        } else {
            self.audio.sample_rate as f32 / 2.0
        }
    }
}

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
