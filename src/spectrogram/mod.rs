pub mod mel;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use self::mel::MelFilterbank;

/// Floor added before the log so silent bands come out at a finite
/// 10*log10(1e-10) = -100 dB instead of -inf.
const LOG_EPS: f32 = 1e-10;

/// Mel-scale log-power spectrogram, band-major: `bands[mel][frame]`.
///
/// Band-major orientation is what the classifier and the renderer both
/// index, so the transpose happens here rather than in every consumer.
#[derive(Debug, Clone)]
pub struct MelSpectrogram {
    bands: Vec<Vec<f32>>,
}

impl MelSpectrogram {
    /// Build from pre-computed band rows. All rows must share one frame count.
    pub fn from_bands(bands: Vec<Vec<f32>>) -> Self {
        debug_assert!(bands.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { bands }
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn n_frames(&self) -> usize {
        self.bands.first().map_or(0, |b| b.len())
    }

    pub fn band(&self, m: usize) -> &[f32] {
        &self.bands[m]
    }

    pub fn bands(&self) -> &[Vec<f32>] {
        &self.bands
    }
}

/// Converts one waveform chunk into a [`MelSpectrogram`].
///
/// The FFT plan, Hann window, and filterbank are built once and shared by
/// every frame of every chunk; `compute` itself is pure and safe to call
/// from parallel workers.
pub struct SpectrogramGenerator {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    filterbank: MelFilterbank,
    fft_size: usize,
    hop_size: usize,
}

impl SpectrogramGenerator {
    pub fn new(fft_size: usize, hop_size: usize, n_mels: usize, sample_rate: u32, fmin: f32, fmax: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            window: hann_window(fft_size),
            filterbank: MelFilterbank::new(n_mels, fft_size, sample_rate, fmin, fmax),
            fft_size,
            hop_size,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.filterbank.n_mels()
    }

    /// Frame count for a chunk of `len` samples. Zero when the chunk is
    /// shorter than one FFT window.
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.fft_size {
            0
        } else {
            (len - self.fft_size) / self.hop_size + 1
        }
    }

    pub fn compute(&self, chunk: &[f32]) -> MelSpectrogram {
        let n_frames = self.frame_count(chunk.len());
        let n_mels = self.filterbank.n_mels();
        let n_bins = self.filterbank.n_bins();

        // Frame-major pass first, transposed to band-major at the end.
        let mut frames: Vec<Vec<f32>> = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        let mut power = vec![0.0f32; n_bins];

        for f in 0..n_frames {
            let start = f * self.hop_size;
            for (i, (&s, &w)) in chunk[start..start + self.fft_size]
                .iter()
                .zip(&self.window)
                .enumerate()
            {
                buffer[i] = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut buffer);

            // One-sided power spectrum, bins 0..=fft_size/2
            for (k, p) in power.iter_mut().enumerate() {
                let c = buffer[k];
                *p = c.re * c.re + c.im * c.im;
            }

            let mut band_db = vec![0.0f32; n_mels];
            self.filterbank.apply(&power, &mut band_db);
            for e in &mut band_db {
                *e = 10.0 * (*e + LOG_EPS).log10();
            }
            frames.push(band_db);
        }

        let bands = (0..n_mels)
            .map(|m| frames.iter().map(|f| f[m]).collect())
            .collect();

        MelSpectrogram { bands }
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
