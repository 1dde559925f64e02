pub mod engine;

use thiserror::Error;

use crate::spectrogram::MelSpectrogram;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ClassifyError(pub String);

/// The external classification oracle.
///
/// Given one fixed-shape mel spectrogram, return one confidence score per
/// instrument class, ordered by the taxonomy. Calls may be slow (a first
/// call may pay a model warm-up cost) and must be tolerated as such; the
/// oracle is expected to be stateless, so identical spectrograms yield
/// identical scores.
pub trait Classifier: Sync {
    fn class_count(&self) -> usize;

    fn classify(&self, spectrogram: &MelSpectrogram) -> Result<Vec<f32>, ClassifyError>;
}

/// Built-in stand-in oracle: mean log-power energy inside a per-instrument
/// mel register, squashed through a logistic. Not a trained model — it makes
/// the binary usable without one and mirrors how stem activity was labelled
/// (band energy against a threshold) in the training data preparation.
pub struct RegisterEnergyClassifier {
    /// Per class: band register as fractions of the mel axis.
    registers: Vec<(f32, f32)>,
}

/// Logistic pivot: register energy around this dB level scores 0.5.
const PIVOT_DB: f32 = -45.0;
const SLOPE_DB: f32 = 10.0;

impl RegisterEnergyClassifier {
    pub fn new(registers: Vec<(f32, f32)>) -> Self {
        Self { registers }
    }

    /// Register table keyed by instrument name; unknown names get the full
    /// band range.
    pub fn for_taxonomy(instruments: &[String]) -> Self {
        let registers = instruments
            .iter()
            .map(|name| match name.as_str() {
                "Bass" => (0.0, 0.12),
                "Piano" => (0.10, 0.55),
                "Guitar" => (0.15, 0.60),
                "Strings" => (0.25, 0.75),
                "Drums" => (0.0, 1.0),
                _ => (0.0, 1.0),
            })
            .collect();
        Self { registers }
    }
}

impl Classifier for RegisterEnergyClassifier {
    fn class_count(&self) -> usize {
        self.registers.len()
    }

    fn classify(&self, spectrogram: &MelSpectrogram) -> Result<Vec<f32>, ClassifyError> {
        let n_bands = spectrogram.n_bands();
        if n_bands == 0 || spectrogram.n_frames() == 0 {
            return Ok(vec![0.0; self.registers.len()]);
        }

        let scores = self
            .registers
            .iter()
            .map(|&(lo, hi)| {
                // Registers outside [0, 1) collapse to the topmost band
                let lo_band = ((lo * n_bands as f32) as usize).min(n_bands - 1);
                let hi_band = ((hi * n_bands as f32) as usize).clamp(lo_band + 1, n_bands);

                let mut sum = 0.0f64;
                let mut count = 0usize;
                for m in lo_band..hi_band {
                    for &v in spectrogram.band(m) {
                        sum += v as f64;
                        count += 1;
                    }
                }
                let mean_db = (sum / count as f64) as f32;
                1.0 / (1.0 + (-(mean_db - PIVOT_DB) / SLOPE_DB).exp())
            })
            .collect();

        Ok(scores)
    }
}
