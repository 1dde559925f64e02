/// Triangular mel filterbank on the HTK scale (`mel = 2595 * log10(1 + f/700)`).
///
/// Weights are stored row-major, one row per mel band, one column per FFT
/// bin (`fft_size / 2 + 1` columns). Built once per pipeline run; applying
/// it is a plain weighted sum over the one-sided power spectrum.
pub struct MelFilterbank {
    weights: Vec<f32>,
    n_mels: usize,
    n_bins: usize,
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

impl MelFilterbank {
    pub fn new(n_mels: usize, fft_size: usize, sample_rate: u32, fmin: f32, fmax: f32) -> Self {
        let n_bins = fft_size / 2 + 1;

        // n_mels + 2 band edges evenly spaced in mel space; edges m, m+1, m+2
        // bound the triangle for band m.
        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let n_edges = n_mels + 2;
        let edges: Vec<f32> = (0..n_edges)
            .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_edges - 1) as f32)
            .collect();

        let bin_mels: Vec<f32> = (0..n_bins)
            .map(|k| hz_to_mel(k as f32 * sample_rate as f32 / fft_size as f32))
            .collect();

        let mut weights = vec![0.0f32; n_mels * n_bins];
        for m in 0..n_mels {
            let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            let row = &mut weights[m * n_bins..(m + 1) * n_bins];
            for (k, &mel) in bin_mels.iter().enumerate() {
                let rising = if center > lower { (mel - lower) / (center - lower) } else { 0.0 };
                let falling = if upper > center { (upper - mel) / (upper - center) } else { 0.0 };
                row[k] = rising.min(falling).max(0.0);
            }
        }

        Self { weights, n_mels, n_bins }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Aggregate a one-sided power spectrum into per-band energies.
    pub fn apply(&self, power: &[f32], band_energy: &mut [f32]) {
        debug_assert_eq!(power.len(), self.n_bins);
        debug_assert_eq!(band_energy.len(), self.n_mels);
        for m in 0..self.n_mels {
            let row = &self.weights[m * self.n_bins..(m + 1) * self.n_bins];
            band_energy[m] = row.iter().zip(power).map(|(w, p)| w * p).sum();
        }
    }
}
