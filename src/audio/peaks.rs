use rayon::prelude::*;

/// Reduce a waveform to `total_bins` (min, max) pairs for coarse envelope
/// display. Bins partition the waveform exactly; the final bin absorbs any
/// remainder. Display-only — classification never reads these.
pub fn downsample_peaks(samples: &[f32], total_bins: usize) -> Vec<(f32, f32)> {
    if samples.is_empty() || total_bins == 0 {
        return Vec::new();
    }

    // More bins than samples degenerates to one sample per bin.
    let total_bins = total_bins.min(samples.len());
    let bin_size = samples.len() / total_bins;

    (0..total_bins)
        .into_par_iter()
        .map(|i| {
            let start = i * bin_size;
            let end = if i == total_bins - 1 {
                samples.len()
            } else {
                start + bin_size
            };

            let mut min = f32::INFINITY;
            let mut max = f32::NEG_INFINITY;
            for &v in &samples[start..end] {
                if v < min {
                    min = v;
                }
                if v > max {
                    max = v;
                }
            }
            (min, max)
        })
        .collect()
}
