use rayon::prelude::*;
use std::sync::atomic::AtomicBool;

use crate::audio::chunk::{chunk_count, chunk_waveform, ChunkParams};
use crate::audio::peaks::downsample_peaks;
use crate::classify::engine::classify_ordered;
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::spectrogram::{MelSpectrogram, SpectrogramGenerator};
use crate::timeline::{Timeline, TimelineAggregator};

/// Coarse pipeline milestones for progress display. Cosmetic — consumers
/// must not derive correctness from these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Chunked { chunks: usize },
    SpectrogramsReady { count: usize },
    Inference { completed: usize, total: usize },
    Finalized,
}

#[derive(Debug)]
pub struct AnalysisOutput {
    pub timeline: Timeline,
    /// Coarse (min, max) waveform envelope for display.
    pub peaks: Vec<(f32, f32)>,
    /// Raw-stream spectrograms for visual overlay, index-aligned with the
    /// timeline columns.
    pub display_spectrograms: Vec<MelSpectrogram>,
    pub chunk_count: usize,
}

/// Run the full analysis over a decoded waveform.
///
/// Two chunk streams derive from identical boundaries: a peak-normalized
/// one feeding the oracle and a raw one kept for display, so the model
/// input and the visual overlay can never drift out of alignment. A
/// waveform shorter than one chunk yields an empty, finalized timeline.
pub fn analyze(
    waveform: &[f32],
    config: &Config,
    classifier: &dyn Classifier,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(Progress),
) -> Result<AnalysisOutput, AnalysisError> {
    config.validate()?;
    if classifier.class_count() != config.model.instruments.len() {
        return Err(AnalysisError::InvalidConfig(format!(
            "classifier has {} classes, taxonomy has {}",
            classifier.class_count(),
            config.model.instruments.len()
        )));
    }

    let params = ChunkParams::from_seconds(
        config.audio.sample_rate,
        config.audio.chunk_duration,
        config.audio.chunk_step,
    );
    let total = chunk_count(waveform.len(), params);
    log::info!("Slicing {} samples into {} chunks", waveform.len(), total);

    let model_chunks = chunk_waveform(waveform, params, true);
    let display_chunks = chunk_waveform(waveform, params, false);
    on_progress(Progress::Chunked { chunks: total });

    let generator = SpectrogramGenerator::new(
        config.spectrogram.fft_size,
        config.spectrogram.hop_size,
        config.spectrogram.n_mels,
        config.audio.sample_rate,
        config.spectrogram.fmin,
        config.fmax(),
    );

    log::info!("Generating {} mel spectrograms", total);
    let model_specs: Vec<MelSpectrogram> = model_chunks
        .par_iter()
        .map(|c| generator.compute(&c.samples))
        .collect();
    let display_spectrograms: Vec<MelSpectrogram> = display_chunks
        .par_iter()
        .map(|c| generator.compute(&c.samples))
        .collect();
    on_progress(Progress::SpectrogramsReady { count: total });

    // Display envelope: an independent branch off the raw waveform, sized
    // to the timeline's column grid.
    let columns = waveform.len().div_ceil(params.step_len.max(1));
    let peaks = downsample_peaks(waveform, config.display.peaks_per_column * columns);

    log::info!("Running inference over {} chunks", total);
    let mut aggregator = TimelineAggregator::new(
        config.model.instruments.clone(),
        config.model.thresholds.clone(),
        config.audio.chunk_step,
    );
    classify_ordered(
        &model_specs,
        classifier,
        config.inference.max_in_flight,
        cancel,
        |i, scores| {
            aggregator.push(i, &scores)?;
            on_progress(Progress::Inference {
                completed: i + 1,
                total,
            });
            Ok(())
        },
    )?;
    aggregator.finalize();
    on_progress(Progress::Finalized);
    log::info!("Timeline complete: {} columns", aggregator.n_committed());

    Ok(AnalysisOutput {
        timeline: aggregator.into_timeline(),
        peaks,
        display_spectrograms,
        chunk_count: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstOracle {
        classes: usize,
        score: f32,
    }

    impl Classifier for ConstOracle {
        fn class_count(&self) -> usize {
            self.classes
        }

        fn classify(&self, _: &MelSpectrogram) -> Result<Vec<f32>, ClassifyError> {
            Ok(vec![self.score; self.classes])
        }
    }

    /// Returns 1.0 for class (call_index % classes), 0.0 elsewhere. Only
    /// deterministic with max_in_flight = 1.
    struct DiagonalOracle {
        classes: usize,
        calls: AtomicUsize,
    }

    impl Classifier for DiagonalOracle {
        fn class_count(&self) -> usize {
            self.classes
        }

        fn classify(&self, _: &MelSpectrogram) -> Result<Vec<f32>, ClassifyError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut scores = vec![0.0; self.classes];
            scores[i % self.classes] = 1.0;
            Ok(scores)
        }
    }

    fn disjoint_config() -> Config {
        let mut cfg = Config::default();
        cfg.audio.chunk_step = 1.0;
        cfg
    }

    #[test]
    fn silent_three_seconds_disjoint_chunks() {
        let waveform = vec![0.0f32; 3 * 44100];
        let cfg = disjoint_config();
        let oracle = ConstOracle { classes: 5, score: 0.0 };
        let cancel = AtomicBool::new(false);

        let out = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap();

        assert_eq!(out.chunk_count, 3);
        assert_eq!(out.timeline.matrix.len(), 5);
        for row in &out.timeline.matrix {
            assert_eq!(row.len(), 3);
            assert!(row.iter().all(|&v| !v));
        }
        assert_eq!(out.timeline.labels, vec!["0.00", "1.00", "2.00"]);

        // Zero energy everywhere: every band cell sits on the epsilon floor
        let floor = 10.0 * 1e-10f32.log10();
        assert_eq!(out.display_spectrograms.len(), 3);
        for spec in &out.display_spectrograms {
            assert_eq!(spec.n_bands(), 128);
            assert_eq!(spec.n_frames(), 42);
            for m in 0..spec.n_bands() {
                assert!(spec.band(m).iter().all(|&v| (v - floor).abs() < 1e-4));
            }
        }
    }

    #[test]
    fn half_second_waveform_yields_empty_finalized_timeline() {
        let waveform = vec![0.1f32; 22050];
        let cfg = disjoint_config();
        let oracle = ConstOracle { classes: 5, score: 1.0 };
        let cancel = AtomicBool::new(false);
        let mut milestones = Vec::new();

        let out = analyze(&waveform, &cfg, &oracle, &cancel, |p| milestones.push(p)).unwrap();

        assert_eq!(out.chunk_count, 0);
        assert_eq!(out.timeline.n_steps(), 0);
        assert_eq!(out.timeline.matrix.len(), 5);
        assert!(milestones.contains(&Progress::Finalized));
    }

    #[test]
    fn overlapping_stride_produces_expected_columns() {
        // 3s at the default 1.0s/0.5s policy: (132300 - 44100) / 22050 + 1 = 5
        let waveform = vec![0.0f32; 3 * 44100];
        let cfg = Config::default();
        let oracle = ConstOracle { classes: 5, score: 0.9 };
        let cancel = AtomicBool::new(false);

        let out = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap();

        assert_eq!(out.chunk_count, 5);
        assert_eq!(out.timeline.labels, vec!["0.00", "0.50", "1.00", "1.50", "2.00"]);
        // 0.9 beats every default threshold
        for row in &out.timeline.matrix {
            assert!(row.iter().all(|&v| v));
        }
    }

    #[test]
    fn thresholds_gate_the_matrix_per_class() {
        let waveform = vec![0.0f32; 2 * 44100];
        let mut cfg = disjoint_config();
        cfg.inference.max_in_flight = 1; // DiagonalOracle needs call order == chunk order
        let oracle = DiagonalOracle {
            classes: 5,
            calls: AtomicUsize::new(0),
        };
        let cancel = AtomicBool::new(false);

        let out = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap();

        assert_eq!(out.timeline.n_steps(), 2);
        for (inst, row) in out.timeline.matrix.iter().enumerate() {
            for (step, &active) in row.iter().enumerate() {
                assert_eq!(active, inst == step, "instrument {} step {}", inst, step);
            }
        }
    }

    #[test]
    fn progress_reports_completed_over_total() {
        let waveform = vec![0.0f32; 3 * 44100];
        let cfg = disjoint_config();
        let oracle = ConstOracle { classes: 5, score: 0.0 };
        let cancel = AtomicBool::new(false);
        let mut inference = Vec::new();

        analyze(&waveform, &cfg, &oracle, &cancel, |p| {
            if let Progress::Inference { completed, total } = p {
                inference.push((completed, total));
            }
        })
        .unwrap();

        assert_eq!(inference, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn peak_envelope_covers_the_column_grid() {
        let waveform = vec![0.5f32; 3 * 44100];
        let cfg = Config::default();
        let oracle = ConstOracle { classes: 5, score: 0.0 };
        let cancel = AtomicBool::new(false);

        let out = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap();

        // 3s / 0.5s step = 6 columns of 7 bins each
        assert_eq!(out.peaks.len(), 6 * cfg.display.peaks_per_column);
        assert!(out.peaks.iter().all(|&(min, max)| min <= max));
    }

    #[test]
    fn class_count_mismatch_is_rejected_up_front() {
        let waveform = vec![0.0f32; 44100];
        let cfg = disjoint_config();
        let oracle = ConstOracle { classes: 3, score: 0.0 };
        let cancel = AtomicBool::new(false);

        let err = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn sub_sample_step_is_a_config_error_not_a_crash() {
        let waveform = vec![0.0f32; 2 * 44100];
        let mut cfg = Config::default();
        cfg.audio.chunk_step = 0.00001; // truncates to zero samples
        let oracle = ConstOracle { classes: 5, score: 0.0 };
        let cancel = AtomicBool::new(false);

        let err = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn cancelled_run_reports_cancelled() {
        let waveform = vec![0.0f32; 3 * 44100];
        let cfg = disjoint_config();
        let oracle = ConstOracle { classes: 5, score: 0.0 };
        let cancel = AtomicBool::new(true);

        let err = analyze(&waveform, &cfg, &oracle, &cancel, |_| {}).unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }
}
