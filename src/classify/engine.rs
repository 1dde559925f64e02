//! Bounded-concurrency classification with ordered result delivery.
//!
//! Classification dominates the pipeline's latency, so chunks are fed to a
//! pool of worker threads. The number of unconfirmed in-flight calls is
//! bounded by the job channel's capacity; completions may arrive in any
//! order but are buffered and released to the caller's sink strictly in
//! chunk-index order, so the timeline aggregator only ever sees a
//! contiguous run of indices.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel};
use std::sync::Mutex;
use std::thread;

use super::{Classifier, ClassifyError};
use crate::error::AnalysisError;
use crate::spectrogram::MelSpectrogram;

/// Run `classifier` over every spectrogram, delivering `(index, scores)` to
/// `on_scores` in strictly increasing index order.
///
/// At most `max_in_flight` calls are outstanding at once. The first oracle
/// failure (call error or wrong score-vector length) aborts the run;
/// results already delivered stay delivered. Setting `cancel` stops the
/// run without further deliveries and yields [`AnalysisError::Cancelled`].
pub fn classify_ordered(
    spectrograms: &[MelSpectrogram],
    classifier: &dyn Classifier,
    max_in_flight: usize,
    cancel: &AtomicBool,
    mut on_scores: impl FnMut(usize, Vec<f32>) -> Result<(), AnalysisError>,
) -> Result<(), AnalysisError> {
    let total = spectrograms.len();
    if total == 0 {
        return Ok(());
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(AnalysisError::Cancelled);
    }

    let n_workers = max_in_flight.min(total);
    let (job_tx, job_rx) = sync_channel::<(usize, &MelSpectrogram)>(max_in_flight);
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = channel::<(usize, Result<Vec<f32>, ClassifyError>)>();

    thread::scope(|s| {
        let job_rx = &job_rx;

        s.spawn(move || {
            for (i, spec) in spectrograms.iter().enumerate() {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                if job_tx.send((i, spec)).is_err() {
                    break;
                }
            }
            // job_tx drops here; workers drain and exit
        });

        for _ in 0..n_workers {
            let result_tx = result_tx.clone();
            s.spawn(move || loop {
                let job = job_rx.lock().unwrap().recv();
                let Ok((i, spec)) = job else { break };
                if cancel.load(Ordering::Relaxed) {
                    // Superseded run: drain jobs without classifying so the
                    // producer is never left blocked on a full channel.
                    continue;
                }
                if result_tx.send((i, classifier.classify(spec))).is_err() {
                    break;
                }
            });
        }
        drop(result_tx);

        let mut pending: BTreeMap<usize, Vec<f32>> = BTreeMap::new();
        let mut next = 0usize;
        let mut outcome: Result<(), AnalysisError> = Ok(());

        'collect: while next < total {
            let (i, result) = match result_rx.recv() {
                Ok(v) => v,
                Err(_) => break, // all workers gone (cancelled run)
            };
            let scores = match result {
                Ok(s) => s,
                Err(e) => {
                    outcome = Err(AnalysisError::Oracle {
                        chunk_index: i,
                        message: e.to_string(),
                    });
                    cancel.store(true, Ordering::Relaxed);
                    break;
                }
            };
            if scores.len() != classifier.class_count() {
                outcome = Err(AnalysisError::Oracle {
                    chunk_index: i,
                    message: format!(
                        "oracle returned {} scores, expected {}",
                        scores.len(),
                        classifier.class_count()
                    ),
                });
                cancel.store(true, Ordering::Relaxed);
                break;
            }

            pending.insert(i, scores);
            while let Some(scores) = pending.remove(&next) {
                if let Err(e) = on_scores(next, scores) {
                    outcome = Err(e);
                    cancel.store(true, Ordering::Relaxed);
                    break 'collect;
                }
                next += 1;
            }
        }

        if outcome.is_ok() && next < total {
            outcome = Err(AnalysisError::Cancelled);
        }
        outcome
    })
}
