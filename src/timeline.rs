use serde::Serialize;

use crate::error::TimelineError;

/// Per-instrument activation timeline: `matrix[instrument][time_step]`,
/// one boolean column per classified chunk, plus one time label per column.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub instruments: Vec<String>,
    pub matrix: Vec<Vec<bool>>,
    pub labels: Vec<String>,
}

impl Timeline {
    pub fn n_steps(&self) -> usize {
        self.labels.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Empty,
    Accumulating,
    Finalized,
}

/// Accumulates classification scores into a [`Timeline`].
///
/// The single stateful piece of the pipeline: append-only, one column per
/// chunk, fed in strictly increasing chunk-index order. An aggregator is
/// scoped to exactly one pipeline run; a superseded run's aggregator is
/// dropped, never recycled.
pub struct TimelineAggregator {
    thresholds: Vec<f32>,
    step_seconds: f32,
    state: State,
    timeline: Timeline,
}

impl TimelineAggregator {
    pub fn new(instruments: Vec<String>, thresholds: Vec<f32>, step_seconds: f32) -> Self {
        debug_assert_eq!(instruments.len(), thresholds.len());
        let matrix = vec![Vec::new(); instruments.len()];
        Self {
            thresholds,
            step_seconds,
            state: State::Empty,
            timeline: Timeline {
                instruments,
                matrix,
                labels: Vec::new(),
            },
        }
    }

    /// Number of committed columns; also the next expected chunk index.
    pub fn n_committed(&self) -> usize {
        self.timeline.labels.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    /// Committed prefix, readable while later columns are still pending.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Append one chunk's scores as a new column.
    ///
    /// Indices must arrive contiguously from zero: a duplicate or a gap is
    /// rejected rather than silently rewriting or desynchronizing the label
    /// sequence.
    pub fn push(&mut self, chunk_index: usize, scores: &[f32]) -> Result<(), TimelineError> {
        if self.state == State::Finalized {
            return Err(TimelineError::Finalized);
        }
        if scores.len() != self.thresholds.len() {
            return Err(TimelineError::ScoreLength {
                expected: self.thresholds.len(),
                got: scores.len(),
            });
        }
        let expected = self.n_committed();
        if chunk_index != expected {
            return Err(TimelineError::OutOfOrder {
                expected,
                got: chunk_index,
            });
        }

        for (row, (&score, &threshold)) in self
            .timeline
            .matrix
            .iter_mut()
            .zip(scores.iter().zip(&self.thresholds))
        {
            row.push(score > threshold);
        }
        self.timeline
            .labels
            .push(format!("{:.2}", chunk_index as f32 * self.step_seconds));
        self.state = State::Accumulating;
        Ok(())
    }

    /// Seal the timeline once the chunk stream is known to be drained.
    /// Legal from any state; an empty run finalizes to zero columns.
    pub fn finalize(&mut self) {
        self.state = State::Finalized;
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }
}
