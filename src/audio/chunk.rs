//! Fixed-length, fixed-stride chunking of a waveform.
//!
//! Chunk boundaries depend only on waveform length, chunk length, and step
//! length, so two streams built from the same waveform with different
//! normalization settings are always index-aligned.

const NORMALIZE_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkParams {
    /// Chunk length in samples.
    pub chunk_len: usize,
    /// Stride between chunk starts in samples.
    pub step_len: usize,
}

impl ChunkParams {
    pub fn from_seconds(sample_rate: u32, duration_s: f32, step_s: f32) -> Self {
        Self {
            chunk_len: (duration_s * sample_rate as f32) as usize,
            step_len: (step_s * sample_rate as f32) as usize,
        }
    }
}

/// One classification unit: a contiguous slice of the waveform.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    /// Offset of the first sample within the source waveform.
    pub start: usize,
    pub samples: Vec<f32>,
}

/// Number of chunks `chunk_waveform` will produce for a waveform of `len`
/// samples. The trailing partial remainder is dropped, never padded.
pub fn chunk_count(len: usize, params: ChunkParams) -> usize {
    if len < params.chunk_len {
        0
    } else {
        (len - params.chunk_len) / params.step_len + 1
    }
}

/// Slice `waveform` into chunks at offsets `0, step_len, 2*step_len, ...`.
///
/// With `normalize` set, each chunk is independently scaled so its peak
/// absolute sample maps to ~1.0; the epsilon keeps near-silent chunks from
/// exploding in scale. Normalization is per chunk, not global, so quiet
/// passages get the same treatment as loud ones.
pub fn chunk_waveform(waveform: &[f32], params: ChunkParams, normalize: bool) -> Vec<Chunk> {
    let count = chunk_count(waveform.len(), params);
    let mut chunks = Vec::with_capacity(count);

    for index in 0..count {
        let start = index * params.step_len;
        let mut samples = waveform[start..start + params.chunk_len].to_vec();

        if normalize {
            let max_abs = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
            let scale = 1.0 / (max_abs + NORMALIZE_EPS);
            for s in &mut samples {
                *s *= scale;
            }
        }

        chunks.push(Chunk { index, start, samples });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_len: usize, step_len: usize) -> ChunkParams {
        ChunkParams { chunk_len, step_len }
    }

    #[test]
    fn count_matches_closed_form() {
        for (len, chunk_len, step_len) in [
            (132300usize, 44100usize, 22050usize), // 3s, 1s chunks, 0.5s step
            (132300, 44100, 44100),                // disjoint
            (44100, 44100, 22050),                 // exactly one chunk
            (44099, 44100, 22050),                 // one sample short
            (0, 44100, 22050),
        ] {
            let expected = if len < chunk_len {
                0
            } else {
                (len - chunk_len) / step_len + 1
            };
            assert_eq!(chunk_count(len, params(chunk_len, step_len)), expected);
        }
    }

    #[test]
    fn chunks_have_fixed_length_and_stride() {
        let waveform: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let p = params(300, 200);
        let chunks = chunk_waveform(&waveform, p, false);
        assert_eq!(chunks.len(), 4); // offsets 0, 200, 400, 600
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.start, i * 200);
            assert_eq!(c.samples.len(), 300);
            assert_eq!(c.samples[0], (i * 200) as f32);
        }
    }

    #[test]
    fn trailing_remainder_is_dropped() {
        let waveform = vec![0.0f32; 450];
        let chunks = chunk_waveform(&waveform, params(300, 200), false);
        // offset 200 would need samples up to 500; only one chunk fits
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn short_waveform_yields_zero_chunks() {
        let waveform = vec![0.0f32; 22050]; // 0.5s at 44.1k
        let p = ChunkParams::from_seconds(44100, 1.0, 1.0);
        assert!(chunk_waveform(&waveform, p, true).is_empty());
    }

    #[test]
    fn normalized_peak_is_close_to_one() {
        let mut waveform = vec![0.0f32; 600];
        waveform[10] = 0.25;
        waveform[350] = -0.5;
        let chunks = chunk_waveform(&waveform, params(300, 300), true);
        for c in &chunks {
            let max_abs = c.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
            assert!(max_abs <= 1.0 + 1e-4);
            assert!((max_abs - 1.0).abs() < 1e-3, "peak {} not near 1.0", max_abs);
        }
    }

    #[test]
    fn silent_chunk_stays_silent_when_normalized() {
        let waveform = vec![0.0f32; 300];
        let chunks = chunk_waveform(&waveform, params(300, 300), true);
        assert!(chunks[0].samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn raw_and_normalized_streams_are_index_aligned() {
        let waveform: Vec<f32> = (0..10_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let p = params(2048, 1024);
        let raw = chunk_waveform(&waveform, p, false);
        let norm = chunk_waveform(&waveform, p, true);
        assert_eq!(raw.len(), norm.len());
        for (r, n) in raw.iter().zip(&norm) {
            assert_eq!(r.start, n.start);
            assert_eq!(r.samples.len(), n.samples.len());
        }
    }
}
