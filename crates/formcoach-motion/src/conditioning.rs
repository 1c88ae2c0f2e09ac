//! Sequence conditioning: smoothing, resampling and left/right mirroring.
//!
//! All operations work per dimension on [`AngleVector`] sequences and never
//! fail; degenerate inputs are returned unchanged.

use formcoach_core::{mirror_vector, AngleSequence, AngleVector, ANGLE_DIMS};

/// Moving-average window used for both template and user sequences
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Centered moving average with reflection padding.
///
/// The sequence is padded at both ends by `min(window - 1, len - 1)` samples
/// mirrored about the edge sample (the edge itself is not repeated). The output
/// has the same length as the input.
pub fn smooth(seq: &[AngleVector], window: usize) -> AngleSequence {
    let n = seq.len();
    if n <= 1 || window <= 1 {
        return seq.to_vec();
    }

    let pad = (window - 1).min(n - 1);
    // Short sequences cannot host the full window; shrink it to stay centered.
    let window = window.min(2 * pad + 1);

    let padded: Vec<&AngleVector> = (0..n + 2 * pad)
        .map(|k| &seq[reflect_index(k as isize - pad as isize, n)])
        .collect();

    let valid_len = padded.len() - window + 1;
    let offset = (valid_len - n) / 2;
    let scale = 1.0 / window as f64;

    (offset..offset + n)
        .map(|start| {
            let mut out = [0.0; ANGLE_DIMS];
            for v in &padded[start..start + window] {
                for (acc, x) in out.iter_mut().zip(v.iter()) {
                    *acc += x;
                }
            }
            out.iter_mut().for_each(|x| *x *= scale);
            out
        })
        .collect()
}

fn reflect_index(i: isize, n: usize) -> usize {
    let last = n as isize - 1;
    if i < 0 {
        (-i) as usize
    } else if i > last {
        (2 * last - i) as usize
    } else {
        i as usize
    }
}

/// Linear resampling onto `target_len` evenly spaced points over [0, 1].
///
/// Source samples sit at `linspace(0, 1, len)`. Returns the input unchanged
/// when it is empty, already the right length, or `target_len` is zero.
pub fn resample(seq: &[AngleVector], target_len: usize) -> AngleSequence {
    let n = seq.len();
    if n == 0 || target_len == 0 || n == target_len {
        return seq.to_vec();
    }
    if n == 1 {
        return vec![seq[0]; target_len];
    }

    let span = (n - 1) as f64;
    (0..target_len)
        .map(|j| {
            let x = if target_len == 1 {
                0.0
            } else {
                j as f64 / (target_len - 1) as f64
            };
            let pos = x * span;
            let lo = (pos.floor() as usize).min(n - 1);
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;

            let mut out = [0.0; ANGLE_DIMS];
            for (d, slot) in out.iter_mut().enumerate() {
                *slot = seq[lo][d] + (seq[hi][d] - seq[lo][d]) * frac;
            }
            out
        })
        .collect()
}

/// Swap every left/right column pair
pub fn mirror(seq: &[AngleVector]) -> AngleSequence {
    seq.iter().map(mirror_vector).collect()
}

/// Smooth with the default window, then resample to `target_len`
pub fn condition(seq: &[AngleVector], target_len: usize) -> AngleSequence {
    resample(&smooth(seq, DEFAULT_SMOOTHING_WINDOW), target_len)
}
