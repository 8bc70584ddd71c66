//! Envelope reduction for waveform previews

/// Reduce `samples` to one (min, max) pair per column
///
/// Columns cover `ceil(len / width)` samples each, so the whole signal fits in
/// `width` columns. When there are fewer samples than columns the trailing
/// columns have nothing to cover and are left out of the result; index `i` of
/// the result is always column `i`.
pub fn compute_envelope(samples: &[f32], width: usize) -> Vec<(f32, f32)> {
    if samples.is_empty() || width == 0 {
        return Vec::new();
    }

    let step = samples.len().div_ceil(width);

    samples
        .chunks(step)
        .take(width)
        .map(|window| {
            window
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &s| {
                    (min.min(s), max.max(s))
                })
        })
        .collect()
}
