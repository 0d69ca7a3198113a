//! Linear interpolation by row position.

/// Fill missing entries from their nearest present neighbours.
///
/// An interior gap between positions `a < i < b` becomes
/// `v(a) + (v(b) - v(a)) * (i - a) / (b - a)`. A gap at either end takes the
/// value of the nearest present entry. A column with no present value is
/// returned unchanged.
pub fn interpolate_linear(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();
    let (Some(&(first_pos, first)), Some(&(last_pos, last))) = (known.first(), known.last()) else {
        return values.to_vec();
    };

    let mut out = values.to_vec();
    for (i, slot) in out.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        *slot = Some(if i < first_pos {
            first
        } else if i > last_pos {
            last
        } else {
            // known is sorted by position; the gap sits between two entries
            let next = known.partition_point(|&(pos, _)| pos < i);
            let (a, va) = known[next - 1];
            let (b, vb) = known[next];
            va + (vb - va) * (i - a) as f64 / (b - a) as f64
        });
    }
    out
}
