use std::cmp::Ordering;

/// Append the indices of the `n` strongest bins of `power` to `out`, one byte each.
///
/// Bins are ordered by descending power, ties by ascending index. Indices
/// above 255 saturate to 255, so very wide windows lose resolution among
/// their upper bins.
pub fn encode_top_bins(power: &[f64], n: usize, order: &mut Vec<usize>, out: &mut Vec<u8>) {
    let n = n.min(power.len());
    if n == 0 {
        return;
    }

    let by_power = |&a: &usize, &b: &usize| -> Ordering {
        power[b].total_cmp(&power[a]).then(a.cmp(&b))
    };

    order.clear();
    order.extend(0..power.len());
    if n < order.len() {
        order.select_nth_unstable_by(n - 1, by_power);
    }
    let top = &mut order[..n];
    top.sort_unstable_by(by_power);

    out.extend(top.iter().map(|&bin| bin.min(u8::MAX as usize) as u8));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(power: &[f64], n: usize) -> Vec<u8> {
        let mut order = Vec::new();
        let mut out = Vec::new();
        encode_top_bins(power, n, &mut order, &mut out);
        out
    }

    #[test]
    fn picks_strongest_bins_in_descending_order() {
        let power = [0.5, 9.0, 1.0, 7.0, 3.0, 8.0];
        assert_eq!(encode(&power, 3), vec![1, 5, 3]);
    }

    #[test]
    fn ties_resolve_by_lower_index() {
        let power = [1.0, 4.0, 4.0, 0.0, 4.0];
        assert_eq!(encode(&power, 2), vec![1, 2]);
        assert_eq!(encode(&power, 4), vec![1, 2, 4, 0]);
    }

    #[test]
    fn high_bins_saturate() {
        let mut power = vec![0.0; 512];
        power[300] = 10.0;
        power[256] = 9.0;
        power[255] = 8.0;
        power[3] = 7.0;
        assert_eq!(encode(&power, 4), vec![255, 255, 255, 3]);
    }

    #[test]
    fn appends_to_existing_output() {
        let mut order = Vec::new();
        let mut out = vec![42];
        encode_top_bins(&[1.0, 2.0], 1, &mut order, &mut out);
        assert_eq!(out, vec![42, 1]);
    }
}
