pub struct StatsHelper;

impl StatsHelper {
    pub fn mean<I: IntoIterator<Item = f64>>(samples: I) -> f64 {
        let (sum, count) = samples
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
        if count == 0 {
            return 0.0;
        }
        sum / count as f64
    }

    /// `rank`-th smallest value (1-based). Reorders `scratch` in place.
    pub fn kth_smallest(scratch: &mut [u8], rank: usize) -> Option<u8> {
        if rank == 0 || rank > scratch.len() {
            return None;
        }
        let (_, value, _) = scratch.select_nth_unstable(rank - 1);
        Some(*value)
    }
}
