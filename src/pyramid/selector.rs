/// Picks the pyramid level whose downsample is closest to a requested one.
///
/// Downsamples are ordered non-decreasing with level 0 at 1.0. Requests at or
/// below the first downsample select level 0, at or above the last select the
/// last level. Between those, the level with the smallest absolute difference
/// wins, and on a tie the coarser level is preferred since it needs fewer
/// tiles.
#[derive(Debug, Clone, Copy)]
pub struct DownsampleSelector<'a> {
    downsamples: &'a [f64],
}

impl<'a> DownsampleSelector<'a> {
    pub fn new(downsamples: &'a [f64]) -> Self {
        Self { downsamples }
    }

    /// Index of the level to read for `requested`.
    ///
    /// A NaN request selects level 0.
    pub fn select(&self, requested: f64) -> usize {
        let (Some(&first), Some(&last)) = (self.downsamples.first(), self.downsamples.last()) else {
            return 0;
        };

        if requested.is_nan() || requested <= first {
            return 0;
        }
        if requested >= last {
            return self.downsamples.len() - 1;
        }

        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for (index, &downsample) in self.downsamples.iter().enumerate() {
            let diff = (downsample - requested).abs();
            if diff <= best_diff {
                best = index;
                best_diff = diff;
            }
        }
        best
    }
}
