//! Quantile binning of feature columns for histogram split finding

use crate::models::FeatureVector;

/// Cut points for one feature column.
///
/// A value lands in bin `b` when `cuts[b-1] < value <= cuts[b]`, so a split
/// "left if bin <= b" is the same as "left if value <= cuts[b]".
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BinMapper {
    cuts: Vec<f64>,
}

impl BinMapper {
    /// Build cut points from a column, at most `max_bins` bins.
    ///
    /// Cuts sit halfway between adjacent distinct values. With more distinct
    /// values than bins, cuts are placed so each bin holds roughly the same
    /// number of rows.
    pub(crate) fn from_values(values: &[f64], max_bins: usize) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut distinct: Vec<(f64, usize)> = Vec::new();
        for v in sorted {
            match distinct.last_mut() {
                Some((last, count)) if *last == v => *count += 1,
                _ => distinct.push((v, 1)),
            }
        }

        let mut cuts = Vec::new();
        if distinct.len() <= max_bins {
            cuts.extend(distinct.windows(2).map(|w| midpoint(w[0].0, w[1].0)));
        } else {
            let per_bin = values.len() as f64 / max_bins as f64;
            let mut seen = 0usize;
            for w in distinct.windows(2) {
                seen += w[0].1;
                if cuts.len() + 1 >= max_bins {
                    break;
                }
                if seen as f64 >= per_bin * (cuts.len() + 1) as f64 {
                    cuts.push(midpoint(w[0].0, w[1].0));
                }
            }
        }

        Self { cuts }
    }

    pub(crate) fn n_bins(&self) -> usize {
        self.cuts.len() + 1
    }

    #[inline]
    pub(crate) fn bin(&self, value: f64) -> u8 {
        self.cuts.partition_point(|&c| c < value) as u8
    }

    /// Upper bound of a bin, used as the split threshold
    pub(crate) fn threshold(&self, bin: usize) -> f64 {
        self.cuts[bin]
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    a + (b - a) / 2.0
}

/// Column-major matrix of bin indices
#[derive(Debug)]
pub(crate) struct BinnedMatrix {
    n_rows: usize,
    mappers: Vec<BinMapper>,
    bins: Vec<u8>,
}

impl BinnedMatrix {
    pub(crate) fn build(rows: &[FeatureVector], n_features: usize, max_bins: usize) -> Self {
        let n_rows = rows.len();
        let mut mappers = Vec::with_capacity(n_features);
        let mut bins = Vec::with_capacity(n_rows * n_features);
        let mut column = Vec::with_capacity(n_rows);

        for feature in 0..n_features {
            column.clear();
            column.extend(rows.iter().map(|r| r.as_slice()[feature]));
            let mapper = BinMapper::from_values(&column, max_bins);
            bins.extend(column.iter().map(|&v| mapper.bin(v)));
            mappers.push(mapper);
        }

        Self {
            n_rows,
            mappers,
            bins,
        }
    }

    pub(crate) fn n_features(&self) -> usize {
        self.mappers.len()
    }

    pub(crate) fn mapper(&self, feature: usize) -> &BinMapper {
        &self.mappers[feature]
    }

    /// Bin indices of one feature for every row
    #[inline]
    pub(crate) fn column(&self, feature: usize) -> &[u8] {
        &self.bins[feature * self.n_rows..(feature + 1) * self.n_rows]
    }
}
