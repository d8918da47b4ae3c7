//! One-dimensional k-means with seeded k-means++ initialisation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansOptions {
    pub k: usize,
    pub seed: u64,
    /// Independent initialisations; the lowest inertia wins.
    pub n_init: usize,
    pub max_iter: usize,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            k: 3,
            seed: 42,
            n_init: 10,
            max_iter: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per input value.
    pub labels: Vec<usize>,
    pub centroids: Vec<f64>,
    pub inertia: f64,
}

impl KMeansFit {
    /// Cluster indices ordered by descending centroid.
    pub fn ranked_clusters(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.centroids.len()).collect();
        order.sort_by(|&a, &b| self.centroids[b].total_cmp(&self.centroids[a]));
        order
    }
}

/// Clusters `values` into `opts.k` groups.
///
/// `None` when there are fewer distinct values than clusters.
pub fn fit(values: &[f64], opts: &KMeansOptions) -> Option<KMeansFit> {
    let k = opts.k;
    if k == 0 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    if super::stats::distinct_count(values) < k {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut best: Option<KMeansFit> = None;
    for _ in 0..opts.n_init.max(1) {
        let init = init_plus_plus(values, k, &mut rng);
        let run = lloyd(values, init, opts.max_iter);
        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    best
}

fn init_plus_plus(values: &[f64], k: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(values[rng.gen_range(0..values.len())]);

    while centroids.len() < k {
        let d2: Vec<f64> = values
            .iter()
            .map(|v| {
                centroids
                    .iter()
                    .map(|c| (v - c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = d2.iter().sum();

        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = None;
            for (i, w) in d2.iter().enumerate() {
                acc += w;
                if *w > 0.0 && acc >= target {
                    chosen = Some(i);
                    break;
                }
            }
            // Rounding can leave the target just past the last cumulative sum.
            chosen.or_else(|| d2.iter().rposition(|w| *w > 0.0))
        } else {
            None
        };

        match next {
            Some(i) => centroids.push(values[i]),
            None => break,
        }
    }
    centroids
}

fn nearest(v: f64, centroids: &[f64]) -> usize {
    let mut best = 0;
    for (i, c) in centroids.iter().enumerate() {
        if (v - c).abs() < (v - centroids[best]).abs() {
            best = i;
        }
    }
    best
}

fn lloyd(values: &[f64], mut centroids: Vec<f64>, max_iter: usize) -> KMeansFit {
    let k = centroids.len();
    let mut labels: Vec<usize> = values.iter().map(|v| nearest(*v, &centroids)).collect();

    for _ in 0..max_iter.max(1) {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (v, l) in values.iter().zip(&labels) {
            sums[*l] += v;
            counts[*l] += 1;
        }
        for c in 0..k {
            if counts[c] > 0 {
                centroids[c] = sums[c] / counts[c] as f64;
            } else {
                // Empty cluster: move it onto the worst-served value.
                let far = values
                    .iter()
                    .enumerate()
                    .max_by(|(i, a), (j, b)| {
                        let da = (*a - centroids[labels[*i]]).abs();
                        let db = (*b - centroids[labels[*j]]).abs();
                        da.total_cmp(&db)
                    })
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                centroids[c] = values[far];
                labels[far] = c;
            }
        }

        let next: Vec<usize> = values.iter().map(|v| nearest(*v, &centroids)).collect();
        if next == labels {
            break;
        }
        labels = next;
    }

    let inertia = values
        .iter()
        .zip(&labels)
        .map(|(v, l)| (v - centroids[*l]).powi(2))
        .sum();
    KMeansFit {
        labels,
        centroids,
        inertia,
    }
}
