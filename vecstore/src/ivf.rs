//! Inverted-file (IVF) coarse quantizer trained with k-means.
//!
//! Vectors are partitioned into `nlist` clusters. A search probes the
//! `nprobe` clusters whose centroids are closest to the query and ranks the
//! members of those clusters exactly. Results are approximate: a true
//! nearest neighbor assigned to an unprobed cluster is missed.
//!
//! Vectors added after training are assigned to the nearest existing
//! centroid; callers decide when the partition is worth retraining.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::l2_squared;

/// Fixed seed so that training on the same records yields the same index.
const TRAIN_SEED: u64 = 0x5eed_a0d1;

/// Lloyd iterations are capped; assignments usually settle well before.
const MAX_ITER: usize = 25;

/// A trained IVF partition over positions `0..n` of the indexed vectors.
#[derive(Debug, Clone)]
pub struct IvfFlat {
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<u32>>,
    trained: usize,
}

impl IvfFlat {
    /// Trains `nlist` clusters over `vectors` and assigns every vector to
    /// its nearest centroid.
    ///
    /// `nlist` is clamped to the number of distinct vectors. All vectors
    /// must share the same dimension.
    pub fn train<V: AsRef<[f32]>>(vectors: &[V], nlist: usize) -> Self {
        let n = vectors.len();
        let k = nlist.min(n).max(1);
        if n == 0 {
            return Self {
                centroids: vec![],
                lists: vec![],
                trained: 0,
            };
        }

        let mut centroids = seed_centroids(vectors, k);

        let mut assign = vec![usize::MAX; n];
        for _ in 0..MAX_ITER {
            let mut changed = false;
            for (i, v) in vectors.iter().enumerate() {
                let c = nearest(&centroids, v.as_ref());
                if assign[i] != c {
                    assign[i] = c;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            centroids = recompute(vectors, &mut assign, &centroids);
        }

        // Final assignment against the final centroids so a query equal to a
        // stored vector always probes that vector's list first.
        let mut lists = vec![Vec::new(); centroids.len()];
        for (i, v) in vectors.iter().enumerate() {
            lists[nearest(&centroids, v.as_ref())].push(i as u32);
        }
        Self {
            centroids,
            lists,
            trained: n,
        }
    }

    /// Assigns the vector at position `pos` to its nearest centroid without
    /// moving any centroid.
    pub fn add(&mut self, pos: usize, vector: &[f32]) {
        if self.centroids.is_empty() {
            return;
        }
        let c = nearest(&self.centroids, vector);
        self.lists[c].push(pos as u32);
    }

    /// Number of clusters.
    pub fn nlist(&self) -> usize {
        self.centroids.len()
    }

    /// Number of vectors the centroids were trained on.
    pub fn trained_on(&self) -> usize {
        self.trained
    }

    /// Returns the indices of the `nprobe` clusters closest to `query`,
    /// nearest first.
    pub fn probe(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        let mut order: Vec<(usize, f64)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, l2_squared(query, c)))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        order.truncate(nprobe.max(1));
        order.into_iter().map(|(i, _)| i).collect()
    }

    /// Positions of the indexed vectors stored in the probed clusters.
    pub fn candidates(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        self.probe(query, nprobe)
            .into_iter()
            .flat_map(|l| self.lists[l].iter().map(|&p| p as usize))
            .collect()
    }

    /// Size of every inverted list, in cluster order.
    pub fn list_sizes(&self) -> Vec<usize> {
        self.lists.iter().map(Vec::len).collect()
    }
}

/// Farthest-first seeding: a random first centroid, then repeatedly the
/// vector farthest from every centroid chosen so far. Stops early when the
/// remaining vectors duplicate existing centroids.
fn seed_centroids<V: AsRef<[f32]>>(vectors: &[V], k: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(TRAIN_SEED);
    let first = rng.random_range(0..vectors.len());
    let mut centroids = vec![vectors[first].as_ref().to_vec()];
    let mut min_d: Vec<f64> = vectors
        .iter()
        .map(|v| l2_squared(v.as_ref(), &centroids[0]))
        .collect();

    while centroids.len() < k {
        let Some((far, d)) = min_d
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            break;
        };
        if d <= 0.0 {
            break;
        }
        let c = vectors[far].as_ref().to_vec();
        for (m, v) in min_d.iter_mut().zip(vectors) {
            *m = m.min(l2_squared(v.as_ref(), &c));
        }
        centroids.push(c);
    }
    centroids
}

fn nearest(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = l2_squared(v, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Mean of each cluster. An emptied cluster is re-seeded with the vector
/// farthest from its own centroid so that `nlist` stays constant; the moved
/// vector is reassigned so it cannot seed a second empty cluster.
fn recompute<V: AsRef<[f32]>>(
    vectors: &[V],
    assign: &mut [usize],
    old: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let k = old.len();
    let dim = old.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0f64; dim]; k];
    let mut counts = vec![0usize; k];

    for (v, &c) in vectors.iter().zip(assign.iter()) {
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(v.as_ref()) {
            *s += *x as f64;
        }
    }

    let mut centroids: Vec<Vec<f32>> = sums
        .into_iter()
        .zip(&counts)
        .zip(old)
        .map(|((sum, &count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| (s / count as f64) as f32).collect()
            }
        })
        .collect();

    for c in 0..k {
        if counts[c] > 0 {
            continue;
        }
        let far = vectors
            .iter()
            .enumerate()
            .filter(|(i, _)| counts[assign[*i]] > 1)
            .max_by(|(i, a), (j, b)| {
                l2_squared(a.as_ref(), &centroids[assign[*i]])
                    .total_cmp(&l2_squared(b.as_ref(), &centroids[assign[*j]]))
            })
            .map(|(i, _)| i);
        if let Some(i) = far {
            counts[assign[i]] -= 1;
            counts[c] = 1;
            assign[i] = c;
            centroids[c] = vectors[i].as_ref().to_vec();
        }
    }
    centroids
}
