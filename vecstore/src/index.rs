use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distance::l2_squared;
use crate::ivf::IvfFlat;
use crate::record::Hit;

/// Distance metric of an index. Only Euclidean distance is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Metric {
    #[default]
    L2,
}

/// Structure used to answer nearest-neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Exact brute-force scan.
    Flat,
    /// Clustered approximate search with `nlist` inverted lists.
    IvfFlat { nlist: usize },
}

/// Index declaration stored with a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub kind: IndexKind,
    #[serde(default)]
    pub metric: Metric,
}

impl IndexParams {
    pub const DEFAULT_NLIST: usize = 128;

    pub fn ivf_flat(nlist: usize) -> Self {
        Self {
            kind: IndexKind::IvfFlat { nlist },
            metric: Metric::L2,
        }
    }

    pub fn flat() -> Self {
        Self {
            kind: IndexKind::Flat,
            metric: Metric::L2,
        }
    }
}

impl Default for IndexParams {
    fn default() -> Self {
        Self::ivf_flat(Self::DEFAULT_NLIST)
    }
}

/// Per-query search knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Number of inverted lists probed by an IVF index. Ignored by flat
    /// indexes.
    pub nprobe: usize,
}

impl SearchParams {
    pub const DEFAULT_NPROBE: usize = 10;
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            nprobe: Self::DEFAULT_NPROBE,
        }
    }
}

/// An IVF partition is retrained once the collection has grown by this
/// factor since the last training; in between, new vectors join the
/// nearest existing cluster.
pub(crate) const RETRAIN_GROWTH: usize = 2;

/// Immutable searchable view of a collection at one point in time.
///
/// Vectors are reference counted so that extending a snapshot copies
/// pointers, not embeddings.
pub(crate) struct Snapshot {
    ids: Vec<i64>,
    vectors: Vec<Arc<[f32]>>,
    ivf: Option<IvfFlat>,
    /// Collection version this snapshot was built from.
    pub(crate) version: u64,
}

impl Snapshot {
    /// Builds a snapshot holding everything in `base` followed by `added`.
    ///
    /// IVF training needs at least `nlist` records; smaller collections get
    /// an exact scan instead. A clustered `base` is reused until the
    /// population reaches [`RETRAIN_GROWTH`] times its training size.
    pub(crate) fn build(
        params: &IndexParams,
        base: Option<&Snapshot>,
        added: Vec<(i64, Arc<[f32]>)>,
        version: u64,
    ) -> Self {
        let (mut ids, mut vectors) = match base {
            Some(b) => (b.ids.clone(), b.vectors.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let start = ids.len();
        ids.reserve(added.len());
        vectors.reserve(added.len());
        for (id, v) in added {
            ids.push(id);
            vectors.push(v);
        }

        let ivf = match params.kind {
            IndexKind::IvfFlat { nlist } if nlist > 0 && vectors.len() >= nlist => {
                match base.and_then(|b| b.ivf.as_ref()) {
                    Some(prev) if vectors.len() < prev.trained_on() * RETRAIN_GROWTH => {
                        let mut ivf = prev.clone();
                        for (pos, v) in vectors.iter().enumerate().skip(start) {
                            ivf.add(pos, v);
                        }
                        Some(ivf)
                    }
                    _ => Some(IvfFlat::train(&vectors, nlist)),
                }
            }
            _ => None,
        };

        Self {
            ids,
            vectors,
            ivf,
            version,
        }
    }

    /// Number of records the IVF centroids were trained on, if clustered.
    pub(crate) fn trained_on(&self) -> Option<usize> {
        self.ivf.as_ref().map(IvfFlat::trained_on)
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn is_clustered(&self) -> bool {
        self.ivf.is_some()
    }

    /// Returns up to `k` hits ordered by ascending distance, ties broken by
    /// ascending id.
    pub(crate) fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> Vec<Hit> {
        if k == 0 || self.ids.is_empty() {
            return vec![];
        }

        let mut scored: Vec<(f64, i64)> = match &self.ivf {
            Some(ivf) => ivf
                .candidates(query, params.nprobe)
                .into_iter()
                .map(|p| (l2_squared(query, &self.vectors[p]), self.ids[p]))
                .collect(),
            None => self
                .vectors
                .iter()
                .zip(&self.ids)
                .map(|(v, &id)| (l2_squared(query, v), id))
                .collect(),
        };

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(d, id)| Hit {
                id,
                distance: d.sqrt() as f32,
            })
            .collect()
    }
}
