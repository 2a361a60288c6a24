use crate::*;

/// One low-level geometry record whose bounds already met the pick shape.
///
/// A single logical source node may produce several candidates (text glyphs),
/// and several candidates may share a source through different instancing keys.
#[derive(Debug, Clone)]
pub struct GeometryCandidate<N> {
  /// the logical source node, the leaf of the reported path
  pub source: N,
  /// which instantiation of shared subgraphs produced this record
  pub key: InstancingKey,
  /// branch groups this record lives under, `None` when unknown
  pub branch_groups: Option<SmallVec<[N; 4]>>,
  pub world_bounds: Box3,
}

impl<N: Copy + Eq> GeometryCandidate<N> {
  pub fn new(source: N, key: InstancingKey, world_bounds: Box3) -> Self {
    Self {
      source,
      key,
      branch_groups: None,
      world_bounds,
    }
  }

  pub fn with_branch_groups(mut self, groups: impl IntoIterator<Item = N>) -> Self {
    self.branch_groups = Some(groups.into_iter().collect());
    self
  }

  /// Whether this record belongs to the subtree a query is scoped to.
  pub fn is_inside(&self, root: &PickRoot<N>) -> bool {
    match (root, &self.branch_groups) {
      (PickRoot::Branch(branch), Some(groups)) => groups.contains(branch),
      _ => true,
    }
  }
}

/// A candidate together with its bounds distance to the pick shape.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a, N> {
  pub candidate: &'a GeometryCandidate<N>,
  pub distance: f64,
}

impl<'a, N> ScoredCandidate<'a, N> {
  /// Candidates the shape no longer meets (their bounds moved since gathering)
  /// measure infinitely far.
  pub fn measure(candidate: &'a GeometryCandidate<N>, shape: &(impl PickShape + ?Sized)) -> Self {
    Self {
      candidate,
      distance: shape
        .intersect_bounds(&candidate.world_bounds)
        .unwrap_or(f64::INFINITY),
    }
  }
}

/// Measure each candidate against `shape` only when it is pulled.
pub fn score_lazily<'a, N, S: PickShape + ?Sized>(
  candidates: &'a [GeometryCandidate<N>],
  shape: &'a S,
) -> impl Iterator<Item = ScoredCandidate<'a, N>> + 'a {
  candidates
    .iter()
    .map(move |candidate| ScoredCandidate::measure(candidate, shape))
}

/// Measure every candidate against `shape`.
pub fn score_candidates<'a, N>(
  candidates: &'a [GeometryCandidate<N>],
  shape: &(impl PickShape + ?Sized),
) -> Vec<ScoredCandidate<'a, N>> {
  candidates
    .iter()
    .map(|candidate| ScoredCandidate::measure(candidate, shape))
    .collect()
}

/// Order candidates nearest bounds first.
pub fn sort_candidates_by_bounds<N>(scored: &mut [ScoredCandidate<'_, N>]) {
  sort_by_distance(scored, |c| c.distance);
}
