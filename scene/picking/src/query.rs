use parking_lot::RwLock;

use crate::*;

pub type HitOf<G> = HitRecord<<G as PickSceneGraph>::Node, <G as PickSceneGraph>::Geometry>;

/// Resolve a pick against a scene that stays borrowed for the whole query.
///
/// `candidates` are the low-level records whose bounds met `shape`. Geometry
/// precision any-picks interleave aggregation and refinement so that nothing
/// past the first confirmed hit is resolved.
pub fn pick<G, S, I>(
  graph: &G,
  root: PickRoot<G::Node>,
  candidates: &[GeometryCandidate<G::Node>],
  options: &PickOptions,
  shape: &S,
  intersector: &I,
) -> Result<Vec<HitOf<G>>, PickError>
where
  G: PickSceneGraph,
  S: PickShape + ?Sized,
  I: GeometryIntersector<G, S> + ?Sized,
{
  let flags = options.effective_flags();
  if !can_resolve(graph, root, options, candidates.len()) {
    return Ok(Vec::new());
  }

  let scored = score_for_policy(candidates, shape, options.policy);
  let hits = HitAggregation::new(graph, root, scored, flags, options.precision);

  let resolved = match options.precision {
    PickPrecision::Bounds => match options.policy {
      PickPolicy::Any => hits.take(1).collect(),
      PickPolicy::All | PickPolicy::AllSorted => hits.collect(),
    },
    PickPrecision::Geometry => refine_hits(graph, shape, intersector, flags, options.policy, hits)?,
  };

  Ok(finish_hits(resolved, options.policy))
}

/// Resolve a pick against a scene shared with concurrent writers.
///
/// Gathering and aggregation run under one read guard. The guard is released
/// before refinement, which then takes a short read guard per hit, so a long
/// geometry pick never stalls a writer for its whole duration. Hits whose
/// target is removed in between are dropped.
pub fn pick_shared<G, S, I>(
  scene: &RwLock<G>,
  root: PickRoot<G::Node>,
  options: &PickOptions,
  shape: &S,
  intersector: &I,
  gather: impl FnOnce(&G, &S) -> Vec<GeometryCandidate<G::Node>>,
) -> Result<Vec<HitOf<G>>, PickError>
where
  G: PickSceneGraph,
  S: PickShape + ?Sized,
  I: GeometryIntersector<G, S> + ?Sized,
{
  let flags = options.effective_flags();

  let aggregated = {
    let graph = scene.read();
    let candidates = gather(&*graph, shape);
    if !can_resolve(&*graph, root, options, candidates.len()) {
      return Ok(Vec::new());
    }
    let scored = score_for_policy(&candidates, shape, options.policy);

    // refinement may reject any hit, so the early exit has to wait for it
    let policy = match options.precision {
      PickPrecision::Bounds => options.policy,
      PickPrecision::Geometry => PickPolicy::All,
    };
    aggregate(&*graph, root, scored, flags, options.precision, policy)
  };

  let resolved = match options.precision {
    PickPrecision::Bounds => aggregated,
    PickPrecision::Geometry => {
      let mut kept = Vec::new();
      for mut record in aggregated {
        let confirmed = {
          let graph = scene.read();
          refine_hit(&*graph, shape, intersector, flags, &mut record)?
        };
        if confirmed {
          kept.push(record);
          if options.policy == PickPolicy::Any {
            break;
          }
        }
      }
      kept
    }
  };

  Ok(finish_hits(resolved, options.policy))
}

fn can_resolve<G: PickSceneGraph>(
  graph: &G,
  root: PickRoot<G::Node>,
  options: &PickOptions,
  candidate_count: usize,
) -> bool {
  let flags = options.effective_flags();
  if flags.is_empty() {
    log::debug!("pick requested no facets, nothing to resolve");
    return false;
  }
  if let PickRoot::Branch(branch) = root {
    if !graph.is_alive(branch) {
      log::debug!("pick root {branch:?} is gone, nothing to resolve");
      return false;
    }
  }
  if options.precision == PickPrecision::Bounds && flags.intersects(PickFlags::GEOMETRY_ONLY) {
    log::debug!(
      "bounds precision pick leaves {:?} empty",
      flags & PickFlags::GEOMETRY_ONLY
    );
  }
  log::debug!(
    "resolving {:?} {:?} pick over {candidate_count} candidates",
    options.precision,
    options.policy
  );
  candidate_count > 0
}

/// Only sorted picks need every bounds distance up front.
fn score_for_policy<'a, N: Copy + 'a, S: PickShape + ?Sized>(
  candidates: &'a [GeometryCandidate<N>],
  shape: &'a S,
  policy: PickPolicy,
) -> Box<dyn Iterator<Item = ScoredCandidate<'a, N>> + 'a> {
  match policy {
    PickPolicy::AllSorted => {
      let mut scored = score_candidates(candidates, shape);
      sort_candidates_by_bounds(&mut scored);
      Box::new(scored.into_iter())
    }
    PickPolicy::Any | PickPolicy::All => Box::new(score_lazily(candidates, shape)),
  }
}

/// Freeze the hits under construction, ordering them by closest distance for
/// sorted picks.
pub fn finish_hits<N: Copy, M>(
  hits: Vec<HitRecordBuilder<N, M>>,
  policy: PickPolicy,
) -> Vec<HitRecord<N, M>> {
  let mut hits = hits;
  if policy == PickPolicy::AllSorted {
    sort_by_distance(&mut hits, |hit| hit.closest_distance());
  }
  let hits: Vec<_> = hits.into_iter().map(HitRecordBuilder::build).collect();
  log::debug!("pick resolved {} hits", hits.len());
  hits
}

/// Convenience entry points over one scene and one geometry intersector.
pub struct ScenePicker<'a, G, I> {
  graph: &'a G,
  intersector: I,
}

impl<'a, G: PickSceneGraph, I> ScenePicker<'a, G, I> {
  pub fn new(graph: &'a G, intersector: I) -> Self {
    Self { graph, intersector }
  }

  pub fn pick<S>(
    &self,
    root: PickRoot<G::Node>,
    candidates: &[GeometryCandidate<G::Node>],
    options: &PickOptions,
    shape: &S,
  ) -> Result<Vec<HitOf<G>>, PickError>
  where
    S: PickShape + ?Sized,
    I: GeometryIntersector<G, S>,
  {
    pick(self.graph, root, candidates, options, shape, &self.intersector)
  }

  pub fn pick_any<S>(
    &self,
    root: PickRoot<G::Node>,
    candidates: &[GeometryCandidate<G::Node>],
    precision: PickPrecision,
    flags: PickFlags,
    shape: &S,
  ) -> Result<Option<HitOf<G>>, PickError>
  where
    S: PickShape + ?Sized,
    I: GeometryIntersector<G, S>,
  {
    let options = PickOptions::new(precision, flags, PickPolicy::Any);
    Ok(self.pick(root, candidates, &options, shape)?.into_iter().next())
  }

  pub fn pick_all<S>(
    &self,
    root: PickRoot<G::Node>,
    candidates: &[GeometryCandidate<G::Node>],
    precision: PickPrecision,
    flags: PickFlags,
    shape: &S,
  ) -> Result<Vec<HitOf<G>>, PickError>
  where
    S: PickShape + ?Sized,
    I: GeometryIntersector<G, S>,
  {
    let options = PickOptions::new(precision, flags, PickPolicy::All);
    self.pick(root, candidates, &options, shape)
  }

  pub fn pick_all_sorted<S>(
    &self,
    root: PickRoot<G::Node>,
    candidates: &[GeometryCandidate<G::Node>],
    precision: PickPrecision,
    flags: PickFlags,
    shape: &S,
  ) -> Result<Vec<HitOf<G>>, PickError>
  where
    S: PickShape + ?Sized,
    I: GeometryIntersector<G, S>,
  {
    let options = PickOptions::new(precision, flags, PickPolicy::AllSorted);
    self.pick(root, candidates, &options, shape)
  }

  /// The nearest hit, if any.
  pub fn pick_closest<S>(
    &self,
    root: PickRoot<G::Node>,
    candidates: &[GeometryCandidate<G::Node>],
    precision: PickPrecision,
    flags: PickFlags,
    shape: &S,
  ) -> Result<Option<HitOf<G>>, PickError>
  where
    S: PickShape + ?Sized,
    I: GeometryIntersector<G, S>,
  {
    Ok(
      self
        .pick_all_sorted(root, candidates, precision, flags, shape)?
        .into_iter()
        .next(),
    )
  }
}
