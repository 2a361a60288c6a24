use crate::*;

pub type HitBuilderOf<G> =
  HitRecordBuilder<<G as PickSceneGraph>::Node, <G as PickSceneGraph>::Geometry>;

/// Lazily turns scored candidates into hits under construction.
///
/// Candidates are only pulled from `C` when the next hit is pulled, so a
/// consumer that stops after the first hit never measures or resolves anything
/// beyond it. Stale
/// sources, detached branches, unresolvable paths and candidates outside the
/// query root are skipped silently.
pub struct HitAggregation<'a, G: PickSceneGraph, C> {
  graph: &'a G,
  root: PickRoot<G::Node>,
  prefix: Option<Vec<G::Node>>,
  flags: PickFlags,
  precision: PickPrecision,
  candidates: C,
  reported_text_sources: FxHashSet<G::Node>,
  pending: VecDeque<HitBuilderOf<G>>,
}

impl<'a, G, C> HitAggregation<'a, G, C>
where
  G: PickSceneGraph,
  C: Iterator<Item = ScoredCandidate<'a, G::Node>>,
{
  pub fn new(
    graph: &'a G,
    root: PickRoot<G::Node>,
    candidates: impl IntoIterator<IntoIter = C>,
    flags: PickFlags,
    precision: PickPrecision,
  ) -> Self {
    let prefix = match root {
      PickRoot::Scene => None,
      PickRoot::Branch(branch) => Some(root_prefix_path(graph, branch)),
    };

    Self {
      graph,
      root,
      prefix,
      flags,
      precision,
      candidates: candidates.into_iter(),
      reported_text_sources: Default::default(),
      pending: Default::default(),
    }
  }

  fn expand(&mut self, scored: ScoredCandidate<'a, G::Node>) {
    let graph = self.graph;
    let candidate = scored.candidate;
    let source = candidate.source;

    if !candidate.is_inside(&self.root) {
      log::trace!("pick candidate {source:?} is outside the query root, skipped");
      return;
    }

    let Some(kind) = graph.source_kind(source) else {
      log::trace!("pick candidate {source:?} has a stale source, skipped");
      return;
    };

    // several low level records of one text node collapse into one hit
    let text = matches!(kind, SourceKind::Shape { text: true });
    if text && self.reported_text_sources.contains(&source) {
      log::trace!("text source {source:?} already reported, skipped");
      return;
    }

    let Some(local_to_world) = graph.local_to_world(source, &candidate.key) else {
      log::trace!("pick candidate {source:?} lost its transform, skipped");
      return;
    };

    let path_nodes = if self.flags.contains(PickFlags::PATH) {
      let Some(resolved) = resolve_path(graph, source, self.root.path_stop(), &candidate.key)
      else {
        log::trace!("no scene path for pick candidate {source:?}, skipped");
        return;
      };
      Some(merge_path(&resolved, self.prefix.as_deref()))
    } else {
      None
    };

    if text {
      self.reported_text_sources.insert(source);
    }

    let originals = match kind {
      SourceKind::Merged(originals) => originals,
      SourceKind::Shape { .. } | SourceKind::Morph => std::slice::from_ref(&candidate.source),
    };

    for &reported in originals {
      let target = PickTarget {
        node: reported,
        local_to_world,
      };
      let mut record = HitRecordBuilder::new(target, candidate.key.clone(), scored.distance);

      if let Some(nodes) = &path_nodes {
        record.set_path(ScenePath {
          nodes: nodes.clone(),
          leaf: reported,
          local_to_world,
        });
      }
      if self.flags.contains(PickFlags::NODE) {
        record.set_node(reported);
      }
      if self.flags.contains(PickFlags::TRANSFORM) {
        record.set_local_to_world(local_to_world);
      }
      // bounds picks report the bounds distance, geometry picks get the exact
      // one from the refinement
      if self.precision == PickPrecision::Bounds && self.flags.contains(PickFlags::CLOSEST_DISTANCE)
      {
        record.set_closest_distance(scored.distance);
      }

      self.pending.push_back(record);
    }
  }
}

impl<'a, G, C> Iterator for HitAggregation<'a, G, C>
where
  G: PickSceneGraph,
  C: Iterator<Item = ScoredCandidate<'a, G::Node>>,
{
  type Item = HitBuilderOf<G>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(record) = self.pending.pop_front() {
        return Some(record);
      }
      let scored = self.candidates.next()?;
      self.expand(scored);
    }
  }
}

/// Build the hits of `candidates` eagerly. Under [`PickPolicy::Any`] this
/// returns as soon as one hit exists.
pub fn aggregate<'a, G: PickSceneGraph>(
  graph: &'a G,
  root: PickRoot<G::Node>,
  candidates: impl IntoIterator<Item = ScoredCandidate<'a, G::Node>>,
  flags: PickFlags,
  precision: PickPrecision,
  policy: PickPolicy,
) -> Vec<HitBuilderOf<G>> {
  if flags.is_empty() {
    return Vec::new();
  }

  let hits = HitAggregation::new(graph, root, candidates, flags, precision);
  match policy {
    PickPolicy::Any => hits.take(1).collect(),
    PickPolicy::All | PickPolicy::AllSorted => hits.collect(),
  }
}
