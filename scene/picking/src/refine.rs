use crate::*;

/// Check the permissions an exact geometry test needs on `node`.
///
/// `Ok(None)` means the node went stale since gathering and the hit should be
/// dropped. A missing permission fails the whole query.
pub fn check_pick_capabilities<G: PickSceneGraph>(
  graph: &G,
  node: G::Node,
) -> Result<Option<PickableKind>, PickError> {
  let (Some(kind), Some(granted)) = (graph.pickable_kind(node), graph.node_capabilities(node))
  else {
    return Ok(None);
  };

  let missing = Capabilities::GEOMETRY_READ.difference(granted);
  if !missing.is_empty() {
    let err = PickError::NodeCapabilityNotSet {
      node: format!("{node:?}"),
      missing,
    };
    log::warn!("{err}");
    return Err(err);
  }

  for geometry_index in 0..graph.geometry_count(node) {
    let Some(slot) = graph.geometry_slot(node, geometry_index) else {
      continue;
    };
    // morph targets are blended as plain vertex arrays
    let slot_kind = match (kind, slot.kind) {
      (PickableKind::Morph, GeometryKind::Compressed | GeometryKind::Text) => {
        GeometryKind::Array { indexed: false }
      }
      (_, slot_kind) => slot_kind,
    };
    let missing = required_geometry_capabilities(slot_kind).difference(slot.capabilities);
    if !missing.is_empty() {
      let err = PickError::GeometryCapabilityNotSet {
        node: format!("{node:?}"),
        geometry_index,
        missing,
      };
      log::warn!("{err}");
      return Err(err);
    }
  }

  Ok(Some(kind))
}

pub fn required_geometry_capabilities(kind: GeometryKind) -> Capabilities {
  match kind {
    GeometryKind::Array { indexed } => {
      let mut required = Capabilities::INTERSECT
        | Capabilities::COORDINATE_READ
        | Capabilities::COUNT_READ
        | Capabilities::FORMAT_READ;
      if indexed {
        required |= Capabilities::COORDINATE_INDEX_READ;
      }
      required
    }
    GeometryKind::Compressed => Capabilities::INTERSECT | Capabilities::GEOMETRY_READ,
    GeometryKind::Text => Capabilities::INTERSECT,
  }
}

/// Run the exact test for one hit. `Ok(false)` drops the hit, either because
/// the shape misses the primitives or because the target went stale.
pub fn refine_hit<G, S, I>(
  graph: &G,
  shape: &S,
  intersector: &I,
  flags: PickFlags,
  record: &mut HitBuilderOf<G>,
) -> Result<bool, PickError>
where
  G: PickSceneGraph,
  S: ?Sized,
  I: GeometryIntersector<G, S> + ?Sized,
{
  let node = record.target().node;
  if check_pick_capabilities(graph, node)?.is_none() {
    log::trace!("refine target {node:?} went stale, dropped");
    return Ok(false);
  }
  Ok(intersector.intersect(graph, shape, flags, record))
}

/// Keep the hits whose geometry really meets `shape`, in their current order.
/// Under [`PickPolicy::Any`] this stops at the first success.
pub fn refine_hits<G, S, I>(
  graph: &G,
  shape: &S,
  intersector: &I,
  flags: PickFlags,
  policy: PickPolicy,
  hits: impl IntoIterator<Item = HitBuilderOf<G>>,
) -> Result<Vec<HitBuilderOf<G>>, PickError>
where
  G: PickSceneGraph,
  S: ?Sized,
  I: GeometryIntersector<G, S> + ?Sized,
{
  let mut kept = Vec::new();
  for mut record in hits {
    if refine_hit(graph, shape, intersector, flags, &mut record)? {
      kept.push(record);
      if policy == PickPolicy::Any {
        break;
      }
    }
  }
  Ok(kept)
}
