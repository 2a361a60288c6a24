use crate::*;

bitflags::bitflags! {
  /// Read/intersect permissions granted on pickable nodes and their geometry.
  #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
  pub struct Capabilities: u32 {
    /// node: allow reading its geometry (or morph geometry arrays).
    /// compressed geometry: allow reading its payload.
    const GEOMETRY_READ = 0x01;
    const INTERSECT = 0x02;
    const COORDINATE_READ = 0x04;
    const COUNT_READ = 0x08;
    const FORMAT_READ = 0x10;
    const COORDINATE_INDEX_READ = 0x20;
  }
}

/// What a candidate's logical source node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind<'a, N> {
  /// A plain renderable leaf. `text` marks sources whose geometry is split
  /// into several low-level records that must be reported once.
  Shape { text: bool },
  Morph,
  /// A compiled merge of originally distinct nodes.
  Merged(&'a [N]),
}

/// The kind of node the exact geometry test runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickableKind {
  Shape,
  Morph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
  Array { indexed: bool },
  Compressed,
  Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometrySlot<M> {
  pub geometry: M,
  pub kind: GeometryKind,
  pub capabilities: Capabilities,
}

/// Read only access to the retained scene graph a pick runs against.
///
/// Every accessor answers `None` for nodes that were removed or detached, the
/// pick resolution treats that as "this candidate contributes nothing".
pub trait PickSceneGraph {
  type Node: Copy + Eq + Hash + Debug;
  type Geometry: Copy + Eq + Debug;

  fn is_alive(&self, node: Self::Node) -> bool;

  /// The single parent of a node. Shared groups have none, they are reached
  /// through [`PickSceneGraph::shared_group_links`] instead.
  fn parent(&self, node: Self::Node) -> Option<Self::Node>;

  /// Whether `node` sits directly on the scene boundary, as opposed to having
  /// no parent because its branch was detached.
  fn is_scene_root(&self, node: Self::Node) -> bool;

  fn pick_reporting(&self, node: Self::Node) -> bool;

  /// The link nodes instantiating `node`, or `None` if it is not a shared group.
  fn shared_group_links(&self, node: Self::Node) -> Option<&[Self::Node]>;

  fn link_instance(&self, link: Self::Node) -> Option<InstanceId>;

  /// Current local to world transform of `node`, instantiated through `key`.
  fn local_to_world(&self, node: Self::Node, key: &InstancingKey) -> Option<Matrix4<f64>>;

  fn source_kind(&self, node: Self::Node) -> Option<SourceKind<'_, Self::Node>>;

  fn pickable_kind(&self, node: Self::Node) -> Option<PickableKind>;

  fn node_capabilities(&self, node: Self::Node) -> Option<Capabilities>;

  fn geometry_count(&self, node: Self::Node) -> usize;

  /// `None` for an empty slot or a stale node.
  fn geometry_slot(&self, node: Self::Node, index: usize) -> Option<GeometrySlot<Self::Geometry>>;
}

/// The exact per-primitive test used by geometry precision picks.
///
/// Implementations read the target through [`HitRecordBuilder::target`], and
/// fill the closeness facets `flags` asks for. Returning `false` means the
/// pick shape misses the node's primitives.
pub trait GeometryIntersector<G: PickSceneGraph, S: ?Sized> {
  fn intersect(
    &self,
    graph: &G,
    shape: &S,
    flags: PickFlags,
    record: &mut HitRecordBuilder<G::Node, G::Geometry>,
  ) -> bool;
}

impl<G, S, F> GeometryIntersector<G, S> for F
where
  G: PickSceneGraph,
  S: ?Sized,
  F: Fn(&G, &S, PickFlags, &mut HitRecordBuilder<G::Node, G::Geometry>) -> bool,
{
  fn intersect(
    &self,
    graph: &G,
    shape: &S,
    flags: PickFlags,
    record: &mut HitRecordBuilder<G::Node, G::Geometry>,
  ) -> bool {
    self(graph, shape, flags, record)
  }
}
