//! A small retained scene graph that can be picked.
//!
//! Nodes and geometries live in generational slot maps, so handles kept across
//! a removal resolve to nothing instead of to a recycled node.

use cgmath::SquareMatrix;
use slotmap::{new_key_type, SlotMap};

use crate::*;

new_key_type! {
  pub struct SceneNodeKey;
  pub struct GeometryKey;
}

#[derive(Debug, Clone)]
pub struct SceneGeometry {
  pub kind: GeometryKind,
  pub capabilities: Capabilities,
  pub positions: Vec<Point3<f64>>,
  /// triangle list indices, `None` for non indexed geometry
  pub indices: Option<Vec<u32>>,
}

impl SceneGeometry {
  fn create(kind: GeometryKind, positions: Vec<Point3<f64>>, indices: Option<Vec<u32>>) -> Self {
    Self {
      kind,
      capabilities: Capabilities::all(),
      positions,
      indices,
    }
  }

  pub fn triangles(positions: Vec<Point3<f64>>) -> Self {
    Self::create(GeometryKind::Array { indexed: false }, positions, None)
  }

  pub fn indexed_triangles(positions: Vec<Point3<f64>>, indices: Vec<u32>) -> Self {
    Self::create(GeometryKind::Array { indexed: true }, positions, Some(indices))
  }

  pub fn compressed(positions: Vec<Point3<f64>>) -> Self {
    Self::create(GeometryKind::Compressed, positions, None)
  }

  /// The triangles of one glyph of a text node.
  pub fn glyph(positions: Vec<Point3<f64>>) -> Self {
    Self::create(GeometryKind::Text, positions, None)
  }

  pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
    self.capabilities = capabilities;
    self
  }

  pub fn local_bounds(&self) -> Box3 {
    self.positions.iter().copied().collect()
  }

  /// Every triangle with the vertex indices it was built from.
  pub fn iter_triangles(&self) -> impl Iterator<Item = ([Point3<f64>; 3], [u32; 3])> + '_ {
    let indices: Box<dyn Iterator<Item = [u32; 3]> + '_> = match &self.indices {
      Some(indices) => Box::new(indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])),
      None => Box::new((0..self.positions.len() as u32 / 3).map(|t| [t * 3, t * 3 + 1, t * 3 + 2])),
    };
    indices.filter_map(|idx| {
      let a = *self.positions.get(idx[0] as usize)?;
      let b = *self.positions.get(idx[1] as usize)?;
      let c = *self.positions.get(idx[2] as usize)?;
      Some(([a, b, c], idx))
    })
  }
}

#[derive(Debug, Clone)]
pub enum SceneNodeKind {
  Group,
  /// scopes picks, see [`PickRoot::Branch`]
  BranchGroup,
  /// a subgraph instantiated by several links; has no parent of its own
  SharedGroup {
    links: Vec<SceneNodeKey>,
  },
  Link {
    instance: InstanceId,
    target: SceneNodeKey,
  },
  Shape {
    geometries: Vec<Option<GeometryKey>>,
  },
  Morph {
    geometries: Vec<Option<GeometryKey>>,
  },
  /// compiled merge of several shapes; the originals are reported in its place
  Merged {
    originals: Vec<SceneNodeKey>,
    geometries: Vec<Option<GeometryKey>>,
  },
}

impl SceneNodeKind {
  pub fn geometries(&self) -> Option<&[Option<GeometryKey>]> {
    match self {
      SceneNodeKind::Shape { geometries }
      | SceneNodeKind::Morph { geometries }
      | SceneNodeKind::Merged { geometries, .. } => Some(geometries.as_slice()),
      _ => None,
    }
  }

  fn accepts_children(&self) -> bool {
    matches!(
      self,
      SceneNodeKind::Group | SceneNodeKind::BranchGroup | SceneNodeKind::SharedGroup { .. }
    )
  }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
  pub kind: SceneNodeKind,
  pub local_matrix: Matrix4<f64>,
  pub pick_reporting: bool,
  pub capabilities: Capabilities,
  parent: Option<SceneNodeKey>,
  children: Vec<SceneNodeKey>,
}

impl SceneNode {
  fn new(kind: SceneNodeKind) -> Self {
    Self {
      kind,
      local_matrix: Matrix4::identity(),
      pick_reporting: false,
      capabilities: Capabilities::all(),
      parent: None,
      children: Vec::new(),
    }
  }

  pub fn parent(&self) -> Option<SceneNodeKey> {
    self.parent
  }

  pub fn children(&self) -> &[SceneNodeKey] {
    &self.children
  }
}

#[derive(Default)]
pub struct PickableScene {
  nodes: SlotMap<SceneNodeKey, SceneNode>,
  geometries: SlotMap<GeometryKey, SceneGeometry>,
  roots: Vec<SceneNodeKey>,
  next_instance: u64,
}

impl PickableScene {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn node(&self, node: SceneNodeKey) -> Option<&SceneNode> {
    self.nodes.get(node)
  }

  pub fn node_mut(&mut self, node: SceneNodeKey) -> Option<&mut SceneNode> {
    self.nodes.get_mut(node)
  }

  pub fn geometry(&self, geometry: GeometryKey) -> Option<&SceneGeometry> {
    self.geometries.get(geometry)
  }

  pub fn geometry_mut(&mut self, geometry: GeometryKey) -> Option<&mut SceneGeometry> {
    self.geometries.get_mut(geometry)
  }

  pub fn add_geometry(&mut self, geometry: SceneGeometry) -> GeometryKey {
    self.geometries.insert(geometry)
  }

  pub fn create_group(&mut self) -> SceneNodeKey {
    self.nodes.insert(SceneNode::new(SceneNodeKind::Group))
  }

  pub fn create_branch_group(&mut self) -> SceneNodeKey {
    self.nodes.insert(SceneNode::new(SceneNodeKind::BranchGroup))
  }

  pub fn create_shared_group(&mut self) -> SceneNodeKey {
    let kind = SceneNodeKind::SharedGroup { links: Vec::new() };
    self.nodes.insert(SceneNode::new(kind))
  }

  pub fn create_shape(&mut self, geometries: impl IntoIterator<Item = GeometryKey>) -> SceneNodeKey {
    let geometries = geometries.into_iter().map(Some).collect();
    self.nodes.insert(SceneNode::new(SceneNodeKind::Shape { geometries }))
  }

  pub fn create_morph(&mut self, geometries: impl IntoIterator<Item = GeometryKey>) -> SceneNodeKey {
    let geometries = geometries.into_iter().map(Some).collect();
    self.nodes.insert(SceneNode::new(SceneNodeKind::Morph { geometries }))
  }

  /// Merge `originals` into one node drawing `geometries`. The originals stay
  /// in the scene, unattached, as what picks report.
  pub fn create_merged(
    &mut self,
    originals: Vec<SceneNodeKey>,
    geometries: impl IntoIterator<Item = GeometryKey>,
  ) -> SceneNodeKey {
    let geometries = geometries.into_iter().map(Some).collect();
    let kind = SceneNodeKind::Merged {
      originals,
      geometries,
    };
    self.nodes.insert(SceneNode::new(kind))
  }

  /// Create a new instantiation of `shared`. `None` if it is not a live shared
  /// group.
  pub fn create_link(&mut self, shared: SceneNodeKey) -> Option<SceneNodeKey> {
    if !matches!(
      self.nodes.get(shared)?.kind,
      SceneNodeKind::SharedGroup { .. }
    ) {
      return None;
    }

    self.next_instance += 1;
    let instance = InstanceId(self.next_instance);
    let link = self.nodes.insert(SceneNode::new(SceneNodeKind::Link {
      instance,
      target: shared,
    }));

    if let Some(SceneNodeKind::SharedGroup { links }) = self.nodes.get_mut(shared).map(|n| &mut n.kind)
    {
      links.push(link);
    }
    Some(link)
  }

  pub fn set_local_matrix(&mut self, node: SceneNodeKey, mat: Matrix4<f64>) {
    if let Some(node) = self.nodes.get_mut(node) {
      node.local_matrix = mat;
    }
  }

  pub fn set_pick_reporting(&mut self, node: SceneNodeKey, reporting: bool) {
    if let Some(node) = self.nodes.get_mut(node) {
      node.pick_reporting = reporting;
    }
  }

  pub fn set_capabilities(&mut self, node: SceneNodeKey, capabilities: Capabilities) {
    if let Some(node) = self.nodes.get_mut(node) {
      node.capabilities = capabilities;
    }
  }

  /// Attach `node` directly on the scene boundary.
  pub fn add_root(&mut self, node: SceneNodeKey) -> bool {
    match self.nodes.get(node) {
      Some(n) if n.parent.is_none() && !self.roots.contains(&node) => {
        self.roots.push(node);
        true
      }
      _ => false,
    }
  }

  pub fn roots(&self) -> &[SceneNodeKey] {
    &self.roots
  }

  /// Attach a detached `child` under `parent`. Shared groups can only be
  /// reached through links and are never attached.
  pub fn attach(&mut self, parent: SceneNodeKey, child: SceneNodeKey) -> bool {
    let child_ok = match self.nodes.get(child) {
      Some(c) => {
        c.parent.is_none()
          && !self.roots.contains(&child)
          && !matches!(c.kind, SceneNodeKind::SharedGroup { .. })
      }
      None => false,
    };
    let parent_ok = parent != child
      && self
        .nodes
        .get(parent)
        .map_or(false, |p| p.kind.accepts_children());
    if !child_ok || !parent_ok {
      return false;
    }

    if let Some(p) = self.nodes.get_mut(parent) {
      p.children.push(child);
    }
    if let Some(c) = self.nodes.get_mut(child) {
      c.parent = Some(parent);
    }
    true
  }

  /// Cut `node` loose from its parent or from the scene boundary. The node and
  /// its subtree stay alive.
  pub fn detach(&mut self, node: SceneNodeKey) {
    self.roots.retain(|r| *r != node);
    let Some(parent) = self.nodes.get_mut(node).and_then(|n| n.parent.take()) else {
      return;
    };
    if let Some(p) = self.nodes.get_mut(parent) {
      p.children.retain(|c| *c != node);
    }
  }

  /// Remove `node` and everything under it. Shared groups reached through a
  /// removed link survive, only the link goes away.
  pub fn remove(&mut self, node: SceneNodeKey) {
    self.detach(node);
    let mut stack = vec![node];
    while let Some(key) = stack.pop() {
      let Some(removed) = self.nodes.remove(key) else {
        continue;
      };
      if let SceneNodeKind::Link { target, .. } = removed.kind {
        if let Some(SceneNodeKind::SharedGroup { links }) =
          self.nodes.get_mut(target).map(|n| &mut n.kind)
        {
          links.retain(|l| *l != key);
        }
      }
      stack.extend(removed.children);
    }
  }

  /// Collect one candidate per shape whose world bounds meet `shape`, and one
  /// per glyph for text shapes. Shared groups are entered once per link.
  pub fn gather_candidates(
    &self,
    shape: &(impl PickShape + ?Sized),
  ) -> Vec<GeometryCandidate<SceneNodeKey>> {
    let mut candidates = Vec::new();
    for &root in &self.roots {
      self.gather_node(
        root,
        Matrix4::identity(),
        &InstancingKey::root(),
        &SmallVec::new(),
        shape,
        &mut candidates,
      );
    }
    log::debug!("gathered {} pick candidates", candidates.len());
    candidates
  }

  fn gather_node(
    &self,
    node: SceneNodeKey,
    parent_world: Matrix4<f64>,
    key: &InstancingKey,
    branches: &SmallVec<[SceneNodeKey; 4]>,
    shape: &(impl PickShape + ?Sized),
    out: &mut Vec<GeometryCandidate<SceneNodeKey>>,
  ) {
    let Some(n) = self.nodes.get(node) else {
      return;
    };
    let world = parent_world * n.local_matrix;

    match &n.kind {
      SceneNodeKind::Group | SceneNodeKind::SharedGroup { .. } => {
        for &child in &n.children {
          self.gather_node(child, world, key, branches, shape, out);
        }
      }
      SceneNodeKind::BranchGroup => {
        let mut branches = branches.clone();
        branches.push(node);
        for &child in &n.children {
          self.gather_node(child, world, key, &branches, shape, out);
        }
      }
      SceneNodeKind::Link { instance, target } => {
        let key = key.descend(*instance);
        self.gather_node(*target, world, &key, branches, shape, out);
      }
      SceneNodeKind::Shape { geometries }
      | SceneNodeKind::Morph { geometries }
      | SceneNodeKind::Merged { geometries, .. } => {
        let slots = geometries
          .iter()
          .flatten()
          .filter_map(|g| self.geometries.get(*g));

        let mut push = |bounds: Box3| {
          let world_bounds = bounds.apply_matrix(&world);
          if shape.intersect_bounds(&world_bounds).is_some() {
            out.push(
              GeometryCandidate::new(node, key.clone(), world_bounds)
                .with_branch_groups(branches.iter().copied()),
            );
          }
        };

        if self.is_text(&n.kind) {
          slots.for_each(|g| push(g.local_bounds()));
        } else {
          push(slots.fold(Box3::empty(), |b, g| b.union(&g.local_bounds())));
        }
      }
    }
  }

  fn is_text(&self, kind: &SceneNodeKind) -> bool {
    match kind {
      SceneNodeKind::Shape { geometries } => geometries
        .iter()
        .flatten()
        .filter_map(|g| self.geometries.get(*g))
        .any(|g| g.kind == GeometryKind::Text),
      _ => false,
    }
  }

  /// Gather and resolve a ray pick in one go, using [`TriangleRayIntersector`]
  /// for geometry precision.
  pub fn pick_ray(
    &self,
    root: PickRoot<SceneNodeKey>,
    options: &PickOptions,
    ray: &PickRay,
  ) -> Result<Vec<HitOf<Self>>, PickError> {
    let candidates = self.gather_candidates(ray);
    pick(
      self,
      root,
      &candidates,
      options,
      ray,
      &TriangleRayIntersector::default(),
    )
  }
}

impl PickSceneGraph for PickableScene {
  type Node = SceneNodeKey;
  type Geometry = GeometryKey;

  fn is_alive(&self, node: SceneNodeKey) -> bool {
    self.nodes.contains_key(node)
  }

  fn parent(&self, node: SceneNodeKey) -> Option<SceneNodeKey> {
    self.nodes.get(node)?.parent
  }

  fn is_scene_root(&self, node: SceneNodeKey) -> bool {
    self.roots.contains(&node)
  }

  fn pick_reporting(&self, node: SceneNodeKey) -> bool {
    self.nodes.get(node).map_or(false, |n| n.pick_reporting)
  }

  fn shared_group_links(&self, node: SceneNodeKey) -> Option<&[SceneNodeKey]> {
    match &self.nodes.get(node)?.kind {
      SceneNodeKind::SharedGroup { links } => Some(links.as_slice()),
      _ => None,
    }
  }

  fn link_instance(&self, link: SceneNodeKey) -> Option<InstanceId> {
    match self.nodes.get(link)?.kind {
      SceneNodeKind::Link { instance, .. } => Some(instance),
      _ => None,
    }
  }

  fn local_to_world(&self, node: SceneNodeKey, key: &InstancingKey) -> Option<Matrix4<f64>> {
    let mut world = Matrix4::identity();
    walk_instanced_ancestors(self, node, key, |step| match self.nodes.get(step.node()) {
      Some(n) => {
        world = n.local_matrix * world;
        true
      }
      None => false,
    })
    .ok()?;
    Some(world)
  }

  fn source_kind(&self, node: SceneNodeKey) -> Option<SourceKind<'_, SceneNodeKey>> {
    let n = self.nodes.get(node)?;
    match &n.kind {
      SceneNodeKind::Shape { .. } => Some(SourceKind::Shape {
        text: self.is_text(&n.kind),
      }),
      SceneNodeKind::Morph { .. } => Some(SourceKind::Morph),
      SceneNodeKind::Merged { originals, .. } => Some(SourceKind::Merged(originals.as_slice())),
      _ => None,
    }
  }

  fn pickable_kind(&self, node: SceneNodeKey) -> Option<PickableKind> {
    match self.nodes.get(node)?.kind {
      SceneNodeKind::Shape { .. } => Some(PickableKind::Shape),
      SceneNodeKind::Morph { .. } => Some(PickableKind::Morph),
      _ => None,
    }
  }

  fn node_capabilities(&self, node: SceneNodeKey) -> Option<Capabilities> {
    self.nodes.get(node).map(|n| n.capabilities)
  }

  fn geometry_count(&self, node: SceneNodeKey) -> usize {
    self
      .nodes
      .get(node)
      .and_then(|n| n.kind.geometries())
      .map_or(0, |g| g.len())
  }

  fn geometry_slot(&self, node: SceneNodeKey, index: usize) -> Option<GeometrySlot<GeometryKey>> {
    let geometry = (*self.nodes.get(node)?.kind.geometries()?.get(index)?)?;
    let g = self.geometries.get(geometry)?;
    Some(GeometrySlot {
      geometry,
      kind: g.kind,
      capabilities: g.capabilities,
    })
  }
}

/// Exact ray test against the triangles of a [`PickableScene`] node.
#[derive(Debug, Clone, Copy)]
pub struct TriangleRayIntersector {
  /// whether back facing triangles can be hit
  pub double_sided: bool,
}

impl Default for TriangleRayIntersector {
  fn default() -> Self {
    Self { double_sided: true }
  }
}

impl GeometryIntersector<PickableScene, PickRay> for TriangleRayIntersector {
  fn intersect(
    &self,
    scene: &PickableScene,
    ray: &PickRay,
    flags: PickFlags,
    record: &mut HitBuilderOf<PickableScene>,
  ) -> bool {
    let target = *record.target();
    let Some(node) = scene.nodes.get(target.node) else {
      return false;
    };
    let Some(geometries) = node.kind.geometries() else {
      return false;
    };
    // a morph is hit as one blended geometry, whichever target the primitive came from
    let morph = matches!(node.kind, SceneNodeKind::Morph { .. });

    let mut hits: Vec<IntersectionRecord<GeometryKey>> = Vec::new();
    let mut closest: Option<IntersectionRecord<GeometryKey>> = None;

    for (geometry_index, slot) in geometries.iter().enumerate() {
      let Some(geometry) = *slot else {
        continue;
      };
      let Some(g) = scene.geometries.get(geometry) else {
        continue;
      };
      for (triangle, vertex_indices) in g.iter_triangles() {
        let world = triangle.map(|p| target.local_to_world.transform_point(p));
        let Some(distance) = ray_triangle(ray, world, self.double_sided) else {
          continue;
        };
        let hit = IntersectionRecord {
          geometry_index: if morph { 0 } else { geometry_index },
          geometry,
          point: ray.at(distance),
          distance,
          vertex_indices: SmallVec::from_slice(&vertex_indices),
        };
        if closest.as_ref().map_or(true, |c| distance < c.distance) {
          closest = Some(hit.clone());
        }
        if flags.contains(PickFlags::ALL_GEOM_INFO) {
          hits.push(hit);
        }
      }
    }

    let Some(closest) = closest else {
      return false;
    };

    if flags.contains(PickFlags::CLOSEST_POINT) {
      record.set_closest_point(closest.point);
    }
    if flags.contains(PickFlags::CLOSEST_DISTANCE) {
      record.set_closest_distance(closest.distance);
    }
    if flags.contains(PickFlags::ALL_GEOM_INFO) {
      hits.into_iter().for_each(|hit| record.push_intersection(hit));
    } else if flags.contains(PickFlags::CLOSEST_GEOM_INFO) {
      record.push_intersection(closest);
    }
    true
  }
}

/// Moller-Trumbore. Returns the distance along the normalized ray direction.
fn ray_triangle(ray: &PickRay, [a, b, c]: [Point3<f64>; 3], double_sided: bool) -> Option<f64> {
  let ab = b - a;
  let ac = c - a;
  let p = ray.direction.cross(ac);
  let det = ab.dot(p);
  if det.abs() < f64::EPSILON || (!double_sided && det < 0.) {
    return None;
  }
  let inv_det = 1. / det;

  let t: Vector3<f64> = ray.origin - a;
  let u = t.dot(p) * inv_det;
  if !(0.0..=1.0).contains(&u) {
    return None;
  }
  let q = t.cross(ab);
  let v = ray.direction.dot(q) * inv_det;
  if v < 0. || u + v > 1. {
    return None;
  }

  let distance = ac.dot(q) * inv_det;
  (distance >= 0.).then_some(distance)
}

#[test]
fn ray_triangle_hits_front_and_back() {
  let tri = [
    Point3::new(-1., -1., 3.),
    Point3::new(1., -1., 3.),
    Point3::new(0., 1., 3.),
  ];
  let ray = PickRay::new(Point3::new(0., 0., 0.), Vector3::new(0., 0., 1.));
  let d = ray_triangle(&ray, tri, true).unwrap();
  assert!((d - 3.).abs() < 1e-9);

  let [a, b, c] = tri;
  assert!(ray_triangle(&ray, [a, c, b], true).is_some());

  let miss = PickRay::new(Point3::new(5., 0., 0.), Vector3::new(0., 0., 1.));
  assert!(ray_triangle(&miss, tri, true).is_none());
}
