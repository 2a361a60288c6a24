use crate::*;

/// One primitive level intersection inside a hit node.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionRecord<M> {
  /// which geometry slot of the node was hit
  pub geometry_index: usize,
  pub geometry: M,
  pub point: Point3<f64>,
  pub distance: f64,
  /// vertex indices of the hit primitive, in winding order
  pub vertex_indices: SmallVec<[u32; 4]>,
}

/// Append-only collection of intersections while a node is being tested.
#[derive(Debug, Clone)]
pub struct IntersectionListBuilder<M> {
  items: Vec<IntersectionRecord<M>>,
}

impl<M> Default for IntersectionListBuilder<M> {
  fn default() -> Self {
    Self { items: Vec::new() }
  }
}

impl<M> IntersectionListBuilder<M> {
  pub fn push(&mut self, record: IntersectionRecord<M>) {
    self.items.push(record);
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn into_sorted(self) -> SortedIntersections<M> {
    let mut items = self.items;
    sort_by_distance(&mut items, |r| r.distance);
    SortedIntersections {
      items: items.into_boxed_slice(),
    }
  }
}

/// Frozen, distance ascending intersection list of a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedIntersections<M> {
  items: Box<[IntersectionRecord<M>]>,
}

impl<M> Deref for SortedIntersections<M> {
  type Target = [IntersectionRecord<M>];

  fn deref(&self) -> &Self::Target {
    &self.items
  }
}

impl<M> SortedIntersections<M> {
  pub fn closest(&self) -> Option<&IntersectionRecord<M>> {
    self.items.first()
  }
}

/// The node and transform a later geometry test works on. Present on every hit
/// under construction, whatever facets were requested, and never reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickTarget<N> {
  pub node: N,
  pub local_to_world: Matrix4<f64>,
}

/// A hit under construction, filled facet by facet during a query.
#[derive(Debug, Clone)]
pub struct HitRecordBuilder<N, M> {
  path: Option<ScenePath<N>>,
  node: Option<N>,
  local_to_world: Option<Matrix4<f64>>,
  closest_point: Option<Point3<f64>>,
  closest_distance: f64,
  intersections: Option<IntersectionListBuilder<M>>,
  target: PickTarget<N>,
  key: InstancingKey,
  bounds_distance: f64,
}

impl<N: Copy, M> HitRecordBuilder<N, M> {
  pub fn new(target: PickTarget<N>, key: InstancingKey, bounds_distance: f64) -> Self {
    Self {
      path: None,
      node: None,
      local_to_world: None,
      closest_point: None,
      closest_distance: f64::NAN,
      intersections: None,
      target,
      key,
      bounds_distance,
    }
  }

  pub fn target(&self) -> &PickTarget<N> {
    &self.target
  }

  /// the instancing key of the candidate this hit came from
  pub fn key(&self) -> &InstancingKey {
    &self.key
  }

  pub fn bounds_distance(&self) -> f64 {
    self.bounds_distance
  }

  pub fn set_path(&mut self, path: ScenePath<N>) {
    self.path = Some(path);
  }

  pub fn set_node(&mut self, node: N) {
    self.node = Some(node);
  }

  pub fn set_local_to_world(&mut self, mat: Matrix4<f64>) {
    self.local_to_world = Some(mat);
  }

  pub fn set_closest_point(&mut self, point: Point3<f64>) {
    self.closest_point = Some(point);
  }

  pub fn set_closest_distance(&mut self, distance: f64) {
    self.closest_distance = distance;
  }

  pub fn closest_distance(&self) -> f64 {
    self.closest_distance
  }

  pub fn push_intersection(&mut self, record: IntersectionRecord<M>) {
    self
      .intersections
      .get_or_insert_with(Default::default)
      .push(record);
  }

  pub fn build(self) -> HitRecord<N, M> {
    HitRecord {
      path: self.path,
      node: self.node,
      local_to_world: self.local_to_world,
      closest_point: self.closest_point,
      closest_distance: self.closest_distance,
      intersections: self.intersections.map(|list| list.into_sorted()),
    }
  }
}

/// The result of a pick for one logical node.
///
/// Only the facets requested by the query's [`PickFlags`] are present. All
/// data is an owned snapshot, the scene may change or go away afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord<N, M> {
  path: Option<ScenePath<N>>,
  node: Option<N>,
  local_to_world: Option<Matrix4<f64>>,
  closest_point: Option<Point3<f64>>,
  closest_distance: f64,
  intersections: Option<SortedIntersections<M>>,
}

impl<N, M> HitRecord<N, M> {
  pub fn path(&self) -> Option<&ScenePath<N>> {
    self.path.as_ref()
  }

  pub fn node(&self) -> Option<&N> {
    self.node.as_ref()
  }

  pub fn local_to_world(&self) -> Option<&Matrix4<f64>> {
    self.local_to_world.as_ref()
  }

  pub fn closest_point(&self) -> Option<Point3<f64>> {
    self.closest_point
  }

  /// `NaN` when not computed.
  pub fn closest_distance(&self) -> f64 {
    self.closest_distance
  }

  pub fn intersections(&self) -> Option<&SortedIntersections<M>> {
    self.intersections.as_ref()
  }
}
