use std::cell::Cell;

use crate::{scene::*, *};

mod query;

pub fn init_log() {
  let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ray_forward() -> PickRay {
  PickRay::new(Point3::new(0., 0., 0.), Vector3::new(0., 0., 1.))
}

/// one triangle facing the z axis at depth `z`, covering the axis
pub fn triangle_at(z: f64) -> Vec<Point3<f64>> {
  vec![
    Point3::new(-1., -1., z),
    Point3::new(1., -1., z),
    Point3::new(0., 1., z),
  ]
}

/// A pick reporting shape on the scene boundary holding one triangle at `z`.
pub fn shape_root_at(scene: &mut PickableScene, z: f64) -> SceneNodeKey {
  let geometry = scene.add_geometry(SceneGeometry::triangles(triangle_at(z)));
  let shape = scene.create_shape([geometry]);
  scene.set_pick_reporting(shape, true);
  scene.add_root(shape);
  shape
}

/// ```text
///            root
///          /      \
///     group_a    group_b
///        |          |
///     link_a     link_b
///          \      /
///           shared
///             |
///            leaf
/// ```
/// Every node reports picks, the leaf has a triangle at z = 5.
pub struct Instanced {
  pub scene: PickableScene,
  pub root: SceneNodeKey,
  pub group_a: SceneNodeKey,
  pub group_b: SceneNodeKey,
  pub link_a: SceneNodeKey,
  pub link_b: SceneNodeKey,
  pub shared: SceneNodeKey,
  pub leaf: SceneNodeKey,
}

impl Instanced {
  pub fn new() -> Self {
    let mut scene = PickableScene::new();
    let root = scene.create_group();
    let group_a = scene.create_group();
    let group_b = scene.create_group();
    let shared = scene.create_shared_group();
    let link_a = scene.create_link(shared).unwrap();
    let link_b = scene.create_link(shared).unwrap();
    let geometry = scene.add_geometry(SceneGeometry::triangles(triangle_at(5.)));
    let leaf = scene.create_shape([geometry]);

    assert!(scene.add_root(root));
    assert!(scene.attach(root, group_a));
    assert!(scene.attach(root, group_b));
    assert!(scene.attach(group_a, link_a));
    assert!(scene.attach(group_b, link_b));
    assert!(scene.attach(shared, leaf));

    for node in [root, group_a, group_b, link_a, link_b, shared, leaf] {
      scene.set_pick_reporting(node, true);
    }

    Self {
      scene,
      root,
      group_a,
      group_b,
      link_a,
      link_b,
      shared,
      leaf,
    }
  }

  pub fn key_of(&self, link: SceneNodeKey) -> InstancingKey {
    InstancingKey::root().descend(self.scene.link_instance(link).unwrap())
  }
}

/// Counts how many candidates the resolution actually looked at.
pub struct CountingGraph<'a> {
  pub inner: &'a PickableScene,
  pub inspected: Cell<usize>,
}

impl<'a> CountingGraph<'a> {
  pub fn new(inner: &'a PickableScene) -> Self {
    Self {
      inner,
      inspected: Cell::new(0),
    }
  }
}

impl PickSceneGraph for CountingGraph<'_> {
  type Node = SceneNodeKey;
  type Geometry = GeometryKey;

  fn is_alive(&self, node: SceneNodeKey) -> bool {
    self.inner.is_alive(node)
  }

  fn parent(&self, node: SceneNodeKey) -> Option<SceneNodeKey> {
    self.inner.parent(node)
  }

  fn is_scene_root(&self, node: SceneNodeKey) -> bool {
    self.inner.is_scene_root(node)
  }

  fn pick_reporting(&self, node: SceneNodeKey) -> bool {
    self.inner.pick_reporting(node)
  }

  fn shared_group_links(&self, node: SceneNodeKey) -> Option<&[SceneNodeKey]> {
    self.inner.shared_group_links(node)
  }

  fn link_instance(&self, link: SceneNodeKey) -> Option<InstanceId> {
    self.inner.link_instance(link)
  }

  fn local_to_world(&self, node: SceneNodeKey, key: &InstancingKey) -> Option<Matrix4<f64>> {
    self.inner.local_to_world(node, key)
  }

  fn source_kind(&self, node: SceneNodeKey) -> Option<SourceKind<'_, SceneNodeKey>> {
    self.inspected.set(self.inspected.get() + 1);
    self.inner.source_kind(node)
  }

  fn pickable_kind(&self, node: SceneNodeKey) -> Option<PickableKind> {
    self.inner.pickable_kind(node)
  }

  fn node_capabilities(&self, node: SceneNodeKey) -> Option<Capabilities> {
    self.inner.node_capabilities(node)
  }

  fn geometry_count(&self, node: SceneNodeKey) -> usize {
    self.inner.geometry_count(node)
  }

  fn geometry_slot(&self, node: SceneNodeKey, index: usize) -> Option<GeometrySlot<GeometryKey>> {
    self.inner.geometry_slot(node, index)
  }
}
