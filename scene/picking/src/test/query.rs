use parking_lot::RwLock;

use super::*;

fn three_at_five_two_two() -> (PickableScene, [SceneNodeKey; 3]) {
  let mut scene = PickableScene::new();
  let a = shape_root_at(&mut scene, 5.);
  let b = shape_root_at(&mut scene, 2.);
  let c = shape_root_at(&mut scene, 2.);
  (scene, [a, b, c])
}

fn distances<N, M>(hits: &[HitRecord<N, M>]) -> Vec<f64> {
  hits.iter().map(|h| h.closest_distance()).collect()
}

#[test]
fn sorted_pick_orders_by_distance() {
  init_log();
  let (scene, [a, b, c]) = three_at_five_two_two();

  for precision in [PickPrecision::Bounds, PickPrecision::Geometry] {
    let options = PickOptions::new(precision, PickFlags::CLOSEST_DISTANCE, PickPolicy::AllSorted);
    let hits = scene
      .pick_ray(PickRoot::Scene, &options, &ray_forward())
      .unwrap();
    assert_eq!(distances(&hits), vec![2., 2., 5.]);

    let options = options.with_flags(PickFlags::NODE | PickFlags::CLOSEST_DISTANCE);
    let hits = scene
      .pick_ray(PickRoot::Scene, &options, &ray_forward())
      .unwrap();
    let nodes: Vec<_> = hits.iter().map(|h| *h.node().unwrap()).collect();
    assert_eq!(nodes[2], a);
    assert!(nodes[..2].contains(&b));
    assert!(nodes[..2].contains(&c));
  }
}

#[test]
fn sorted_pick_always_measures_distance() {
  let (scene, _) = three_at_five_two_two();

  let options = PickOptions::new(
    PickPrecision::Bounds,
    PickFlags::NODE,
    PickPolicy::AllSorted,
  );
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(distances(&hits), vec![2., 2., 5.]);
}

#[test]
fn unsorted_pick_keeps_candidate_order() {
  let (scene, [a, b, c]) = three_at_five_two_two();

  let options = PickOptions::new(
    PickPrecision::Bounds,
    PickFlags::NODE | PickFlags::CLOSEST_DISTANCE,
    PickPolicy::All,
  );
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  let nodes: Vec<_> = hits.iter().map(|h| *h.node().unwrap()).collect();
  assert_eq!(nodes, vec![a, b, c]);
  assert_eq!(distances(&hits), vec![5., 2., 2.]);

  // no distance requested, none computed
  let hits = scene
    .pick_ray(
      PickRoot::Scene,
      &options.with_flags(PickFlags::NODE),
      &ray_forward(),
    )
    .unwrap();
  assert!(hits.iter().all(|h| h.closest_distance().is_nan()));
}

#[test]
fn missing_intersect_permission_aborts_the_query() {
  init_log();
  let mut scene = PickableScene::new();
  let geometry = scene.add_geometry(
    SceneGeometry::triangles(triangle_at(3.))
      .with_capabilities(Capabilities::all().difference(Capabilities::INTERSECT)),
  );
  let shape = scene.create_shape([geometry]);
  scene.add_root(shape);

  let options = PickOptions::default().with_precision(PickPrecision::Geometry);
  let err = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap_err();
  assert!(matches!(
    err,
    PickError::GeometryCapabilityNotSet {
      geometry_index: 0,
      ..
    }
  ));
  assert_eq!(err.missing(), Capabilities::INTERSECT);

  // bounds picks never touch the primitives
  let options = options.with_precision(PickPrecision::Bounds);
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(hits.len(), 1);
}

#[test]
fn capability_table() {
  let mut scene = PickableScene::new();
  let indexed = scene.add_geometry(
    SceneGeometry::indexed_triangles(triangle_at(3.), vec![0, 1, 2]).with_capabilities(
      Capabilities::all().difference(Capabilities::COORDINATE_INDEX_READ),
    ),
  );
  let plain = scene.add_geometry(
    SceneGeometry::triangles(triangle_at(3.)).with_capabilities(
      Capabilities::INTERSECT
        | Capabilities::COORDINATE_READ
        | Capabilities::COUNT_READ
        | Capabilities::FORMAT_READ,
    ),
  );
  let glyph = scene.add_geometry(
    SceneGeometry::glyph(triangle_at(3.)).with_capabilities(Capabilities::INTERSECT),
  );
  let compressed = scene.add_geometry(
    SceneGeometry::compressed(triangle_at(3.)).with_capabilities(Capabilities::INTERSECT),
  );

  let shape_indexed = scene.create_shape([plain, indexed]);
  let shape_ok = scene.create_shape([plain, glyph]);
  let shape_compressed = scene.create_shape([compressed]);
  let morph = scene.create_morph([compressed]);

  let err = check_pick_capabilities(&scene, shape_indexed).unwrap_err();
  assert_eq!(
    err,
    PickError::GeometryCapabilityNotSet {
      node: format!("{shape_indexed:?}"),
      geometry_index: 1,
      missing: Capabilities::COORDINATE_INDEX_READ,
    }
  );

  assert_eq!(
    check_pick_capabilities(&scene, shape_ok),
    Ok(Some(PickableKind::Shape))
  );

  let err = check_pick_capabilities(&scene, shape_compressed).unwrap_err();
  assert_eq!(err.missing(), Capabilities::GEOMETRY_READ);

  // morph targets need the vertex array permissions on every slot
  let err = check_pick_capabilities(&scene, morph).unwrap_err();
  assert_eq!(
    err,
    PickError::GeometryCapabilityNotSet {
      node: format!("{morph:?}"),
      geometry_index: 0,
      missing: Capabilities::COORDINATE_READ | Capabilities::COUNT_READ | Capabilities::FORMAT_READ,
    }
  );
  let morph_ok = scene.create_morph([plain, plain]);
  assert_eq!(
    check_pick_capabilities(&scene, morph_ok),
    Ok(Some(PickableKind::Morph))
  );
  scene.set_capabilities(morph, Capabilities::INTERSECT);
  assert!(matches!(
    check_pick_capabilities(&scene, morph),
    Err(PickError::NodeCapabilityNotSet { .. })
  ));

  scene.remove(shape_ok);
  assert_eq!(check_pick_capabilities(&scene, shape_ok), Ok(None));
}

#[test]
fn morph_picks_check_and_report_the_blended_geometry() {
  init_log();
  let mut scene = PickableScene::new();
  let far = scene.add_geometry(SceneGeometry::triangles(triangle_at(4.)));
  let near = scene.add_geometry(SceneGeometry::triangles(triangle_at(2.)));
  let morph = scene.create_morph([far, near]);
  scene.add_root(morph);

  let flags = PickFlags::NODE | PickFlags::ALL_GEOM_INFO;
  let options = PickOptions::new(PickPrecision::Geometry, flags, PickPolicy::AllSorted);
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].node(), Some(&morph));
  let found: Vec<_> = hits[0]
    .intersections()
    .unwrap()
    .iter()
    .map(|i| (i.geometry_index, i.geometry, i.distance))
    .collect();
  assert_eq!(found, vec![(0, near, 2.), (0, far, 4.)]);

  let sealed = scene.add_geometry(
    SceneGeometry::triangles(triangle_at(3.))
      .with_capabilities(Capabilities::all().difference(Capabilities::INTERSECT)),
  );
  let sealed_morph = scene.create_morph([sealed]);
  scene.add_root(sealed_morph);

  let err = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap_err();
  assert!(matches!(
    err,
    PickError::GeometryCapabilityNotSet {
      geometry_index: 0,
      ..
    }
  ));
  assert_eq!(err.missing(), Capabilities::INTERSECT);
}

#[test]
fn geometry_precision_drops_bounds_only_hits() {
  let mut scene = PickableScene::new();
  // the bounds cover the ray, the triangle itself does not
  let geometry = scene.add_geometry(SceneGeometry::triangles(vec![
    Point3::new(-1., -1., 3.),
    Point3::new(1., -1., 3.),
    Point3::new(1., 0.5, 3.),
  ]));
  let shape = scene.create_shape([geometry]);
  scene.add_root(shape);
  let hit_shape = shape_root_at(&mut scene, 6.);

  let options = PickOptions::default();
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(hits.len(), 2);

  let options = options.with_precision(PickPrecision::Geometry);
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].node(), Some(&hit_shape));
  assert_eq!(hits[0].closest_distance(), 6.);

  let options = options.with_policy(PickPolicy::Any);
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].node(), Some(&hit_shape));
}

#[test]
fn intersections_are_sorted_by_distance() {
  let mut scene = PickableScene::new();
  let far = scene.add_geometry(SceneGeometry::triangles(triangle_at(4.)));
  let near = scene.add_geometry(SceneGeometry::triangles(triangle_at(2.)));
  let shape = scene.create_shape([far, near]);
  scene.add_root(shape);

  let flags = PickFlags::ALL_GEOM_INFO | PickFlags::CLOSEST_POINT;
  let options = PickOptions::new(PickPrecision::Geometry, flags, PickPolicy::All);
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  assert_eq!(hits.len(), 1);

  let hit = &hits[0];
  assert_eq!(hit.closest_point(), Some(Point3::new(0., 0., 2.)));
  let intersections = hit.intersections().unwrap();
  let found: Vec<_> = intersections
    .iter()
    .map(|i| (i.geometry_index, i.geometry, i.distance))
    .collect();
  assert_eq!(found, vec![(1, near, 2.), (0, far, 4.)]);
  assert_eq!(intersections.closest().unwrap().vertex_indices.as_slice(), &[0, 1, 2]);

  let options = options.with_flags(PickFlags::CLOSEST_GEOM_INFO);
  let hits = scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  let intersections = hits[0].intersections().unwrap();
  assert_eq!(intersections.len(), 1);
  assert_eq!(intersections[0].distance, 2.);
}

#[test]
fn refinement_uses_the_instance_transform() {
  let mut f = Instanced::new();
  f.scene
    .set_local_matrix(f.link_b, Matrix4::from_translation(Vector3::new(0., 0., 3.)));

  let options = PickOptions::new(
    PickPrecision::Geometry,
    PickFlags::PATH | PickFlags::TRANSFORM,
    PickPolicy::AllSorted,
  );
  let hits = f
    .scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();

  assert_eq!(distances(&hits), vec![5., 8.]);
  assert!(hits[0].path().unwrap().nodes.contains(&f.link_a));
  assert!(hits[1].path().unwrap().nodes.contains(&f.link_b));
  assert_eq!(
    hits[1].local_to_world(),
    Some(&Matrix4::from_translation(Vector3::new(0., 0., 3.)))
  );
}

#[test]
fn geometry_any_pick_refines_only_until_the_first_success() {
  let mut scene = PickableScene::new();
  for z in [1., 2., 3.] {
    shape_root_at(&mut scene, z);
  }
  let candidates = scene.gather_candidates(&ray_forward());

  let graph = CountingGraph::new(&scene);
  let refined = Cell::new(0);
  let intersector = |_: &CountingGraph<'_>,
                     _: &PickRay,
                     _: PickFlags,
                     _: &mut HitRecordBuilder<SceneNodeKey, GeometryKey>| {
    refined.set(refined.get() + 1);
    true
  };

  let options = PickOptions::new(PickPrecision::Geometry, PickFlags::NODE, PickPolicy::Any);
  let hits = pick(
    &graph,
    PickRoot::Scene,
    &candidates,
    &options,
    &ray_forward(),
    &intersector,
  )
  .unwrap();

  assert_eq!(hits.len(), 1);
  assert_eq!(refined.get(), 1);
  assert_eq!(graph.inspected.get(), 1);
}

#[test]
fn empty_queries_are_not_errors() {
  let (scene, [a, ..]) = three_at_five_two_two();
  let picker = ScenePicker::new(&scene, TriangleRayIntersector::default());
  let candidates = scene.gather_candidates(&ray_forward());

  let options = PickOptions::default().with_flags(PickFlags::empty());
  assert!(picker
    .pick(PickRoot::Scene, &candidates, &options, &ray_forward())
    .unwrap()
    .is_empty());

  let any = picker
    .pick_any(
      PickRoot::Scene,
      &[],
      PickPrecision::Geometry,
      PickFlags::NODE,
      &ray_forward(),
    )
    .unwrap();
  assert!(any.is_none());

  // a removed scope root contains nothing
  let mut scene = scene;
  let branch = scene.create_branch_group();
  scene.remove(branch);
  let hits = scene
    .pick_ray(PickRoot::Branch(branch), &PickOptions::default(), &ray_forward())
    .unwrap();
  assert!(hits.is_empty());

  let away = PickRay::new(Point3::new(0., 0., 0.), Vector3::new(0., 0., -1.));
  let hits = scene
    .pick_ray(PickRoot::Scene, &PickOptions::default(), &away)
    .unwrap();
  assert!(hits.is_empty());
  assert!(scene.is_alive(a));
}

#[test]
fn picker_entry_points() {
  let (scene, [a, b, c]) = three_at_five_two_two();
  let picker = ScenePicker::new(&scene, TriangleRayIntersector::default());
  let candidates = scene.gather_candidates(&ray_forward());
  let ray = ray_forward();

  let closest = picker
    .pick_closest(
      PickRoot::Scene,
      &candidates,
      PickPrecision::Geometry,
      PickFlags::NODE,
      &ray,
    )
    .unwrap()
    .unwrap();
  assert!([b, c].contains(closest.node().unwrap()));
  assert_eq!(closest.closest_distance(), 2.);

  let any = picker
    .pick_any(
      PickRoot::Scene,
      &candidates,
      PickPrecision::Bounds,
      PickFlags::NODE,
      &ray,
    )
    .unwrap()
    .unwrap();
  assert_eq!(any.node(), Some(&a));

  let all = picker
    .pick_all(
      PickRoot::Scene,
      &candidates,
      PickPrecision::Geometry,
      PickFlags::NODE,
      &ray,
    )
    .unwrap();
  assert_eq!(all.len(), 3);

  let sorted = picker
    .pick_all_sorted(
      PickRoot::Scene,
      &candidates,
      PickPrecision::Bounds,
      PickFlags::NODE,
      &ray,
    )
    .unwrap();
  assert_eq!(*sorted[2].node().unwrap(), a);
}

#[test]
fn shared_scene_pick_matches_borrowed_pick() {
  let f = Instanced::new();
  let options = PickOptions::new(
    PickPrecision::Geometry,
    PickFlags::PATH | PickFlags::CLOSEST_POINT,
    PickPolicy::AllSorted,
  );
  let expected = f
    .scene
    .pick_ray(PickRoot::Scene, &options, &ray_forward())
    .unwrap();
  let leaf = f.leaf;

  let shared = RwLock::new(f.scene);
  let hits = pick_shared(
    &shared,
    PickRoot::Scene,
    &options,
    &ray_forward(),
    &TriangleRayIntersector::default(),
    |scene, ray| scene.gather_candidates(ray),
  )
  .unwrap();
  assert_eq!(hits.len(), 2);
  assert_eq!(hits.len(), expected.len());
  assert!(hits.iter().all(|h| h.path().unwrap().leaf == leaf));

  let options = options.with_policy(PickPolicy::Any);
  let hits = pick_shared(
    &shared,
    PickRoot::Scene,
    &options,
    &ray_forward(),
    &TriangleRayIntersector::default(),
    |scene, ray| scene.gather_candidates(ray),
  )
  .unwrap();
  assert_eq!(hits.len(), 1);
}

#[test]
fn refinement_drops_targets_removed_after_aggregation() {
  let mut scene = PickableScene::new();
  let gone = shape_root_at(&mut scene, 1.);
  let kept = shape_root_at(&mut scene, 2.);
  let candidates = scene.gather_candidates(&ray_forward());
  let scored = score_candidates(&candidates, &ray_forward());
  let aggregated = aggregate(
    &scene,
    PickRoot::Scene,
    scored,
    PickFlags::NODE,
    PickPrecision::Geometry,
    PickPolicy::All,
  );
  assert_eq!(aggregated.len(), 2);

  // a writer got in between the two phases
  scene.remove(gone);

  let refined = refine_hits(
    &scene,
    &ray_forward(),
    &TriangleRayIntersector::default(),
    PickFlags::NODE,
    PickPolicy::All,
    aggregated,
  )
  .unwrap();
  assert_eq!(refined.len(), 1);
  assert_eq!(refined[0].target().node, kept);
}

#[test]
fn options_load_from_json() {
  let options: PickOptions =
    serde_json::from_str(r#"{ "precision": "Geometry", "policy": "Any" }"#).unwrap();
  assert_eq!(options.precision, PickPrecision::Geometry);
  assert_eq!(options.policy, PickPolicy::Any);
  assert_eq!(options.flags, PickFlags::NODE);

  let options = PickOptions::default()
    .with_flags(PickFlags::PATH | PickFlags::ALL_GEOM_INFO)
    .with_policy(PickPolicy::All);
  let text = serde_json::to_string(&options).unwrap();
  let back: PickOptions = serde_json::from_str(&text).unwrap();
  assert_eq!(back, options);

  assert_eq!(options.effective_flags(), options.flags);
  assert!(PickOptions::default()
    .effective_flags()
    .contains(PickFlags::CLOSEST_DISTANCE));
}

/// A ray that counts its bounds tests.
struct MeasuredRay {
  ray: PickRay,
  measured: Cell<usize>,
}

impl PickShape for MeasuredRay {
  fn intersect_bounds(&self, bounds: &Box3) -> Option<f64> {
    self.measured.set(self.measured.get() + 1);
    self.ray.intersect_bounds(bounds)
  }
}

#[test]
fn unsorted_picks_measure_candidates_on_demand() {
  let mut scene = PickableScene::new();
  for z in [4., 3., 2., 1.] {
    shape_root_at(&mut scene, z);
  }
  let candidates = scene.gather_candidates(&ray_forward());
  assert_eq!(candidates.len(), 4);

  let ray = MeasuredRay {
    ray: ray_forward(),
    measured: Cell::new(0),
  };
  let confirm_all = |_: &PickableScene,
                     _: &MeasuredRay,
                     _: PickFlags,
                     _: &mut HitRecordBuilder<SceneNodeKey, GeometryKey>| true;

  let measured_by = |precision: PickPrecision, policy: PickPolicy| {
    ray.measured.set(0);
    let options = PickOptions::new(precision, PickFlags::CLOSEST_DISTANCE, policy);
    let hits = pick(
      &scene,
      PickRoot::Scene,
      &candidates,
      &options,
      &ray,
      &confirm_all,
    )
    .unwrap();
    (hits.len(), ray.measured.get())
  };

  assert_eq!(measured_by(PickPrecision::Bounds, PickPolicy::Any), (1, 1));
  assert_eq!(measured_by(PickPrecision::Geometry, PickPolicy::Any), (1, 1));
  assert_eq!(measured_by(PickPrecision::Bounds, PickPolicy::All), (4, 4));
  assert_eq!(measured_by(PickPrecision::Bounds, PickPolicy::AllSorted), (4, 4));
}
