use crate::*;

/// Axis aligned box in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Box3 {
  pub min: Point3<f64>,
  pub max: Point3<f64>,
}

impl Box3 {
  pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
    Self { min, max }
  }

  pub fn empty() -> Self {
    Self {
      min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
      max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
  }

  pub fn expand_by_point(&mut self, p: Point3<f64>) {
    self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
    self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
  }

  pub fn union(mut self, other: &Self) -> Self {
    if !other.is_empty() {
      self.expand_by_point(other.min);
      self.expand_by_point(other.max);
    }
    self
  }

  pub fn center(&self) -> Point3<f64> {
    Point3::new(
      (self.min.x + self.max.x) * 0.5,
      (self.min.y + self.max.y) * 0.5,
      (self.min.z + self.max.z) * 0.5,
    )
  }

  pub fn contains(&self, p: Point3<f64>) -> bool {
    (self.min.x..=self.max.x).contains(&p.x)
      && (self.min.y..=self.max.y).contains(&p.y)
      && (self.min.z..=self.max.z).contains(&p.z)
  }

  pub fn overlaps(&self, other: &Self) -> bool {
    self.min.x <= other.max.x
      && other.min.x <= self.max.x
      && self.min.y <= other.max.y
      && other.min.y <= self.max.y
      && self.min.z <= other.max.z
      && other.min.z <= self.max.z
  }

  /// bounding box of the eight transformed corners
  pub fn apply_matrix(&self, mat: &Matrix4<f64>) -> Self {
    if self.is_empty() {
      return *self;
    }
    let mut result = Self::empty();
    for i in 0..8 {
      let corner = Point3::new(
        if i & 1 == 0 { self.min.x } else { self.max.x },
        if i & 2 == 0 { self.min.y } else { self.max.y },
        if i & 4 == 0 { self.min.z } else { self.max.z },
      );
      result.expand_by_point(mat.transform_point(corner));
    }
    result
  }
}

impl FromIterator<Point3<f64>> for Box3 {
  fn from_iter<T: IntoIterator<Item = Point3<f64>>>(iter: T) -> Self {
    let mut b = Self::empty();
    iter.into_iter().for_each(|p| b.expand_by_point(p));
    b
  }
}

/// The probe of a pick query.
pub trait PickShape {
  /// Distance from the probe's origin to `bounds`, `None` if they don't meet.
  fn intersect_bounds(&self, bounds: &Box3) -> Option<f64>;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickRay {
  pub origin: Point3<f64>,
  /// normalized
  pub direction: Vector3<f64>,
}

impl PickRay {
  pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
    Self {
      origin,
      direction: direction.normalize(),
    }
  }

  pub fn at(&self, distance: f64) -> Point3<f64> {
    self.origin + self.direction * distance
  }
}

impl PickShape for PickRay {
  fn intersect_bounds(&self, bounds: &Box3) -> Option<f64> {
    if bounds.is_empty() {
      return None;
    }
    let mut near = f64::NEG_INFINITY;
    let mut far = f64::INFINITY;

    for axis in 0..3 {
      let origin = self.origin[axis];
      let dir = self.direction[axis];
      let (min, max) = (bounds.min[axis], bounds.max[axis]);
      if dir == 0. {
        if origin < min || origin > max {
          return None;
        }
        continue;
      }
      let inv = 1. / dir;
      let (mut t0, mut t1) = ((min - origin) * inv, (max - origin) * inv);
      if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
      }
      near = near.max(t0);
      far = far.min(t1);
      if near > far {
        return None;
      }
    }

    if far < 0. {
      return None;
    }
    Some(near.max(0.))
  }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickPoint {
  pub location: Point3<f64>,
}

impl PickShape for PickPoint {
  fn intersect_bounds(&self, bounds: &Box3) -> Option<f64> {
    bounds.contains(self.location).then_some(0.)
  }
}

/// Volume probe, distance is measured from the volume's center.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickVolume {
  pub bounds: Box3,
}

impl PickShape for PickVolume {
  fn intersect_bounds(&self, bounds: &Box3) -> Option<f64> {
    if bounds.is_empty() || !self.bounds.overlaps(bounds) {
      return None;
    }
    let c = self.bounds.center();
    let closest = Point3::new(
      c.x.clamp(bounds.min.x, bounds.max.x),
      c.y.clamp(bounds.min.y, bounds.max.y),
      c.z.clamp(bounds.min.z, bounds.max.z),
    );
    Some((closest - c).magnitude())
  }
}

#[test]
fn ray_bounds_distance() {
  let b = Box3::new(Point3::new(-1., -1., 4.), Point3::new(1., 1., 6.));
  let ray = PickRay::new(Point3::new(0., 0., 0.), Vector3::new(0., 0., 1.));
  assert_eq!(ray.intersect_bounds(&b), Some(4.));

  let away = PickRay::new(Point3::new(0., 0., 0.), Vector3::new(0., 0., -1.));
  assert_eq!(away.intersect_bounds(&b), None);

  let inside = PickRay::new(Point3::new(0., 0., 5.), Vector3::new(1., 0., 0.));
  assert_eq!(inside.intersect_bounds(&b), Some(0.));
}

#[test]
fn point_and_volume_probes() {
  let b = Box3::new(Point3::new(0., 0., 0.), Point3::new(2., 2., 2.));

  let inside = PickPoint {
    location: Point3::new(1., 1., 1.),
  };
  let outside = PickPoint {
    location: Point3::new(3., 1., 1.),
  };
  assert_eq!(inside.intersect_bounds(&b), Some(0.));
  assert_eq!(outside.intersect_bounds(&b), None);

  let volume = PickVolume {
    bounds: Box3::new(Point3::new(3., 0., 0.), Point3::new(5., 2., 2.)),
  };
  assert_eq!(volume.intersect_bounds(&b), None);

  let touching = PickVolume {
    bounds: Box3::new(Point3::new(1., 0., 0.), Point3::new(5., 2., 2.)),
  };
  // from the volume center (3, 1, 1) to the box face at x = 2
  assert_eq!(touching.intersect_bounds(&b), Some(1.));

  let moved = b.apply_matrix(&Matrix4::from_translation(Vector3::new(0., 0., 10.)));
  assert_eq!(moved.min, Point3::new(0., 0., 10.));
  assert_eq!(moved.max, Point3::new(2., 2., 12.));
  assert!(Box3::empty().union(&b) == b);
}
