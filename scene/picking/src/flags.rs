use crate::*;

bitflags::bitflags! {
  /// Selects which facets of a [`HitRecord`] a query populates.
  #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
  pub struct PickFlags: u32 {
    /// the root-to-leaf scene path of the hit
    const PATH = 0x01;
    /// the hit leaf node
    const NODE = 0x02;
    /// a snapshot of the leaf's local to world transform
    const TRANSFORM = 0x04;
    const CLOSEST_POINT = 0x08;
    const CLOSEST_DISTANCE = 0x10;
    /// only the closest intersection record
    const CLOSEST_GEOM_INFO = 0x20;
    /// every intersection record, sorted by distance
    const ALL_GEOM_INFO = 0x40;
  }
}

impl PickFlags {
  /// Facets only an exact geometry test can produce.
  pub const GEOMETRY_ONLY: Self = Self::CLOSEST_POINT
    .union(Self::CLOSEST_GEOM_INFO)
    .union(Self::ALL_GEOM_INFO);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PickPrecision {
  /// test against each node's enclosing bounds only
  #[default]
  Bounds,
  /// additionally test against the node's actual primitives
  Geometry,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PickPolicy {
  /// stop at the first hit found
  Any,
  /// every hit, in candidate order
  All,
  /// every hit, ordered by closest distance
  #[default]
  AllSorted,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickOptions {
  pub precision: PickPrecision,
  pub flags: PickFlags,
  pub policy: PickPolicy,
}

impl Default for PickOptions {
  fn default() -> Self {
    Self {
      precision: PickPrecision::Bounds,
      flags: PickFlags::NODE,
      policy: PickPolicy::AllSorted,
    }
  }
}

impl PickOptions {
  pub fn new(precision: PickPrecision, flags: PickFlags, policy: PickPolicy) -> Self {
    Self {
      precision,
      flags,
      policy,
    }
  }

  pub fn with_precision(mut self, precision: PickPrecision) -> Self {
    self.precision = precision;
    self
  }

  pub fn with_flags(mut self, flags: PickFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn with_policy(mut self, policy: PickPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// The flags actually used while resolving. Sorted picks always need the
  /// closest distance as their ordering key.
  pub fn effective_flags(&self) -> PickFlags {
    match self.policy {
      PickPolicy::AllSorted => self.flags | PickFlags::CLOSEST_DISTANCE,
      PickPolicy::Any | PickPolicy::All => self.flags,
    }
  }
}
