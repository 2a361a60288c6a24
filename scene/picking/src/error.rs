use crate::*;

/// Failures that abort a whole pick query.
///
/// These describe a scene that was not configured for picking; they are not
/// recoverable runtime conditions. Races with concurrent scene mutation never
/// surface here, they only make the affected candidate disappear.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PickError {
  #[error("pickable node {node} lacks capability {missing:?} required for geometry picking")]
  NodeCapabilityNotSet { node: String, missing: Capabilities },
  #[error(
    "geometry slot {geometry_index} of pickable node {node} lacks capability {missing:?} required for geometry picking"
  )]
  GeometryCapabilityNotSet {
    node: String,
    geometry_index: usize,
    missing: Capabilities,
  },
}

impl PickError {
  pub fn missing(&self) -> Capabilities {
    match self {
      PickError::NodeCapabilityNotSet { missing, .. } => *missing,
      PickError::GeometryCapabilityNotSet { missing, .. } => *missing,
    }
  }
}
