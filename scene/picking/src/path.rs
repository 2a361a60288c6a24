use crate::*;

/// Where a pick query is rooted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickRoot<N> {
  /// the whole scene
  Scene,
  /// a branch group; only geometry under it is reported
  Branch(N),
}

impl<N: Copy> PickRoot<N> {
  pub fn path_stop(&self) -> PathStop<N> {
    match self {
      PickRoot::Scene => PathStop::SceneBoundary,
      PickRoot::Branch(b) => PathStop::Ancestor(*b),
    }
  }
}

/// Where an upward path walk ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStop<N> {
  /// walk until there is no parent left
  SceneBoundary,
  /// walk until this node, which must dominate the leaf
  Ancestor(N),
}

/// One step of an instancing aware upward walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AncestorStep<N> {
  /// an ordinary node on the way up (the leaf included)
  Node(N),
  /// the link through which a shared group was entered, visited right after
  /// the shared group itself
  Link(N),
}

impl<N: Copy> AncestorStep<N> {
  pub fn node(&self) -> N {
    match self {
      AncestorStep::Node(n) | AncestorStep::Link(n) => *n,
    }
  }
}

/// Why a walk could not reach the scene boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkBreak {
  /// the visitor asked to stop
  Stopped,
  /// no link of a shared group matches the key (detached concurrently), or a
  /// node vanished during the walk
  Detached,
}

/// Walk from `leaf` towards the scene boundary, following for every shared
/// group the link selected by the trailing id of `key`.
///
/// The visitor returns `false` to stop the walk early.
pub fn walk_instanced_ancestors<G: PickSceneGraph>(
  graph: &G,
  leaf: G::Node,
  key: &InstancingKey,
  mut visitor: impl FnMut(AncestorStep<G::Node>) -> bool,
) -> Result<(), WalkBreak> {
  if !graph.is_alive(leaf) {
    return Err(WalkBreak::Detached);
  }

  let mut cursor = key.cursor();
  let mut current = Some(leaf);
  let mut top = leaf;

  while let Some(node) = current {
    if !visitor(AncestorStep::Node(node)) {
      return Err(WalkBreak::Stopped);
    }
    top = node;

    current = if let Some(links) = graph.shared_group_links(node) {
      let instance = cursor.pop_trailing().ok_or(WalkBreak::Detached)?;
      let link = links
        .iter()
        .copied()
        .find(|link| graph.link_instance(*link) == Some(instance))
        .ok_or(WalkBreak::Detached)?;

      if !visitor(AncestorStep::Link(link)) {
        return Err(WalkBreak::Stopped);
      }
      top = link;
      graph.parent(link)
    } else {
      graph.parent(node)
    };
  }

  // running out of parents anywhere but on the scene boundary means a detached
  // branch
  if graph.is_scene_root(top) {
    Ok(())
  } else {
    Err(WalkBreak::Detached)
  }
}

/// Collect the pick reporting nodes from `leaf` up to, excluding, `stop`.
///
/// Returned in leaf-to-root order. Link nodes entering shared groups are always
/// reported. `None` when the branch was detached or when `stop` is an ancestor
/// that does not dominate `leaf` under this instancing key.
pub fn resolve_path<G: PickSceneGraph>(
  graph: &G,
  leaf: G::Node,
  stop: PathStop<G::Node>,
  key: &InstancingKey,
) -> Option<Vec<G::Node>> {
  let mut path = Vec::with_capacity(5);
  let mut reached = false;

  let result = walk_instanced_ancestors(graph, leaf, key, |step| match step {
    AncestorStep::Node(node) => {
      if stop == PathStop::Ancestor(node) {
        reached = true;
        return false;
      }
      if graph.pick_reporting(node) {
        path.push(node);
      }
      true
    }
    // a link is never the stop ancestor, its parent is checked next
    AncestorStep::Link(link) => {
      path.push(link);
      true
    }
  });

  match result {
    Err(WalkBreak::Stopped) if reached => Some(path),
    Err(_) => None,
    Ok(()) => match stop {
      PathStop::SceneBoundary => Some(path),
      PathStop::Ancestor(_) => None,
    },
  }
}

/// The pick reporting nodes from `branch` itself up to the scene boundary, in
/// leaf-to-root order. This is the part of a reported path above a branch
/// scoped query's root.
pub fn root_prefix_path<G: PickSceneGraph>(graph: &G, branch: G::Node) -> Vec<G::Node> {
  let mut path = Vec::with_capacity(5);
  let mut current = Some(branch);
  while let Some(node) = current {
    if graph.pick_reporting(node) {
      path.push(node);
    }
    current = graph.parent(node);
  }
  path
}

/// Concatenate the resolved leaf-to-root path with the root prefix (also
/// leaf-to-root) and flip the whole into root-to-leaf order.
pub fn merge_path<N: Copy>(resolved: &[N], prefix: Option<&[N]>) -> Vec<N> {
  let prefix = prefix.unwrap_or(&[]);
  let mut nodes = Vec::with_capacity(resolved.len() + prefix.len());
  nodes.extend(prefix.iter().rev().copied());
  nodes.extend(resolved.iter().rev().copied());
  nodes
}

/// A reported path of a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePath<N> {
  /// pick reporting nodes, root to leaf
  pub nodes: Vec<N>,
  /// the reported leaf; for merged sources this is the original node
  pub leaf: N,
  pub local_to_world: Matrix4<f64>,
}

impl<N> ScenePath<N> {
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
