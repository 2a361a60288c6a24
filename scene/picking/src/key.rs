use crate::*;

/// Identifies one link node, i.e. one instantiation of a shared subgraph.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// Disambiguates which instantiation of (possibly nested) shared subgraphs a
/// leaf was reached through.
///
/// Ids are stored outermost first, so walking from the leaf towards the root
/// consumes them from the back. The key itself is never mutated by a walk, a
/// [`KeyCursor`] tracks the consumption instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InstancingKey {
  ids: SmallVec<[InstanceId; 4]>,
}

impl InstancingKey {
  /// the key of a leaf that is not inside any shared subgraph
  pub fn root() -> Self {
    Self::default()
  }

  pub fn from_ids(ids: impl IntoIterator<Item = InstanceId>) -> Self {
    Self {
      ids: ids.into_iter().collect(),
    }
  }

  /// Key for descending one more level of sharing through `link`.
  pub fn descend(&self, link: InstanceId) -> Self {
    let mut ids = self.ids.clone();
    ids.push(link);
    Self { ids }
  }

  pub fn ids(&self) -> &[InstanceId] {
    &self.ids
  }

  pub fn depth(&self) -> usize {
    self.ids.len()
  }

  pub fn is_root(&self) -> bool {
    self.ids.is_empty()
  }

  pub fn trailing(&self) -> Option<InstanceId> {
    self.ids.last().copied()
  }

  pub fn cursor(&self) -> KeyCursor<'_> {
    KeyCursor {
      remain: &self.ids,
    }
  }
}

/// Read position inside an [`InstancingKey`] during one upward walk.
#[derive(Debug, Clone, Copy)]
pub struct KeyCursor<'a> {
  remain: &'a [InstanceId],
}

impl KeyCursor<'_> {
  /// Take the trailing, not yet consumed, instance id.
  pub fn pop_trailing(&mut self) -> Option<InstanceId> {
    let (last, rest) = self.remain.split_last()?;
    self.remain = rest;
    Some(*last)
  }

  pub fn remaining(&self) -> usize {
    self.remain.len()
  }
}

#[test]
fn key_cursor_consumes_from_the_back() {
  let key = InstancingKey::root()
    .descend(InstanceId(1))
    .descend(InstanceId(7));
  assert_eq!(key.trailing(), Some(InstanceId(7)));

  let mut cursor = key.cursor();
  assert_eq!(cursor.pop_trailing(), Some(InstanceId(7)));
  assert_eq!(cursor.pop_trailing(), Some(InstanceId(1)));
  assert_eq!(cursor.pop_trailing(), None);

  // walking never alters the key
  assert_eq!(key.depth(), 2);
}
