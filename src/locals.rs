//! Function-scoped local variable table.
//!
//! Every distinct identifier gets an 8-byte slot below `%rbp`. Slots are
//! handed out on first use and never released; there is no block scoping.

/// A local variable and its distance below the frame pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obj {
  pub name: String,
  pub offset: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LocalTable {
  locals: Vec<Obj>,
}

impl LocalTable {
  const SLOT_SIZE: i64 = 8;

  pub fn new() -> Self {
    Self::default()
  }

  pub fn find(&self, name: &str) -> Option<&Obj> {
    self.locals.iter().find(|obj| obj.name == name)
  }

  /// Return the offset for `name`, allocating the next slot if it is new.
  pub fn resolve(&mut self, name: &str) -> i64 {
    if let Some(obj) = self.find(name) {
      return obj.offset;
    }

    let offset = self.stack_size() + Self::SLOT_SIZE;
    self.locals.push(Obj {
      name: name.to_string(),
      offset,
    });
    offset
  }

  /// Bytes of frame needed to hold every local allocated so far.
  pub fn stack_size(&self) -> i64 {
    self.locals.len() as i64 * Self::SLOT_SIZE
  }

  pub(crate) fn len(&self) -> usize {
    self.locals.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn offsets_start_at_eight_in_first_use_order() {
    let mut table = LocalTable::new();
    assert_eq!(table.resolve("foo"), 8);
    assert_eq!(table.resolve("bar"), 16);
    assert_eq!(table.resolve("baz"), 24);
    assert_eq!(table.stack_size(), 24);
  }

  #[test]
  fn same_spelling_aliases_one_slot() {
    let mut table = LocalTable::new();
    let first = table.resolve("x");
    table.resolve("y");
    assert_eq!(table.resolve("x"), first);
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn prefixes_are_distinct_names() {
    let mut table = LocalTable::new();
    assert_eq!(table.resolve("ab"), 8);
    assert_eq!(table.resolve("a"), 16);
    assert_eq!(table.resolve("abc"), 24);
    assert_eq!(table.find("a").map(|obj| obj.offset), Some(16));
    assert_eq!(table.len(), 3);
  }

  #[test]
  fn empty_table_needs_no_frame() {
    let table = LocalTable::new();
    assert_eq!(table.len(), 0);
    assert_eq!(table.stack_size(), 0);
    assert!(table.find("a").is_none());
  }
}
