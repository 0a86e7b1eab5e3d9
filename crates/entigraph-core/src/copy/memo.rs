//! Memo table of a copy operation.

use crate::identity::Identity;
use std::collections::hash_map::{Entry, HashMap};
use tracing::warn;

/// Maps each original instance to the copy produced for it.
///
/// Scoped to one copy operation. Entries are never overwritten: the first
/// copy registered for an original is the one every later lookup returns.
#[derive(Debug, Clone, Default)]
pub struct CopyMemo {
    copies: HashMap<Identity, Identity>,
}

impl CopyMemo {
    /// Create an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// The copy recorded for `original`.
    pub fn get(&self, original: &Identity) -> Option<&Identity> {
        self.copies.get(original)
    }

    /// Check if `original` was already copied.
    pub fn contains(&self, original: &Identity) -> bool {
        self.copies.contains_key(original)
    }

    /// Record `copy` as the copy of `original`, keeping any earlier entry.
    ///
    /// Returns the copy that is recorded after the call.
    pub fn register(&mut self, original: Identity, copy: Identity) -> &Identity {
        match self.copies.entry(original) {
            Entry::Occupied(entry) => {
                if entry.get() != &copy {
                    warn!(
                        original = %entry.key(),
                        kept = %entry.get(),
                        ignored = %copy,
                        "memo entry already registered"
                    );
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(copy),
        }
    }

    /// Number of originals copied.
    pub fn len(&self) -> usize {
        self.copies.len()
    }

    /// Check if nothing was copied.
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// Iterate over `(original, copy)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &Identity)> {
        self.copies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_never_overwrites() {
        let original = Identity::new("Order", [1; 16]);
        let first = Identity::new("Order", [2; 16]);
        let second = Identity::new("Order", [3; 16]);

        let mut memo = CopyMemo::new();
        assert_eq!(memo.register(original.clone(), first.clone()), &first);
        assert_eq!(memo.register(original.clone(), second), &first);

        assert_eq!(memo.get(&original), Some(&first));
        assert_eq!(memo.len(), 1);
    }
}
