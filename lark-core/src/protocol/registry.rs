//! Known message-type IDs.
//!
//! The `type → payload schema` mapping lives with the application; the
//! codec only needs membership so it can tell a deliverable frame from a
//! forward-compatible one to consume and drop.

use std::collections::HashSet;

/// Set of message-type IDs the application can interpret.
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    known: HashSet<u32>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type ID as deliverable.
    pub fn register(&mut self, frame_type: u32) -> &mut Self {
        self.known.insert(frame_type);
        self
    }

    /// Whether frames of this type should be delivered (vs. skipped).
    pub fn is_known(&self, frame_type: u32) -> bool {
        self.known.contains(&frame_type)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl FromIterator<u32> for MessageRegistry {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            known: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = MessageRegistry::new();
        assert!(registry.is_empty());
        registry.register(1).register(12);
        assert!(registry.is_known(1));
        assert!(registry.is_known(12));
        assert!(!registry.is_known(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn from_iterator() {
        let registry: MessageRegistry = [3u32, 5, 5].into_iter().collect();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_known(5));
    }
}
