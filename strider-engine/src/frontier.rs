use std::collections::HashSet;

use crate::extract::Node;

/// Seen-once gate for discovered nodes.
///
/// Owned exclusively by the coordinator loop, which makes the
/// check-then-mark in [`Frontier::admit`] atomic without any locking.
/// Nodes are never removed; the set only grows over the course of a run.
#[derive(Debug, Default)]
pub struct Frontier {
    seen: HashSet<Node>,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Marks `node` as seen. Returns true iff it had not been seen
    /// before, i.e. the node should be scheduled for expansion.
    pub fn admit(&mut self, node: &str) -> bool {
        if self.seen.contains(node) {
            return false;
        }
        self.seen.insert(node.to_string());
        true
    }

    pub fn contains(&self, node: &str) -> bool {
        self.seen.contains(node)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Consumes the frontier, yielding the full discovered set.
    pub fn into_nodes(self) -> HashSet<Node> {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_new_node() {
        let mut frontier = Frontier::new();
        assert!(frontier.admit("http://example.com/"));
        assert!(frontier.contains("http://example.com/"));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_admit_rejects_seen_node() {
        let mut frontier = Frontier::new();
        assert!(frontier.admit("http://example.com/"));
        assert!(!frontier.admit("http://example.com/"));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_nodes_are_compared_by_exact_value() {
        // No normalization happens here; trailing slashes matter.
        let mut frontier = Frontier::new();
        assert!(frontier.admit("http://example.com"));
        assert!(frontier.admit("http://example.com/"));
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn test_into_nodes_returns_everything_admitted() {
        let mut frontier = Frontier::new();
        frontier.admit("a");
        frontier.admit("b");
        frontier.admit("a");
        let nodes = frontier.into_nodes();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains("a"));
        assert!(nodes.contains("b"));
    }
}
