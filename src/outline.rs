//! Bookmark outline built from heading close events.
//!
//! Nodes live in a flat arena indexed by position; parent/child links are
//! arena indices. A synthetic level-0 root is materialized on the first
//! insertion so headings that start deep (an `h3` before any `h1`) still hang
//! off a well-defined ancestor.

/// One outline node in the arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineNode {
    /// Heading level, 1-6; 0 for the synthetic root.
    pub level: u8,
    /// Concatenated heading text.
    pub title: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Arena-backed bookmark tree.
#[derive(Clone, Debug, Default)]
pub struct OutlineTree {
    nodes: Vec<OutlineNode>,
    /// Most recently inserted heading node.
    current: Option<usize>,
}

impl OutlineTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no heading has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Number of heading nodes, excluding the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn node(&self, index: usize) -> Option<&OutlineNode> {
        self.nodes.get(index)
    }

    /// Indices of the top-level headings (children of the synthetic root).
    pub fn roots(&self) -> &[usize] {
        match self.nodes.first() {
            Some(root) => &root.children,
            None => &[],
        }
    }

    /// Record a closed heading and make it the current node.
    ///
    /// Placement relative to the current node: a deeper level nests under it,
    /// an equal level becomes its sibling, a shallower level walks up the
    /// ancestor chain until an ancestor with a smaller level is found.
    pub fn on_header_close(&mut self, level: u8, title: String) {
        let level = level.clamp(1, 6);
        if self.nodes.is_empty() {
            self.nodes.push(OutlineNode {
                level: 0,
                title: String::new(),
                parent: None,
                children: Vec::with_capacity(8),
            });
        }
        let parent = match self.current {
            None => 0,
            Some(mut at) => {
                while self.nodes[at].level >= level {
                    match self.nodes[at].parent {
                        Some(p) => at = p,
                        None => break,
                    }
                }
                at
            }
        };
        let index = self.nodes.len();
        self.nodes.push(OutlineNode {
            level,
            title,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        self.current = Some(index);
    }

    /// Flatten to `(depth, title)` pairs in document order, depth 1 at the top.
    pub fn flat(&self) -> Vec<(u8, &str)> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(usize, u8)> = self.roots().iter().rev().map(|&i| (i, 1)).collect();
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            out.push((depth, node.title.as_str()));
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(levels: &[(u8, &str)]) -> OutlineTree {
        let mut tree = OutlineTree::new();
        for (level, title) in levels {
            tree.on_header_close(*level, title.to_string());
        }
        tree
    }

    #[test]
    fn empty_tree_has_no_roots() {
        let tree = OutlineTree::new();
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn deeper_heading_nests_under_current() {
        let tree = tree_of(&[(1, "ch"), (2, "sec"), (3, "sub")]);
        assert_eq!(
            tree.flat(),
            vec![(1, "ch"), (2, "sec"), (3, "sub")]
        );
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn equal_level_becomes_sibling() {
        let tree = tree_of(&[(1, "a"), (2, "a1"), (2, "a2")]);
        let flat = tree.flat();
        assert_eq!(flat, vec![(1, "a"), (2, "a1"), (2, "a2")]);
    }

    #[test]
    fn shallower_heading_climbs_to_matching_ancestor() {
        let tree = tree_of(&[(1, "a"), (2, "a1"), (3, "a1x"), (2, "a2"), (1, "b")]);
        assert_eq!(
            tree.flat(),
            vec![(1, "a"), (2, "a1"), (3, "a1x"), (2, "a2"), (1, "b")]
        );
        assert_eq!(tree.roots().len(), 2);
    }

    #[test]
    fn deep_first_heading_hangs_off_synthetic_root() {
        let tree = tree_of(&[(3, "orphan"), (1, "real")]);
        // Both end up as direct children of the root; depth in the flattened
        // view reflects tree shape, not heading level.
        assert_eq!(tree.flat(), vec![(1, "orphan"), (1, "real")]);
        assert_eq!(tree.roots().len(), 2);
    }
}
