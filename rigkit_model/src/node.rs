//! The scene node hierarchy produced by an importer.
use glam::Mat4;

/// A named node in the scene hierarchy.
///
/// Names do not need to be unique.
/// Nodes with the same name as a bone in the [Skeleton](crate::Skeleton) drive that bone.
#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    pub name: String,
    /// The rest transform relative to the parent node.
    pub transform: Mat4,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Iterate this node and its descendants in pre-order.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { stack: vec![self] }
    }

    /// The total number of nodes including this node.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// The number of nodes on the longest path from this node to a leaf.
    pub fn depth(&self) -> usize {
        // Avoid recursion for deep hierarchies.
        let mut max_depth = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        max_depth
    }

    /// The correction applied above the root to cancel the root's rest transform.
    ///
    /// Returns `None` if the transform cannot be inverted.
    /// Small scales like unit conversions from millimeters are still invertible.
    pub fn global_inverse(&self) -> Option<Mat4> {
        if self.transform.determinant() == 0.0 {
            return None;
        }
        let inverse = self.transform.inverse();
        inverse.is_finite().then_some(inverse)
    }
}

/// A pre-order iterator over a [Node] and its descendants.
pub struct NodeIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push in reverse to visit the first child next.
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
