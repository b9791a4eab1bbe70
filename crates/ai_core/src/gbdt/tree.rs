//! Regression tree structures shared by the boosted and bagged models
//!
//! Nodes live in a flat vector with node 0 as the root. Traversal goes left
//! when `feature <= threshold`.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the projected feature row
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the prediction value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    #[serde(default)]
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    #[serde(default = "no_child")]
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    #[serde(default = "no_child")]
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature", default = "no_child")]
    pub feature_idx: i32,

    /// Split threshold
    #[serde(default)]
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    #[serde(default)]
    pub leaf: Option<f64>,
}

fn no_child() -> i32 {
    -1
}

fn unit_weight() -> f64 {
    1.0
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to the leaf value when boosting
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Evaluate this tree on a feature row.
    ///
    /// Returns `None` when the structure is malformed for this row (dangling
    /// child, feature index past the row, or a cycle). A tree that passed
    /// `validate` against the row width never returns `None`.
    pub fn evaluate(&self, features: &[f64]) -> Option<f64> {
        let mut idx = 0usize;

        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(idx)?;

            if node.is_leaf() {
                return node.leaf;
            }

            let value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).ok()?;
        }

        None
    }

    /// Validate tree structure against the width of the feature row
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    Some(v) => return Err(format!("Leaf node {i} has non-finite value {v}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            if node.left < 0 || node.left >= len {
                return Err(format!("Node {} has invalid left child: {}", i, node.left));
            }
            if node.right < 0 || node.right >= len {
                return Err(format!("Node {} has invalid right child: {}", i, node.right));
            }
            if node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Node {} splits on feature {} but only {} features are declared",
                    i, node.feature_idx, feature_count
                ));
            }
            if node.threshold.is_nan() {
                return Err(format!("Node {i} has NaN threshold"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        )
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 12.5, 1, 2);
        assert!(!internal.is_leaf());
        assert_eq!(internal.feature_idx, 3);

        let leaf = Node::leaf(1, -2.5);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.leaf, Some(-2.5));
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30.0]), Some(100.0));
        assert_eq!(tree.evaluate(&[50.0]), Some(100.0)); // equal goes left
        assert_eq!(tree.evaluate(&[60.0]), Some(200.0));
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump().validate(1).is_ok());
        assert!(stump().validate(0).is_err());

        let dangling = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 5, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        assert!(dangling.validate(1).is_err());
        assert_eq!(dangling.evaluate(&[10.0]), None);
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let cyclic = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 1),
                Node::internal(1, 0, 50.0, 0, 0),
            ],
            1.0,
        );
        assert_eq!(cyclic.evaluate(&[1.0]), None);
    }

    #[test]
    fn test_json_defaults() {
        let tree: Tree = serde_json::from_str(
            r#"{"nodes":[{"feature":0,"threshold":1.5,"left":1,"right":2},{"leaf":3.0},{"leaf":4.0}]}"#,
        )
        .unwrap();
        assert_eq!(tree.weight, 1.0);
        assert!(tree.validate(1).is_ok());
        assert_eq!(tree.evaluate(&[2.0]), Some(4.0));
    }
}
