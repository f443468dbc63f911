//! Binary operation tree.
//!
//! Children are exclusively owned (`Box`), there are no parent pointers.
//! Nodes are addressed by [`NodePath`], the sequence of left/right turns from
//! the root, so callers can hold on to a location while mutating the tree.
//! Parent lookup is a traversal that carries the parent path along.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;

use calc_core::{Operator, SchedulerError, SchedulerResult};

use crate::compiler::Token;

/// Content of a node: a numeric literal (leaf) or an operator (internal).
///
/// Serialized as text: the operator symbol, or the shortest decimal form of
/// the literal that parses back to the same `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum NodeValue {
    Literal(f64),
    Operator(Operator),
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Literal(value) => write!(f, "{value}"),
            NodeValue::Operator(op) => write!(f, "{op}"),
        }
    }
}

impl From<NodeValue> for String {
    fn from(value: NodeValue) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for NodeValue {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        if let Ok(op) = text.parse::<Operator>() {
            return Ok(NodeValue::Operator(op));
        }
        text.parse::<f64>()
            .map(NodeValue::Literal)
            .map_err(|_| format!("invalid node value: {text}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub value: NodeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<TreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<TreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
}

impl TreeNode {
    pub fn leaf(value: f64) -> Self {
        Self {
            value: NodeValue::Literal(value),
            left: None,
            right: None,
            task_id: None,
        }
    }

    pub fn internal(op: Operator, left: TreeNode, right: TreeNode) -> Self {
        Self {
            value: NodeValue::Operator(op),
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            task_id: None,
        }
    }

    pub fn literal(&self) -> Option<f64> {
        match self.value {
            NodeValue::Literal(value) => Some(value),
            NodeValue::Operator(_) => None,
        }
    }

    /// True iff both children exist and both are numeric literals.
    pub fn is_spare(&self) -> bool {
        self.operands().is_some()
    }

    /// Operator and operand values of a spare node.
    pub fn operands(&self) -> Option<(Operator, f64, f64)> {
        let op = match self.value {
            NodeValue::Operator(op) => op,
            NodeValue::Literal(_) => return None,
        };
        let left = self.left.as_deref()?.literal()?;
        let right = self.right.as_deref()?.literal()?;
        Some((op, left, right))
    }

    /// Turns the node into a leaf holding `value`, dropping both children
    /// and the task annotation.
    pub fn replace_with_value(&mut self, value: f64) {
        self.left = None;
        self.right = None;
        self.value = NodeValue::Literal(value);
        self.task_id = None;
    }

    fn child(&self, side: Side) -> Option<&TreeNode> {
        match side {
            Side::Left => self.left.as_deref(),
            Side::Right => self.right.as_deref(),
        }
    }

    fn child_mut(&mut self, side: Side) -> Option<&mut TreeNode> {
        match side {
            Side::Left => self.left.as_deref_mut(),
            Side::Right => self.right.as_deref_mut(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Location of a node as turns taken from the root. Empty means the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Vec<Side>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self) -> Option<NodePath> {
        let (_, rest) = self.0.split_last()?;
        Some(NodePath(rest.to_vec()))
    }

    pub fn child(&self, side: Side) -> NodePath {
        let mut turns = self.0.clone();
        turns.push(side);
        NodePath(turns)
    }
}

/// Result of a task-id lookup: the node and its parent (`None` for the root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocation {
    pub parent: Option<NodePath>,
    pub node: NodePath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub root: TreeNode,
}

impl Tree {
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    pub fn node(&self, path: &NodePath) -> Option<&TreeNode> {
        path.0
            .iter()
            .try_fold(&self.root, |node, side| node.child(*side))
    }

    pub fn node_mut(&mut self, path: &NodePath) -> Option<&mut TreeNode> {
        let mut node = &mut self.root;
        for side in &path.0 {
            node = node.child_mut(*side)?;
        }
        Some(node)
    }

    /// The root has been rewritten to a literal.
    pub fn result(&self) -> Option<f64> {
        self.root.literal()
    }

    /// Collects every spare node in one traversal. Each reachable node is
    /// visited exactly once; the order is pre-order, left before right.
    pub fn find_spare_nodes(&self) -> Vec<NodePath> {
        let mut spare = Vec::new();
        self.walk(|path, node| {
            if node.is_spare() {
                spare.push(path.clone());
            }
            false
        });
        spare
    }

    pub fn find_parent_and_node_by_task_id(&self, task_id: i64) -> Option<NodeLocation> {
        let mut found = None;
        self.walk(|path, node| {
            if node.task_id == Some(task_id) {
                found = Some(NodeLocation {
                    parent: path.parent(),
                    node: path.clone(),
                });
                return true;
            }
            false
        });
        found
    }

    /// Number of nodes, used for log fields.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| {
            count += 1;
            false
        });
        count
    }

    /// Evaluates the whole tree locally. `None` on division by zero.
    pub fn evaluate(&self) -> Option<f64> {
        fn eval(node: &TreeNode) -> Option<f64> {
            match node.value {
                NodeValue::Literal(value) => Some(value),
                NodeValue::Operator(op) => {
                    let left = eval(node.left.as_deref()?)?;
                    let right = eval(node.right.as_deref()?)?;
                    op.apply(left, right)
                }
            }
        }
        eval(&self.root)
    }

    pub fn to_blob(&self) -> SchedulerResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_blob(blob: &[u8]) -> SchedulerResult<Self> {
        Ok(serde_json::from_slice(blob)?)
    }

    /// Depth-first traversal with an explicit stack. `visit` returns `true`
    /// to stop early.
    fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&NodePath, &TreeNode) -> bool,
    {
        let mut stack = vec![(NodePath::root(), &self.root)];
        while let Some((path, node)) = stack.pop() {
            if visit(&path, node) {
                return;
            }
            for side in [Side::Right, Side::Left] {
                if let Some(child) = node.child(side) {
                    stack.push((path.child(side), child));
                }
            }
        }
    }
}

/// Builds the operation tree from a postfix sequence.
///
/// The second-popped operand becomes the left child. A malformed sequence
/// is an invariant violation: the compiler never emits one.
pub fn build_tree(postfix: &[Token]) -> SchedulerResult<Tree> {
    let mut stack: Vec<TreeNode> = Vec::with_capacity(postfix.len());

    for token in postfix {
        match *token {
            Token::Number(value) => stack.push(TreeNode::leaf(value)),
            Token::Operator(op) => {
                let (right, left) = match (stack.pop(), stack.pop()) {
                    (Some(right), Some(left)) => (right, left),
                    _ => {
                        error!(operator = %op, "operand stack underflow while building tree");
                        return Err(SchedulerError::TreeInvariant(format!(
                            "operand stack underflow at operator {op}"
                        )));
                    }
                };
                stack.push(TreeNode::internal(op, left, right));
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(Tree::new(root)),
        (root, _) => {
            let remaining = stack.len() + usize::from(root.is_some());
            error!(remaining, "postfix sequence did not reduce to a single root");
            Err(SchedulerError::TreeInvariant(format!(
                "expected a single root, found {remaining} nodes"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::to_postfix;

    fn tree(input: &str) -> Tree {
        build_tree(&to_postfix(input).unwrap()).unwrap()
    }

    /// Resolves spare nodes one at a time, lowest path first, until the root
    /// is a literal.
    fn resolve(tree: &mut Tree) -> f64 {
        let mut next_id = 1;
        loop {
            if let Some(result) = tree.result() {
                return result;
            }
            for path in tree.find_spare_nodes() {
                let node = tree.node_mut(&path).unwrap();
                if node.task_id.is_none() {
                    node.task_id = Some(next_id);
                    next_id += 1;
                }
            }
            let task_id = (1..next_id)
                .find(|id| tree.find_parent_and_node_by_task_id(*id).is_some())
                .unwrap();
            let location = tree.find_parent_and_node_by_task_id(task_id).unwrap();
            let node = tree.node_mut(&location.node).unwrap();
            let (op, a, b) = node.operands().unwrap();
            node.replace_with_value(op.apply(a, b).unwrap());
        }
    }

    #[test]
    fn test_build_preserves_operand_order() {
        let t = tree("8-3");
        assert_eq!(t.root.value, NodeValue::Operator(Operator::Sub));
        assert_eq!(t.root.left.as_ref().unwrap().literal(), Some(8.0));
        assert_eq!(t.root.right.as_ref().unwrap().literal(), Some(3.0));
    }

    #[test]
    fn test_build_rejects_malformed_postfix() {
        let underflow = [Token::Number(1.0), Token::Operator(Operator::Add)];
        assert!(matches!(
            build_tree(&underflow),
            Err(SchedulerError::TreeInvariant(_))
        ));

        let leftovers = [Token::Number(1.0), Token::Number(2.0)];
        assert!(matches!(
            build_tree(&leftovers),
            Err(SchedulerError::TreeInvariant(_))
        ));

        assert!(matches!(build_tree(&[]), Err(SchedulerError::TreeInvariant(_))));
    }

    #[test]
    fn test_is_spare() {
        let t = tree("2*(2+2)");
        assert!(!t.root.is_spare());
        assert!(t.root.right.as_ref().unwrap().is_spare());
        assert!(!t.root.left.as_ref().unwrap().is_spare());
        assert!(TreeNode::internal(Operator::Add, TreeNode::leaf(1.0), TreeNode::leaf(2.0)).is_spare());
    }

    #[test]
    fn test_find_spare_nodes() {
        let t = tree("(1+2)*(3-4)+5/6");
        let spare: Vec<_> = t
            .find_spare_nodes()
            .iter()
            .map(|path| t.node(path).unwrap().operands().unwrap())
            .collect();
        assert_eq!(
            spare,
            vec![
                (Operator::Add, 1.0, 2.0),
                (Operator::Sub, 3.0, 4.0),
                (Operator::Div, 5.0, 6.0),
            ]
        );

        assert!(tree("2+2").find_spare_nodes()[0].is_root());
        assert!(build_tree(&[Token::Number(7.0)])
            .unwrap()
            .find_spare_nodes()
            .is_empty());
    }

    #[test]
    fn test_find_parent_and_node_by_task_id() {
        let mut t = tree("2*(2+2)");
        let inner = NodePath::root().child(Side::Right);
        t.node_mut(&inner).unwrap().task_id = Some(11);

        let location = t.find_parent_and_node_by_task_id(11).unwrap();
        assert_eq!(location.node, inner);
        assert_eq!(location.parent, Some(NodePath::root()));
        assert!(t.find_parent_and_node_by_task_id(12).is_none());

        t.root.task_id = Some(5);
        let location = t.find_parent_and_node_by_task_id(5).unwrap();
        assert!(location.node.is_root());
        assert_eq!(location.parent, None);
    }

    #[test]
    fn test_replace_with_value_makes_parent_spare() {
        let mut t = tree("2*(2+2)");
        let inner = NodePath::root().child(Side::Right);
        let node = t.node_mut(&inner).unwrap();
        node.task_id = Some(1);
        node.replace_with_value(4.0);

        let node = t.node(&inner).unwrap();
        assert_eq!(node.literal(), Some(4.0));
        assert!(node.left.is_none() && node.right.is_none());
        assert_eq!(node.task_id, None);
        assert_eq!(t.root.operands(), Some((Operator::Mul, 2.0, 4.0)));
        assert_eq!(t.node_count(), 3);
    }

    #[test]
    fn test_full_resolution_matches_evaluation() {
        for (input, expected) in [
            ("2+2", 4.0),
            ("2-2", 0.0),
            ("2*6", 12.0),
            ("12/3", 4.0),
            ("2.2/1.1", 2.0),
            ("2 + 6", 8.0),
            ("2*(2+2)", 8.0),
            ("-2*(-4+2)", 4.0),
            ("8-3-2", 3.0),
            ("((1+2)*(3+4)-5)/2", 8.0),
        ] {
            let mut t = tree(input);
            assert_eq!(t.evaluate(), Some(expected), "input: {input}");
            assert_eq!(resolve(&mut t), expected, "input: {input}");
        }
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(tree("2/(2-2)").evaluate(), None);
        assert_eq!(tree("2/0").evaluate(), None);
    }

    #[test]
    fn test_blob_roundtrip_keeps_values_and_task_ids() {
        let mut t = tree("-0.1*(3-1)");
        let inner = NodePath::root().child(Side::Right);
        t.node_mut(&inner).unwrap().task_id = Some(99);
        t.root.left.as_mut().unwrap().replace_with_value(0.1 + 0.2);

        let decoded = Tree::from_blob(&t.to_blob().unwrap()).unwrap();
        assert_eq!(decoded, t);
        assert_eq!(decoded.root.left.as_ref().unwrap().literal(), Some(0.1 + 0.2));
        assert_eq!(decoded.node(&inner).unwrap().task_id, Some(99));
    }

    #[test]
    fn test_blob_rejects_garbage() {
        assert!(matches!(
            Tree::from_blob(b"not a tree"),
            Err(SchedulerError::Serialization(_))
        ));
        assert!(Tree::from_blob(br#"{"root":{"value":"x"}}"#).is_err());
    }
}
