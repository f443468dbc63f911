//! Expression compilation and the binary operation tree.
//!
//! [`compiler::to_postfix`] validates infix text and orders it for
//! evaluation; [`tree::build_tree`] turns the postfix sequence into the tree
//! the scheduler cuts into tasks.

pub mod compiler;
pub mod tree;

pub use compiler::{format_postfix, to_postfix, Token};
pub use tree::{build_tree, NodeLocation, NodePath, NodeValue, Side, Tree, TreeNode};
