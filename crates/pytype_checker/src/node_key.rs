//! Compact, `Copy` identity for an AST node, used only to distinguish "this symbol was bound by
//! the same assignment as that one" without borrowing the AST for the symbol's lifetime.
//!
//! Mirrors `red_knot_python_semantic::node_key::NodeKey`: stores the node's address rather than
//! its range, because two distinct nodes in a syntactically invalid tree can share a (degenerate)
//! range. Unlike the teacher's version we never dereference the pointer back to a node — we only
//! ever compare keys for equality — so no `unsafe` is needed here.

use ruff_python_ast::AnyNodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn from_node<'a, N>(node: N) -> Self
    where
        N: Into<AnyNodeRef<'a>>,
    {
        let node = node.into();
        NodeKey(node.as_ptr().as_ptr() as usize)
    }
}
