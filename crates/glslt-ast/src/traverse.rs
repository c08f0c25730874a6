//! Fixed-order tree traversal.
//!
//! Order per kind: binary visits left then right, aggregates visit children
//! in order, selections visit condition, true block, false block, and loops
//! visit init, condition, body, expression. Pre-visit hooks returning
//! `false` prune the subtree; in-visit hooks returning `false` skip the
//! remaining children.

use crate::arena::Handle;
use crate::node::{Ast, Node, NodeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Pre,
    In,
    Post,
}

/// The path from the traversal root to the node being visited.
#[derive(Clone, Debug, Default)]
pub struct Walk {
    path: Vec<Handle<Node>>,
}

impl Walk {
    /// Nesting depth of the current node (the root has depth 0).
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn parent(&self) -> Option<Handle<Node>> {
        self.path.last().copied()
    }

    /// Ancestors from the root downward, not including the current node.
    pub fn ancestors(&self) -> &[Handle<Node>] {
        &self.path
    }
}

/// Per-kind hooks. Every hook defaults to "continue".
#[allow(unused_variables)]
pub trait Visitor {
    /// Whether in-visit hooks fire between children.
    fn in_visit(&self) -> bool {
        false
    }

    /// Whether post-visit hooks fire after the children.
    fn post_visit(&self) -> bool {
        false
    }

    fn visit_symbol(&mut self, ast: &Ast, walk: &Walk, node: Handle<Node>) {}

    fn visit_constant(&mut self, ast: &Ast, walk: &Walk, node: Handle<Node>) {}

    fn visit_unary(&mut self, ast: &Ast, walk: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        true
    }

    fn visit_binary(&mut self, ast: &Ast, walk: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        true
    }

    fn visit_aggregate(
        &mut self,
        ast: &Ast,
        walk: &Walk,
        visit: Visit,
        node: Handle<Node>,
    ) -> bool {
        true
    }

    fn visit_selection(
        &mut self,
        ast: &Ast,
        walk: &Walk,
        visit: Visit,
        node: Handle<Node>,
    ) -> bool {
        true
    }

    fn visit_loop(&mut self, ast: &Ast, walk: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        true
    }

    fn visit_branch(&mut self, ast: &Ast, walk: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        true
    }
}

/// Walks the subtree rooted at `root`.
pub fn traverse<V: Visitor + ?Sized>(ast: &Ast, root: Handle<Node>, visitor: &mut V) {
    let mut walk = Walk::default();
    traverse_node(ast, root, visitor, &mut walk);
}

/// Continues a traversal below `node` with an existing path, for visitors
/// that descend into children by hand after pruning.
pub fn traverse_with<V: Visitor + ?Sized>(
    ast: &Ast,
    node: Handle<Node>,
    visitor: &mut V,
    walk: &mut Walk,
) {
    traverse_node(ast, node, visitor, walk);
}

fn traverse_node<V: Visitor + ?Sized>(
    ast: &Ast,
    node: Handle<Node>,
    visitor: &mut V,
    walk: &mut Walk,
) {
    let kind = &ast.node(node).kind;
    let hook = |visitor: &mut V, walk: &Walk, visit: Visit| -> bool {
        match kind {
            NodeKind::Symbol { .. } | NodeKind::Constant { .. } => true,
            NodeKind::Unary { .. } => visitor.visit_unary(ast, walk, visit, node),
            NodeKind::Binary { .. } => visitor.visit_binary(ast, walk, visit, node),
            NodeKind::Aggregate { .. } => visitor.visit_aggregate(ast, walk, visit, node),
            NodeKind::Selection { .. } => visitor.visit_selection(ast, walk, visit, node),
            NodeKind::Loop { .. } => visitor.visit_loop(ast, walk, visit, node),
            NodeKind::Branch { .. } => visitor.visit_branch(ast, walk, visit, node),
        }
    };

    match kind {
        NodeKind::Symbol { .. } => {
            visitor.visit_symbol(ast, walk, node);
            return;
        }
        NodeKind::Constant { .. } => {
            visitor.visit_constant(ast, walk, node);
            return;
        }
        _ => {}
    }

    if !hook(visitor, walk, Visit::Pre) {
        return;
    }

    let children = ast.node(node).children();
    walk.path.push(node);
    for (i, &child) in children.iter().enumerate() {
        traverse_node(ast, child, visitor, walk);
        let last = i + 1 == children.len();
        if !last && visitor.in_visit() {
            walk.path.pop();
            let proceed = hook(visitor, walk, Visit::In);
            walk.path.push(node);
            if !proceed {
                break;
            }
        }
    }
    walk.path.pop();

    if visitor.post_visit() {
        hook(visitor, walk, Visit::Post);
    }
}

/// Greatest nesting depth below `root`, counting `root` as depth 1.
pub fn max_depth(ast: &Ast, root: Handle<Node>) -> usize {
    struct Depth {
        max: usize,
    }

    impl Depth {
        fn note(&mut self, walk: &Walk) {
            self.max = self.max.max(walk.depth() + 1);
        }
    }

    impl Visitor for Depth {
        fn visit_symbol(&mut self, _: &Ast, walk: &Walk, _: Handle<Node>) {
            self.note(walk);
        }
        fn visit_constant(&mut self, _: &Ast, walk: &Walk, _: Handle<Node>) {
            self.note(walk);
        }
        fn visit_unary(&mut self, _: &Ast, walk: &Walk, _: Visit, _: Handle<Node>) -> bool {
            self.note(walk);
            true
        }
        fn visit_binary(&mut self, _: &Ast, walk: &Walk, _: Visit, _: Handle<Node>) -> bool {
            self.note(walk);
            true
        }
        fn visit_aggregate(&mut self, _: &Ast, walk: &Walk, _: Visit, _: Handle<Node>) -> bool {
            self.note(walk);
            true
        }
        fn visit_selection(&mut self, _: &Ast, walk: &Walk, _: Visit, _: Handle<Node>) -> bool {
            self.note(walk);
            true
        }
        fn visit_loop(&mut self, _: &Ast, walk: &Walk, _: Visit, _: Handle<Node>) -> bool {
            self.note(walk);
            true
        }
        fn visit_branch(&mut self, _: &Ast, walk: &Walk, _: Visit, _: Handle<Node>) -> bool {
            self.note(walk);
            true
        }
    }

    let mut depth = Depth { max: 0 };
    traverse(ast, root, &mut depth);
    depth.max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceLoc;
    use crate::operator::Operator;
    use crate::types::{BasicType, Type};

    fn sym(ast: &mut Ast, name: &str) -> Handle<Node> {
        ast.append(
            NodeKind::Symbol {
                id: 0,
                name: name.into(),
                ty: Type::scalar(BasicType::Float),
            },
            SourceLoc::default(),
        )
    }

    fn add(ast: &mut Ast, left: Handle<Node>, right: Handle<Node>) -> Handle<Node> {
        ast.append(
            NodeKind::Binary {
                op: Operator::Add,
                left,
                right,
                ty: Type::scalar(BasicType::Float),
                add_index_clamp: false,
            },
            SourceLoc::default(),
        )
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        prune: bool,
    }

    impl Visitor for Recorder {
        fn in_visit(&self) -> bool {
            true
        }
        fn post_visit(&self) -> bool {
            true
        }
        fn visit_symbol(&mut self, ast: &Ast, walk: &Walk, node: Handle<Node>) {
            let (_, name) = ast.node(node).as_symbol().unwrap_or((0, "?"));
            self.events.push(format!("{name}@{}", walk.depth()));
        }
        fn visit_binary(&mut self, _: &Ast, walk: &Walk, visit: Visit, _: Handle<Node>) -> bool {
            self.events.push(format!("+{visit:?}@{}", walk.depth()));
            !(self.prune && walk.depth() > 0)
        }
    }

    #[test]
    fn binary_order_with_in_and_post_visits() {
        let mut ast = Ast::new();
        let a = sym(&mut ast, "a");
        let b = sym(&mut ast, "b");
        let c = sym(&mut ast, "c");
        let inner = add(&mut ast, a, b);
        let outer = add(&mut ast, inner, c);

        let mut rec = Recorder::default();
        traverse(&ast, outer, &mut rec);
        assert_eq!(
            rec.events,
            vec![
                "+Pre@0", "+Pre@1", "a@2", "+In@1", "b@2", "+Post@1", "+In@0", "c@1", "+Post@0"
            ]
        );
    }

    #[test]
    fn pre_visit_false_prunes_subtree() {
        let mut ast = Ast::new();
        let a = sym(&mut ast, "a");
        let b = sym(&mut ast, "b");
        let c = sym(&mut ast, "c");
        let inner = add(&mut ast, a, b);
        let outer = add(&mut ast, inner, c);

        let mut rec = Recorder {
            prune: true,
            ..Recorder::default()
        };
        traverse(&ast, outer, &mut rec);
        assert!(!rec.events.iter().any(|e| e.starts_with("a@")));
        assert!(rec.events.contains(&"c@1".to_string()));
    }

    #[test]
    fn max_depth_counts_levels() {
        let mut ast = Ast::new();
        let a = sym(&mut ast, "a");
        assert_eq!(max_depth(&ast, a), 1);
        let b = sym(&mut ast, "b");
        let c = sym(&mut ast, "c");
        let inner = add(&mut ast, a, b);
        let outer = add(&mut ast, inner, c);
        assert_eq!(max_depth(&ast, outer), 3);
    }
}
