//! Expression-complexity limit.

use glslt_ast::{Ast, Diagnostics, Handle, Node, max_depth};

/// Deepest nesting of the tree under `root`, counting `root` as 1.
pub fn max_tree_depth(ast: &Ast, root: Handle<Node>) -> usize {
    max_depth(ast, root)
}

/// Rejects trees nested deeper than `max_complexity`.
pub fn limit_expression_complexity(
    ast: &Ast,
    root: Handle<Node>,
    max_complexity: u32,
    diags: &mut Diagnostics,
) -> bool {
    let depth = max_tree_depth(ast, root);
    log::debug!("expression complexity: depth {depth}, limit {max_complexity}");
    if depth > max_complexity as usize {
        diags.global_error("Expression too complex.");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use glslt_ast::{BasicType, Operator, SourceLoc, Type};

    #[test]
    fn deep_chains_are_rejected() {
        let mut ast = Ast::new();
        let mut node = ast.add_symbol(1, "x", Type::scalar(BasicType::Float), SourceLoc::default());
        for _ in 0..9 {
            node = ast.aggregate(Operator::Sequence, vec![node], SourceLoc::default());
        }
        assert_eq!(max_tree_depth(&ast, node), 10);

        let mut diags = Diagnostics::new();
        assert!(limit_expression_complexity(&ast, node, 10, &mut diags));
        assert!(!limit_expression_complexity(&ast, node, 9, &mut diags));
        assert_eq!(diags.info_log(), "ERROR: Expression too complex.\n");
    }
}
