//! Indented text dump of a tree for debugging.

use crate::arena::Handle;
use crate::constant::ConstantUnion;
use crate::node::{Ast, LoopKind, Node, NodeKind};
use crate::operator::Operator;

/// Dumps the tree rooted at `root`, one node per line, prefixed with the
/// node's `file:line` and indented two spaces per level.
pub fn dump_tree(ast: &Ast, root: Handle<Node>) -> String {
    let mut out = String::new();
    dump_node(&mut out, ast, root, 0);
    out
}

fn line(out: &mut String, ast: &Ast, node: Handle<Node>, depth: usize, text: &str) {
    out.push_str(&format!("{}: {}{text}\n", ast.loc(node), "  ".repeat(depth)));
}

fn describe_unary(op: Operator) -> &'static str {
    match op {
        Operator::Negative => "Negate value",
        Operator::Positive => "Positive sign",
        Operator::LogicalNot => "Negate conditional",
        Operator::BitwiseNot => "bit-wise not",
        Operator::PostIncrement => "Post-Increment",
        Operator::PostDecrement => "Post-Decrement",
        Operator::PreIncrement => "Pre-Increment",
        Operator::PreDecrement => "Pre-Decrement",
        _ => "unknown unary",
    }
}

fn describe_binary(op: Operator) -> String {
    let text = match op {
        Operator::Assign => "move second child to first child",
        Operator::Initialize => "initialize first child with second child",
        Operator::IndexDirect => "direct index",
        Operator::IndexIndirect => "indirect index",
        Operator::IndexDirectStruct => "direct index for structure",
        Operator::IndexDirectInterfaceBlock => "direct index for interface block",
        Operator::VectorSwizzle => "vector swizzle",
        Operator::Comma => "comma",
        Operator::VectorTimesScalar => "vector-scale",
        Operator::VectorTimesMatrix => "vector-times-matrix",
        Operator::MatrixTimesVector => "matrix-times-vector",
        Operator::MatrixTimesScalar => "matrix-scale",
        Operator::MatrixTimesMatrix => "matrix-multiply",
        other => return format!("'{other}'"),
    };
    text.to_string()
}

fn describe_aggregate(op: Operator, name: &str) -> String {
    match op {
        Operator::Null => "ERROR: node has no operator".to_string(),
        Operator::Sequence => "Sequence".to_string(),
        Operator::Comma => "Comma".to_string(),
        Operator::Function => format!("Function Definition: {name}"),
        Operator::FunctionCall => format!("Function Call: {name}"),
        Operator::Parameters => "Function Parameters: ".to_string(),
        Operator::Prototype => format!("Function Prototype: {name}"),
        Operator::Declaration => "Declaration".to_string(),
        Operator::InvariantDeclaration => "Invariant Declaration".to_string(),
        op if op.is_constructor() => format!("Construct {op}"),
        other => format!("'{other}'"),
    }
}

fn format_constant(value: ConstantUnion) -> String {
    match value {
        ConstantUnion::Float(v) => format!("{v:?} (const float)"),
        ConstantUnion::Int(v) => format!("{v} (const int)"),
        ConstantUnion::UInt(v) => format!("{v} (const uint)"),
        ConstantUnion::Bool(v) => format!("{v} (const bool)"),
    }
}

fn dump_node(out: &mut String, ast: &Ast, node: Handle<Node>, depth: usize) {
    match &ast.node(node).kind {
        NodeKind::Symbol { id, name, ty } => {
            line(out, ast, node, depth, &format!("'{name}' (symbol id {id}) ({ty})"));
        }
        NodeKind::Constant { values, .. } => {
            for value in values {
                line(out, ast, node, depth, &format_constant(*value));
            }
        }
        NodeKind::Unary { op, operand, ty } => {
            line(out, ast, node, depth, &format!("{} ({ty})", describe_unary(*op)));
            dump_node(out, ast, *operand, depth + 1);
        }
        NodeKind::Binary {
            op, left, right, ty, ..
        } => {
            line(out, ast, node, depth, &format!("{} ({ty})", describe_binary(*op)));
            dump_node(out, ast, *left, depth + 1);
            dump_node(out, ast, *right, depth + 1);
        }
        NodeKind::Aggregate {
            op,
            children,
            name,
            ty,
            ..
        } => {
            let text = describe_aggregate(*op, name);
            if matches!(op, Operator::Sequence | Operator::Parameters) {
                line(out, ast, node, depth, &text);
            } else {
                line(out, ast, node, depth, &format!("{text} ({ty})"));
            }
            for &child in children {
                dump_node(out, ast, child, depth + 1);
            }
        }
        NodeKind::Selection {
            condition,
            true_block,
            false_block,
            ty,
        } => {
            line(out, ast, node, depth, &format!("Test condition and select ({ty})"));
            line(out, ast, node, depth + 1, "Condition");
            dump_node(out, ast, *condition, depth + 2);
            match true_block {
                Some(block) => {
                    line(out, ast, node, depth + 1, "true case");
                    dump_node(out, ast, *block, depth + 2);
                }
                None => line(out, ast, node, depth + 1, "true case is null"),
            }
            if let Some(block) = false_block {
                line(out, ast, node, depth + 1, "false case");
                dump_node(out, ast, *block, depth + 2);
            }
        }
        NodeKind::Loop {
            kind,
            init,
            condition,
            expression,
            body,
            unroll,
        } => {
            let tested = if *kind == LoopKind::DoWhile {
                "Loop with condition not tested first"
            } else {
                "Loop with condition tested first"
            };
            let marker = if *unroll { " [unroll]" } else { "" };
            line(out, ast, node, depth, &format!("{tested}{marker}"));
            if let Some(init) = init {
                line(out, ast, node, depth + 1, "Loop Initializer");
                dump_node(out, ast, *init, depth + 2);
            }
            match condition {
                Some(cond) => {
                    line(out, ast, node, depth + 1, "Loop Condition");
                    dump_node(out, ast, *cond, depth + 2);
                }
                None => line(out, ast, node, depth + 1, "No loop condition"),
            }
            match body {
                Some(body) => {
                    line(out, ast, node, depth + 1, "Loop Body");
                    dump_node(out, ast, *body, depth + 2);
                }
                None => line(out, ast, node, depth + 1, "No loop body"),
            }
            if let Some(expr) = expression {
                line(out, ast, node, depth + 1, "Loop Terminal Expression");
                dump_node(out, ast, *expr, depth + 2);
            }
        }
        NodeKind::Branch { kind, expression } => {
            let keyword = kind.keyword();
            let mut name = String::with_capacity(keyword.len());
            let mut chars = keyword.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(chars.as_str());
            }
            match expression {
                Some(expr) => {
                    line(out, ast, node, depth, &format!("Branch: {name} with expression"));
                    dump_node(out, ast, *expr, depth + 1);
                }
                None => line(out, ast, node, depth, &format!("Branch: {name}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceLoc;
    use crate::node::BranchKind;
    use crate::types::{BasicType, Type};

    #[test]
    fn dump_indents_children() {
        let mut ast = Ast::new();
        let loc = SourceLoc::new(0, 2);
        let x = ast.add_symbol(3, "x", Type::scalar(BasicType::Float), loc);
        let one = ast.add_constant(
            vec![ConstantUnion::Float(1.0)],
            Type::scalar(BasicType::Float),
            loc,
        );
        let init = ast.add_assign(Operator::Initialize, x, one, loc).unwrap();
        let ret = ast.add_branch(BranchKind::Return, None, loc);
        let seq = ast.aggregate(Operator::Sequence, vec![init, ret], loc);

        let dump = dump_tree(&ast, seq);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "0:2: Sequence");
        assert_eq!(lines[1], "0:2:   initialize first child with second child (float)");
        assert_eq!(lines[2], "0:2:     'x' (symbol id 3) (float)");
        assert_eq!(lines[3], "0:2:     1.0 (const float)");
        assert_eq!(lines[4], "0:2:   Branch: Return");
    }

    #[test]
    fn loop_dump_marks_unroll() {
        let mut ast = Ast::new();
        let loc = SourceLoc::default();
        let cond = ast.add_constant(vec![ConstantUnion::Bool(true)], Type::BOOL, loc);
        let lp = ast.add_loop(LoopKind::While, None, Some(cond), None, None, loc);
        if let NodeKind::Loop { unroll, .. } = &mut ast.node_mut(lp).kind {
            *unroll = true;
        }
        let dump = dump_tree(&ast, lp);
        assert!(dump.starts_with("0:0: Loop with condition tested first [unroll]\n"));
        assert!(dump.contains("Loop Condition\n"));
        assert!(dump.contains("true (const bool)"));
        assert!(dump.contains("No loop body"));
    }
}
