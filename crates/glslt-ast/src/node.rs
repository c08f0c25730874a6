//! The tree itself: nodes stored in arenas and linked by handles.

use crate::arena::{Arena, Handle};
use crate::constant::ConstantUnion;
use crate::diagnostics::SourceLoc;
use crate::operator::Operator;
use crate::types::{InterfaceBlock, StructType, Type};

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BranchKind {
    Discard,
    Return,
    Break,
    Continue,
}

impl BranchKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Discard => "discard",
            Self::Return => "return",
            Self::Break => "break",
            Self::Continue => "continue",
        }
    }
}

/// Node payload, one variant per node kind.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Symbol {
        id: u32,
        name: String,
        ty: Type,
    },
    Constant {
        values: Vec<ConstantUnion>,
        ty: Type,
    },
    Unary {
        op: Operator,
        operand: Handle<Node>,
        ty: Type,
    },
    Binary {
        op: Operator,
        left: Handle<Node>,
        right: Handle<Node>,
        ty: Type,
        /// Indirect index to be clamped to the indexed object's bounds.
        add_index_clamp: bool,
    },
    Aggregate {
        op: Operator,
        children: Vec<Handle<Node>>,
        /// Mangled name for calls, definitions and prototypes.
        name: String,
        user_defined: bool,
        ty: Type,
        /// Built-in call to be routed through an emulation helper.
        use_emulated_function: bool,
    },
    /// `if`/`else` when `ty` is void, `?:` otherwise.
    Selection {
        condition: Handle<Node>,
        true_block: Option<Handle<Node>>,
        false_block: Option<Handle<Node>>,
        ty: Type,
    },
    Loop {
        kind: LoopKind,
        init: Option<Handle<Node>>,
        condition: Option<Handle<Node>>,
        expression: Option<Handle<Node>>,
        body: Option<Handle<Node>>,
        /// Loop is to be fully unrolled by the emitter.
        unroll: bool,
    },
    Branch {
        kind: BranchKind,
        expression: Option<Handle<Node>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub loc: SourceLoc,
}

impl Node {
    pub fn new(kind: NodeKind, loc: SourceLoc) -> Self {
        Self { kind, loc }
    }

    /// The value type of the node. Loops and branches have none.
    pub fn ty(&self) -> Option<&Type> {
        match &self.kind {
            NodeKind::Symbol { ty, .. }
            | NodeKind::Constant { ty, .. }
            | NodeKind::Unary { ty, .. }
            | NodeKind::Binary { ty, .. }
            | NodeKind::Aggregate { ty, .. }
            | NodeKind::Selection { ty, .. } => Some(ty),
            NodeKind::Loop { .. } | NodeKind::Branch { .. } => None,
        }
    }

    pub fn ty_mut(&mut self) -> Option<&mut Type> {
        match &mut self.kind {
            NodeKind::Symbol { ty, .. }
            | NodeKind::Constant { ty, .. }
            | NodeKind::Unary { ty, .. }
            | NodeKind::Binary { ty, .. }
            | NodeKind::Aggregate { ty, .. }
            | NodeKind::Selection { ty, .. } => Some(ty),
            NodeKind::Loop { .. } | NodeKind::Branch { .. } => None,
        }
    }

    pub fn op(&self) -> Option<Operator> {
        match &self.kind {
            NodeKind::Unary { op, .. }
            | NodeKind::Binary { op, .. }
            | NodeKind::Aggregate { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&[ConstantUnion]> {
        match &self.kind {
            NodeKind::Constant { values, .. } => Some(values),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<(u32, &str)> {
        match &self.kind {
            NodeKind::Symbol { id, name, .. } => Some((*id, name)),
            _ => None,
        }
    }

    /// Children in traversal order.
    pub fn children(&self) -> Vec<Handle<Node>> {
        match &self.kind {
            NodeKind::Symbol { .. } | NodeKind::Constant { .. } => Vec::new(),
            NodeKind::Unary { operand, .. } => vec![*operand],
            NodeKind::Binary { left, right, .. } => vec![*left, *right],
            NodeKind::Aggregate { children, .. } => children.clone(),
            NodeKind::Selection {
                condition,
                true_block,
                false_block,
                ..
            } => std::iter::once(*condition)
                .chain(*true_block)
                .chain(*false_block)
                .collect(),
            NodeKind::Loop {
                init,
                condition,
                expression,
                body,
                ..
            } => init
                .iter()
                .chain(condition)
                .chain(body)
                .chain(expression)
                .copied()
                .collect(),
            NodeKind::Branch { expression, .. } => expression.iter().copied().collect(),
        }
    }

    /// Swaps one direct child handle. Returns `false` if `original` is not a child.
    pub fn replace_child(&mut self, original: Handle<Node>, replacement: Handle<Node>) -> bool {
        fn swap(slot: &mut Handle<Node>, original: Handle<Node>, replacement: Handle<Node>) -> bool {
            if *slot == original {
                *slot = replacement;
                true
            } else {
                false
            }
        }
        fn swap_opt(
            slot: &mut Option<Handle<Node>>,
            original: Handle<Node>,
            replacement: Handle<Node>,
        ) -> bool {
            match slot {
                Some(h) => swap(h, original, replacement),
                None => false,
            }
        }

        match &mut self.kind {
            NodeKind::Symbol { .. } | NodeKind::Constant { .. } => false,
            NodeKind::Unary { operand, .. } => swap(operand, original, replacement),
            NodeKind::Binary { left, right, .. } => {
                swap(left, original, replacement) || swap(right, original, replacement)
            }
            NodeKind::Aggregate { children, .. } => children
                .iter_mut()
                .any(|child| swap(child, original, replacement)),
            NodeKind::Selection {
                condition,
                true_block,
                false_block,
                ..
            } => {
                swap(condition, original, replacement)
                    || swap_opt(true_block, original, replacement)
                    || swap_opt(false_block, original, replacement)
            }
            NodeKind::Loop {
                init,
                condition,
                expression,
                body,
                ..
            } => {
                swap_opt(init, original, replacement)
                    || swap_opt(condition, original, replacement)
                    || swap_opt(expression, original, replacement)
                    || swap_opt(body, original, replacement)
            }
            NodeKind::Branch { expression, .. } => swap_opt(expression, original, replacement),
        }
    }
}

/// A child replacement discovered during a traversal and applied after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeUpdate {
    pub parent: Handle<Node>,
    pub original: Handle<Node>,
    pub replacement: Handle<Node>,
    /// The replacement wraps the original, so later updates still target
    /// the original's children through the original itself.
    pub original_becomes_child_of_replacement: bool,
}

/// Arena-backed storage for one translation unit plus the built-in structs
/// that outlive individual compiles.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    pub nodes: Arena<Node>,
    pub structs: Arena<StructType>,
    pub blocks: Arena<InterfaceBlock>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a restore point in every arena.
    pub fn push(&mut self) {
        self.nodes.push();
        self.structs.push();
        self.blocks.push();
    }

    /// Releases everything allocated since the matching [`push`](Self::push).
    /// Returns the number of released nodes.
    pub fn pop(&mut self) -> usize {
        self.structs.pop();
        self.blocks.pop();
        self.nodes.pop()
    }

    pub fn depth(&self) -> usize {
        self.nodes.depth()
    }

    pub fn append(&mut self, kind: NodeKind, loc: SourceLoc) -> Handle<Node> {
        self.nodes.append(Node::new(kind, loc))
    }

    pub fn node(&self, handle: Handle<Node>) -> &Node {
        &self.nodes[handle]
    }

    pub fn node_mut(&mut self, handle: Handle<Node>) -> &mut Node {
        &mut self.nodes[handle]
    }

    /// The value type of a node, void for loops and branches.
    pub fn ty(&self, handle: Handle<Node>) -> Type {
        self.nodes[handle].ty().copied().unwrap_or(Type::VOID)
    }

    pub fn loc(&self, handle: Handle<Node>) -> SourceLoc {
        self.nodes[handle].loc
    }

    pub fn children(&self, handle: Handle<Node>) -> Vec<Handle<Node>> {
        self.nodes[handle].children()
    }

    pub fn object_size(&self, ty: &Type) -> usize {
        ty.object_size(&self.structs)
    }

    pub fn mangled_name(&self, ty: &Type) -> String {
        ty.mangled_name(&self.structs)
    }

    pub fn struct_type(&self, ty: &Type) -> Option<&StructType> {
        ty.structure.and_then(|h| self.structs.try_get(h))
    }

    pub fn replace_child(
        &mut self,
        parent: Handle<Node>,
        original: Handle<Node>,
        replacement: Handle<Node>,
    ) -> bool {
        self.nodes[parent].replace_child(original, replacement)
    }

    /// Applies recorded replacements in order.
    ///
    /// When an original is dropped from the tree, later updates naming it as
    /// parent are redirected to its replacement. Returns the number of
    /// replacements that found their child.
    pub fn apply_updates(&mut self, mut updates: Vec<NodeUpdate>) -> usize {
        let mut applied = 0;
        for i in 0..updates.len() {
            let entry = updates[i];
            if self.replace_child(entry.parent, entry.original, entry.replacement) {
                applied += 1;
            } else {
                log::debug!(
                    "node update: {:?} is not a child of {:?}",
                    entry.original,
                    entry.parent
                );
            }
            if !entry.original_becomes_child_of_replacement {
                for later in &mut updates[i + 1..] {
                    if later.parent == entry.original {
                        later.parent = entry.replacement;
                    }
                }
            }
        }
        applied
    }

    /// The function definition named `name` (mangled) among the root's children.
    pub fn find_function(&self, root: Handle<Node>, name: &str) -> Option<Handle<Node>> {
        let NodeKind::Aggregate { children, .. } = &self.nodes[root].kind else {
            return None;
        };
        children.iter().copied().find(|&child| {
            matches!(
                &self.nodes[child].kind,
                NodeKind::Aggregate { op: Operator::Function, name: n, .. } if n == name
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicType;

    fn float_symbol(ast: &mut Ast, id: u32, name: &str) -> Handle<Node> {
        ast.append(
            NodeKind::Symbol {
                id,
                name: name.into(),
                ty: Type::scalar(BasicType::Float),
            },
            SourceLoc::default(),
        )
    }

    fn binary(ast: &mut Ast, op: Operator, left: Handle<Node>, right: Handle<Node>) -> Handle<Node> {
        ast.append(
            NodeKind::Binary {
                op,
                left,
                right,
                ty: Type::scalar(BasicType::Float),
                add_index_clamp: false,
            },
            SourceLoc::default(),
        )
    }

    #[test]
    fn loop_children_in_traversal_order() {
        let mut ast = Ast::new();
        let init = float_symbol(&mut ast, 1, "i");
        let cond = float_symbol(&mut ast, 2, "c");
        let expr = float_symbol(&mut ast, 3, "e");
        let body = float_symbol(&mut ast, 4, "b");
        let lp = ast.append(
            NodeKind::Loop {
                kind: LoopKind::For,
                init: Some(init),
                condition: Some(cond),
                expression: Some(expr),
                body: Some(body),
                unroll: false,
            },
            SourceLoc::default(),
        );
        assert_eq!(ast.children(lp), vec![init, cond, body, expr]);
    }

    #[test]
    fn replace_child_swaps_handle() {
        let mut ast = Ast::new();
        let a = float_symbol(&mut ast, 1, "a");
        let b = float_symbol(&mut ast, 2, "b");
        let c = float_symbol(&mut ast, 3, "c");
        let add = binary(&mut ast, Operator::Add, a, b);
        assert!(ast.replace_child(add, b, c));
        assert_eq!(ast.children(add), vec![a, c]);
        assert!(!ast.replace_child(add, b, c));
    }

    #[test]
    fn updates_redirect_to_replacement_parent() {
        let mut ast = Ast::new();
        let a = float_symbol(&mut ast, 1, "a");
        let b = float_symbol(&mut ast, 2, "b");
        let inner = binary(&mut ast, Operator::Add, a, b);
        let c = float_symbol(&mut ast, 3, "c");
        let outer = binary(&mut ast, Operator::Mul, inner, c);
        let root = ast.append(
            NodeKind::Aggregate {
                op: Operator::Sequence,
                children: vec![outer],
                name: String::new(),
                user_defined: false,
                ty: Type::VOID,
                use_emulated_function: false,
            },
            SourceLoc::default(),
        );

        // The replacement for `outer` reuses its child handles.
        let new_outer = binary(&mut ast, Operator::Sub, inner, c);
        let new_inner = binary(&mut ast, Operator::Div, a, b);
        let applied = ast.apply_updates(vec![
            NodeUpdate {
                parent: root,
                original: outer,
                replacement: new_outer,
                original_becomes_child_of_replacement: false,
            },
            NodeUpdate {
                parent: outer,
                original: inner,
                replacement: new_inner,
                original_becomes_child_of_replacement: false,
            },
        ]);
        assert_eq!(applied, 2);
        assert_eq!(ast.children(root), vec![new_outer]);
        assert_eq!(ast.children(new_outer), vec![new_inner, c]);
    }

    #[test]
    fn push_pop_releases_compile_nodes() {
        let mut ast = Ast::new();
        let builtin = float_symbol(&mut ast, 1, "gl_x");
        ast.push();
        float_symbol(&mut ast, 2, "user");
        assert_eq!(ast.pop(), 1);
        assert!(ast.nodes.contains(builtin));
    }
}
