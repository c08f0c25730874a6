//! Data and control dependency graph over a shader's `main`.
//!
//! Every symbol, call, call argument, branch condition, loop condition and
//! left operand of `&&`/`||` becomes a graph node. Edges run from a value
//! toward the nodes that depend on it, so `a = b + c` produces `b -> a` and
//! `c -> a`, and `f(x)` produces `x -> argument 0 -> call`.
//!
//! User-defined function bodies are not modelled; only `main` is walked and
//! every user-defined call is recorded so callers can reject it.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Write as _};

use glslt_ast::{Ast, Handle, Node, NodeKind, Operator};

/// Index of a node inside one [`DependencyGraph`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphNodeId(usize);

impl GraphNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a graph node stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphNodeKind {
    /// One per distinct symbol id.
    Symbol {
        id: u32,
        name: String,
        node: Handle<Node>,
        sampler: bool,
    },
    FunctionCall {
        node: Handle<Node>,
        name: String,
        user_defined: bool,
    },
    /// Argument `index` of the call `call`.
    Argument {
        call: Handle<Node>,
        name: String,
        user_defined: bool,
        index: usize,
    },
    Selection {
        node: Handle<Node>,
    },
    /// The condition of a loop.
    Loop {
        node: Handle<Node>,
    },
    LogicalOp {
        node: Handle<Node>,
        op: Operator,
    },
}

impl GraphNodeKind {
    /// The AST node this graph node was created for.
    pub fn ast_node(&self) -> Handle<Node> {
        match self {
            Self::Symbol { node, .. }
            | Self::FunctionCall { node, .. }
            | Self::Selection { node }
            | Self::Loop { node }
            | Self::LogicalOp { node, .. } => *node,
            Self::Argument { call, .. } => *call,
        }
    }
}

impl fmt::Display for GraphNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol { id, name, .. } => write!(f, "{name} (symbol id: {id})"),
            Self::FunctionCall { name, .. } => write!(f, "function call {name}"),
            Self::Argument { name, index, .. } => write!(f, "argument {index} of call to {name}"),
            Self::Selection { .. } => f.write_str("selection"),
            Self::Loop { .. } => f.write_str("loop condition"),
            Self::LogicalOp { op, .. } => write!(f, "logical {}", op.as_str()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub kind: GraphNodeKind,
    /// Nodes whose value depends on this one.
    pub dependents: BTreeSet<GraphNodeId>,
}

/// The dependency graph of one shader.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    symbols_by_id: HashMap<u32, GraphNodeId>,
    samplers: Vec<GraphNodeId>,
    user_calls: Vec<GraphNodeId>,
}

impl DependencyGraph {
    /// Builds the graph for the shader rooted at `root`.
    pub fn build(ast: &Ast, root: Handle<Node>) -> Self {
        let mut builder = Builder {
            ast,
            graph: Self::default(),
            sets: Vec::new(),
            leftmost: Vec::new(),
        };
        builder.visit(root);
        let graph = builder.graph;
        log::debug!(
            "dependency graph: {} nodes, {} samplers, {} user calls",
            graph.nodes.len(),
            graph.samplers.len(),
            graph.user_calls.len()
        );
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: GraphNodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (GraphNodeId, &GraphNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (GraphNodeId(i), node))
    }

    /// The graph node for symbol `id`, if the symbol was referenced.
    pub fn symbol(&self, id: u32) -> Option<GraphNodeId> {
        self.symbols_by_id.get(&id).copied()
    }

    /// Symbol nodes of sampler type, in creation order.
    pub fn sampler_symbols(&self) -> &[GraphNodeId] {
        &self.samplers
    }

    /// Calls to functions the shader defines itself.
    pub fn user_defined_calls(&self) -> &[GraphNodeId] {
        &self.user_calls
    }

    /// Renders the spanning tree reached from every sampler symbol, one
    /// indented line per node.
    pub fn dump_spanning_trees(&self) -> String {
        let mut out = String::from("\n");
        for &sampler in &self.samplers {
            out.push_str("--- Dependency graph spanning tree ---\n");
            let mut visited = vec![false; self.nodes.len()];
            self.dump_from(sampler, 0, &mut visited, &mut out);
        }
        out
    }

    fn dump_from(&self, id: GraphNodeId, depth: usize, visited: &mut [bool], out: &mut String) {
        visited[id.0] = true;
        let node = &self.nodes[id.0];
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), node.kind);
        for &dependent in &node.dependents {
            if !visited[dependent.0] {
                self.dump_from(dependent, depth + 1, visited, out);
            }
        }
    }

    fn add(&mut self, kind: GraphNodeKind) -> GraphNodeId {
        let id = GraphNodeId(self.nodes.len());
        self.nodes.push(GraphNode {
            kind,
            dependents: BTreeSet::new(),
        });
        id
    }

    fn connect(&mut self, from: GraphNodeId, to: GraphNodeId) {
        if from != to {
            self.nodes[from.0].dependents.insert(to);
        }
    }
}

/// Marker pushed on the leftmost-symbol stack.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Leftmost {
    /// Inside a left operand, no symbol seen yet.
    LeftSubtree,
    /// Inside a right operand; symbols here are never the target.
    RightSubtree,
    Found(GraphNodeId),
}

struct Builder<'a> {
    ast: &'a Ast,
    graph: DependencyGraph,
    /// Pending sets of nodes the innermost open construct depends on.
    sets: Vec<BTreeSet<GraphNodeId>>,
    leftmost: Vec<Leftmost>,
}

impl Builder<'_> {
    fn insert_into_top_set(&mut self, id: GraphNodeId) {
        if let Some(top) = self.sets.last_mut() {
            top.insert(id);
        }
    }

    /// Runs `f` with a fresh dependency set and returns what it collected.
    fn with_set(&mut self, f: impl FnOnce(&mut Self)) -> BTreeSet<GraphNodeId> {
        self.sets.push(BTreeSet::new());
        f(self);
        self.sets.pop().unwrap_or_default()
    }

    fn with_leftmost(&mut self, marker: Leftmost, f: impl FnOnce(&mut Self)) -> Leftmost {
        self.leftmost.push(marker);
        f(self);
        self.leftmost.pop().unwrap_or(marker)
    }

    fn connect_all(&mut self, from: &BTreeSet<GraphNodeId>, to: GraphNodeId) {
        for &node in from {
            self.graph.connect(node, to);
        }
    }

    fn visit(&mut self, handle: Handle<Node>) {
        let ast = self.ast;
        match &ast.node(handle).kind {
            NodeKind::Symbol { id, name, ty } => self.visit_symbol(handle, *id, name, ty.is_sampler()),
            NodeKind::Constant { .. } => {}
            NodeKind::Unary { operand, .. } => self.visit(*operand),
            NodeKind::Binary {
                op, left, right, ..
            } => {
                if op.is_assignment() {
                    self.visit_assignment(*left, *right);
                } else if matches!(op, Operator::LogicalAnd | Operator::LogicalOr) {
                    self.visit_logical_op(handle, *op, *left, *right);
                } else {
                    self.visit(*left);
                    self.with_leftmost(Leftmost::RightSubtree, |b| b.visit(*right));
                }
            }
            NodeKind::Aggregate {
                op,
                children,
                name,
                user_defined,
                ..
            } => match op {
                // User function bodies are not modelled.
                Operator::Function if name != "main(" => {}
                Operator::FunctionCall => {
                    self.visit_function_call(handle, name, *user_defined, children)
                }
                _ => {
                    for &child in children {
                        self.visit(child);
                    }
                }
            },
            NodeKind::Selection {
                condition,
                true_block,
                false_block,
                ..
            } => {
                let condition_nodes = self.with_set(|b| b.visit(*condition));
                if !condition_nodes.is_empty() {
                    let selection = self.graph.add(GraphNodeKind::Selection { node: handle });
                    self.connect_all(&condition_nodes, selection);
                }
                for block in [true_block, false_block].into_iter().flatten() {
                    self.visit(*block);
                }
            }
            NodeKind::Loop {
                init,
                condition,
                expression,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.visit(*init);
                }
                if let Some(condition) = condition {
                    let condition_nodes = self.with_set(|b| b.visit(*condition));
                    if !condition_nodes.is_empty() {
                        let lp = self.graph.add(GraphNodeKind::Loop { node: handle });
                        self.connect_all(&condition_nodes, lp);
                    }
                }
                for part in [body, expression].into_iter().flatten() {
                    self.visit(*part);
                }
            }
            NodeKind::Branch { expression, .. } => {
                if let Some(expression) = expression {
                    self.visit(*expression);
                }
            }
        }
    }

    fn visit_symbol(&mut self, handle: Handle<Node>, id: u32, name: &str, sampler: bool) {
        let node = match self.graph.symbols_by_id.get(&id) {
            Some(&existing) => existing,
            None => {
                let created = self.graph.add(GraphNodeKind::Symbol {
                    id,
                    name: name.to_string(),
                    node: handle,
                    sampler,
                });
                self.graph.symbols_by_id.insert(id, created);
                if sampler {
                    self.graph.samplers.push(created);
                }
                created
            }
        };
        self.insert_into_top_set(node);

        if let Some(top) = self.leftmost.last_mut() {
            if *top != Leftmost::RightSubtree {
                *top = Leftmost::Found(node);
            }
        }
    }

    fn visit_assignment(&mut self, left: Handle<Node>, right: Handle<Node>) {
        let mut target = None;
        let sources = self.with_set(|b| {
            if let Leftmost::Found(symbol) = b.with_leftmost(Leftmost::LeftSubtree, |b| b.visit(left)) {
                target = Some(symbol);
            }
            b.with_leftmost(Leftmost::RightSubtree, |b| b.visit(right));
        });
        let Some(target) = target else {
            return;
        };
        self.connect_all(&sources, target);
        // `a = (b = c)` hands `b` up to the outer assignment.
        self.insert_into_top_set(target);
    }

    fn visit_logical_op(
        &mut self,
        handle: Handle<Node>,
        op: Operator,
        left: Handle<Node>,
        right: Handle<Node>,
    ) {
        let left_nodes = self.with_set(|b| b.visit(left));
        if !left_nodes.is_empty() {
            let logical = self.graph.add(GraphNodeKind::LogicalOp { node: handle, op });
            self.connect_all(&left_nodes, logical);
        }
        // The left operand's dependencies also flow into the result.
        if let Some(top) = self.sets.last_mut() {
            top.extend(left_nodes);
        }
        self.with_leftmost(Leftmost::RightSubtree, |b| b.visit(right));
    }

    fn visit_function_call(
        &mut self,
        handle: Handle<Node>,
        name: &str,
        user_defined: bool,
        args: &[Handle<Node>],
    ) {
        let call = self.graph.add(GraphNodeKind::FunctionCall {
            node: handle,
            name: name.to_string(),
            user_defined,
        });
        if user_defined {
            self.graph.user_calls.push(call);
        }
        for (index, &arg) in args.iter().enumerate() {
            let arg_nodes = self.with_set(|b| b.visit(arg));
            if !arg_nodes.is_empty() {
                let argument = self.graph.add(GraphNodeKind::Argument {
                    call: handle,
                    name: name.to_string(),
                    user_defined,
                    index,
                });
                self.connect_all(&arg_nodes, argument);
                self.graph.connect(argument, call);
            }
        }
        self.insert_into_top_set(call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glslt_ast::{BasicType, SourceLoc, Type};

    fn symbol(ast: &mut Ast, id: u32, name: &str, basic: BasicType) -> Handle<Node> {
        ast.add_symbol(id, name, Type::scalar(basic), SourceLoc::default())
    }

    fn assign(ast: &mut Ast, left: Handle<Node>, right: Handle<Node>) -> Handle<Node> {
        let ty = ast.ty(left);
        ast.append(
            NodeKind::Binary {
                op: Operator::Assign,
                left,
                right,
                ty,
                add_index_clamp: false,
            },
            SourceLoc::default(),
        )
    }

    fn names(graph: &DependencyGraph, id: GraphNodeId) -> Vec<String> {
        graph
            .node(id)
            .dependents
            .iter()
            .map(|&d| graph.node(d).kind.to_string())
            .collect()
    }

    #[test]
    fn nested_assignment_chains_targets() {
        let mut ast = Ast::new();
        let a = symbol(&mut ast, 1, "a", BasicType::Float);
        let b = symbol(&mut ast, 2, "b", BasicType::Float);
        let c = symbol(&mut ast, 3, "c", BasicType::Float);
        let inner = assign(&mut ast, b, c);
        let outer = assign(&mut ast, a, inner);
        let root = ast.aggregate(Operator::Sequence, vec![outer], SourceLoc::default());

        let graph = DependencyGraph::build(&ast, root);
        let c_node = graph.symbol(3).unwrap();
        let b_node = graph.symbol(2).unwrap();
        assert_eq!(names(&graph, c_node), vec!["b (symbol id: 2)"]);
        assert_eq!(names(&graph, b_node), vec!["a (symbol id: 1)"]);
        assert!(graph.node(graph.symbol(1).unwrap()).dependents.is_empty());
    }

    #[test]
    fn call_arguments_feed_the_call() {
        let mut ast = Ast::new();
        let s = symbol(&mut ast, 1, "s", BasicType::Sampler2D);
        let uv = symbol(&mut ast, 2, "uv", BasicType::Float);
        let call = ast.add_function_call(
            "texture2D(s21;vf2;",
            vec![s, uv],
            Type::vector(BasicType::Float, 4),
            false,
            SourceLoc::default(),
        );
        let root = ast.aggregate(Operator::Sequence, vec![call], SourceLoc::default());

        let graph = DependencyGraph::build(&ast, root);
        assert_eq!(graph.sampler_symbols().len(), 1);
        assert!(graph.user_defined_calls().is_empty());
        let sampler = graph.sampler_symbols()[0];
        assert_eq!(
            names(&graph, sampler),
            vec!["argument 0 of call to texture2D(s21;vf2;"]
        );
        let dump = graph.dump_spanning_trees();
        assert!(dump.contains("--- Dependency graph spanning tree ---"));
        assert!(dump.contains("    function call texture2D(s21;vf2;"));
    }

    #[test]
    fn user_function_bodies_are_skipped() {
        let mut ast = Ast::new();
        let x = symbol(&mut ast, 7, "x", BasicType::Float);
        let body = ast.aggregate(Operator::Sequence, vec![x], SourceLoc::default());
        let function = ast.aggregate(Operator::Function, vec![body], SourceLoc::default());
        ast.set_aggregate_signature(function, "helper(", Type::VOID, true);
        let root = ast.aggregate(Operator::Null, vec![function], SourceLoc::default());

        let graph = DependencyGraph::build(&ast, root);
        assert!(graph.is_empty());
    }
}
