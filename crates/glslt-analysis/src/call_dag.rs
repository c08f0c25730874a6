//! Call graph construction and recursion / call-depth detection.

use std::collections::HashMap;

use glslt_ast::{Ast, Handle, Node, NodeKind, Operator, Visit, Visitor, Walk, traverse};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallDepthError {
    #[error("Missing main()")]
    MissingMain,
    #[error("Function recursion detected")]
    Recursion { function: String },
    /// `path` lists the call chain from the deepest caller back to the root.
    #[error("Function call stack too deep")]
    TooDeep { path: Vec<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

#[derive(Clone, Debug)]
pub struct FunctionRecord {
    /// Mangled name, e.g. `main(`.
    pub name: String,
    /// Indices of directly called functions, without duplicates.
    pub callees: Vec<usize>,
    /// Whether a definition was seen (calls to prototypes create records too).
    pub defined: bool,
}

/// Call graph of user-defined functions, keyed by mangled name.
#[derive(Clone, Debug, Default)]
pub struct CallDag {
    functions: Vec<FunctionRecord>,
    by_name: HashMap<String, usize>,
}

impl CallDag {
    pub fn build(ast: &Ast, root: Handle<Node>) -> Self {
        struct Collect {
            dag: CallDag,
            current: Option<usize>,
        }

        impl Visitor for Collect {
            fn post_visit(&self) -> bool {
                true
            }

            fn visit_aggregate(&mut self, ast: &Ast, _: &Walk, visit: Visit, node: Handle<Node>) -> bool {
                let NodeKind::Aggregate {
                    op,
                    name,
                    user_defined,
                    ..
                } = &ast.node(node).kind
                else {
                    return true;
                };
                match (op, visit) {
                    (Operator::Function, Visit::Pre) => {
                        let index = self.dag.record(name);
                        self.dag.functions[index].defined = true;
                        self.current = Some(index);
                    }
                    (Operator::Function, Visit::Post) => self.current = None,
                    (Operator::FunctionCall, Visit::Pre) if *user_defined => {
                        let callee = self.dag.record(name);
                        if let Some(caller) = self.current {
                            let callees = &mut self.dag.functions[caller].callees;
                            if !callees.contains(&callee) {
                                callees.push(callee);
                            }
                        }
                    }
                    _ => {}
                }
                true
            }
        }

        let mut collect = Collect {
            dag: Self::default(),
            current: None,
        };
        traverse(ast, root, &mut collect);
        collect.dag
    }

    fn record(&mut self, name: &str) -> usize {
        if let Some(&index) = self.by_name.get(name) {
            return index;
        }
        let index = self.functions.len();
        self.functions.push(FunctionRecord {
            name: name.to_string(),
            callees: Vec::new(),
            defined: false,
        });
        self.by_name.insert(name.to_string(), index);
        index
    }

    pub fn functions(&self) -> &[FunctionRecord] {
        &self.functions
    }

    pub fn find(&self, mangled_name: &str) -> Option<usize> {
        self.by_name.get(mangled_name).copied()
    }

    /// Checks the graph for recursion and, with a limit, for call chains
    /// reaching `limit` levels. `main` alone is one level.
    ///
    /// With a limit every function is checked as a root, since a driver may
    /// reject a deep function even when `main` never calls it. Without one
    /// only `main` is checked and a missing `main` is an error.
    pub fn detect_call_depth(&self, limit: Option<u32>) -> Result<(), CallDepthError> {
        let mut walk = DepthWalk {
            marks: vec![Mark::Unvisited; self.functions.len()],
            heights: vec![0; self.functions.len()],
        };
        match limit {
            Some(limit) => {
                for root in 0..self.functions.len() {
                    self.check_root(root, limit, &mut walk)?;
                    walk.marks.fill(Mark::Unvisited);
                }
                Ok(())
            }
            None => {
                let main = self.find("main(").ok_or(CallDepthError::MissingMain)?;
                self.check(main, 1, u32::MAX, &mut walk).map(|_| ())
            }
        }
    }

    fn check_root(&self, root: usize, limit: u32, walk: &mut DepthWalk) -> Result<(), CallDepthError> {
        let height = self.check(root, 1, limit, walk)?;
        if height >= limit {
            return Err(CallDepthError::TooDeep {
                path: vec![self.functions[root].name.clone()],
            });
        }
        Ok(())
    }

    /// Walks the callees of `index`, entered at `depth`, and returns the
    /// number of levels of the longest chain starting at `index`. The bound
    /// is tested before descending into a callee and again with the depth
    /// the callee reached.
    fn check(&self, index: usize, depth: u32, limit: u32, walk: &mut DepthWalk) -> Result<u32, CallDepthError> {
        walk.marks[index] = Mark::InProgress;
        let name = &self.functions[index].name;
        let mut height = 1;
        for &callee in &self.functions[index].callees {
            let callee_height = match walk.marks[callee] {
                Mark::InProgress => {
                    return Err(CallDepthError::Recursion {
                        function: self.functions[callee].name.clone(),
                    });
                }
                Mark::Done => walk.heights[callee],
                Mark::Unvisited => {
                    if depth >= limit {
                        return Err(CallDepthError::TooDeep {
                            path: vec![name.clone()],
                        });
                    }
                    match self.check(callee, depth + 1, limit, walk) {
                        Ok(callee_height) => callee_height,
                        Err(CallDepthError::TooDeep { mut path }) => {
                            path.push(name.clone());
                            return Err(CallDepthError::TooDeep { path });
                        }
                        Err(other) => return Err(other),
                    }
                }
            };
            height = height.max(callee_height.saturating_add(1));
            if depth.saturating_add(height - 1) >= limit {
                return Err(CallDepthError::TooDeep {
                    path: vec![self.functions[callee].name.clone(), name.clone()],
                });
            }
        }
        walk.marks[index] = Mark::Done;
        walk.heights[index] = height;
        Ok(height)
    }
}

struct DepthWalk {
    marks: Vec<Mark>,
    /// Chain length below each finished function, itself included.
    heights: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dag(edges: &[(&str, &[&str])]) -> CallDag {
        let mut dag = CallDag::default();
        for (caller, callees) in edges {
            let caller = dag.record(caller);
            dag.functions[caller].defined = true;
            for callee in *callees {
                let callee = dag.record(callee);
                dag.functions[caller].callees.push(callee);
            }
        }
        dag
    }

    #[test]
    fn acyclic_graph_passes() {
        let dag = dag(&[("main(", &["a(", "b("]), ("a(", &["b("]), ("b(", &[])]);
        assert_eq!(dag.detect_call_depth(None), Ok(()));
        assert_eq!(dag.detect_call_depth(Some(8)), Ok(()));
    }

    #[test]
    fn mutual_recursion_is_detected() {
        let dag = dag(&[("a(", &["b("]), ("b(", &["a("]), ("main(", &["a("])]);
        assert!(matches!(
            dag.detect_call_depth(None),
            Err(CallDepthError::Recursion { .. })
        ));
        assert!(matches!(
            dag.detect_call_depth(Some(256)),
            Err(CallDepthError::Recursion { .. })
        ));
    }

    #[test]
    fn unreachable_cycle_found_only_with_limit() {
        let dag = dag(&[("main(", &[]), ("a(", &["a("])]);
        assert_eq!(dag.detect_call_depth(None), Ok(()));
        assert!(dag.detect_call_depth(Some(4)).is_err());
    }

    #[test]
    fn missing_main() {
        let dag = dag(&[("a(", &[])]);
        assert_eq!(dag.detect_call_depth(None), Err(CallDepthError::MissingMain));
        assert_eq!(CallDepthError::MissingMain.to_string(), "Missing main()");
    }

    #[test]
    fn depth_limit() {
        let dag = dag(&[("main(", &["a("]), ("a(", &["b("]), ("b(", &[])]);
        assert_eq!(dag.detect_call_depth(Some(4)), Ok(()));
        match dag.detect_call_depth(Some(3)) {
            Err(CallDepthError::TooDeep { path }) => assert_eq!(path, vec!["b(", "a(", "main("]),
            other => panic!("unexpected {other:?}"),
        }
        match dag.detect_call_depth(Some(2)) {
            Err(CallDepthError::TooDeep { path }) => assert_eq!(path, vec!["a(", "main("]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn chain_as_deep_as_the_limit_is_rejected() {
        let dag = dag(&[("main(", &["a("]), ("a(", &[])]);
        assert!(matches!(
            dag.detect_call_depth(Some(1)),
            Err(CallDepthError::TooDeep { .. })
        ));
        assert!(matches!(
            dag.detect_call_depth(Some(2)),
            Err(CallDepthError::TooDeep { .. })
        ));
        assert_eq!(dag.detect_call_depth(Some(3)), Ok(()));
    }

    #[test]
    fn finished_callees_still_count_toward_depth() {
        // `b` is finished through the short edge before the long chain reaches it.
        let dag = dag(&[
            ("main(", &["b(", "a("]),
            ("a(", &["b("]),
            ("b(", &["c("]),
            ("c(", &[]),
        ]);
        assert_eq!(dag.detect_call_depth(Some(5)), Ok(()));
        assert!(matches!(
            dag.detect_call_depth(Some(4)),
            Err(CallDepthError::TooDeep { .. })
        ));
    }
}
