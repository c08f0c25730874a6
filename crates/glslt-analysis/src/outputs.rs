//! Fragment output location validation (GLSL ES 3.00).

use std::collections::{BTreeMap, HashSet};

use glslt_ast::{Ast, Diagnostics, Handle, Node, Qualifier, Visitor, Walk, traverse};

/// Checks `layout(location)` assignments of fragment `out` variables:
/// locations must fit in `max_draw_buffers`, may not overlap, and must
/// all be given once more than one output exists.
pub fn validate_outputs(
    ast: &Ast,
    root: Handle<Node>,
    max_draw_buffers: u32,
    diags: &mut Diagnostics,
) -> bool {
    let mut outputs = Outputs {
        max_draw_buffers,
        diags,
        seen: HashSet::new(),
        locations: BTreeMap::new(),
        count: 0,
        unspecified: false,
        errors: 0,
    };
    traverse(ast, root, &mut outputs);
    outputs.errors == 0
}

struct Outputs<'d> {
    max_draw_buffers: u32,
    diags: &'d mut Diagnostics,
    seen: HashSet<String>,
    /// Location to the output occupying it.
    locations: BTreeMap<u32, String>,
    count: usize,
    unspecified: bool,
    errors: usize,
}

impl Visitor for Outputs<'_> {
    fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
        let ty = ast.ty(node);
        if ty.qualifier != Qualifier::FragmentOut {
            return;
        }
        let Some((_, name)) = ast.node(node).as_symbol() else {
            return;
        };
        if !self.seen.insert(name.to_string()) {
            return;
        }
        let loc = ast.loc(node);
        self.count += 1;

        let Some(location) = ty.layout.location else {
            if self.count > 1 {
                self.errors += 1;
                self.diags.error(
                    loc,
                    "must explicitly specify all locations when using multiple fragment outputs",
                    name,
                    "",
                );
            }
            self.unspecified = true;
            return;
        };
        if self.unspecified {
            self.errors += 1;
            self.diags.error(
                loc,
                "must explicitly specify all locations when using multiple fragment outputs",
                name,
                "",
            );
            return;
        }

        let elements = ty.array_size.unwrap_or(1);
        if let Some(previous) = (location..location + elements).find_map(|l| self.locations.get(&l)) {
            let reason = format!("conflicting output locations with previously defined output '{previous}'");
            self.errors += 1;
            self.diags.error(loc, &reason, name, "");
            return;
        }
        if location + elements > self.max_draw_buffers {
            self.errors += 1;
            self.diags
                .error(loc, "output location must be < MAX_DRAW_BUFFERS", name, "");
        }
        for l in location..location + elements {
            self.locations.insert(l, name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glslt_ast::{BasicType, Operator, SourceLoc, Type};

    fn output(ast: &mut Ast, id: u32, name: &str, location: Option<u32>, array: Option<u32>) -> Handle<Node> {
        let mut ty = Type::vector(BasicType::Float, 4).with_qualifier(Qualifier::FragmentOut);
        ty.layout.location = location;
        ty.array_size = array;
        ast.add_symbol(id, name, ty, SourceLoc::new(0, id))
    }

    fn run(ast: &Ast, children: Vec<Handle<Node>>, max: u32) -> (bool, String) {
        let mut ast = ast.clone();
        let root = ast.aggregate(Operator::Null, children, SourceLoc::default());
        let mut diags = Diagnostics::new();
        let ok = validate_outputs(&ast, root, max, &mut diags);
        (ok, diags.info_log())
    }

    #[test]
    fn single_output_needs_no_location() {
        let mut ast = Ast::new();
        let a = output(&mut ast, 1, "color", None, None);
        assert!(run(&ast, vec![a], 1).0);
    }

    #[test]
    fn overlapping_locations_conflict() {
        let mut ast = Ast::new();
        let a = output(&mut ast, 1, "a", Some(0), Some(2));
        let b = output(&mut ast, 2, "b", Some(1), None);
        let (ok, log) = run(&ast, vec![a, b], 4);
        assert!(!ok);
        assert!(log.contains("'b' : conflicting output locations with previously defined output 'a'"));
    }

    #[test]
    fn location_beyond_draw_buffers() {
        let mut ast = Ast::new();
        let a = output(&mut ast, 1, "a", Some(1), None);
        let (ok, log) = run(&ast, vec![a], 1);
        assert!(!ok);
        assert!(log.contains("output location must be < MAX_DRAW_BUFFERS"));
    }

    #[test]
    fn mixed_specified_and_unspecified() {
        let mut ast = Ast::new();
        let a = output(&mut ast, 1, "a", Some(0), None);
        let b = output(&mut ast, 2, "b", None, None);
        let (ok, log) = run(&ast, vec![a, b], 4);
        assert!(!ok);
        assert!(log.contains("must explicitly specify all locations"));
    }
}
