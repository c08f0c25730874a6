//! Struct-name regeneration.
//!
//! Structs declared inside functions get `_webgl_struct_<id>_<name>` so
//! that identical local names in the two stages cannot collide once
//! identifiers are hashed. Global structs keep their names because they
//! may type uniforms shared by both stages. Already regenerated names are
//! left alone, which makes the pass idempotent.

use glslt_ast::{Ast, Diagnostics, Handle, Node, StructType, Visitor, Walk, traverse};

use crate::{Pass, PassContext};

pub const REGENERATED_STRUCT_PREFIX: &str = "_webgl_struct_";

#[derive(Debug)]
pub struct RegenerateStructNames;

impl Pass for RegenerateStructNames {
    fn name(&self) -> &str {
        "regenerate-struct-names"
    }

    fn run(&self, cx: &mut PassContext<'_>, _: &mut Diagnostics) -> bool {
        let mut finder = LocalStructs::default();
        traverse(cx.ast, cx.root, &mut finder);

        for handle in finder.structs {
            let Some(st) = cx.ast.structs.try_get_mut(handle) else {
                continue;
            };
            if st.name.starts_with(REGENERATED_STRUCT_PREFIX) {
                continue;
            }
            st.name = format!("{REGENERATED_STRUCT_PREFIX}{}_{}", st.unique_id, st.name);
            log::debug!("struct renamed to {}", st.name);
        }
        true
    }
}

#[derive(Default)]
struct LocalStructs {
    structs: Vec<Handle<StructType>>,
}

impl Visitor for LocalStructs {
    fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
        let Some(handle) = ast.ty(node).structure else {
            return;
        };
        let Some(st) = ast.structs.try_get(handle) else {
            return;
        };
        if st.at_global_scope || st.name.starts_with("gl_") || self.structs.contains(&handle) {
            return;
        }
        self.structs.push(handle);
    }
}
