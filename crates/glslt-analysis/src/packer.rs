//! Register packing feasibility for uniforms and varyings.
//!
//! Follows the GLSL ES 1.00 Appendix A, section 7 algorithm: variables are
//! placed into a grid of four-column rows, widest first. Four-column
//! entries take whole rows from the top, three-column entries the rows
//! right below them, two-column entries fill columns 0-1 from the top and
//! 2-3 from the bottom of what remains, and each single-column entry goes
//! to the column whose smallest free run still fits it.

use std::cmp::Reverse;

use crate::variables::ShaderVariable;

const COLUMNS: usize = 4;
const FULL_ROW: u8 = 0b1111;

/// Components one row of `variable` occupies.
pub fn components_per_row(variable: &ShaderVariable) -> u32 {
    if variable.is_matrix() {
        match (variable.cols, variable.rows) {
            (2, 2) => 4,
            (c, r) => u32::from(c.max(r)),
        }
    } else {
        u32::from(variable.cols.clamp(1, 4))
    }
}

/// Rows one element of `variable` occupies.
pub fn rows_per_element(variable: &ShaderVariable) -> u32 {
    if variable.is_matrix() {
        match (variable.cols, variable.rows) {
            (2, 2) => 2,
            (c, r) => u32::from(c.max(r)),
        }
    } else {
        1
    }
}

/// Total rows `variable` occupies.
pub fn packing_rows(variable: &ShaderVariable) -> u32 {
    rows_per_element(variable).saturating_mul(variable.element_count())
}

/// Replaces struct variables by their leaf members (`s.f`, `a[1].f`), which
/// is what occupies registers.
pub fn expand_variables(variables: &[ShaderVariable]) -> Vec<ShaderVariable> {
    fn expand(variable: &ShaderVariable, prefix: &str, out: &mut Vec<ShaderVariable>) {
        let name = if prefix.is_empty() {
            variable.name.clone()
        } else {
            format!("{prefix}.{}", variable.name)
        };
        if !variable.is_struct() {
            let mut leaf = variable.clone();
            leaf.name = name;
            out.push(leaf);
            return;
        }
        match variable.array_size {
            Some(size) => {
                for i in 0..size {
                    let element = format!("{name}[{i}]");
                    for field in &variable.fields {
                        expand(field, &element, out);
                    }
                }
            }
            None => {
                for field in &variable.fields {
                    expand(field, &name, out);
                }
            }
        }
    }

    let mut out = Vec::new();
    for variable in variables {
        expand(variable, "", &mut out);
    }
    out
}

/// Whether `variables` fit into `max_rows` four-component registers.
///
/// Struct variables must be expanded with [`expand_variables`] first. The
/// input is not modified.
pub fn check_variables_within_packing_limits(max_rows: u32, variables: &[ShaderVariable]) -> bool {
    if max_rows == 0 {
        return variables.is_empty();
    }
    // Each variable must fit on its own.
    if variables
        .iter()
        .any(|v| v.element_count() > max_rows / rows_per_element(v))
    {
        return false;
    }

    let mut order: Vec<(u32, u32)> = variables
        .iter()
        .map(|v| (components_per_row(v), packing_rows(v)))
        .collect();
    order.sort_by_key(|&(width, rows)| (Reverse(width), Reverse(rows)));

    let mut packer = Packer::new(max_rows as usize);
    packer.pack(&order)
}

/// Packing check for the user varyings of a shader against
/// `max_varying_vectors`. Built-in varyings do not take registers here.
pub fn check_varyings_within_packing_limits(max_varying_vectors: u32, varyings: &[ShaderVariable]) -> bool {
    let user: Vec<ShaderVariable> = varyings
        .iter()
        .filter(|v| !v.name.starts_with("gl_"))
        .cloned()
        .collect();
    check_variables_within_packing_limits(max_varying_vectors, &expand_variables(&user))
}

struct Packer {
    /// One bit per occupied column, bit 3 is column 0.
    rows: Vec<u8>,
    max_rows: usize,
    top_non_full: usize,
    /// One past the lowest row that is not full.
    bottom_end: usize,
}

impl Packer {
    fn new(max_rows: usize) -> Self {
        Self {
            rows: vec![0; max_rows],
            max_rows,
            top_non_full: 0,
            bottom_end: max_rows,
        }
    }

    fn column_flags(column: usize, width: usize) -> u8 {
        ((FULL_ROW << (COLUMNS - width)) & FULL_ROW) >> column
    }

    fn fill(&mut self, top: usize, count: usize, column: usize, width: usize) {
        let flags = Self::column_flags(column, width);
        for row in &mut self.rows[top..top + count] {
            debug_assert_eq!(*row & flags, 0);
            *row |= flags;
        }
    }

    fn pack(&mut self, order: &[(u32, u32)]) -> bool {
        let max = self.max_rows;
        let mut items = order.iter().map(|&(w, r)| (w as usize, r as usize)).peekable();

        let mut four = 0usize;
        while let Some(&(4, rows)) = items.peek() {
            four += rows;
            items.next();
        }
        if four > max {
            return false;
        }
        self.fill(0, four, 0, 4);
        self.top_non_full = four;

        let mut three = 0usize;
        while let Some(&(3, rows)) = items.peek() {
            three += rows;
            items.next();
        }
        if four + three > max {
            return false;
        }
        self.fill(four, three, 0, 3);

        let two_top = four + three;
        let available = max - two_top;
        let (mut free01, mut free23) = (available, available);
        while let Some(&(2, rows)) = items.peek() {
            if rows <= free01 {
                free01 -= rows;
            } else if rows <= free23 {
                free23 -= rows;
            } else {
                return false;
            }
            items.next();
        }
        let used01 = available - free01;
        let used23 = available - free23;
        self.fill(two_top, used01, 0, 2);
        self.fill(max - used23, used23, 2, 2);

        for (_, rows) in items {
            let mut best: Option<(usize, usize, usize)> = None;
            for column in 0..COLUMNS {
                if let Some((top, size)) = self.search_column(column, rows) {
                    if best.is_none_or(|(_, _, best_size)| size < best_size) {
                        best = Some((column, top, size));
                    }
                }
            }
            let Some((column, top, _)) = best else {
                return false;
            };
            self.fill(top, rows, column, 1);
        }
        true
    }

    /// Smallest free run in `column` that holds `rows` rows, as
    /// `(top row, run length)`.
    fn search_column(&mut self, column: usize, rows: usize) -> Option<(usize, usize)> {
        while self.top_non_full < self.max_rows && self.rows[self.top_non_full] == FULL_ROW {
            self.top_non_full += 1;
        }
        while self.bottom_end > 0 && self.rows[self.bottom_end - 1] == FULL_ROW {
            self.bottom_end -= 1;
        }
        if self.bottom_end < self.top_non_full + rows {
            return None;
        }

        let flags = Self::column_flags(column, 1);
        let mut best: Option<(usize, usize)> = None;
        let mut run_start = None;
        for row in self.top_non_full..=self.bottom_end {
            let free = row < self.bottom_end && self.rows[row] & flags == 0;
            match (free, run_start) {
                (true, None) => run_start = Some(row),
                (false, Some(start)) => {
                    let size = row - start;
                    if size >= rows && best.is_none_or(|(_, s)| size < s) {
                        best = Some((start, size));
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glslt_ast::BasicType;
    use proptest::prelude::*;

    fn float(n: u8) -> ShaderVariable {
        ShaderVariable::new("v", BasicType::Float, n, 1)
    }

    fn mat(c: u8, r: u8) -> ShaderVariable {
        ShaderVariable::new("m", BasicType::Float, c, r)
    }

    #[test]
    fn packing_shapes() {
        assert_eq!((components_per_row(&mat(2, 2)), rows_per_element(&mat(2, 2))), (4, 2));
        assert_eq!((components_per_row(&mat(3, 2)), rows_per_element(&mat(3, 2))), (3, 3));
        assert_eq!((components_per_row(&mat(4, 4)), rows_per_element(&mat(4, 4))), (4, 4));
        assert_eq!(packing_rows(&float(2).with_array(5)), 5);
    }

    #[test]
    fn vec4_rows_fill_exactly() {
        let vars = vec![float(4); 8];
        assert!(check_variables_within_packing_limits(8, &vars));
        assert!(!check_variables_within_packing_limits(7, &vars));
    }

    #[test]
    fn mixed_widths_share_rows() {
        // vec3 + float share a row, two vec2 share a row.
        let vars = vec![float(3), float(1), float(2), float(2)];
        assert!(check_variables_within_packing_limits(2, &vars));
        assert!(!check_variables_within_packing_limits(1, &vars));
    }

    #[test]
    fn oversized_array_rejected_up_front() {
        let vars = vec![mat(4, 4).with_array(3)];
        assert!(!check_variables_within_packing_limits(11, &vars));
        assert!(check_variables_within_packing_limits(12, &vars));
    }

    #[test]
    fn scalars_fill_every_column() {
        let vars = vec![float(1); 16];
        assert!(check_variables_within_packing_limits(4, &vars));
        assert!(!check_variables_within_packing_limits(4, &vec![float(1); 17]));
    }

    #[test]
    fn struct_expansion() {
        let mut light = ShaderVariable::new("light", BasicType::Struct, 1, 1).with_array(2);
        light.struct_name = Some("Light".into());
        light.fields = vec![
            ShaderVariable::new("color", BasicType::Float, 3, 1),
            ShaderVariable::new("power", BasicType::Float, 1, 1),
        ];
        let expanded = expand_variables(&[light]);
        let names: Vec<_> = expanded.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["light[0].color", "light[0].power", "light[1].color", "light[1].power"]
        );
        assert!(check_variables_within_packing_limits(2, &expanded));
    }

    #[test]
    fn builtin_varyings_are_free() {
        let varyings = vec![
            ShaderVariable::new("gl_Position", BasicType::Float, 4, 1),
            ShaderVariable::new("v_color", BasicType::Float, 4, 1),
        ];
        assert!(check_varyings_within_packing_limits(1, &varyings));
        assert!(!check_variables_within_packing_limits(1, &varyings));
    }

    fn variable() -> impl Strategy<Value = ShaderVariable> {
        let shape = prop_oneof![
            (1u8..=4).prop_map(|n| (n, 1u8)),
            (2u8..=4, 2u8..=4),
        ];
        (shape, proptest::option::of(1u32..4)).prop_map(|((c, r), array)| {
            let mut v = ShaderVariable::new("v", BasicType::Float, c, r);
            v.array_size = array;
            v
        })
    }

    proptest! {
        #[test]
        fn over_capacity_is_always_rejected(
            vars in proptest::collection::vec(variable(), 0..24),
            max_rows in 1u32..16,
        ) {
            let demand: u32 = vars
                .iter()
                .map(|v| components_per_row(v) * packing_rows(v))
                .sum();
            if demand > 4 * max_rows {
                prop_assert!(!check_variables_within_packing_limits(max_rows, &vars));
            }
        }

        #[test]
        fn input_order_does_not_matter(
            vars in proptest::collection::vec(variable(), 0..12),
            max_rows in 1u32..12,
        ) {
            let mut reversed = vars.clone();
            reversed.reverse();
            prop_assert_eq!(
                check_variables_within_packing_limits(max_rows, &vars),
                check_variables_within_packing_limits(max_rows, &reversed)
            );
        }

        #[test]
        fn vec4_only_inputs_pack_iff_rows_suffice(count in 0usize..20, max_rows in 1u32..16) {
            let vars = vec![float(4); count];
            prop_assert_eq!(
                check_variables_within_packing_limits(max_rows, &vars),
                count as u32 <= max_rows
            );
        }
    }
}
