//! Scoped symbol table.
//!
//! Levels 0..=2 hold built-ins (common, ESSL1-only, ESSL3-only) and are
//! populated once per compiler. Level 3 is the global scope of one compile;
//! function bodies and blocks stack above it. Default precisions are
//! scoped in parallel with names.

use std::collections::{HashMap, HashSet};

use crate::constant::ConstantUnion;
use crate::error::SymbolError;
use crate::types::{BasicType, Precision, Type};

pub const COMMON_BUILTINS: usize = 0;
pub const ESSL1_BUILTINS: usize = 1;
pub const ESSL3_BUILTINS: usize = 2;
pub const LAST_BUILTIN_LEVEL: usize = ESSL3_BUILTINS;
pub const GLOBAL_LEVEL: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub id: u32,
    pub name: String,
    pub ty: Type,
    /// A struct name introduced by a struct declaration, not a value.
    pub user_type: bool,
    /// Folded initializer of a `const` variable.
    pub const_value: Option<Vec<ConstantUnion>>,
    /// Extension that must be enabled to use this variable.
    pub extension: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            id: 0,
            name: name.into(),
            ty,
            user_type: false,
            const_value: None,
            extension: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: Option<String>,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub id: u32,
    pub name: String,
    /// `name(` followed by the mangled parameter types.
    pub mangled_name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub defined: bool,
    pub extension: Option<String>,
}

impl Function {
    /// `param_codes` are the parameters' mangled type names.
    pub fn mangle(name: &str, param_codes: &[String]) -> String {
        let mut mangled = format!("{name}(");
        for code in param_codes {
            mangled.push_str(code);
        }
        mangled
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    Variable(Variable),
    Function(Function),
}

impl Symbol {
    pub fn id(&self) -> u32 {
        match self {
            Self::Variable(v) => v.id,
            Self::Function(f) => f.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Variable(v) => &v.name,
            Self::Function(f) => &f.name,
        }
    }

    /// Key under which the symbol is stored.
    pub fn mangled_name(&self) -> &str {
        match self {
            Self::Variable(v) => &v.name,
            Self::Function(f) => &f.mangled_name,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Function(_) => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            Self::Variable(_) => None,
        }
    }

    fn set_id(&mut self, id: u32) {
        match self {
            Self::Variable(v) => v.id = id,
            Self::Function(f) => f.id = id,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Level {
    symbols: HashMap<String, Symbol>,
    function_names: HashSet<String>,
    precisions: HashMap<BasicType, Precision>,
}

/// Result of a name lookup.
#[derive(Clone, Copy, Debug)]
pub struct Lookup<'a> {
    pub symbol: &'a Symbol,
    pub level: usize,
    pub builtin: bool,
    /// Found in the innermost open scope.
    pub same_scope: bool,
}

#[derive(Clone, Debug)]
pub struct SymbolTable {
    levels: Vec<Level>,
    next_id: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table with the three built-in levels open and empty.
    pub fn new() -> Self {
        Self {
            levels: vec![Level::default(), Level::default(), Level::default()],
            next_id: 0,
        }
    }

    pub fn next_unique_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn push(&mut self) {
        self.levels.push(Level::default());
    }

    /// Closes the innermost scope. Built-in levels are never popped.
    pub fn pop(&mut self) -> bool {
        if self.levels.len() > GLOBAL_LEVEL {
            self.levels.pop();
            true
        } else {
            false
        }
    }

    /// Drops every per-compile scope, leaving only the built-in levels.
    pub fn pop_to_global_boundary(&mut self) {
        self.levels.truncate(GLOBAL_LEVEL);
    }

    pub fn at_global_level(&self) -> bool {
        self.levels.len() == GLOBAL_LEVEL + 1
    }

    pub fn at_builtin_level(&self) -> bool {
        self.levels.len() <= GLOBAL_LEVEL
    }

    /// Inserts into the innermost scope and assigns a fresh unique id.
    pub fn insert(&mut self, symbol: Symbol) -> Result<u32, SymbolError> {
        let level = self.levels.len().checked_sub(1).ok_or(SymbolError::NoScope)?;
        self.insert_at(level, symbol)
    }

    /// Inserts into one of the built-in levels.
    pub fn insert_builtin(&mut self, level: usize, symbol: Symbol) -> Result<u32, SymbolError> {
        if level > LAST_BUILTIN_LEVEL {
            return Err(SymbolError::NoScope);
        }
        self.insert_at(level, symbol)
    }

    fn insert_at(&mut self, level: usize, mut symbol: Symbol) -> Result<u32, SymbolError> {
        let id = self.next_id + 1;
        let scope = self.levels.get_mut(level).ok_or(SymbolError::NoScope)?;
        let key = symbol.mangled_name().to_string();
        if scope.symbols.contains_key(&key) {
            return Err(SymbolError::Redefinition {
                name: symbol.name().to_string(),
            });
        }
        symbol.set_id(id);
        if let Symbol::Function(f) = &symbol {
            scope.function_names.insert(f.name.clone());
        }
        scope.symbols.insert(key, symbol);
        self.next_id = id;
        Ok(id)
    }

    /// Levels searched for a shader of `version`, innermost first.
    fn visible_levels(&self, version: u32) -> impl Iterator<Item = usize> + '_ {
        (0..self.levels.len()).rev().filter(move |&level| match level {
            ESSL3_BUILTINS => version >= 300,
            ESSL1_BUILTINS => version < 300,
            _ => true,
        })
    }

    /// Looks `name` up from the innermost scope outward.
    pub fn find(&self, name: &str, version: u32) -> Option<Lookup<'_>> {
        let innermost = self.levels.len().checked_sub(1)?;
        self.visible_levels(version).find_map(|level| {
            self.levels[level].symbols.get(name).map(|symbol| Lookup {
                symbol,
                level,
                builtin: level <= LAST_BUILTIN_LEVEL,
                same_scope: level == innermost,
            })
        })
    }

    pub fn find_builtin(&self, name: &str, version: u32) -> Option<&Symbol> {
        self.visible_levels(version)
            .filter(|&level| level <= LAST_BUILTIN_LEVEL)
            .find_map(|level| self.levels[level].symbols.get(name))
    }

    pub fn find_global(&self, name: &str) -> Option<&Symbol> {
        self.levels.get(GLOBAL_LEVEL)?.symbols.get(name)
    }

    pub fn find_global_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.levels.get_mut(GLOBAL_LEVEL)?.symbols.get_mut(name)
    }

    /// Whether any visible function (of any overload) is called `name`.
    pub fn has_function_named(&self, name: &str, version: u32) -> bool {
        self.visible_levels(version)
            .any(|level| self.levels[level].function_names.contains(name))
    }

    /// Whether `name` is a built-in function name.
    pub fn is_builtin_function_name(&self, name: &str, version: u32) -> bool {
        self.visible_levels(version)
            .filter(|&level| level <= LAST_BUILTIN_LEVEL)
            .any(|level| self.levels[level].function_names.contains(name))
    }

    /// Sets the default precision of `basic` in the innermost scope.
    pub fn set_default_precision(&mut self, basic: BasicType, precision: Precision) -> bool {
        if !basic.supports_precision() {
            return false;
        }
        let basic = if basic == BasicType::UInt {
            BasicType::Int
        } else {
            basic
        };
        match self.levels.last_mut() {
            Some(level) => {
                level.precisions.insert(basic, precision);
                true
            }
            None => false,
        }
    }

    /// Sets a default precision on a built-in level.
    pub fn set_builtin_default_precision(
        &mut self,
        level: usize,
        basic: BasicType,
        precision: Precision,
    ) {
        if let Some(scope) = self.levels.get_mut(level) {
            scope.precisions.insert(basic, precision);
        }
    }

    /// Innermost default precision for `basic`; uint shares int's.
    pub fn default_precision(&self, basic: BasicType) -> Precision {
        if !basic.supports_precision() {
            return Precision::Undefined;
        }
        let basic = if basic == BasicType::UInt {
            BasicType::Int
        } else {
            basic
        };
        self.levels
            .iter()
            .rev()
            .find_map(|level| level.precisions.get(&basic).copied())
            .unwrap_or(Precision::Undefined)
    }

    /// Number of symbols on a level.
    pub fn level_len(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, |l| l.symbols.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_var(name: &str) -> Symbol {
        Symbol::Variable(Variable::new(name, Type::scalar(BasicType::Float)))
    }

    fn global_table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.insert_builtin(COMMON_BUILTINS, float_var("gl_x")).unwrap();
        table.push();
        table
    }

    #[test]
    fn innermost_scope_wins() {
        let mut table = global_table();
        let outer = table.insert(float_var("a")).unwrap();
        table.push();
        let inner = table.insert(float_var("a")).unwrap();
        let hit = table.find("a", 100).unwrap();
        assert_eq!(hit.symbol.id(), inner);
        assert!(hit.same_scope);
        table.pop();
        let hit = table.find("a", 100).unwrap();
        assert_eq!(hit.symbol.id(), outer);
        assert!(!hit.builtin);
    }

    #[test]
    fn insert_fails_only_in_same_level() {
        let mut table = global_table();
        table.insert(float_var("a")).unwrap();
        assert_eq!(
            table.insert(float_var("a")),
            Err(SymbolError::Redefinition { name: "a".into() })
        );
        table.push();
        assert!(table.insert(float_var("a")).is_ok());
    }

    #[test]
    fn shadowing_builtin_does_not_leak_across_compiles() {
        let mut table = global_table();
        let builtin = table.find("gl_x", 100).unwrap().symbol.id();

        table.push();
        let shadow = table.insert(float_var("gl_x")).unwrap();
        assert_eq!(table.find("gl_x", 100).unwrap().symbol.id(), shadow);
        table.pop_to_global_boundary();

        table.push();
        let hit = table.find("gl_x", 100).unwrap();
        assert_eq!(hit.symbol.id(), builtin);
        assert!(hit.builtin);
    }

    #[test]
    fn version_selects_builtin_level() {
        let mut table = SymbolTable::new();
        table.insert_builtin(ESSL1_BUILTINS, float_var("gl_FragColor")).unwrap();
        table.insert_builtin(ESSL3_BUILTINS, float_var("gl_Only3")).unwrap();
        table.push();
        assert!(table.find("gl_FragColor", 100).is_some());
        assert!(table.find("gl_FragColor", 300).is_none());
        assert!(table.find("gl_Only3", 100).is_none());
        assert!(table.find("gl_Only3", 300).is_some());
    }

    #[test]
    fn unique_ids_increase() {
        let mut table = global_table();
        let a = table.insert(float_var("a")).unwrap();
        let b = table.insert(float_var("b")).unwrap();
        assert!(b > a);
        assert!(table.next_unique_id() > b);
    }

    #[test]
    fn precision_scoping() {
        let mut table = SymbolTable::new();
        table.set_builtin_default_precision(COMMON_BUILTINS, BasicType::Int, Precision::Medium);
        table.push();
        assert_eq!(table.default_precision(BasicType::UInt), Precision::Medium);
        assert_eq!(table.default_precision(BasicType::Float), Precision::Undefined);
        table.set_default_precision(BasicType::Float, Precision::High);
        table.push();
        table.set_default_precision(BasicType::Float, Precision::Low);
        assert_eq!(table.default_precision(BasicType::Float), Precision::Low);
        table.pop();
        assert_eq!(table.default_precision(BasicType::Float), Precision::High);
        assert!(!table.set_default_precision(BasicType::Bool, Precision::High));
    }

    #[test]
    fn builtin_levels_survive_pop() {
        let mut table = SymbolTable::new();
        assert!(table.at_builtin_level());
        table.push();
        assert!(table.at_global_level());
        assert!(table.pop());
        assert!(!table.pop());
        assert_eq!(table.depth(), GLOBAL_LEVEL);
    }

    #[test]
    fn function_overloads_by_mangled_name() {
        let mut table = global_table();
        let f = |mangled: &str| {
            Symbol::Function(Function {
                id: 0,
                name: "f".into(),
                mangled_name: mangled.into(),
                params: Vec::new(),
                return_type: Type::VOID,
                defined: false,
                extension: None,
            })
        };
        table.insert(f("f(f1;")).unwrap();
        table.insert(f("f(i1;")).unwrap();
        assert!(table.find("f(f1;", 100).is_some());
        assert!(table.has_function_named("f", 100));
        assert!(!table.is_builtin_function_name("f", 100));
        assert_eq!(Function::mangle("g", &["vf2;".into(), "s21;".into()]), "g(vf2;s21;");
    }
}
