#![no_main]

use glslt_ast::{Ast, Diagnostics, Resources, ShaderStage, SymbolTable, insert_builtins};
use glslt_parser::ParseOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let resources = Resources::default();
    let mut ast = Ast::default();
    let mut symbols = SymbolTable::new();
    if insert_builtins(&mut symbols, &mut ast.structs, ShaderStage::Fragment, &resources).is_err() {
        return;
    }
    let options = ParseOptions {
        stage: ShaderStage::Fragment,
        webgl: true,
        css: false,
        max_version: 300,
        max_token_length: 256,
        resources,
    };
    let mut diags = Diagnostics::new();
    // The parser reports malformed input through diagnostics, never by panicking.
    let _ = glslt_parser::parse(&[source], &mut ast, &mut symbols, &options, &mut diags);
});
