//! Recursive-descent grammar.
//!
//! The grammar follows the GLSL ES 1.00 / 3.00 reference grammar closely
//! enough that node shapes match what a yacc-generated front end would
//! produce. Semantic work is delegated to [`ParseContext`]; this module
//! only decides which action to run. A syntax error stops the parse.

use std::ops::Range;

use glslt_ast::{
    BasicType, BranchKind, ConstantUnion, Handle, LoopKind, Node, Operator, Parameter, Precision,
    Qualifier, SourceLoc, Type,
};

use crate::context::{
    FunctionHeader, Interpolation, Layout, MemberDeclarator, ParseContext, PublicType, Qualifiers,
    Storage,
};
use crate::lexer::{Class, Lexeme, Token, TypeKeyword};

/// Deepest statement or unary-expression nesting accepted.
const MAX_NESTING: usize = 256;

/// Marker for an unrecoverable syntax error; the diagnostic is already
/// recorded.
#[derive(Debug)]
pub(crate) struct Abort;

type PResult<T> = Result<T, Abort>;

#[derive(Clone, Debug)]
struct Item {
    token: Token,
    span: Range<usize>,
    loc: SourceLoc,
    reserved: bool,
}

pub(crate) struct Parser<'a, 's> {
    cx: ParseContext<'a>,
    text: &'s str,
    items: Vec<Item>,
    pos: usize,
    nesting: usize,
}

impl<'a, 's> Parser<'a, 's> {
    pub fn new(cx: ParseContext<'a>, text: &'s str, lexemes: &[Lexeme]) -> Self {
        let version = cx.version;
        let items = lexemes
            .iter()
            .map(|lexeme| {
                let word = &text[lexeme.span.clone()];
                let class = lexeme.classify(word, version);
                Item {
                    token: match class {
                        Class::Identifier => Token::Identifier,
                        _ => lexeme.token,
                    },
                    span: lexeme.span.clone(),
                    loc: lexeme.loc,
                    reserved: class == Class::Reserved,
                }
            })
            .collect();
        Self {
            cx,
            text,
            items,
            pos: 0,
            nesting: 0,
        }
    }

    // ---- token access -------------------------------------------------

    fn peek(&self) -> Option<Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<Token> {
        self.items.get(self.pos + ahead).map(|item| item.token)
    }

    fn at(&self, token: Token) -> bool {
        self.peek() == Some(token)
    }

    fn loc(&self) -> SourceLoc {
        self.items
            .get(self.pos)
            .or(self.items.last())
            .map(|item| item.loc)
            .unwrap_or_default()
    }

    fn slice(&self, index: usize) -> &'s str {
        self.items
            .get(index)
            .map_or("", |item| &self.text[item.span.clone()])
    }

    fn advance(&mut self) -> PResult<(Token, SourceLoc, &'s str)> {
        let Some(item) = self.items.get(self.pos) else {
            return Err(self.syntax_error());
        };
        if item.reserved {
            let loc = item.loc;
            let word = self.slice(self.pos);
            self.cx.error(loc, "Illegal use of reserved word", word, "");
            return Err(Abort);
        }
        let token = item.token;
        let loc = item.loc;
        let word = self.slice(self.pos);
        self.pos += 1;
        Ok((token, loc, word))
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> PResult<SourceLoc> {
        if self.at(token) {
            let loc = self.loc();
            self.pos += 1;
            Ok(loc)
        } else {
            Err(self.syntax_error())
        }
    }

    fn expect_identifier(&mut self) -> PResult<(&'s str, SourceLoc)> {
        match self.peek() {
            Some(Token::Identifier) => {
                let (_, loc, word) = self.advance()?;
                Ok((word, loc))
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn syntax_error(&mut self) -> Abort {
        let loc = self.loc();
        let word = match self.items.get(self.pos) {
            Some(item) if item.reserved => {
                let word = self.slice(self.pos);
                self.cx.error(loc, "Illegal use of reserved word", word, "");
                return Abort;
            }
            Some(_) => self.slice(self.pos),
            None => "",
        };
        self.cx.error(loc, "syntax error", word, "");
        Abort
    }

    fn enter(&mut self) -> PResult<()> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            let loc = self.loc();
            self.cx.error(loc, "nesting too deep", "", "");
            return Err(Abort);
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    // ---- translation unit ---------------------------------------------

    /// Parses the whole token stream. `None` after a syntax error.
    pub fn translation_unit(mut self) -> Option<Handle<Node>> {
        if self.items.is_empty() {
            let loc = self.loc();
            self.cx.error(loc, "syntax error", "", "");
            return None;
        }
        let mut root = None;
        while self.pos < self.items.len() {
            let loc = self.loc();
            match self.external_declaration() {
                Ok(node) => root = self.cx.ast.grow_aggregate(root, node, loc),
                Err(Abort) => return None,
            }
        }
        let loc = self.loc();
        Some(root.unwrap_or_else(|| self.cx.ast.make_aggregate(None, loc)))
    }

    fn external_declaration(&mut self) -> PResult<Option<Handle<Node>>> {
        self.declaration(true)
    }

    // ---- declarations -------------------------------------------------

    /// Whether the upcoming tokens start a declaration rather than an
    /// expression statement.
    fn at_declaration(&self) -> bool {
        match self.peek() {
            Some(
                Token::Const
                | Token::Attribute
                | Token::Uniform
                | Token::Varying
                | Token::In
                | Token::Out
                | Token::InOut
                | Token::Centroid
                | Token::Flat
                | Token::Smooth
                | Token::Invariant
                | Token::Layout
                | Token::Lowp
                | Token::Mediump
                | Token::Highp
                | Token::Precision
                | Token::Struct,
            ) => true,
            Some(Token::Type(_)) => !self.at_constructor(),
            Some(Token::Identifier) => {
                let name = self.slice(self.pos);
                self.peek_at(1) == Some(Token::Identifier)
                    && self.cx.struct_type_named(name).is_some()
            }
            _ => false,
        }
    }

    /// A type keyword followed by `(` or `[...](`.
    fn at_constructor(&self) -> bool {
        match self.peek_at(1) {
            Some(Token::LeftParen) => true,
            Some(Token::LeftBracket) => {
                let mut depth = 0usize;
                let mut i = self.pos + 1;
                while let Some(item) = self.items.get(i) {
                    match item.token {
                        Token::LeftBracket => depth += 1,
                        Token::RightBracket => {
                            depth -= 1;
                            if depth == 0 {
                                return self.items.get(i + 1).map(|it| it.token)
                                    == Some(Token::LeftParen);
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn declaration(&mut self, external: bool) -> PResult<Option<Handle<Node>>> {
        let start = self.loc();
        if self.at(Token::Precision) {
            self.precision_statement()?;
            return Ok(None);
        }
        if self.at(Token::Invariant)
            && self.peek_at(1) == Some(Token::Identifier)
            && self.cx.struct_type_named(self.slice(self.pos + 1)).is_none()
        {
            return self.invariant_list().map(Some);
        }

        let quals = self.qualifiers()?;
        if !quals.is_empty()
            && self.at(Token::Identifier)
            && self.peek_at(1) == Some(Token::LeftBrace)
            && self.cx.struct_type_named(self.slice(self.pos)).is_none()
        {
            return self.interface_block(&quals, start).map(Some);
        }
        if !quals.is_empty() && self.at(Token::Semicolon) {
            let Some((layout, layout_loc)) = quals.layout else {
                return Err(self.syntax_error());
            };
            self.pos += 1;
            let (qualifier, _, _) = self.cx.resolve_qualifiers(&quals, start);
            self.cx.global_layout(layout_loc, qualifier, layout);
            return Ok(None);
        }

        let spec = self.type_specifier()?;
        let (qualifier, invariant, layout) = self.cx.resolve_qualifiers(&quals, start);
        let mut pt = self.cx.fully_specified_type(qualifier, invariant, layout, spec);

        if self.at(Token::Semicolon) {
            let loc = self.expect(Token::Semicolon)?;
            let list = self.cx.single_declaration(&mut pt, loc, "");
            return Ok(Some(self.set_declaration(Some(list), loc)));
        }

        let (name, name_loc) = self.expect_identifier()?;
        if self.at(Token::LeftParen) {
            let header = self.function_header(&pt, name, name_loc)?;
            self.cx.function_prototype(&header);
            if self.at(Token::LeftBrace) {
                if !external {
                    return Err(self.syntax_error());
                }
                return self.function_definition(&header).map(Some);
            }
            self.expect(Token::Semicolon)?;
            return Ok(Some(self.cx.prototype_declaration(&header)));
        }

        let mut list = Some(self.first_declarator(&mut pt, name, name_loc)?);
        while self.eat(Token::Comma) {
            let (name, loc) = self.expect_identifier()?;
            list = if self.at(Token::LeftBracket) {
                let (size_loc, size) = self.array_suffix()?;
                self.cx.array_declarator(&mut pt, list, loc, name, size_loc, size)
            } else if self.at(Token::Equal) {
                let init_loc = self.expect(Token::Equal)?;
                let init = self.assignment_expression()?;
                self.cx.init_declarator(&mut pt, list, loc, name, init_loc, init)
            } else {
                self.cx.declarator(&mut pt, list, loc, name)
            };
        }
        self.expect(Token::Semicolon)?;
        Ok(Some(self.set_declaration(list, start)))
    }

    fn first_declarator(
        &mut self,
        pt: &mut PublicType,
        name: &str,
        name_loc: SourceLoc,
    ) -> PResult<Handle<Node>> {
        if self.at(Token::LeftBracket) {
            let (size_loc, size) = self.array_suffix()?;
            return Ok(self.cx.single_array_declaration(pt, name_loc, name, size_loc, size));
        }
        if self.at(Token::Equal) {
            let init_loc = self.expect(Token::Equal)?;
            let init = self.assignment_expression()?;
            let node = self.cx.single_init_declaration(pt, name_loc, name, init_loc, init);
            return Ok(node.unwrap_or_else(|| self.cx.ast.make_aggregate(None, init_loc)));
        }
        Ok(self.cx.single_declaration(pt, name_loc, name))
    }

    fn set_declaration(&mut self, list: Option<Handle<Node>>, loc: SourceLoc) -> Handle<Node> {
        self.cx
            .ast
            .set_aggregate_operator(list, Operator::Declaration, loc)
    }

    /// `[ constant-expression ]` after a declarator name.
    fn array_suffix(&mut self) -> PResult<(SourceLoc, Handle<Node>)> {
        let loc = self.expect(Token::LeftBracket)?;
        if self.at(Token::RightBracket) {
            return Err(self.syntax_error());
        }
        let size = self.conditional_expression()?;
        self.expect(Token::RightBracket)?;
        Ok((loc, size))
    }

    fn precision_statement(&mut self) -> PResult<()> {
        let loc = self.expect(Token::Precision)?;
        let precision = match self.advance()?.0 {
            Token::Lowp => Precision::Low,
            Token::Mediump => Precision::Medium,
            Token::Highp => Precision::High,
            _ => {
                self.pos -= 1;
                return Err(self.syntax_error());
            }
        };
        let Some(Token::Type(kw)) = self.peek() else {
            return Err(self.syntax_error());
        };
        self.pos += 1;
        self.expect(Token::Semicolon)?;
        let ty = keyword_type(kw);
        self.cx.default_precision(loc, precision, &ty);
        Ok(())
    }

    fn invariant_list(&mut self) -> PResult<Handle<Node>> {
        let invariant_loc = self.expect(Token::Invariant)?;
        let mut list = None;
        loop {
            let (name, loc) = self.expect_identifier()?;
            list = self.cx.invariant_declaration(list, invariant_loc, loc, name);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::Semicolon)?;
        Ok(list.unwrap_or_else(|| {
            self.cx
                .ast
                .aggregate(Operator::InvariantDeclaration, Vec::new(), invariant_loc)
        }))
    }

    fn qualifiers(&mut self) -> PResult<Qualifiers> {
        let mut quals = Qualifiers::default();
        loop {
            let loc = self.loc();
            let storage = match self.peek() {
                Some(Token::Invariant) => {
                    self.pos += 1;
                    quals.invariant = Some(loc);
                    continue;
                }
                Some(Token::Smooth | Token::Flat) => {
                    let interp = if self.at(Token::Smooth) {
                        Interpolation::Smooth
                    } else {
                        Interpolation::Flat
                    };
                    self.pos += 1;
                    quals.interpolation = Some((interp, loc));
                    continue;
                }
                Some(Token::Layout) => {
                    let layout = self.layout_qualifier()?;
                    quals.layout = Some((layout, loc));
                    continue;
                }
                Some(Token::Const) => Storage::Const,
                Some(Token::Attribute) => Storage::Attribute,
                Some(Token::Varying) => Storage::Varying,
                Some(Token::Uniform) => Storage::Uniform,
                Some(Token::In) => Storage::In,
                Some(Token::Out) => Storage::Out,
                Some(Token::Centroid) => match self.peek_at(1) {
                    Some(Token::In) => {
                        self.pos += 1;
                        Storage::CentroidIn
                    }
                    Some(Token::Out) => {
                        self.pos += 1;
                        Storage::CentroidOut
                    }
                    _ => {
                        self.pos += 1;
                        return Err(self.syntax_error());
                    }
                },
                _ => return Ok(quals),
            };
            let word = self.slice(self.pos);
            self.pos += 1;
            if quals.storage.is_some() {
                self.cx
                    .error(loc, "storage qualifier specified more than once", word, "");
            }
            quals.storage = Some((storage, loc));
        }
    }

    fn layout_qualifier(&mut self) -> PResult<Layout> {
        self.expect(Token::Layout)?;
        self.expect(Token::LeftParen)?;
        let mut layout = Layout::default();
        loop {
            let (name, loc) = self.expect_identifier()?;
            let id = if self.eat(Token::Equal) {
                let negative = self.eat(Token::Dash);
                let value_index = self.pos;
                self.expect(Token::IntConstant)?;
                let text = self.slice(value_index);
                let value = parse_int(text).map_or(i64::MAX, |(v, _)| i64::from(v));
                let value = if negative { -value } else { value };
                let shown = if negative { format!("-{text}") } else { text.to_string() };
                self.cx.layout_id_value(loc, name, &shown, value)
            } else {
                self.cx.layout_id(loc, name)
            };
            layout = ParseContext::join_layouts(layout, id);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RightParen)?;
        Ok(layout)
    }

    /// Optional precision, a type name and an optional `[N]`.
    fn type_specifier(&mut self) -> PResult<PublicType> {
        let precision = match self.peek() {
            Some(Token::Lowp) => Some(Precision::Low),
            Some(Token::Mediump) => Some(Precision::Medium),
            Some(Token::Highp) => Some(Precision::High),
            _ => None,
        };
        let precision = precision.map(|p| {
            let loc = self.loc();
            self.pos += 1;
            (p, loc)
        });

        let loc = self.loc();
        let mut pt = match self.peek() {
            Some(Token::Type(kw)) => {
                self.pos += 1;
                PublicType::new(keyword_type(kw), loc)
            }
            Some(Token::Struct) => self.struct_specifier()?,
            Some(Token::Identifier) => match self.cx.struct_type_named(self.slice(self.pos)) {
                Some(ty) => {
                    self.pos += 1;
                    PublicType::new(ty.with_qualifier(Qualifier::Temporary), loc)
                }
                None => return Err(self.syntax_error()),
            },
            _ => return Err(self.syntax_error()),
        };
        if self.at(Token::LeftBracket) {
            let (size_loc, size) = self.array_suffix()?;
            let size = self.cx.array_size(size_loc, size);
            pt.ty.array_size = Some(size);
        }
        Ok(self.cx.finish_type_specifier(pt, precision))
    }

    fn struct_specifier(&mut self) -> PResult<PublicType> {
        let loc = self.expect(Token::Struct)?;
        let (name, name_loc) = if self.at(Token::Identifier) {
            self.expect_identifier()?
        } else {
            ("", loc)
        };
        self.expect(Token::LeftBrace)?;
        self.cx.enter_struct(loc);
        let fields = self.member_list()?;
        self.expect(Token::RightBrace)?;
        Ok(self.cx.add_structure(loc, name_loc, name, fields))
    }

    /// Member declarations up to (not including) the closing brace.
    fn member_list(&mut self) -> PResult<Vec<glslt_ast::Field>> {
        let mut fields = Vec::new();
        while !self.at(Token::RightBrace) {
            let spec = self.type_specifier()?;
            let mut declarators = Vec::new();
            loop {
                let (name, loc) = self.expect_identifier()?;
                self.cx.check_reserved_name(loc, name);
                let array_size = if self.at(Token::LeftBracket) {
                    let (size_loc, size) = self.array_suffix()?;
                    Some(self.cx.array_size(size_loc, size))
                } else {
                    None
                };
                declarators.push(MemberDeclarator {
                    name: name.to_string(),
                    loc,
                    array_size,
                });
                if !self.eat(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Semicolon)?;
            fields.extend(self.cx.struct_member_list(&spec, declarators));
        }
        if fields.is_empty() {
            return Err(self.syntax_error());
        }
        Ok(fields)
    }

    fn interface_block(&mut self, quals: &Qualifiers, start: SourceLoc) -> PResult<Handle<Node>> {
        let (qualifier, _, layout) = self.cx.resolve_qualifiers(quals, start);
        let (name, name_loc) = self.expect_identifier()?;
        self.expect(Token::LeftBrace)?;
        let fields = self.member_list()?;
        self.expect(Token::RightBrace)?;
        let mut instance = None;
        let mut array = None;
        if self.at(Token::Identifier) {
            let (instance_name, instance_loc) = self.expect_identifier()?;
            instance = Some((instance_name.to_string(), instance_loc));
            if self.at(Token::LeftBracket) {
                array = Some(self.array_suffix()?);
            }
        }
        self.expect(Token::Semicolon)?;
        Ok(self.cx.add_interface_block(
            qualifier, layout, start, name_loc, name, fields, instance, array,
        ))
    }

    // ---- functions ----------------------------------------------------

    fn function_header(
        &mut self,
        pt: &PublicType,
        name: &str,
        loc: SourceLoc,
    ) -> PResult<FunctionHeader> {
        if !matches!(pt.ty.qualifier, Qualifier::Temporary | Qualifier::Global) {
            self.cx.error(
                loc,
                "no qualifiers allowed for function return",
                pt.ty.qualifier.as_str(),
                "",
            );
        }
        self.cx.check_struct_qualifier(loc, &pt.ty);
        self.cx.check_reserved_name(loc, name);
        self.expect(Token::LeftParen)?;

        let mut params = Vec::new();
        let void_only = matches!(
            self.peek(),
            Some(Token::Type(TypeKeyword {
                basic: BasicType::Void,
                ..
            }))
        ) && self.peek_at(1) == Some(Token::RightParen);
        if void_only {
            self.pos += 1;
        } else if !self.at(Token::RightParen) {
            loop {
                let param_loc = self.loc();
                let param = self.parameter_declaration()?;
                if param.ty.basic == BasicType::Void {
                    if param.name.is_none() && params.is_empty() && self.at(Token::RightParen) {
                        // `f(void)` spelled with qualifiers or precision
                    } else if param.name.is_none() {
                        self.cx.error(
                            param_loc,
                            "cannot be an argument type except for '(void)'",
                            "void",
                            "",
                        );
                    }
                } else {
                    params.push(param);
                }
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RightParen)?;

        Ok(FunctionHeader {
            name: name.to_string(),
            loc,
            return_type: pt.ty.with_qualifier(Qualifier::Temporary),
            params,
        })
    }

    fn parameter_declaration(&mut self) -> PResult<Parameter> {
        let loc = self.loc();
        let is_const = self.eat(Token::Const);
        let param_qualifier = match self.peek() {
            Some(Token::In) => Qualifier::In,
            Some(Token::Out) => Qualifier::Out,
            Some(Token::InOut) => Qualifier::InOut,
            _ => Qualifier::Temporary,
        };
        if param_qualifier != Qualifier::Temporary {
            self.pos += 1;
        }
        let param_qualifier = if param_qualifier == Qualifier::Temporary {
            Qualifier::In
        } else {
            param_qualifier
        };
        if matches!(
            self.peek(),
            Some(Token::Attribute | Token::Uniform | Token::Varying | Token::Invariant)
        ) {
            let word = self.slice(self.pos);
            self.cx
                .error(loc, "qualifier not allowed on function parameter", word, "");
            self.pos += 1;
        }

        let spec = self.type_specifier()?;
        let mut ty = spec.ty;
        let name = if self.at(Token::Identifier) {
            let (name, name_loc) = self.expect_identifier()?;
            self.cx.check_reserved_name(name_loc, name);
            self.cx.check_void(name_loc, name, &ty);
            if self.at(Token::LeftBracket) {
                let (size_loc, size) = self.array_suffix()?;
                self.cx.check_array_type(size_loc, &ty);
                let size = self.cx.array_size(size_loc, size);
                ty.array_size = Some(size);
            }
            Some(name.to_string())
        } else {
            None
        };
        self.cx.check_param(loc, is_const, param_qualifier, &mut ty);
        self.cx.check_parameter_sampler(loc, ty.qualifier, &ty);
        Ok(Parameter { name, ty })
    }

    fn function_definition(&mut self, header: &FunctionHeader) -> PResult<Handle<Node>> {
        let params = self.cx.begin_function_definition(header);
        let body = self.compound_statement_no_new_scope();
        match body {
            Ok(body) => Ok(self.cx.end_function_definition(header, params, body)),
            Err(abort) => {
                self.cx.symbols.pop();
                Err(abort)
            }
        }
    }

    // ---- statements ---------------------------------------------------

    fn statement(&mut self) -> PResult<Option<Handle<Node>>> {
        self.enter()?;
        let result = self.statement_inner();
        self.leave();
        result
    }

    fn statement_inner(&mut self) -> PResult<Option<Handle<Node>>> {
        let loc = self.loc();
        match self.peek() {
            Some(Token::LeftBrace) => self.compound_statement(),
            Some(Token::If) => self.selection_statement().map(Some),
            Some(Token::While) => self.while_statement().map(Some),
            Some(Token::Do) => self.do_statement().map(Some),
            Some(Token::For) => self.for_statement().map(Some),
            Some(Token::Continue | Token::Break) => {
                let (token, _, word) = self.advance()?;
                self.expect(Token::Semicolon)?;
                if self.cx.loop_nesting == 0 {
                    let reason = format!("{word} statement only allowed in loops");
                    self.cx.error(loc, &reason, "", "");
                }
                let kind = if token == Token::Continue {
                    BranchKind::Continue
                } else {
                    BranchKind::Break
                };
                Ok(Some(self.cx.ast.add_branch(kind, None, loc)))
            }
            Some(Token::Return) => {
                self.pos += 1;
                let value = if self.at(Token::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(Token::Semicolon)?;
                Ok(Some(self.cx.return_statement(loc, value)))
            }
            Some(Token::Discard) => {
                self.pos += 1;
                self.expect(Token::Semicolon)?;
                if self.cx.options.stage != glslt_ast::ShaderStage::Fragment {
                    self.cx
                        .error(loc, " supported in fragment shaders only ", "discard", "");
                }
                Ok(Some(self.cx.ast.add_branch(BranchKind::Discard, None, loc)))
            }
            Some(Token::Semicolon) => {
                self.pos += 1;
                Ok(None)
            }
            _ if self.at_declaration() => self.declaration(false),
            _ => {
                let expr = self.expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Some(expr))
            }
        }
    }

    /// `{ ... }` opening a new scope.
    fn compound_statement(&mut self) -> PResult<Option<Handle<Node>>> {
        self.cx.symbols.push();
        let result = self.compound_statement_no_new_scope();
        self.cx.symbols.pop();
        result
    }

    fn compound_statement_no_new_scope(&mut self) -> PResult<Option<Handle<Node>>> {
        let loc = self.expect(Token::LeftBrace)?;
        if self.eat(Token::RightBrace) {
            return Ok(None);
        }
        let mut list = None;
        while !self.at(Token::RightBrace) {
            if self.peek().is_none() {
                return Err(self.syntax_error());
            }
            let stmt_loc = self.loc();
            let stmt = self.statement()?;
            list = match (list, stmt) {
                (None, None) => None,
                (list, stmt) => self.cx.ast.grow_aggregate(list, stmt, stmt_loc),
            };
        }
        self.expect(Token::RightBrace)?;
        Ok(Some(
            self.cx
                .ast
                .set_aggregate_operator(list, Operator::Sequence, loc),
        ))
    }

    /// Statement bodies of `if` and `do`: braces share the enclosing scope,
    /// a simple statement gets its own.
    fn statement_with_scope(&mut self) -> PResult<Option<Handle<Node>>> {
        if self.at(Token::LeftBrace) {
            return self.compound_statement_no_new_scope();
        }
        self.cx.symbols.push();
        let result = self.statement();
        self.cx.symbols.pop();
        result
    }

    fn statement_no_new_scope(&mut self) -> PResult<Option<Handle<Node>>> {
        if self.at(Token::LeftBrace) {
            return self.compound_statement_no_new_scope();
        }
        self.statement()
    }

    fn condition(&mut self) -> PResult<Handle<Node>> {
        let loc = self.loc();
        let cond = self.expression()?;
        self.cx.check_bool(loc, cond);
        Ok(cond)
    }

    fn selection_statement(&mut self) -> PResult<Handle<Node>> {
        let loc = self.expect(Token::If)?;
        self.expect(Token::LeftParen)?;
        let cond = self.condition()?;
        self.expect(Token::RightParen)?;
        let true_block = self.statement_with_scope()?;
        let false_block = if self.eat(Token::Else) {
            self.statement_with_scope()?
        } else {
            None
        };
        Ok(self.cx.ast.add_selection(cond, true_block, false_block, loc))
    }

    fn in_loop<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.cx.loop_nesting += 1;
        let result = f(self);
        self.cx.loop_nesting -= 1;
        result
    }

    fn while_statement(&mut self) -> PResult<Handle<Node>> {
        let loc = self.expect(Token::While)?;
        self.cx.symbols.push();
        let result = self.in_loop(|p| {
            p.expect(Token::LeftParen)?;
            let cond = p.condition()?;
            p.expect(Token::RightParen)?;
            let body = p.statement_no_new_scope()?;
            Ok((cond, body))
        });
        self.cx.symbols.pop();
        let (cond, body) = result?;
        Ok(self
            .cx
            .ast
            .add_loop(LoopKind::While, None, Some(cond), None, body, loc))
    }

    fn do_statement(&mut self) -> PResult<Handle<Node>> {
        let loc = self.expect(Token::Do)?;
        let (body, cond) = self.in_loop(|p| {
            let body = p.statement_with_scope()?;
            p.expect(Token::While)?;
            p.expect(Token::LeftParen)?;
            let cond = p.condition()?;
            p.expect(Token::RightParen)?;
            p.expect(Token::Semicolon)?;
            Ok((body, cond))
        })?;
        Ok(self
            .cx
            .ast
            .add_loop(LoopKind::DoWhile, None, Some(cond), None, body, loc))
    }

    fn for_statement(&mut self) -> PResult<Handle<Node>> {
        let loc = self.expect(Token::For)?;
        self.expect(Token::LeftParen)?;
        self.cx.symbols.push();
        let result = self.in_loop(|p| {
            let init = if p.eat(Token::Semicolon) {
                None
            } else if p.at_declaration() {
                p.declaration(false)?
            } else {
                let expr = p.expression()?;
                p.expect(Token::Semicolon)?;
                Some(expr)
            };
            let cond = if p.at(Token::Semicolon) {
                None
            } else {
                Some(p.condition()?)
            };
            p.expect(Token::Semicolon)?;
            let expr = if p.at(Token::RightParen) {
                None
            } else {
                Some(p.expression()?)
            };
            p.expect(Token::RightParen)?;
            let body = p.statement_no_new_scope()?;
            Ok((init, cond, expr, body))
        });
        self.cx.symbols.pop();
        let (init, cond, expr, body) = result?;
        Ok(self
            .cx
            .ast
            .add_loop(LoopKind::For, init, cond, expr, body, loc))
    }

    // ---- expressions --------------------------------------------------

    fn expression(&mut self) -> PResult<Handle<Node>> {
        let mut expr = self.assignment_expression()?;
        while self.at(Token::Comma) {
            let loc = self.expect(Token::Comma)?;
            let right = self.assignment_expression()?;
            expr = self.cx.ast.add_comma(expr, right, loc);
        }
        Ok(expr)
    }

    fn assignment_expression(&mut self) -> PResult<Handle<Node>> {
        let left = self.conditional_expression()?;
        let Some((op, es3)) = self.peek().and_then(assignment_operator) else {
            return Ok(left);
        };
        let (_, loc, word) = self.advance()?;
        if es3 {
            self.cx.es3_only(loc, word, "bit-wise operator");
        }
        let right = self.assignment_expression()?;
        self.cx.check_lvalue(loc, "assign", left);
        match self.cx.ast.add_assign(op, left, right, loc) {
            Ok(node) => Ok(node),
            Err(_) => {
                let left_ty = self.cx.ast.ty(left);
                let right_ty = self.cx.ast.ty(right);
                self.cx.error(
                    loc,
                    "",
                    "assign",
                    &format!("cannot convert from '{right_ty}' to '{left_ty}'"),
                );
                Ok(left)
            }
        }
    }

    fn conditional_expression(&mut self) -> PResult<Handle<Node>> {
        let cond = self.binary_expression(0)?;
        if !self.at(Token::Question) {
            return Ok(cond);
        }
        let loc = self.expect(Token::Question)?;
        self.cx.check_bool(loc, cond);
        let true_expr = self.expression()?;
        self.expect(Token::Colon)?;
        let false_expr = self.assignment_expression()?;
        match self.cx.ast.add_ternary(cond, true_expr, false_expr, loc) {
            Ok(node) => Ok(node),
            Err(err) => {
                self.cx.diags.error_at(loc, err.to_string());
                Ok(false_expr)
            }
        }
    }

    /// Precedence climbing over the binary operators.
    fn binary_expression(&mut self, min_precedence: u8) -> PResult<Handle<Node>> {
        let mut left = self.unary_expression()?;
        while let Some((precedence, op, es3)) = self.peek().and_then(binary_operator) {
            if precedence < min_precedence {
                break;
            }
            let (_, loc, word) = self.advance()?;
            if es3 {
                self.cx.es3_only(loc, word, "bit-wise operator");
            }
            let right = self.binary_expression(precedence + 1)?;
            left = match self
                .cx
                .ast
                .add_binary_math(op, left, right, loc, self.cx.diags)
            {
                Ok(node) => node,
                Err(err) => {
                    self.cx.diags.error_at(loc, err.to_string());
                    if op.is_comparison() || op.is_logical() {
                        self.cx.bool_constant(false, loc)
                    } else {
                        left
                    }
                }
            };
        }
        Ok(left)
    }

    fn unary_expression(&mut self) -> PResult<Handle<Node>> {
        self.enter()?;
        let result = self.unary_inner();
        self.leave();
        result
    }

    fn unary_inner(&mut self) -> PResult<Handle<Node>> {
        let op = match self.peek() {
            Some(Token::IncOp) => Operator::PreIncrement,
            Some(Token::DecOp) => Operator::PreDecrement,
            Some(Token::Plus) => Operator::Positive,
            Some(Token::Dash) => Operator::Negative,
            Some(Token::Bang) => Operator::LogicalNot,
            Some(Token::Tilde) => Operator::BitwiseNot,
            _ => return self.postfix_expression(),
        };
        let (_, loc, word) = self.advance()?;
        if op == Operator::BitwiseNot {
            self.cx.es3_only(loc, word, "bit-wise operator");
        }
        let operand = self.unary_expression()?;
        if op.is_increment() {
            self.cx.check_lvalue(loc, word, operand);
        }
        match self.cx.ast.add_unary_math(op, operand, loc) {
            Ok(node) => Ok(node),
            Err(err) => {
                self.cx.diags.error_at(loc, err.to_string());
                Ok(operand)
            }
        }
    }

    fn postfix_expression(&mut self) -> PResult<Handle<Node>> {
        let mut expr = self.primary_expression()?;
        loop {
            match self.peek() {
                Some(Token::LeftBracket) => {
                    let loc = self.expect(Token::LeftBracket)?;
                    let index = self.expression()?;
                    self.expect(Token::RightBracket)?;
                    expr = self.cx.index(loc, expr, index);
                }
                Some(Token::Dot) => {
                    let dot_loc = self.expect(Token::Dot)?;
                    let (field, field_loc) = self.expect_identifier()?;
                    if field == "length" && self.at(Token::LeftParen) {
                        self.expect(Token::LeftParen)?;
                        self.expect(Token::RightParen)?;
                        expr = self.cx.array_length(field_loc, expr);
                    } else {
                        expr = self.cx.field_selection(dot_loc, expr, field, field_loc);
                    }
                }
                Some(Token::IncOp | Token::DecOp) => {
                    let (token, loc, word) = self.advance()?;
                    let op = if token == Token::IncOp {
                        Operator::PostIncrement
                    } else {
                        Operator::PostDecrement
                    };
                    self.cx.check_lvalue(loc, word, expr);
                    expr = match self.cx.ast.add_unary_math(op, expr, loc) {
                        Ok(node) => node,
                        Err(err) => {
                            self.cx.diags.error_at(loc, err.to_string());
                            expr
                        }
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary_expression(&mut self) -> PResult<Handle<Node>> {
        let loc = self.loc();
        match self.peek() {
            Some(Token::Identifier) => {
                let (name, _) = self.expect_identifier()?;
                if !self.at(Token::LeftParen) {
                    return Ok(self.cx.variable_reference(loc, name));
                }
                let args = self.call_arguments()?;
                Ok(match self.cx.struct_type_named(name) {
                    Some(ty) => self.cx.constructor(loc, ty, args),
                    None => self.cx.function_call(loc, name, args),
                })
            }
            Some(Token::Type(kw)) => {
                self.pos += 1;
                let mut ty = keyword_type(kw);
                if self.at(Token::LeftBracket) {
                    let bracket = self.expect(Token::LeftBracket)?;
                    self.cx.es3_only(bracket, "[", "array constructor");
                    let size = if self.at(Token::RightBracket) {
                        None
                    } else {
                        Some(self.conditional_expression()?)
                    };
                    self.expect(Token::RightBracket)?;
                    let args = self.call_arguments()?;
                    let size = match size {
                        Some(node) => self.cx.array_size(bracket, node),
                        None => u32::try_from(args.len()).unwrap_or(u32::MAX),
                    };
                    ty.array_size = Some(size);
                    return Ok(self.cx.constructor(loc, ty, args));
                }
                let args = self.call_arguments()?;
                Ok(self.cx.constructor(loc, ty, args))
            }
            Some(Token::IntConstant) => {
                let (_, loc, word) = self.advance()?;
                Ok(self.int_literal(loc, word))
            }
            Some(Token::FloatConstant) => {
                let (_, loc, word) = self.advance()?;
                Ok(self.float_literal(loc, word))
            }
            Some(Token::True | Token::False) => {
                let (token, loc, _) = self.advance()?;
                Ok(self.cx.bool_constant(token == Token::True, loc))
            }
            Some(Token::LeftParen) => {
                self.pos += 1;
                let expr = self.expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// `( args )`, accepting `(void)` for an empty list.
    fn call_arguments(&mut self) -> PResult<Vec<Handle<Node>>> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        let void_only = matches!(
            self.peek(),
            Some(Token::Type(TypeKeyword {
                basic: BasicType::Void,
                ..
            }))
        ) && self.peek_at(1) == Some(Token::RightParen);
        if void_only {
            self.pos += 1;
        } else if !self.at(Token::RightParen) {
            loop {
                args.push(self.assignment_expression()?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RightParen)?;
        Ok(args)
    }

    fn int_literal(&mut self, loc: SourceLoc, text: &str) -> Handle<Node> {
        let (value, unsigned, overflowed) = match parse_int(text) {
            Some((value, unsigned)) => (value, unsigned, false),
            None => {
                self.cx.warning(loc, "Integer overflow", text, "");
                (u32::MAX, text.ends_with(['u', 'U']), true)
            }
        };
        if unsigned {
            self.cx.es3_only(loc, text, "unsigned integer literal");
            return self.cx.ast.add_constant(
                vec![ConstantUnion::UInt(value)],
                Type::scalar(BasicType::UInt),
                loc,
            );
        }
        let decimal = !text.starts_with('0') || text == "0";
        let value = if decimal && value > i32::MAX as u32 {
            if !overflowed {
                self.cx.warning(loc, "Integer overflow", text, "");
            }
            i32::MAX
        } else {
            value as i32
        };
        self.cx.ast.add_constant(
            vec![ConstantUnion::Int(value)],
            Type::scalar(BasicType::Int),
            loc,
        )
    }

    fn float_literal(&mut self, loc: SourceLoc, text: &str) -> Handle<Node> {
        let digits = text.trim_end_matches(['f', 'F']);
        if digits.len() != text.len() && self.cx.version < 300 {
            self.cx.error(
                loc,
                "Floating-point suffix unsupported prior to GLSL ES 3.00",
                text,
                "",
            );
        }
        let mut value = digits.parse::<f32>().unwrap_or(f32::MAX);
        if value.is_infinite() {
            self.cx.warning(loc, "Float overflow", text, "");
            value = f32::MAX;
        }
        self.cx.ast.add_constant(
            vec![ConstantUnion::Float(value)],
            Type::scalar(BasicType::Float),
            loc,
        )
    }
}

/// The type a built-in type keyword names, before qualification.
fn keyword_type(kw: TypeKeyword) -> Type {
    Type::new(
        kw.basic,
        Precision::Undefined,
        Qualifier::Temporary,
        kw.primary,
        kw.secondary,
    )
}

/// Parses an integer literal: decimal, octal (leading `0`) or hex, with an
/// optional `u` suffix. `None` when the value does not fit 32 bits.
fn parse_int(text: &str) -> Option<(u32, bool)> {
    let unsigned = text.ends_with(['u', 'U']);
    let digits = text.trim_end_matches(['u', 'U']);
    let (digits, radix) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (&digits[1..], 8)
    } else {
        (digits, 10)
    };
    let value = u64::from_str_radix(digits, radix).ok()?;
    u32::try_from(value).ok().map(|v| (v, unsigned))
}

/// Binary operator precedence (higher binds tighter), operator, and whether
/// it is an ESSL 3.00 bit-wise operator.
fn binary_operator(token: Token) -> Option<(u8, Operator, bool)> {
    Some(match token {
        Token::OrOp => (1, Operator::LogicalOr, false),
        Token::XorOp => (2, Operator::LogicalXor, false),
        Token::AndOp => (3, Operator::LogicalAnd, false),
        Token::VerticalBar => (4, Operator::BitwiseOr, true),
        Token::Caret => (5, Operator::BitwiseXor, true),
        Token::Ampersand => (6, Operator::BitwiseAnd, true),
        Token::EqOp => (7, Operator::Equal, false),
        Token::NeOp => (7, Operator::NotEqual, false),
        Token::LeftAngle => (8, Operator::LessThan, false),
        Token::RightAngle => (8, Operator::GreaterThan, false),
        Token::LeOp => (8, Operator::LessThanEqual, false),
        Token::GeOp => (8, Operator::GreaterThanEqual, false),
        Token::LeftOp => (9, Operator::BitShiftLeft, true),
        Token::RightOp => (9, Operator::BitShiftRight, true),
        Token::Plus => (10, Operator::Add, false),
        Token::Dash => (10, Operator::Sub, false),
        Token::Star => (11, Operator::Mul, false),
        Token::Slash => (11, Operator::Div, false),
        Token::Percent => (11, Operator::IMod, true),
        _ => return None,
    })
}

fn assignment_operator(token: Token) -> Option<(Operator, bool)> {
    Some(match token {
        Token::Equal => (Operator::Assign, false),
        Token::MulAssign => (Operator::MulAssign, false),
        Token::DivAssign => (Operator::DivAssign, false),
        Token::AddAssign => (Operator::AddAssign, false),
        Token::SubAssign => (Operator::SubAssign, false),
        Token::ModAssign => (Operator::IModAssign, true),
        Token::LeftAssign => (Operator::BitShiftLeftAssign, true),
        Token::RightAssign => (Operator::BitShiftRightAssign, true),
        Token::AndAssign => (Operator::BitwiseAndAssign, true),
        Token::XorAssign => (Operator::BitwiseXorAssign, true),
        Token::OrAssign => (Operator::BitwiseOrAssign, true),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_literal_radixes() {
        assert_eq!(parse_int("42"), Some((42, false)));
        assert_eq!(parse_int("0x1F"), Some((31, false)));
        assert_eq!(parse_int("017"), Some((15, false)));
        assert_eq!(parse_int("7u"), Some((7, true)));
        assert_eq!(parse_int("0"), Some((0, false)));
        assert_eq!(parse_int("0xFFFFFFFF"), Some((u32::MAX, false)));
        assert_eq!(parse_int("4294967296"), None);
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        let (add, ..) = binary_operator(Token::Plus).unwrap();
        let (mul, ..) = binary_operator(Token::Star).unwrap();
        let (or, ..) = binary_operator(Token::OrOp).unwrap();
        assert!(mul > add && add > or);
        assert!(binary_operator(Token::Percent).unwrap().2);
    }
}
