//! Directive handling and macro expansion.
//!
//! Runs before lexing. Source fragments are joined, comments are removed,
//! and every `#` line is interpreted: `#version`, `#extension` and
//! `#pragma` are recorded for the parser, conditionals and macros are
//! resolved in place. The result is plain text plus a per-line map back to
//! the original fragment and line number.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use glslt_ast::{Diagnostics, ShaderStage, SourceLoc};

use crate::ParseOptions;

/// Requested behavior of an extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Behavior {
    Require,
    Enable,
    Warn,
    Disable,
    /// Supported but never mentioned by the shader.
    #[default]
    Undefined,
}

impl Behavior {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "require" => Some(Self::Require),
            "enable" => Some(Self::Enable),
            "warn" => Some(Self::Warn),
            "disable" => Some(Self::Disable),
            _ => None,
        }
    }

    /// Whether code may use the extension's symbols.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Require | Self::Enable | Self::Warn)
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Require => "require",
            Self::Enable => "enable",
            Self::Warn => "warn",
            Self::Disable => "disable",
            Self::Undefined => "undefined",
        })
    }
}

/// Settings from `#pragma` lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pragma {
    pub optimize: bool,
    pub debug: bool,
    /// `#pragma STDGL invariant(all)`
    pub invariant_all: bool,
}

impl Default for Pragma {
    fn default() -> Self {
        Self {
            optimize: true,
            debug: false,
            invariant_all: false,
        }
    }
}

/// Preprocessed source ready for the lexer.
#[derive(Clone, Debug, Default)]
pub struct Preprocessed {
    pub text: String,
    /// Location of every line of `text`.
    pub lines: Vec<SourceLoc>,
    pub version: u32,
    pub extensions: BTreeMap<String, Behavior>,
    pub pragma: Pragma,
}

#[derive(Clone, Debug, PartialEq)]
struct Macro {
    /// `None` for object-like macros.
    params: Option<Vec<String>>,
    body: String,
    predefined: bool,
}

#[derive(Clone, Copy, Debug)]
struct Conditional {
    parent_active: bool,
    /// Some branch of this group was (or is being) taken.
    taken: bool,
    active: bool,
    seen_else: bool,
}

/// Joins the fragments and strips comments, keeping one entry per line.
fn strip_comments(sources: &[&str], diags: &mut Diagnostics) -> Vec<(SourceLoc, String)> {
    let mut lines = Vec::new();
    let mut in_block = false;
    let mut last = SourceLoc::default();
    for (file, source) in sources.iter().enumerate() {
        let file = u32::try_from(file).unwrap_or(u32::MAX);
        for (index, raw) in source.split('\n').enumerate() {
            let loc = SourceLoc::new(file, u32::try_from(index + 1).unwrap_or(u32::MAX));
            last = loc;
            let mut out = String::with_capacity(raw.len());
            let mut rest = raw.trim_end_matches('\r');
            while !rest.is_empty() {
                if in_block {
                    match rest.find("*/") {
                        Some(end) => {
                            rest = &rest[end + 2..];
                            in_block = false;
                            out.push(' ');
                        }
                        None => rest = "",
                    }
                    continue;
                }
                let line_comment = rest.find("//");
                let block_comment = rest.find("/*");
                match (line_comment, block_comment) {
                    (Some(l), Some(b)) if l < b => {
                        out.push_str(&rest[..l]);
                        rest = "";
                    }
                    (Some(l), None) => {
                        out.push_str(&rest[..l]);
                        rest = "";
                    }
                    (_, Some(b)) => {
                        out.push_str(&rest[..b]);
                        rest = &rest[b + 2..];
                        in_block = true;
                    }
                    (None, None) => {
                        out.push_str(rest);
                        rest = "";
                    }
                }
            }
            lines.push((loc, out));
        }
    }
    if in_block {
        diags.error(last, "unexpected end of file found in comment", "", "");
    }
    lines
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// End of the numeric literal starting at `start`.
fn number_end(bytes: &[u8], start: usize) -> usize {
    let hex = bytes.get(start) == Some(&b'0') && matches!(bytes.get(start + 1), Some(b'x' | b'X'));
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i];
        let exponent_sign =
            matches!(c, b'+' | b'-') && !hex && i > start && matches!(bytes[i - 1], b'e' | b'E');
        if is_ident_char(c) || c == b'.' || exponent_sign {
            i += 1;
        } else {
            break;
        }
    }
    i
}

struct Preprocessor<'a> {
    options: &'a ParseOptions,
    diags: &'a mut Diagnostics,
    macros: HashMap<String, Macro>,
    conditionals: Vec<Conditional>,
    out: Preprocessed,
    version_seen: bool,
    content_seen: bool,
    line_offset: i64,
    file_override: Option<u32>,
}

impl<'a> Preprocessor<'a> {
    fn new(options: &'a ParseOptions, diags: &'a mut Diagnostics) -> Self {
        let mut macros = HashMap::new();
        let mut predefine = |name: &str| {
            macros.insert(
                name.to_string(),
                Macro {
                    params: None,
                    body: "1".to_string(),
                    predefined: true,
                },
            );
        };
        predefine("GL_ES");
        if options.resources.fragment_precision_high {
            predefine("GL_FRAGMENT_PRECISION_HIGH");
        }
        let mut extensions = BTreeMap::new();
        for (name, available) in options.resources.extensions() {
            if available {
                predefine(name);
                extensions.insert(name.to_string(), Behavior::Undefined);
            }
        }
        Self {
            options,
            diags,
            macros,
            conditionals: Vec::new(),
            out: Preprocessed {
                version: 100,
                extensions,
                ..Preprocessed::default()
            },
            version_seen: false,
            content_seen: false,
            line_offset: 0,
            file_override: None,
        }
    }

    fn active(&self) -> bool {
        self.conditionals.last().is_none_or(|c| c.active)
    }

    fn map_loc(&self, raw: SourceLoc) -> SourceLoc {
        let line = (i64::from(raw.line) + self.line_offset).clamp(0, i64::from(u32::MAX));
        SourceLoc::new(
            self.file_override.unwrap_or(raw.file),
            u32::try_from(line).unwrap_or(0),
        )
    }

    fn run(mut self, sources: &[&str]) -> Preprocessed {
        let lines = strip_comments(sources, self.diags);
        let mut current_file = None;
        for (raw_loc, line) in lines {
            if current_file != Some(raw_loc.file) {
                current_file = Some(raw_loc.file);
                self.line_offset = 0;
                self.file_override = None;
            }
            let loc = self.map_loc(raw_loc);
            let trimmed = line.trim_start();
            let text = if let Some(directive) = trimmed.strip_prefix('#') {
                self.directive(directive, raw_loc, loc);
                String::new()
            } else if self.active() {
                if !trimmed.is_empty() {
                    self.content_seen = true;
                }
                let mut expanding = Vec::new();
                self.expand(&line, loc, &mut expanding)
            } else {
                String::new()
            };
            self.out.lines.push(loc);
            self.out.text.push_str(&text);
            self.out.text.push('\n');
        }
        if !self.conditionals.is_empty() {
            let loc = self.out.lines.last().copied().unwrap_or_default();
            self.diags
                .error(loc, "unexpected end of file found in conditional block", "", "");
        }
        log::debug!(
            "preprocessed {} lines, version {}",
            self.out.lines.len(),
            self.out.version
        );
        self.out
    }

    fn directive(&mut self, text: &str, raw_loc: SourceLoc, loc: SourceLoc) {
        let (name, rest) = split_word(text);
        match name {
            "ifdef" | "ifndef" => {
                let (macro_name, _) = split_word(rest);
                let defined = self.macros.contains_key(macro_name);
                self.push_conditional(defined == (name == "ifdef"));
                return;
            }
            "if" => {
                let value = self.active() && self.evaluate(rest, loc) != 0;
                self.push_conditional(value);
                return;
            }
            "elif" => {
                let evaluate = self
                    .conditionals
                    .last()
                    .is_some_and(|c| c.parent_active && !c.taken && !c.seen_else);
                let value = evaluate && self.evaluate(rest, loc) != 0;
                match self.conditionals.last_mut() {
                    None => self.diags.error(loc, "unexpected #elif found", "#elif", ""),
                    Some(c) if c.seen_else => {
                        self.diags.error(loc, "#elif after #else", "#elif", "");
                        c.active = false;
                    }
                    Some(c) => {
                        c.active = c.parent_active && !c.taken && value;
                        c.taken |= c.active;
                    }
                }
                return;
            }
            "else" => {
                match self.conditionals.last_mut() {
                    None => self.diags.error(loc, "unexpected #else found", "#else", ""),
                    Some(c) if c.seen_else => {
                        self.diags.error(loc, "#else after #else", "#else", "");
                        c.active = false;
                    }
                    Some(c) => {
                        c.seen_else = true;
                        c.active = c.parent_active && !c.taken;
                        c.taken = true;
                    }
                }
                return;
            }
            "endif" => {
                if self.conditionals.pop().is_none() {
                    self.diags.error(loc, "unexpected #endif found", "#endif", "");
                }
                return;
            }
            _ => {}
        }
        if !self.active() {
            return;
        }
        match name {
            "" => {}
            "version" => self.version(rest, loc),
            "define" => self.define(rest, loc),
            "undef" => self.undef(rest, loc),
            "extension" => self.extension(rest, loc),
            "pragma" => self.pragma(rest, loc),
            "error" => self
                .diags
                .error_at(loc, format!("'#error' : {}", rest.trim())),
            "line" => self.line(rest, raw_loc, loc),
            other => self
                .diags
                .error(loc, "invalid directive name", other, ""),
        }
        if name != "version" {
            self.content_seen = true;
        }
    }

    fn push_conditional(&mut self, value: bool) {
        let parent_active = self.active();
        let active = parent_active && value;
        self.conditionals.push(Conditional {
            parent_active,
            taken: active || !parent_active,
            active,
            seen_else: false,
        });
    }

    fn version(&mut self, rest: &str, loc: SourceLoc) {
        if self.version_seen || self.content_seen {
            self.diags.error(
                loc,
                "#version directive must occur before anything else in the program",
                "#version",
                "",
            );
            return;
        }
        self.version_seen = true;
        let mut words = rest.split_whitespace();
        let Some(number) = words.next() else {
            self.diags.error(loc, "invalid version number", "", "");
            return;
        };
        let Ok(version) = number.parse::<u32>() else {
            self.diags.error(loc, "invalid version number", number, "");
            return;
        };
        let profile = words.next();
        match (version, profile) {
            (100, None) | (300, Some("es")) => {}
            (100 | 300, _) => {
                self.diags
                    .error(loc, "invalid version directive", "#version", "");
                return;
            }
            _ => {
                self.diags
                    .error(loc, "version number not supported", number, "");
                return;
            }
        }
        if words.next().is_some() {
            self.diags
                .error(loc, "invalid version directive", "#version", "");
            return;
        }
        self.out.version = version;
    }

    fn define(&mut self, rest: &str, loc: SourceLoc) {
        let (name, after) = split_word(rest);
        if name.is_empty() {
            self.diags.error(loc, "invalid macro name", rest.trim(), "");
            return;
        }
        if name.starts_with("GL_") {
            self.diags.error(loc, "macro name is reserved", name, "");
            return;
        }
        if name.contains("__") {
            self.diags.warning(
                loc,
                "macro name with a double underscore is reserved - unintented behavior is possible",
                name,
                "",
            );
        }
        // function-like only when `(` follows the name immediately
        let (params, body) = match after.strip_prefix('(') {
            Some(list) => {
                let Some(close) = list.find(')') else {
                    self.diags.error(loc, "unexpected end of macro parameter list", name, "");
                    return;
                };
                let params: Vec<String> = list[..close]
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                (Some(params), list[close + 1..].trim())
            }
            None => (None, after.trim()),
        };
        let definition = Macro {
            params,
            body: body.to_string(),
            predefined: false,
        };
        match self.macros.get(name) {
            Some(existing) if existing.predefined => {
                self.diags.error(loc, "predefined macro redefined", name, "");
            }
            Some(existing) if *existing != definition => {
                self.diags.error(loc, "macro redefined", name, "");
            }
            _ => {
                self.macros.insert(name.to_string(), definition);
            }
        }
    }

    fn undef(&mut self, rest: &str, loc: SourceLoc) {
        let (name, _) = split_word(rest);
        match self.macros.get(name) {
            Some(existing) if existing.predefined => {
                self.diags.error(loc, "predefined macro undefined", name, "");
            }
            _ => {
                self.macros.remove(name);
            }
        }
    }

    fn extension(&mut self, rest: &str, loc: SourceLoc) {
        let Some((name, behavior)) = rest.split_once(':') else {
            self.diags
                .error(loc, "invalid extension directive", "#extension", "");
            return;
        };
        let (name, behavior) = (name.trim(), behavior.trim());
        let Some(value) = Behavior::parse(behavior) else {
            self.diags.error(loc, "behavior", name, "invalid");
            return;
        };
        if self.out.version >= 300 && self.content_seen {
            self.diags.error(
                loc,
                "extension directive must occur before any non-preprocessor tokens in ESSL3",
                "#extension",
                "",
            );
        }
        if name == "all" {
            match value {
                Behavior::Require => {
                    self.diags
                        .error(loc, "extension", name, "cannot have 'require' behavior");
                }
                Behavior::Enable => {
                    self.diags
                        .error(loc, "extension", name, "cannot have 'enable' behavior");
                }
                _ => {
                    for slot in self.out.extensions.values_mut() {
                        *slot = value;
                    }
                }
            }
            return;
        }
        match self.out.extensions.get_mut(name) {
            Some(slot) => *slot = value,
            None if value == Behavior::Require => {
                self.diags.error(loc, "extension", name, "is not supported");
            }
            None => self.diags.warning(loc, "extension", name, "is not supported"),
        }
    }

    fn pragma(&mut self, rest: &str, loc: SourceLoc) {
        let mut rest = rest.trim();
        let stdgl = match rest.strip_prefix("STDGL") {
            Some(after) => {
                rest = after.trim();
                true
            }
            None => false,
        };
        let (name, after) = split_word(rest);
        let value = after
            .trim()
            .strip_prefix('(')
            .and_then(|v| v.strip_suffix(')'))
            .map(str::trim)
            .unwrap_or("");

        if stdgl {
            if name == "invariant" && value == "all" {
                if self.out.version >= 300 && self.options.stage == ShaderStage::Fragment {
                    self.diags.error(
                        loc,
                        "#pragma STDGL invariant(all) can not be used in fragment shader",
                        name,
                        "",
                    );
                } else {
                    self.out.pragma.invariant_all = true;
                }
            }
            // other STDGL pragmas are reserved and ignored
            return;
        }

        let slot = match name {
            "optimize" => &mut self.out.pragma.optimize,
            "debug" => &mut self.out.pragma.debug,
            _ => {
                self.diags.warning(loc, "unrecognized pragma", name, "");
                return;
            }
        };
        match value {
            "on" => *slot = true,
            "off" => *slot = false,
            _ => self
                .diags
                .error(loc, "invalid pragma value", value, "'on' or 'off' expected"),
        }
    }

    fn line(&mut self, rest: &str, raw_loc: SourceLoc, loc: SourceLoc) {
        let mut expanding = Vec::new();
        let expanded = self.expand(rest, loc, &mut expanding);
        let mut words = expanded.split_whitespace();
        let line = words.next().and_then(|w| w.parse::<i64>().ok());
        let file = words.next().map(|w| w.parse::<u32>().ok());
        match (line, file) {
            (Some(line), None | Some(Some(_))) => {
                // the line after the directive gets number `line`
                self.line_offset = line - (i64::from(raw_loc.line) + 1);
                if let Some(Some(file)) = file {
                    self.file_override = Some(file);
                }
            }
            _ => self.diags.error(loc, "invalid line directive", "#line", ""),
        }
    }

    /// Expands macros in `text`. `expanding` holds the macros currently
    /// being expanded, which are not expanded again.
    fn expand(&mut self, text: &str, loc: SourceLoc, expanding: &mut Vec<String>) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if is_ident_start(c) {
                let start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                let word = &text[start..i];
                i = self.expand_word(word, text, i, loc, expanding, &mut out);
            } else if c.is_ascii_digit()
                || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
            {
                let end = number_end(bytes, i);
                out.push_str(&text[i..end]);
                i = end;
            } else {
                let len = text[i..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&text[i..i + len]);
                i += len;
            }
        }
        out
    }

    /// Expands one identifier; returns the offset to continue scanning at.
    fn expand_word(
        &mut self,
        word: &str,
        text: &str,
        end: usize,
        loc: SourceLoc,
        expanding: &mut Vec<String>,
        out: &mut String,
    ) -> usize {
        match word {
            "__LINE__" => {
                out.push_str(&loc.line.to_string());
                return end;
            }
            "__FILE__" => {
                out.push_str(&loc.file.to_string());
                return end;
            }
            "__VERSION__" => {
                out.push_str(&self.out.version.to_string());
                return end;
            }
            _ => {}
        }
        let definition = match self.macros.get(word) {
            Some(m) if !expanding.iter().any(|e| e == word) => m.clone(),
            _ => {
                out.push_str(word);
                return end;
            }
        };

        let Some(params) = definition.params else {
            expanding.push(word.to_string());
            let body = self.expand(&definition.body, loc, expanding);
            expanding.pop();
            out.push_str(&body);
            return end;
        };

        let after = &text[end..];
        let Some(open) = after.find(|c: char| !c.is_whitespace()).filter(|&p| after[p..].starts_with('('))
        else {
            // a function-like macro name without arguments is left alone
            out.push_str(word);
            return end;
        };
        let Some((args, consumed)) = split_macro_args(&after[open + 1..]) else {
            self.diags
                .error(loc, "unexpected end of file found in macro invocation", word, "");
            return text.len();
        };
        let no_args = params.is_empty() && args.len() == 1 && args[0].trim().is_empty();
        if !no_args && args.len() != params.len() {
            let reason = if args.len() < params.len() {
                "Not enough arguments for macro"
            } else {
                "Too many arguments for macro"
            };
            self.diags.error(loc, reason, word, "");
            return end + open + 1 + consumed;
        }

        let expanded_args: Vec<String> = args
            .iter()
            .map(|arg| self.expand(arg.trim(), loc, expanding))
            .collect();
        let substituted = substitute(&definition.body, &params, &expanded_args);
        expanding.push(word.to_string());
        let body = self.expand(&substituted, loc, expanding);
        expanding.pop();
        out.push_str(&body);
        end + open + 1 + consumed
    }

    /// Evaluates a `#if`/`#elif` expression.
    fn evaluate(&mut self, expr: &str, loc: SourceLoc) -> i64 {
        let resolved = self.resolve_defined(expr);
        let mut expanding = Vec::new();
        let expanded = self.expand(&resolved, loc, &mut expanding);
        let tokens = match cond_tokens(&expanded) {
            Ok(tokens) => tokens,
            Err(token) => {
                self.diags.error(
                    loc,
                    "unexpected token in preprocessor conditional",
                    &token,
                    "",
                );
                return 0;
            }
        };
        let mut parser = CondParser {
            tokens: &tokens,
            pos: 0,
            error: None,
        };
        let value = parser.binary(0);
        if parser.error.is_none() && parser.pos < tokens.len() {
            parser.error = Some(("unexpected token in preprocessor conditional", tokens[parser.pos].to_string()));
        }
        if tokens.is_empty() {
            parser.error = Some(("invalid expression in preprocessor conditional", String::new()));
        }
        match parser.error {
            Some((reason, token)) => {
                self.diags.error(loc, reason, &token, "");
                0
            }
            None => value,
        }
    }

    /// Replaces `defined X` and `defined(X)` with `1` or `0`.
    fn resolve_defined(&self, expr: &str) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;
        while let Some(pos) = find_word(rest, "defined") {
            out.push_str(&rest[..pos]);
            let after = rest[pos + "defined".len()..].trim_start();
            let (name, tail) = match after.strip_prefix('(') {
                Some(inner) => {
                    let (name, tail) = split_word(inner);
                    (name, tail.trim_start().strip_prefix(')').unwrap_or(tail))
                }
                None => split_word(after),
            };
            out.push_str(if self.macros.contains_key(name) { " 1 " } else { " 0 " });
            rest = tail;
        }
        out.push_str(rest);
        out
    }
}

/// Byte offset of `word` in `text` as a whole identifier.
fn find_word(text: &str, word: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(pos) = text[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let before_ok = start == 0 || !is_ident_char(bytes[start - 1]);
        let after_ok = end >= bytes.len() || !is_ident_char(bytes[end]);
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

/// Splits `a, (b, c))...` into top-level arguments; returns them with the
/// number of bytes consumed up to and including the closing parenthesis.
fn split_macro_args(text: &str) -> Option<(Vec<&str>, usize)> {
    let mut depth = 0usize;
    let mut args = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                args.push(&text[start..i]);
                return Some((args, i + 1));
            }
            ')' => depth -= 1,
            ',' if depth == 0 => {
                args.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    None
}

fn substitute(body: &str, params: &[String], args: &[String]) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < bytes.len() {
        if is_ident_start(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            let word = &body[start..i];
            match params.iter().position(|p| p == word) {
                Some(index) => out.push_str(args.get(index).map_or("", String::as_str)),
                None => out.push_str(word),
            }
        } else if bytes[i].is_ascii_digit() {
            let end = number_end(bytes, i);
            out.push_str(&body[i..end]);
            i = end;
        } else {
            let len = body[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&body[i..i + len]);
            i += len;
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
enum CondToken {
    Number(i64),
    Op(&'static str),
}

impl fmt::Display for CondToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Op(op) => f.write_str(op),
        }
    }
}

const COND_OPS: &[&str] = &[
    "||", "&&", "==", "!=", "<=", ">=", "<<", ">>", "|", "^", "&", "<", ">", "+", "-", "*",
    "/", "%", "!", "~", "(", ")",
];

/// Tokenizes an expanded conditional; an unknown token is returned as `Err`.
fn cond_tokens(text: &str) -> Result<Vec<CondToken>, String> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    'scan: while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let end = number_end(bytes, i);
            tokens.push(CondToken::Number(parse_int_literal(&text[i..end])?));
            i = end;
            continue;
        }
        for op in COND_OPS {
            if text[i..].starts_with(op) {
                tokens.push(CondToken::Op(*op));
                i += op.len();
                continue 'scan;
            }
        }
        let end = if is_ident_start(c) {
            let mut end = i;
            while end < bytes.len() && is_ident_char(bytes[end]) {
                end += 1;
            }
            end
        } else {
            i + text[i..].chars().next().map_or(1, char::len_utf8)
        };
        return Err(text[i..end].to_string());
    }
    Ok(tokens)
}

fn parse_int_literal(literal: &str) -> Result<i64, String> {
    let parsed = if let Some(hex) = literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if literal.len() > 1 && literal.starts_with('0') {
        i64::from_str_radix(&literal[1..], 8)
    } else {
        literal.parse::<i64>()
    };
    parsed.map_err(|_| literal.to_string())
}

struct CondParser<'t> {
    tokens: &'t [CondToken],
    pos: usize,
    error: Option<(&'static str, String)>,
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

impl CondParser<'_> {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(CondToken::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn binary(&mut self, min: u8) -> i64 {
        let mut left = self.unary();
        while let Some(op) = self.peek_op() {
            let Some(prec) = binary_precedence(op) else {
                break;
            };
            if prec <= min {
                break;
            }
            self.pos += 1;
            let right = self.binary(prec);
            left = self.apply(op, left, right);
        }
        left
    }

    fn apply(&mut self, op: &str, l: i64, r: i64) -> i64 {
        let b = |v: bool| i64::from(v);
        match op {
            "||" => b(l != 0 || r != 0),
            "&&" => b(l != 0 && r != 0),
            "|" => l | r,
            "^" => l ^ r,
            "&" => l & r,
            "==" => b(l == r),
            "!=" => b(l != r),
            "<" => b(l < r),
            ">" => b(l > r),
            "<=" => b(l <= r),
            ">=" => b(l >= r),
            "<<" => l.wrapping_shl(r as u32),
            ">>" => l.wrapping_shr(r as u32),
            "+" => l.wrapping_add(r),
            "-" => l.wrapping_sub(r),
            "*" => l.wrapping_mul(r),
            "/" | "%" if r == 0 => {
                if self.error.is_none() {
                    self.error = Some(("division by zero", op.to_string()));
                }
                0
            }
            "/" => l.wrapping_div(r),
            "%" => l.wrapping_rem(r),
            _ => 0,
        }
    }

    fn unary(&mut self) -> i64 {
        match self.tokens.get(self.pos).cloned() {
            Some(CondToken::Number(n)) => {
                self.pos += 1;
                n
            }
            Some(CondToken::Op("(")) => {
                self.pos += 1;
                let value = self.binary(0);
                if self.peek_op() == Some(")") {
                    self.pos += 1;
                } else if self.error.is_none() {
                    self.error = Some(("missing ')' in preprocessor conditional", "(".to_string()));
                }
                value
            }
            Some(CondToken::Op(op @ ("-" | "+" | "!" | "~"))) => {
                self.pos += 1;
                let value = self.unary();
                match op {
                    "-" => value.wrapping_neg(),
                    "!" => i64::from(value == 0),
                    "~" => !value,
                    _ => value,
                }
            }
            other => {
                if self.error.is_none() {
                    self.error = Some((
                        "unexpected token in preprocessor conditional",
                        other.map(|t| t.to_string()).unwrap_or_default(),
                    ));
                }
                self.pos += 1;
                0
            }
        }
    }
}

/// Runs directive handling and macro expansion over `sources`.
pub fn preprocess(sources: &[&str], options: &ParseOptions, diags: &mut Diagnostics) -> Preprocessed {
    Preprocessor::new(options, diags).run(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Preprocessed, Diagnostics) {
        let mut diags = Diagnostics::new();
        let options = ParseOptions::default();
        let out = preprocess(&[src], &options, &mut diags);
        (out, diags)
    }

    #[test]
    fn comments_keep_line_numbers() {
        let (out, diags) = run("a /* x\n y */ b\n// c\nd");
        assert!(!diags.has_errors());
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines, vec!["a ", "  b", "", "d"]);
        assert_eq!(out.lines[3], SourceLoc::new(0, 4));
    }

    #[test]
    fn unterminated_comment() {
        let (_, diags) = run("a /* never closed");
        assert_eq!(
            diags.info_log(),
            "ERROR: 0:1: '' : unexpected end of file found in comment\n"
        );
    }

    #[test]
    fn version_directive() {
        let (out, diags) = run("#version 300 es\nvoid main(){}");
        assert!(!diags.has_errors());
        assert_eq!(out.version, 300);

        let (_, diags) = run("void f();\n#version 100");
        assert!(diags.info_log().contains(
            "'#version' : #version directive must occur before anything else in the program"
        ));

        let (_, diags) = run("#version 110");
        assert!(diags.info_log().contains("'110' : version number not supported"));
    }

    #[test]
    fn object_and_function_macros() {
        let (out, diags) = run("#define N 4\n#define SQ(x) ((x) * (x))\nfloat a[N]; float b = SQ(N + 1.0);");
        assert!(!diags.has_errors(), "{}", diags.info_log());
        assert!(out.text.contains("float a[4];"));
        assert!(out.text.contains("((4 + 1.0) * (4 + 1.0))"));
    }

    #[test]
    fn recursive_macro_stops() {
        let (out, _) = run("#define A A + 1\nA");
        assert!(out.text.contains("A + 1"));
    }

    #[test]
    fn predefined_macros() {
        let (out, _) = run("#if GL_ES && __VERSION__ == 100\nyes\n#else\nno\n#endif");
        assert!(out.text.contains("yes"));
        assert!(!out.text.contains("no"));

        let (_, diags) = run("#define GL_ES 2");
        assert!(diags.info_log().contains("'GL_ES' : macro name is reserved"));
        let (_, diags) = run("#undef GL_ES");
        assert!(diags.info_log().contains("'GL_ES' : predefined macro undefined"));
    }

    #[test]
    fn conditionals() {
        let src = "#define A\n#ifdef A\none\n#elif 1\ntwo\n#else\nthree\n#endif\n#if defined(B) || 2 * 3 == 6\nfour\n#endif";
        let (out, diags) = run(src);
        assert!(!diags.has_errors());
        assert!(out.text.contains("one"));
        assert!(!out.text.contains("two"));
        assert!(!out.text.contains("three"));
        assert!(out.text.contains("four"));
    }

    #[test]
    fn conditional_errors() {
        let (_, diags) = run("#endif");
        assert!(diags.info_log().contains("unexpected #endif found"));
        let (_, diags) = run("#if 1 / 0\n#endif");
        assert!(diags.info_log().contains("'/' : division by zero"));
        let (_, diags) = run("#ifdef X\n");
        assert!(diags.info_log().contains("unexpected end of file found in conditional block"));
    }

    #[test]
    fn extension_behaviors() {
        let mut diags = Diagnostics::new();
        let mut options = ParseOptions::default();
        options.resources.oes_standard_derivatives = true;
        let out = preprocess(
            &["#extension GL_OES_standard_derivatives : enable\n#extension GL_foo : warn"],
            &options,
            &mut diags,
        );
        assert_eq!(
            out.extensions.get("GL_OES_standard_derivatives"),
            Some(&Behavior::Enable)
        );
        assert_eq!(diags.warning_count(), 1);
        assert!(!diags.has_errors());

        let (_, diags) = run("#extension GL_foo : require");
        assert!(diags.info_log().contains("'GL_foo' : extension is not supported"));
        let (_, diags) = run("#extension all : enable");
        assert!(diags.info_log().contains("'all' : extension cannot have 'enable' behavior"));
        let (_, diags) = run("#extension all : sometimes");
        assert!(diags.info_log().contains("'all' : behavior invalid"));
    }

    #[test]
    fn pragmas() {
        let (out, diags) = run("#pragma STDGL invariant(all)\n#pragma optimize(off)");
        assert!(!diags.has_errors());
        assert!(out.pragma.invariant_all);
        assert!(!out.pragma.optimize);

        let (_, diags) = run("#pragma debug(maybe)");
        assert!(diags.info_log().contains("'maybe' : invalid pragma value 'on' or 'off' expected"));
    }

    #[test]
    fn line_directive_renumbers() {
        let (out, _) = run("#line 10\na\n#line 20 3\nb");
        assert_eq!(out.lines[1], SourceLoc::new(0, 10));
        assert_eq!(out.lines[3], SourceLoc::new(3, 20));
    }

    #[test]
    fn fragments_number_separately() {
        let mut diags = Diagnostics::new();
        let out = preprocess(&["a\nb", "c"], &ParseOptions::default(), &mut diags);
        assert_eq!(out.lines, vec![SourceLoc::new(0, 1), SourceLoc::new(0, 2), SourceLoc::new(1, 1)]);
    }
}
