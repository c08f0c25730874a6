//! Tokenization of preprocessed shader text.
//!
//! Comments and directives are already gone by the time text reaches this
//! module (see [`crate::directives`]), so the lexer only has to recognise
//! keywords, operators, literals and identifiers. Which words are keywords
//! depends on the shading-language version; [`Lexeme::classify`] resolves
//! that after lexing.

use std::ops::Range;

use glslt_ast::{BasicType, Diagnostics, SourceLoc};
use logos::Logos;

use crate::ParseError;
use crate::directives::Preprocessed;

/// The shape named by a built-in type keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeKeyword {
    pub basic: BasicType,
    pub primary: u8,
    pub secondary: u8,
}

impl TypeKeyword {
    const fn new(basic: BasicType, primary: u8, secondary: u8) -> Self {
        Self {
            basic,
            primary,
            secondary,
        }
    }
}

/// Shader token.
#[derive(Logos, Clone, Copy, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n\f\x0B]+")]
pub enum Token {
    // storage, parameter and interpolation qualifiers
    #[token("attribute")]
    Attribute,
    #[token("const")]
    Const,
    #[token("uniform")]
    Uniform,
    #[token("varying")]
    Varying,
    #[token("in")]
    In,
    #[token("out")]
    Out,
    #[token("inout")]
    InOut,
    #[token("centroid")]
    Centroid,
    #[token("flat")]
    Flat,
    #[token("smooth")]
    Smooth,
    #[token("invariant")]
    Invariant,
    #[token("layout")]
    Layout,

    #[token("lowp")]
    Lowp,
    #[token("mediump")]
    Mediump,
    #[token("highp")]
    Highp,
    #[token("precision")]
    Precision,

    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("do")]
    Do,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("discard")]
    Discard,
    #[token("return")]
    Return,
    #[token("struct")]
    Struct,

    #[token("void", |_| TypeKeyword::new(BasicType::Void, 1, 1))]
    #[token("float", |_| TypeKeyword::new(BasicType::Float, 1, 1))]
    #[token("int", |_| TypeKeyword::new(BasicType::Int, 1, 1))]
    #[token("uint", |_| TypeKeyword::new(BasicType::UInt, 1, 1))]
    #[token("bool", |_| TypeKeyword::new(BasicType::Bool, 1, 1))]
    #[token("vec2", |_| TypeKeyword::new(BasicType::Float, 2, 1))]
    #[token("vec3", |_| TypeKeyword::new(BasicType::Float, 3, 1))]
    #[token("vec4", |_| TypeKeyword::new(BasicType::Float, 4, 1))]
    #[token("ivec2", |_| TypeKeyword::new(BasicType::Int, 2, 1))]
    #[token("ivec3", |_| TypeKeyword::new(BasicType::Int, 3, 1))]
    #[token("ivec4", |_| TypeKeyword::new(BasicType::Int, 4, 1))]
    #[token("uvec2", |_| TypeKeyword::new(BasicType::UInt, 2, 1))]
    #[token("uvec3", |_| TypeKeyword::new(BasicType::UInt, 3, 1))]
    #[token("uvec4", |_| TypeKeyword::new(BasicType::UInt, 4, 1))]
    #[token("bvec2", |_| TypeKeyword::new(BasicType::Bool, 2, 1))]
    #[token("bvec3", |_| TypeKeyword::new(BasicType::Bool, 3, 1))]
    #[token("bvec4", |_| TypeKeyword::new(BasicType::Bool, 4, 1))]
    #[token("mat2", |_| TypeKeyword::new(BasicType::Float, 2, 2))]
    #[token("mat3", |_| TypeKeyword::new(BasicType::Float, 3, 3))]
    #[token("mat4", |_| TypeKeyword::new(BasicType::Float, 4, 4))]
    #[token("mat2x2", |_| TypeKeyword::new(BasicType::Float, 2, 2))]
    #[token("mat2x3", |_| TypeKeyword::new(BasicType::Float, 2, 3))]
    #[token("mat2x4", |_| TypeKeyword::new(BasicType::Float, 2, 4))]
    #[token("mat3x2", |_| TypeKeyword::new(BasicType::Float, 3, 2))]
    #[token("mat3x3", |_| TypeKeyword::new(BasicType::Float, 3, 3))]
    #[token("mat3x4", |_| TypeKeyword::new(BasicType::Float, 3, 4))]
    #[token("mat4x2", |_| TypeKeyword::new(BasicType::Float, 4, 2))]
    #[token("mat4x3", |_| TypeKeyword::new(BasicType::Float, 4, 3))]
    #[token("mat4x4", |_| TypeKeyword::new(BasicType::Float, 4, 4))]
    #[token("sampler2D", |_| TypeKeyword::new(BasicType::Sampler2D, 1, 1))]
    #[token("sampler3D", |_| TypeKeyword::new(BasicType::Sampler3D, 1, 1))]
    #[token("samplerCube", |_| TypeKeyword::new(BasicType::SamplerCube, 1, 1))]
    #[token("sampler2DArray", |_| TypeKeyword::new(BasicType::Sampler2DArray, 1, 1))]
    #[token("samplerExternalOES", |_| TypeKeyword::new(BasicType::SamplerExternalOes, 1, 1))]
    #[token("sampler2DRect", |_| TypeKeyword::new(BasicType::Sampler2DRect, 1, 1))]
    #[token("isampler2D", |_| TypeKeyword::new(BasicType::ISampler2D, 1, 1))]
    #[token("isampler3D", |_| TypeKeyword::new(BasicType::ISampler3D, 1, 1))]
    #[token("isamplerCube", |_| TypeKeyword::new(BasicType::ISamplerCube, 1, 1))]
    #[token("isampler2DArray", |_| TypeKeyword::new(BasicType::ISampler2DArray, 1, 1))]
    #[token("usampler2D", |_| TypeKeyword::new(BasicType::USampler2D, 1, 1))]
    #[token("usampler3D", |_| TypeKeyword::new(BasicType::USampler3D, 1, 1))]
    #[token("usamplerCube", |_| TypeKeyword::new(BasicType::USamplerCube, 1, 1))]
    #[token("usampler2DArray", |_| TypeKeyword::new(BasicType::USampler2DArray, 1, 1))]
    #[token("sampler2DShadow", |_| TypeKeyword::new(BasicType::Sampler2DShadow, 1, 1))]
    #[token("samplerCubeShadow", |_| TypeKeyword::new(BasicType::SamplerCubeShadow, 1, 1))]
    #[token("sampler2DArrayShadow", |_| TypeKeyword::new(BasicType::Sampler2DArrayShadow, 1, 1))]
    Type(TypeKeyword),

    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?[fF]?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?[fF]?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+[fF]?")]
    FloatConstant,
    #[regex(r"[0-9]+[uU]?")]
    #[regex(r"0[xX][0-9a-fA-F]+[uU]?")]
    IntConstant,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[token("<<=")]
    LeftAssign,
    #[token(">>=")]
    RightAssign,
    #[token("<<")]
    LeftOp,
    #[token(">>")]
    RightOp,
    #[token("++")]
    IncOp,
    #[token("--")]
    DecOp,
    #[token("<=")]
    LeOp,
    #[token(">=")]
    GeOp,
    #[token("==")]
    EqOp,
    #[token("!=")]
    NeOp,
    #[token("&&")]
    AndOp,
    #[token("||")]
    OrOp,
    #[token("^^")]
    XorOp,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("+=")]
    AddAssign,
    #[token("%=")]
    ModAssign,
    #[token("-=")]
    SubAssign,
    #[token("&=")]
    AndAssign,
    #[token("^=")]
    XorAssign,
    #[token("|=")]
    OrAssign,

    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Equal,
    #[token(";")]
    Semicolon,
    #[token("!")]
    Bang,
    #[token("-")]
    Dash,
    #[token("~")]
    Tilde,
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    LeftAngle,
    #[token(">")]
    RightAngle,
    #[token("|")]
    VerticalBar,
    #[token("^")]
    Caret,
    #[token("&")]
    Ampersand,
    #[token("?")]
    Question,
}

/// How a lexed word behaves under the active language version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Keyword,
    /// A keyword of a later version, treated as an ordinary name.
    Identifier,
    /// Reserved for future use; any appearance is an error.
    Reserved,
}

/// Words reserved in every version.
const RESERVED_WORDS: &[&str] = &[
    "asm", "class", "union", "enum", "typedef", "template", "this", "packed", "goto", "inline",
    "noinline", "volatile", "public", "static", "extern", "external", "interface", "long",
    "short", "double", "half", "fixed", "unsigned", "superp", "input", "output", "hvec2",
    "hvec3", "hvec4", "dvec2", "dvec3", "dvec4", "fvec2", "fvec3", "fvec4", "sampler1D",
    "sampler1DShadow", "sampler2DRectShadow", "sampler3DRect", "sizeof", "cast", "namespace",
    "using",
];

/// Additional words reserved in ESSL 3.00.
const RESERVED_WORDS_ES3: &[&str] = &[
    "coherent", "restrict", "readonly", "writeonly", "resource", "atomic_uint",
    "noperspective", "patch", "sample", "subroutine", "common", "partition", "active",
    "filter", "image1D", "image2D", "image3D", "imageCube", "iimage1D", "iimage2D",
    "iimage3D", "iimageCube", "uimage1D", "uimage2D", "uimage3D", "uimageCube",
    "isampler1D", "usampler1D", "sampler1DArray", "sampler1DArrayShadow", "samplerBuffer",
    "isamplerBuffer", "usamplerBuffer", "isampler1DArray", "usampler1DArray", "dmat2",
    "dmat3", "dmat4",
];

/// One token with its byte span in the preprocessed text and its location.
#[derive(Clone, Debug, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Range<usize>,
    pub loc: SourceLoc,
}

impl Lexeme {
    /// Resolves version-dependent keywords.
    pub fn classify(&self, text: &str, version: u32) -> Class {
        let es3 = version >= 300;
        match self.token {
            Token::Identifier => {
                if RESERVED_WORDS.contains(&text) || (es3 && RESERVED_WORDS_ES3.contains(&text)) {
                    Class::Reserved
                } else {
                    Class::Identifier
                }
            }
            // keywords in ESSL 1.00, reserved in ESSL 3.00
            Token::Attribute | Token::Varying if es3 => Class::Reserved,
            // keywords in ESSL 3.00, reserved in ESSL 1.00
            Token::Switch | Token::Default if !es3 => Class::Reserved,
            Token::Type(TypeKeyword {
                basic: BasicType::Sampler3D | BasicType::Sampler2DShadow,
                ..
            }) if !es3 => Class::Reserved,
            // keywords in ESSL 3.00, plain names in ESSL 1.00
            Token::Layout | Token::Centroid | Token::Flat | Token::Smooth | Token::Case
                if !es3 =>
            {
                Class::Identifier
            }
            Token::Type(kw) if !es3 && is_es3_type(kw, text) => Class::Identifier,
            _ => Class::Keyword,
        }
    }
}

fn is_es3_type(kw: TypeKeyword, text: &str) -> bool {
    let es3_sampler = matches!(
        kw.basic,
        BasicType::Sampler2DArray
            | BasicType::ISampler2D
            | BasicType::ISampler3D
            | BasicType::ISamplerCube
            | BasicType::ISampler2DArray
            | BasicType::USampler2D
            | BasicType::USampler3D
            | BasicType::USamplerCube
            | BasicType::USampler2DArray
            | BasicType::SamplerCubeShadow
            | BasicType::Sampler2DArrayShadow
    );
    // `mat2x2` and friends are ES3 spellings even when square
    let sized_matrix = text.len() == 6 && text.starts_with("mat");
    kw.basic == BasicType::UInt || es3_sampler || sized_matrix
}

/// Maps byte offsets of the preprocessed text to source locations.
struct LineIndex<'a> {
    starts: Vec<usize>,
    lines: &'a [SourceLoc],
}

impl<'a> LineIndex<'a> {
    fn new(pre: &'a Preprocessed) -> Self {
        let mut starts = vec![0];
        starts.extend(
            pre.text
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            lines: &pre.lines,
        }
    }

    fn loc(&self, offset: usize) -> SourceLoc {
        let line = self.starts.partition_point(|&start| start <= offset).saturating_sub(1);
        self.lines
            .get(line)
            .or(self.lines.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Splits preprocessed text into lexemes.
///
/// Stops at the first character that starts no token. Words longer than
/// `max_token_length` are reported but still produced.
pub fn tokenize(
    pre: &Preprocessed,
    max_token_length: usize,
    diags: &mut Diagnostics,
) -> Result<Vec<Lexeme>, ParseError> {
    let index = LineIndex::new(pre);
    let mut lexemes = Vec::new();
    let mut lexer = Token::lexer(&pre.text);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let loc = index.loc(span.start);
        let Ok(token) = result else {
            diags.error(loc, "invalid character", lexer.slice(), "");
            return Err(ParseError::Failed {
                errors: diags.error_count(),
            });
        };
        if span.len() > max_token_length {
            diags.error(loc, "token too long", lexer.slice(), "");
        }
        lexemes.push(Lexeme { token, span, loc });
    }
    log::debug!("lexed {} tokens", lexemes.len());
    Ok(lexemes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Token::lexer(src).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn keywords_and_types() {
        assert_eq!(
            kinds("uniform highp vec4 color;"),
            vec![
                Token::Uniform,
                Token::Highp,
                Token::Type(TypeKeyword::new(BasicType::Float, 4, 1)),
                Token::Identifier,
                Token::Semicolon,
            ]
        );
        assert_eq!(
            kinds("mat3x2 m"),
            vec![
                Token::Type(TypeKeyword::new(BasicType::Float, 3, 2)),
                Token::Identifier
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("1 1.0 .5 1e3 0x1F 7u 2.5f"),
            vec![
                Token::IntConstant,
                Token::FloatConstant,
                Token::FloatConstant,
                Token::FloatConstant,
                Token::IntConstant,
                Token::IntConstant,
                Token::FloatConstant,
            ]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a <<= b >> c"),
            vec![
                Token::Identifier,
                Token::LeftAssign,
                Token::Identifier,
                Token::RightOp,
                Token::Identifier,
            ]
        );
        // keyword prefixes stay identifiers
        assert_eq!(kinds("format"), vec![Token::Identifier]);
    }

    #[test]
    fn classification_follows_version() {
        let lex = |token| Lexeme {
            token,
            span: 0..0,
            loc: SourceLoc::default(),
        };
        assert_eq!(lex(Token::Layout).classify("layout", 100), Class::Identifier);
        assert_eq!(lex(Token::Layout).classify("layout", 300), Class::Keyword);
        assert_eq!(lex(Token::Attribute).classify("attribute", 300), Class::Reserved);
        assert_eq!(lex(Token::Identifier).classify("goto", 100), Class::Reserved);
        assert_eq!(lex(Token::Identifier).classify("sample", 100), Class::Identifier);
        let uint = lex(Token::Type(TypeKeyword::new(BasicType::UInt, 1, 1)));
        assert_eq!(uint.classify("uint", 100), Class::Identifier);
        let mat = lex(Token::Type(TypeKeyword::new(BasicType::Float, 2, 2)));
        assert_eq!(mat.classify("mat2", 100), Class::Keyword);
        assert_eq!(mat.classify("mat2x2", 100), Class::Identifier);
    }
}
