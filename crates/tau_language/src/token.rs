//! Token vocabulary of the Tau language.
//!
//! A token is deliberately small: `{ kind, source, offset }`. Everything
//! derived from it — lexeme text, span, row/column — is recomputed on demand
//! against the registered source buffer, so the token stream stays compact
//! and trivially copyable.
//!
//! Keyword recognition is table-driven (see [`lookup_keyword`]); vector and
//! matrix type keywords (`vec4f32`, `mat3x3f64`) are recognised by shape,
//! not enumeration.

use tau_base::{SourceId, Span};

/// Primitive element types a vector or matrix keyword can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKw {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumericKw {
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return None,
        })
    }
}

/// Every kind of token the lexer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    KwIs,
    KwAs,
    KwSizeof,
    KwAlignof,
    KwUse,
    KwIn,
    KwPub,
    KwExtern,
    KwFun,
    KwStruct,
    KwUnion,
    KwEnum,
    KwMod,
    KwIf,
    KwThen,
    KwElse,
    KwFor,
    KwWhile,
    KwDo,
    KwLoop,
    KwBreak,
    KwContinue,
    KwReturn,
    KwDefer,
    KwVar,
    KwMut,
    KwI8,
    KwI16,
    KwI32,
    KwI64,
    KwIsize,
    KwU8,
    KwU16,
    KwU32,
    KwU64,
    KwUsize,
    KwF32,
    KwF64,
    KwC64,
    KwC128,
    KwChar,
    KwBool,
    KwUnit,
    KwType,
    KwUndef,

    /// `vec<N><elem>`, e.g. `vec4f32`. Recognised by shape.
    KwVec { lanes: u8, elem: NumericKw },
    /// `mat<R>x<C><elem>` or `mat<N><elem>`, e.g. `mat3x3f64`, `mat4f32`.
    KwMat { rows: u8, cols: u8, elem: NumericKw },

    // Literals
    LitInt,
    LitFloat,
    LitStr,
    LitChar,
    LitBool,
    LitNull,

    Ident,

    // Punctuation
    Plus,
    PlusPlus,
    PlusEq,
    Minus,
    MinusMinus,
    MinusEq,
    Arrow,
    Star,
    StarEq,
    StarDot,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Amp,
    AmpAmp,
    AmpEq,
    Bar,
    BarBar,
    BarEq,
    Caret,
    CaretEq,
    Tilde,
    Lt,
    LtLt,
    LtLtEq,
    LtEq,
    Gt,
    GtGt,
    GtGtEq,
    GtEq,
    Bang,
    BangEq,
    Dot,
    DotDot,
    DotDotDot,
    DotLt,
    Question,
    QuestionDot,
    Eq,
    EqEq,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Newline,
    Eof,
}

impl TokenKind {
    /// The exact source text of tokens whose spelling is fixed.
    ///
    /// Identifiers, literals, and shape-recognised keywords return `None`
    /// and are rescanned from the source buffer instead.
    pub fn fixed_lexeme(self) -> Option<&'static str> {
        Some(match self {
            Self::KwIs => "is",
            Self::KwAs => "as",
            Self::KwSizeof => "sizeof",
            Self::KwAlignof => "alignof",
            Self::KwUse => "use",
            Self::KwIn => "in",
            Self::KwPub => "pub",
            Self::KwExtern => "extern",
            Self::KwFun => "fun",
            Self::KwStruct => "struct",
            Self::KwUnion => "union",
            Self::KwEnum => "enum",
            Self::KwMod => "mod",
            Self::KwIf => "if",
            Self::KwThen => "then",
            Self::KwElse => "else",
            Self::KwFor => "for",
            Self::KwWhile => "while",
            Self::KwDo => "do",
            Self::KwLoop => "loop",
            Self::KwBreak => "break",
            Self::KwContinue => "continue",
            Self::KwReturn => "return",
            Self::KwDefer => "defer",
            Self::KwVar => "var",
            Self::KwMut => "mut",
            Self::KwI8 => "i8",
            Self::KwI16 => "i16",
            Self::KwI32 => "i32",
            Self::KwI64 => "i64",
            Self::KwIsize => "isize",
            Self::KwU8 => "u8",
            Self::KwU16 => "u16",
            Self::KwU32 => "u32",
            Self::KwU64 => "u64",
            Self::KwUsize => "usize",
            Self::KwF32 => "f32",
            Self::KwF64 => "f64",
            Self::KwC64 => "c64",
            Self::KwC128 => "c128",
            Self::KwChar => "char",
            Self::KwBool => "bool",
            Self::KwUnit => "unit",
            Self::KwType => "type",
            Self::KwUndef => "undef",
            Self::LitNull => "null",
            Self::Plus => "+",
            Self::PlusPlus => "++",
            Self::PlusEq => "+=",
            Self::Minus => "-",
            Self::MinusMinus => "--",
            Self::MinusEq => "-=",
            Self::Arrow => "->",
            Self::Star => "*",
            Self::StarEq => "*=",
            Self::StarDot => "*.",
            Self::Slash => "/",
            Self::SlashEq => "/=",
            Self::Percent => "%",
            Self::PercentEq => "%=",
            Self::Amp => "&",
            Self::AmpAmp => "&&",
            Self::AmpEq => "&=",
            Self::Bar => "|",
            Self::BarBar => "||",
            Self::BarEq => "|=",
            Self::Caret => "^",
            Self::CaretEq => "^=",
            Self::Tilde => "~",
            Self::Lt => "<",
            Self::LtLt => "<<",
            Self::LtLtEq => "<<=",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtGt => ">>",
            Self::GtGtEq => ">>=",
            Self::GtEq => ">=",
            Self::Bang => "!",
            Self::BangEq => "!=",
            Self::Dot => ".",
            Self::DotDot => "..",
            Self::DotDotDot => "...",
            Self::DotLt => ".<",
            Self::Question => "?",
            Self::QuestionDot => "?.",
            Self::Eq => "=",
            Self::EqEq => "==",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Semicolon => ";",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Newline => "\n",
            _ => return None,
        })
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            Self::LitInt
                | Self::LitFloat
                | Self::LitStr
                | Self::LitChar
                | Self::LitBool
                | Self::LitNull
        )
    }

    pub fn is_punctuation(self) -> bool {
        matches!(
            self,
            Self::Plus
                | Self::PlusPlus
                | Self::PlusEq
                | Self::Minus
                | Self::MinusMinus
                | Self::MinusEq
                | Self::Arrow
                | Self::Star
                | Self::StarEq
                | Self::StarDot
                | Self::Slash
                | Self::SlashEq
                | Self::Percent
                | Self::PercentEq
                | Self::Amp
                | Self::AmpAmp
                | Self::AmpEq
                | Self::Bar
                | Self::BarBar
                | Self::BarEq
                | Self::Caret
                | Self::CaretEq
                | Self::Tilde
                | Self::Lt
                | Self::LtLt
                | Self::LtLtEq
                | Self::LtEq
                | Self::Gt
                | Self::GtGt
                | Self::GtGtEq
                | Self::GtEq
                | Self::Bang
                | Self::BangEq
                | Self::Dot
                | Self::DotDot
                | Self::DotDotDot
                | Self::DotLt
                | Self::Question
                | Self::QuestionDot
                | Self::Eq
                | Self::EqEq
                | Self::Comma
                | Self::Colon
                | Self::Semicolon
                | Self::LParen
                | Self::RParen
                | Self::LBracket
                | Self::RBracket
                | Self::LBrace
                | Self::RBrace
        )
    }
}

/// Looks up a plain keyword by its exact text.
///
/// Shape-recognised keywords (`vec…`, `mat…`) are handled by
/// [`recognize_vec`] and [`recognize_mat`].
pub fn lookup_keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "is" => TokenKind::KwIs,
        "as" => TokenKind::KwAs,
        "sizeof" => TokenKind::KwSizeof,
        "alignof" => TokenKind::KwAlignof,
        "use" => TokenKind::KwUse,
        "in" => TokenKind::KwIn,
        "pub" => TokenKind::KwPub,
        "extern" => TokenKind::KwExtern,
        "fun" => TokenKind::KwFun,
        "struct" => TokenKind::KwStruct,
        "union" => TokenKind::KwUnion,
        "enum" => TokenKind::KwEnum,
        "mod" => TokenKind::KwMod,
        "if" => TokenKind::KwIf,
        "then" => TokenKind::KwThen,
        "else" => TokenKind::KwElse,
        "for" => TokenKind::KwFor,
        "while" => TokenKind::KwWhile,
        "do" => TokenKind::KwDo,
        "loop" => TokenKind::KwLoop,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "return" => TokenKind::KwReturn,
        "defer" => TokenKind::KwDefer,
        "var" => TokenKind::KwVar,
        "mut" => TokenKind::KwMut,
        "i8" => TokenKind::KwI8,
        "i16" => TokenKind::KwI16,
        "i32" => TokenKind::KwI32,
        "i64" => TokenKind::KwI64,
        "isize" => TokenKind::KwIsize,
        "u8" => TokenKind::KwU8,
        "u16" => TokenKind::KwU16,
        "u32" => TokenKind::KwU32,
        "u64" => TokenKind::KwU64,
        "usize" => TokenKind::KwUsize,
        "f32" => TokenKind::KwF32,
        "f64" => TokenKind::KwF64,
        "c64" => TokenKind::KwC64,
        "c128" => TokenKind::KwC128,
        "char" => TokenKind::KwChar,
        "bool" => TokenKind::KwBool,
        "unit" => TokenKind::KwUnit,
        "type" => TokenKind::KwType,
        "undef" => TokenKind::KwUndef,
        "true" | "false" => TokenKind::LitBool,
        "null" => TokenKind::LitNull,
        _ => return None,
    })
}

/// Recognises `vec<N><elem>` by shape, e.g. `vec4f32`.
pub fn recognize_vec(word: &str) -> Option<TokenKind> {
    let rest = word.strip_prefix("vec")?;
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let lanes: u8 = rest[..digits].parse().ok()?;
    let elem = NumericKw::from_str(&rest[digits..])?;
    Some(TokenKind::KwVec { lanes, elem })
}

/// Recognises `mat<R>x<C><elem>` or square `mat<N><elem>` by shape.
pub fn recognize_mat(word: &str) -> Option<TokenKind> {
    let rest = word.strip_prefix("mat")?;
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rows: u8 = rest[..digits].parse().ok()?;
    let rest = &rest[digits..];

    if let Some(rest) = rest.strip_prefix('x') {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        let cols: u8 = rest[..digits].parse().ok()?;
        let elem = NumericKw::from_str(&rest[digits..])?;
        Some(TokenKind::KwMat { rows, cols, elem })
    } else {
        let elem = NumericKw::from_str(rest)?;
        Some(TokenKind::KwMat {
            rows,
            cols: rows,
            elem,
        })
    }
}

/// A single lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub source: SourceId,
    pub offset: u32,
}

impl Token {
    pub fn new(kind: TokenKind, source: SourceId, offset: usize) -> Self {
        Self {
            kind,
            source,
            offset: offset as u32,
        }
    }

    /// Byte length of the lexeme, recomputed against the source buffer.
    pub fn lexeme_len(&self, source: &str) -> usize {
        if let Some(fixed) = self.kind.fixed_lexeme() {
            return fixed.len();
        }

        let rest = &source[self.offset as usize..];
        match self.kind {
            TokenKind::Ident
            | TokenKind::LitBool
            | TokenKind::KwVec { .. }
            | TokenKind::KwMat { .. } => scan_word_len(rest),
            TokenKind::LitInt | TokenKind::LitFloat => scan_number_len(rest),
            TokenKind::LitStr => scan_quoted_len(rest, '"'),
            TokenKind::LitChar => scan_quoted_len(rest, '\''),
            TokenKind::Eof => 0,
            _ => unreachable!("fixed lexeme covers remaining kinds"),
        }
    }

    /// The lexeme text.
    pub fn lexeme<'s>(&self, source: &'s str) -> &'s str {
        let start = self.offset as usize;
        &source[start..start + self.lexeme_len(source)]
    }

    /// The token's span within its source.
    pub fn span(&self, source: &str) -> Span {
        let start = self.offset as usize;
        Span::new(start, start + self.lexeme_len(source))
    }
}

/// Whether `byte` continues an identifier. Bytes above 0x7F are treated
/// conservatively as identifier-continue.
pub fn is_word_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

/// Whether `byte` may begin an identifier.
pub fn is_word_begin(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte >= 0x80
}

/// Length of the identifier/keyword starting at the beginning of `rest`.
pub fn scan_word_len(rest: &str) -> usize {
    rest.bytes().take_while(|&b| is_word_continue(b)).count()
}

/// Length of the numeric literal starting at the beginning of `rest`,
/// including any base prefix, fraction, exponent, and type suffix.
pub fn scan_number_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let mut pos = 0;

    if rest.starts_with("0x") || rest.starts_with("0o") || rest.starts_with("0b") {
        pos = 2;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        return pos;
    }

    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
        pos += 1;
    }

    // Fraction: only when a digit follows the dot, so `1..2` stays a range.
    if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
        pos += 1;
        while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
            pos += 1;
        }
    }

    // Exponent.
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    // Type suffix.
    while pos < bytes.len() && is_word_continue(bytes[pos]) {
        pos += 1;
    }

    pos
}

/// Length of a quoted literal starting at `rest`, including both quotes.
/// Stops at an unescaped closing quote, end of line, or end of input.
pub fn scan_quoted_len(rest: &str, quote: char) -> usize {
    let bytes = rest.as_bytes();
    let mut pos = 1; // opening quote

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return pos,
            b if b == quote as u8 => return pos + 1,
            _ => pos += 1,
        }
    }

    pos.min(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tau_base::SourceRegistry;

    fn token_at(kind: TokenKind, offset: usize) -> (Token, SourceId) {
        let mut registry = SourceRegistry::new();
        let id = registry.add("test.tau", "");
        (Token::new(kind, id, offset), id)
    }

    #[test]
    fn fixed_lexemes_cover_punctuation() {
        assert_eq!(TokenKind::Arrow.fixed_lexeme(), Some("->"));
        assert_eq!(TokenKind::DotLt.fixed_lexeme(), Some(".<"));
        assert_eq!(TokenKind::Ident.fixed_lexeme(), None);
    }

    #[test]
    fn keyword_lookup_is_table_driven() {
        assert_eq!(lookup_keyword("fun"), Some(TokenKind::KwFun));
        assert_eq!(lookup_keyword("defer"), Some(TokenKind::KwDefer));
        assert_eq!(lookup_keyword("true"), Some(TokenKind::LitBool));
        assert_eq!(lookup_keyword("funny"), None);
    }

    #[test]
    fn vec_keywords_recognised_by_shape() {
        assert_eq!(
            recognize_vec("vec4f32"),
            Some(TokenKind::KwVec {
                lanes: 4,
                elem: NumericKw::F32
            })
        );
        assert_eq!(
            recognize_vec("vec16u8"),
            Some(TokenKind::KwVec {
                lanes: 16,
                elem: NumericKw::U8
            })
        );
        assert_eq!(recognize_vec("vector"), None);
        assert_eq!(recognize_vec("vec4"), None);
    }

    #[test]
    fn mat_keywords_recognised_by_shape() {
        assert_eq!(
            recognize_mat("mat3x3f64"),
            Some(TokenKind::KwMat {
                rows: 3,
                cols: 3,
                elem: NumericKw::F64
            })
        );
        assert_eq!(
            recognize_mat("mat2x4i32"),
            Some(TokenKind::KwMat {
                rows: 2,
                cols: 4,
                elem: NumericKw::I32
            })
        );
        // Square shorthand.
        assert_eq!(
            recognize_mat("mat4f32"),
            Some(TokenKind::KwMat {
                rows: 4,
                cols: 4,
                elem: NumericKw::F32
            })
        );
        assert_eq!(recognize_mat("matrix"), None);
    }

    #[test]
    fn lexeme_recovers_identifier_text() {
        let source = "var counter = 0";
        let (token, _) = token_at(TokenKind::Ident, 4);
        assert_eq!(token.lexeme(source), "counter");
    }

    #[test]
    fn lexeme_recovers_number_with_suffix() {
        let source = "x = 0xFFu32 + 1";
        let (token, _) = token_at(TokenKind::LitInt, 4);
        assert_eq!(token.lexeme(source), "0xFFu32");
    }

    #[test]
    fn lexeme_recovers_float_with_exponent() {
        let source = "y = 1.5e-3";
        let (token, _) = token_at(TokenKind::LitFloat, 4);
        assert_eq!(token.lexeme(source), "1.5e-3");
    }

    #[test]
    fn number_scan_does_not_eat_range_dots() {
        assert_eq!(scan_number_len("1..10"), 1);
    }

    #[test]
    fn lexeme_recovers_string_with_escape() {
        let source = r#"s = "a\"b" + t"#;
        let (token, _) = token_at(TokenKind::LitStr, 4);
        assert_eq!(token.lexeme(source), r#""a\"b""#);
    }

    #[test]
    fn span_matches_lexeme_slice() {
        let source = "return value";
        let (token, _) = token_at(TokenKind::KwReturn, 0);
        let span = token.span(source);
        assert_eq!(&source[span.start..span.end], "return");
    }
}
