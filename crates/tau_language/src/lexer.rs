//! Hand-written lexer for Tau source text.
//!
//! The lexer walks the byte buffer once and produces a token stream
//! terminated by an [`TokenKind::Eof`] token. Newlines are preserved as
//! tokens so the parser can honour optional statement termination.
//!
//! Errors (ill-formed literals, unknown escapes, unterminated constructs,
//! stray characters) are recorded into the shared [`ErrorBag`]; the lexer
//! does not attempt recovery beyond skipping the offending byte.

use tau_base::{Diagnostic, ErrorBag, SourceId, Span};

use crate::token::{
    self, is_word_begin, is_word_continue, lookup_keyword, recognize_mat, recognize_vec, Token,
    TokenKind,
};

/// Longest identifier the lexer accepts, in bytes.
const MAX_WORD_LEN: usize = 256;

/// Diagnostic codes of the lexer (`E01xx`).
pub mod codes {
    pub const UNEXPECTED_CHARACTER: u16 = 101;
    pub const IDENTIFIER_TOO_LONG: u16 = 102;
    pub const ILL_FORMED_INTEGER: u16 = 103;
    pub const ILL_FORMED_FLOAT: u16 = 104;
    pub const INVALID_INTEGER_SUFFIX: u16 = 105;
    pub const INVALID_FLOAT_SUFFIX: u16 = 106;
    pub const UNTERMINATED_STRING: u16 = 107;
    pub const UNTERMINATED_CHARACTER: u16 = 108;
    pub const UNKNOWN_ESCAPE: u16 = 109;
    pub const EMPTY_CHARACTER: u16 = 110;
}

const INT_SUFFIXES: &[&str] = &[
    "i8", "i16", "i32", "i64", "isize", "u8", "u16", "u32", "u64", "usize",
];
const FLOAT_SUFFIXES: &[&str] = &["f32", "f64"];

struct Lexer<'a> {
    source: SourceId,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

/// Lexes a registered source buffer into a token stream.
///
/// Always returns a stream ending in `Eof`, even when errors were recorded.
pub fn lex(source: SourceId, text: &str, bag: &mut ErrorBag) -> Vec<Token> {
    let mut lexer = Lexer {
        source,
        text,
        bytes: text.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run(bag);
    lexer.tokens
}

impl<'a> Lexer<'a> {
    fn current(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn consume(&mut self, byte: u8) -> bool {
        if self.current() == byte {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.tokens.push(Token::new(kind, self.source, offset));
    }

    fn error(&self, bag: &mut ErrorBag, code: u16, title: &str, start: usize, len: usize) {
        // A full bag aborts the caller later; the lexer itself runs to EOF.
        let _ = bag.report(Diagnostic::error(
            code,
            title,
            self.source,
            Span::new(start, start + len.max(1)),
        ));
    }

    fn run(&mut self, bag: &mut ErrorBag) {
        while !self.at_end() {
            let start = self.pos;
            let byte = self.current();

            match byte {
                b'\n' => {
                    self.pos += 1;
                    self.push(TokenKind::Newline, start);
                }
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                }
                b'/' if self.peek() == b'/' => self.skip_line_comment(),
                b'/' if self.peek() == b'*' => self.skip_block_comment(),
                b'"' => self.read_string(bag),
                b'\'' => self.read_character(bag),
                b if b.is_ascii_digit() => self.read_number(bag),
                b if is_word_begin(b) => self.read_word(bag),
                _ => self.read_punctuation(bag),
            }
        }

        self.push(TokenKind::Eof, self.pos);
    }

    fn skip_line_comment(&mut self) {
        while !self.at_end() && self.current() != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while !self.at_end() {
            if self.current() == b'*' && self.peek() == b'/' {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn read_word(&mut self, bag: &mut ErrorBag) {
        let start = self.pos;
        while is_word_continue(self.current()) && !self.at_end() {
            self.pos += 1;
        }
        let word = &self.text[start..self.pos];

        if word.len() > MAX_WORD_LEN {
            self.error(
                bag,
                codes::IDENTIFIER_TOO_LONG,
                "identifier is too long",
                start,
                word.len(),
            );
        }

        let kind = lookup_keyword(word)
            .or_else(|| recognize_vec(word))
            .or_else(|| recognize_mat(word))
            .unwrap_or(TokenKind::Ident);

        self.push(kind, start);
    }

    fn read_number(&mut self, bag: &mut ErrorBag) {
        let start = self.pos;
        let rest = &self.text[start..];
        let len = token::scan_number_len(rest);
        let lexeme = &rest[..len];
        self.pos += len;

        if let Some(digits) = lexeme
            .strip_prefix("0x")
            .or_else(|| lexeme.strip_prefix("0o"))
            .or_else(|| lexeme.strip_prefix("0b"))
        {
            let radix = match &lexeme[..2] {
                "0x" => 16,
                "0o" => 8,
                _ => 2,
            };
            let digit_count = digits
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric())
                .take_while(|&b| (b as char).is_digit(radix))
                .count();
            let suffix = &digits[digit_count..];

            if digit_count == 0 {
                self.error(
                    bag,
                    codes::ILL_FORMED_INTEGER,
                    "ill-formed integer literal",
                    start,
                    len,
                );
            } else if !suffix.is_empty() && !INT_SUFFIXES.contains(&suffix) {
                self.error(
                    bag,
                    codes::INVALID_INTEGER_SUFFIX,
                    "invalid integer suffix",
                    start,
                    len,
                );
            }

            self.push(TokenKind::LitInt, start);
            return;
        }

        let is_float = lexeme.contains('.') || lexeme.contains('e') || lexeme.contains('E');
        let digits_end = lexeme
            .bytes()
            .take_while(|&b| {
                b.is_ascii_digit()
                    || b == b'_'
                    || b == b'.'
                    || b == b'e'
                    || b == b'E'
                    || b == b'+'
                    || b == b'-'
            })
            .count();
        let suffix = &lexeme[digits_end..];

        if is_float {
            if !suffix.is_empty() && !FLOAT_SUFFIXES.contains(&suffix) {
                self.error(
                    bag,
                    codes::INVALID_FLOAT_SUFFIX,
                    "invalid float suffix",
                    start,
                    len,
                );
            }
            self.push(TokenKind::LitFloat, start);
        } else {
            let float_suffix = FLOAT_SUFFIXES.contains(&suffix);
            if !suffix.is_empty() && !INT_SUFFIXES.contains(&suffix) && !float_suffix {
                self.error(
                    bag,
                    codes::INVALID_INTEGER_SUFFIX,
                    "invalid integer suffix",
                    start,
                    len,
                );
            }
            // `1f32` is a float literal spelled with an integer mantissa.
            if float_suffix {
                self.push(TokenKind::LitFloat, start);
            } else {
                self.push(TokenKind::LitInt, start);
            }
        }
    }

    fn check_escape(&self, bag: &mut ErrorBag, pos: usize) {
        let escape = self.bytes.get(pos + 1).copied().unwrap_or(0);
        match escape {
            b'n' | b't' | b'r' | b'0' | b'\\' | b'\'' | b'"' | b'x' => {}
            _ => self.error(
                bag,
                codes::UNKNOWN_ESCAPE,
                "unknown escape sequence",
                pos,
                2,
            ),
        }
    }

    fn read_string(&mut self, bag: &mut ErrorBag) {
        let start = self.pos;
        self.pos += 1;

        loop {
            match self.current() {
                0 if self.at_end() => {
                    self.error(
                        bag,
                        codes::UNTERMINATED_STRING,
                        "unterminated string literal",
                        start,
                        self.pos - start,
                    );
                    break;
                }
                b'\n' => {
                    self.error(
                        bag,
                        codes::UNTERMINATED_STRING,
                        "unterminated string literal",
                        start,
                        self.pos - start,
                    );
                    break;
                }
                b'\\' => {
                    self.check_escape(bag, self.pos);
                    self.pos += 2;
                }
                b'"' => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }

        self.push(TokenKind::LitStr, start);
    }

    fn read_character(&mut self, bag: &mut ErrorBag) {
        let start = self.pos;
        self.pos += 1;

        let mut content = 0usize;
        loop {
            match self.current() {
                0 if self.at_end() => {
                    self.error(
                        bag,
                        codes::UNTERMINATED_CHARACTER,
                        "unterminated character literal",
                        start,
                        self.pos - start,
                    );
                    break;
                }
                b'\n' => {
                    self.error(
                        bag,
                        codes::UNTERMINATED_CHARACTER,
                        "unterminated character literal",
                        start,
                        self.pos - start,
                    );
                    break;
                }
                b'\\' => {
                    self.check_escape(bag, self.pos);
                    self.pos += 2;
                    content += 1;
                }
                b'\'' => {
                    self.pos += 1;
                    if content == 0 {
                        self.error(
                            bag,
                            codes::EMPTY_CHARACTER,
                            "empty character literal",
                            start,
                            self.pos - start,
                        );
                    }
                    break;
                }
                _ => {
                    self.pos += 1;
                    content += 1;
                }
            }
        }

        self.push(TokenKind::LitChar, start);
    }

    fn read_punctuation(&mut self, bag: &mut ErrorBag) {
        let start = self.pos;

        let kind = if self.consume(b'+') {
            if self.consume(b'+') {
                TokenKind::PlusPlus
            } else if self.consume(b'=') {
                TokenKind::PlusEq
            } else {
                TokenKind::Plus
            }
        } else if self.consume(b'-') {
            if self.consume(b'-') {
                TokenKind::MinusMinus
            } else if self.consume(b'=') {
                TokenKind::MinusEq
            } else if self.consume(b'>') {
                TokenKind::Arrow
            } else {
                TokenKind::Minus
            }
        } else if self.consume(b'*') {
            if self.consume(b'=') {
                TokenKind::StarEq
            } else if self.consume(b'.') {
                TokenKind::StarDot
            } else {
                TokenKind::Star
            }
        } else if self.consume(b'/') {
            if self.consume(b'=') {
                TokenKind::SlashEq
            } else {
                TokenKind::Slash
            }
        } else if self.consume(b'%') {
            if self.consume(b'=') {
                TokenKind::PercentEq
            } else {
                TokenKind::Percent
            }
        } else if self.consume(b'&') {
            if self.consume(b'&') {
                TokenKind::AmpAmp
            } else if self.consume(b'=') {
                TokenKind::AmpEq
            } else {
                TokenKind::Amp
            }
        } else if self.consume(b'|') {
            if self.consume(b'|') {
                TokenKind::BarBar
            } else if self.consume(b'=') {
                TokenKind::BarEq
            } else {
                TokenKind::Bar
            }
        } else if self.consume(b'^') {
            if self.consume(b'=') {
                TokenKind::CaretEq
            } else {
                TokenKind::Caret
            }
        } else if self.consume(b'~') {
            TokenKind::Tilde
        } else if self.consume(b'<') {
            if self.consume(b'<') {
                if self.consume(b'=') {
                    TokenKind::LtLtEq
                } else {
                    TokenKind::LtLt
                }
            } else if self.consume(b'=') {
                TokenKind::LtEq
            } else {
                TokenKind::Lt
            }
        } else if self.consume(b'>') {
            if self.consume(b'>') {
                if self.consume(b'=') {
                    TokenKind::GtGtEq
                } else {
                    TokenKind::GtGt
                }
            } else if self.consume(b'=') {
                TokenKind::GtEq
            } else {
                TokenKind::Gt
            }
        } else if self.consume(b'!') {
            if self.consume(b'=') {
                TokenKind::BangEq
            } else {
                TokenKind::Bang
            }
        } else if self.consume(b'.') {
            if self.consume(b'.') {
                if self.consume(b'.') {
                    TokenKind::DotDotDot
                } else {
                    TokenKind::DotDot
                }
            } else if self.consume(b'<') {
                TokenKind::DotLt
            } else {
                TokenKind::Dot
            }
        } else if self.consume(b'?') {
            if self.consume(b'.') {
                TokenKind::QuestionDot
            } else {
                TokenKind::Question
            }
        } else if self.consume(b'=') {
            if self.consume(b'=') {
                TokenKind::EqEq
            } else {
                TokenKind::Eq
            }
        } else if self.consume(b',') {
            TokenKind::Comma
        } else if self.consume(b':') {
            TokenKind::Colon
        } else if self.consume(b';') {
            TokenKind::Semicolon
        } else if self.consume(b'(') {
            TokenKind::LParen
        } else if self.consume(b')') {
            TokenKind::RParen
        } else if self.consume(b'[') {
            TokenKind::LBracket
        } else if self.consume(b']') {
            TokenKind::RBracket
        } else if self.consume(b'{') {
            TokenKind::LBrace
        } else if self.consume(b'}') {
            TokenKind::RBrace
        } else {
            self.error(
                bag,
                codes::UNEXPECTED_CHARACTER,
                "unexpected character",
                start,
                1,
            );
            self.pos += 1;
            return;
        };

        self.push(kind, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tau_base::SourceRegistry;

    fn lex_text(text: &str) -> (Vec<Token>, ErrorBag, SourceId) {
        let mut registry = SourceRegistry::new();
        let id = registry.add("test.tau", text);
        let mut bag = ErrorBag::new();
        let tokens = lex(id, text, &mut bag);
        (tokens, bag, id)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn stream_ends_with_eof() {
        let (tokens, bag, _) = lex_text("");
        assert_eq!(kinds(&tokens), [TokenKind::Eof]);
        assert!(!bag.has_errors());
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, _, _) = lex_text("fun main");
        assert_eq!(
            kinds(&tokens),
            [TokenKind::KwFun, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn newlines_are_preserved() {
        let (tokens, _, _) = lex_text("a\nb");
        assert_eq!(
            kinds(&tokens),
            [
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, _, _) = lex_text("a // trailing\nb /* block\nstill */ c");
        let stream = kinds(&tokens);
        assert_eq!(
            stream,
            [
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn multi_byte_punctuation_is_greedy() {
        let (tokens, _, _) = lex_text("<<= .. ... .< ?. *. ->");
        assert_eq!(
            kinds(&tokens),
            [
                TokenKind::LtLtEq,
                TokenKind::DotDot,
                TokenKind::DotDotDot,
                TokenKind::DotLt,
                TokenKind::QuestionDot,
                TokenKind::StarDot,
                TokenKind::Arrow,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn integer_bases_lex_as_single_tokens() {
        let (tokens, bag, _) = lex_text("10 0xFF 0o77 0b1010");
        assert_eq!(
            kinds(&tokens),
            [
                TokenKind::LitInt,
                TokenKind::LitInt,
                TokenKind::LitInt,
                TokenKind::LitInt,
                TokenKind::Eof
            ]
        );
        assert!(!bag.has_errors());
    }

    #[test]
    fn float_literal_with_exponent() {
        let (tokens, bag, _) = lex_text("1.5e-3");
        assert_eq!(kinds(&tokens), [TokenKind::LitFloat, TokenKind::Eof]);
        assert!(!bag.has_errors());
    }

    #[test]
    fn float_suffix_on_integer_mantissa() {
        let (tokens, bag, _) = lex_text("1f32");
        assert_eq!(kinds(&tokens), [TokenKind::LitFloat, TokenKind::Eof]);
        assert!(!bag.has_errors());
    }

    #[test]
    fn invalid_integer_suffix_is_reported() {
        let (_, bag, _) = lex_text("10q8");
        assert_eq!(bag.error_count(), 1);
        assert_eq!(bag.diagnostics()[0].code, codes::INVALID_INTEGER_SUFFIX);
    }

    #[test]
    fn empty_hex_literal_is_reported() {
        let (_, bag, _) = lex_text("0x");
        assert_eq!(bag.diagnostics()[0].code, codes::ILL_FORMED_INTEGER);
    }

    #[test]
    fn vec_and_mat_keywords() {
        let (tokens, _, _) = lex_text("vec4f32 mat3x3f64");
        assert!(matches!(
            tokens[0].kind,
            TokenKind::KwVec { lanes: 4, .. }
        ));
        assert!(matches!(
            tokens[1].kind,
            TokenKind::KwMat {
                rows: 3,
                cols: 3,
                ..
            }
        ));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (_, bag, _) = lex_text("\"abc");
        assert_eq!(bag.diagnostics()[0].code, codes::UNTERMINATED_STRING);
    }

    #[test]
    fn unknown_escape_is_reported() {
        let (_, bag, _) = lex_text(r#""a\qb""#);
        assert_eq!(bag.diagnostics()[0].code, codes::UNKNOWN_ESCAPE);
    }

    #[test]
    fn character_literal_round_trip() {
        let (tokens, bag, _) = lex_text(r"'a' '\n'");
        assert_eq!(
            kinds(&tokens),
            [TokenKind::LitChar, TokenKind::LitChar, TokenKind::Eof]
        );
        assert!(!bag.has_errors());
    }

    #[test]
    fn unexpected_character_is_reported_and_skipped() {
        let (tokens, bag, _) = lex_text("a ` b");
        assert_eq!(
            kinds(&tokens),
            [TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(bag.diagnostics()[0].code, codes::UNEXPECTED_CHARACTER);
    }

    #[test]
    fn lexeme_spans_reproduce_source() {
        let source = "fun add(a: i32) -> i32 { return a + 0x2A }";
        let (tokens, bag, _) = lex_text(source);
        assert!(!bag.has_errors());

        // Re-slicing every lexeme out of the buffer reproduces the source
        // minus whitespace.
        let mut rebuilt = String::new();
        for token in &tokens {
            if token.kind != TokenKind::Eof {
                rebuilt.push_str(token.lexeme(source));
            }
        }
        let stripped: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(rebuilt, stripped);
    }
}
