//! Recursive-descent parser for declarations, statements, and types.
//!
//! Expressions are delegated to the Shunting-Yard component in [`shyd`];
//! everything else is plain handwritten descent over the token stream.
//!
//! Statement termination is a newline, a semicolon, or (without consuming)
//! a closing brace or end of input. Newlines are transparent in every other
//! position; the expression parser turns that transparency off so an
//! expression always ends at the line break.
//!
//! On a parse error the parser reports into the shared bag and performs a
//! one-token panic-resume: tokens are skipped up to the next statement
//! boundary and parsing continues.

pub mod shyd;

use tau_base::{Diagnostic, ErrorBag, Interner, SourceId, Span};

use crate::ast::{Ast, CallConv, DeclNode, NodeId, NodeKind, Prim, StmtNode, TypeNode};
use crate::token::{Token, TokenKind};

/// Diagnostic codes of the parser (`E02xx`).
pub mod codes {
    pub const UNEXPECTED_TOKEN: u16 = 201;
    pub const MISSING_CLOSING_PAREN: u16 = 202;
    pub const MISSING_CLOSING_BRACKET: u16 = 203;
    pub const MISSING_OPERAND: u16 = 204;
    pub const UNKNOWN_CALLCONV: u16 = 205;
    pub const INT_OUT_OF_RANGE: u16 = 206;
}

/// How an individual parse production failed.
///
/// Every variant except `ErrorLimit` has already been reported to the bag
/// when it is returned; `ErrorLimit` aborts parsing altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedToken,
    MissingClosingParen,
    MissingClosingBracket,
    MissingOperand,
    ErrorLimit,
}

pub type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    text: &'a str,
    source: SourceId,
    pub(crate) ast: &'a mut Ast,
    pub(crate) interner: &'a mut Interner,
    pub(crate) bag: &'a mut ErrorBag,
    ignore_newline: bool,
}

/// Parses a whole translation unit into a program node.
///
/// Parse errors are reported into `bag`; the returned program contains
/// every declaration that survived recovery.
pub fn parse(
    tokens: &[Token],
    text: &str,
    source: SourceId,
    ast: &mut Ast,
    interner: &mut Interner,
    bag: &mut ErrorBag,
) -> NodeId {
    let mut parser = Parser {
        tokens,
        pos: 0,
        text,
        source,
        ast,
        interner,
        bag,
        ignore_newline: true,
    };
    parser.parse_prog()
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Token stream primitives
    // ------------------------------------------------------------------

    /// Position of the current token, skipping newlines when they are
    /// transparent.
    fn current_pos(&self) -> usize {
        let mut pos = self.pos;
        if self.ignore_newline {
            while self
                .tokens
                .get(pos)
                .is_some_and(|t| t.kind == TokenKind::Newline)
            {
                pos += 1;
            }
        }
        pos.min(self.tokens.len() - 1)
    }

    pub(crate) fn current(&self) -> Token {
        self.tokens[self.current_pos()]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let pos = self.current_pos();
        let token = self.tokens[pos];
        if token.kind != TokenKind::Eof {
            self.pos = pos + 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_unexpected())
        }
    }

    pub(crate) fn set_ignore_newline(&mut self, ignore: bool) -> bool {
        std::mem::replace(&mut self.ignore_newline, ignore)
    }

    pub(crate) fn token_span(&self, token: Token) -> Span {
        token.span(self.text)
    }

    pub(crate) fn lexeme(&self, token: Token) -> &'a str {
        token.lexeme(self.text)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub(crate) fn report(&mut self, code: u16, title: &str, token: Token) -> ParseError {
        let span = self.token_span(token);
        let full = self
            .bag
            .report(Diagnostic::error(code, title, self.source, span))
            .is_err();
        if full {
            return ParseError::ErrorLimit;
        }
        match code {
            codes::MISSING_CLOSING_PAREN => ParseError::MissingClosingParen,
            codes::MISSING_CLOSING_BRACKET => ParseError::MissingClosingBracket,
            codes::MISSING_OPERAND => ParseError::MissingOperand,
            _ => ParseError::UnexpectedToken,
        }
    }

    fn error_unexpected(&mut self) -> ParseError {
        let token = self.current();
        self.report(codes::UNEXPECTED_TOKEN, "unexpected token", token)
    }

    /// Skips to the next statement boundary after a parse error.
    fn recover(&mut self) {
        loop {
            match self.tokens[self.pos.min(self.tokens.len() - 1)].kind {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared pieces
    // ------------------------------------------------------------------

    fn make_ident(&mut self, token: Token) -> NodeId {
        let name = self.interner.intern(token.lexeme(self.text));
        self.ast.alloc(token, NodeKind::Ident { name })
    }

    fn expect_ident(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(self.make_ident(token))
    }

    /// Consumes a statement terminator: newline, semicolon, or a lookahead
    /// `}` / end of input (left for the caller).
    fn terminate(&mut self) -> PResult<()> {
        let was = self.set_ignore_newline(false);
        let result = match self.current().kind {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.error_unexpected()),
        };
        self.set_ignore_newline(was);
        result
    }

    pub(crate) fn parse_expr(&mut self) -> PResult<NodeId> {
        shyd::parse_expr(self)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub(crate) fn parse_type(&mut self) -> PResult<NodeId> {
        let token = self.current();

        let prim = |p| Some(TypeNode::Prim(p));
        let node = match token.kind {
            TokenKind::KwMut => {
                self.advance();
                let base = self.parse_type()?;
                return Ok(self.ast.alloc(token, NodeKind::Type(TypeNode::Mut { base })));
            }
            TokenKind::Star => {
                self.advance();
                let base = self.parse_type()?;
                return Ok(self.ast.alloc(token, NodeKind::Type(TypeNode::Ptr { base })));
            }
            TokenKind::Amp => {
                self.advance();
                let base = self.parse_type()?;
                return Ok(self.ast.alloc(token, NodeKind::Type(TypeNode::Ref { base })));
            }
            TokenKind::Question => {
                self.advance();
                let base = self.parse_type()?;
                return Ok(self.ast.alloc(token, NodeKind::Type(TypeNode::Opt { base })));
            }
            TokenKind::LBracket => {
                self.advance();
                let size = if self.check(TokenKind::RBracket) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                if !self.consume(TokenKind::RBracket) {
                    let current = self.current();
                    return Err(self.report(
                        codes::MISSING_CLOSING_BRACKET,
                        "missing closing bracket",
                        current,
                    ));
                }
                let base = self.parse_type()?;
                return Ok(self
                    .ast
                    .alloc(token, NodeKind::Type(TypeNode::Array { size, base })));
            }
            TokenKind::KwFun => return self.parse_type_fun(token),
            TokenKind::Ident => return self.parse_type_named(token),
            TokenKind::KwI8 => prim(Prim::I8),
            TokenKind::KwI16 => prim(Prim::I16),
            TokenKind::KwI32 => prim(Prim::I32),
            TokenKind::KwI64 => prim(Prim::I64),
            TokenKind::KwIsize => prim(Prim::Isize),
            TokenKind::KwU8 => prim(Prim::U8),
            TokenKind::KwU16 => prim(Prim::U16),
            TokenKind::KwU32 => prim(Prim::U32),
            TokenKind::KwU64 => prim(Prim::U64),
            TokenKind::KwUsize => prim(Prim::Usize),
            TokenKind::KwF32 => prim(Prim::F32),
            TokenKind::KwF64 => prim(Prim::F64),
            TokenKind::KwC64 => prim(Prim::C64),
            TokenKind::KwC128 => prim(Prim::C128),
            TokenKind::KwChar => prim(Prim::Char),
            TokenKind::KwBool => prim(Prim::Bool),
            TokenKind::KwUnit => prim(Prim::Unit),
            TokenKind::KwVec { lanes, elem } => Some(TypeNode::Vec {
                lanes,
                elem: numeric_prim(elem),
            }),
            TokenKind::KwMat { rows, cols, elem } => Some(TypeNode::Mat {
                rows,
                cols,
                elem: numeric_prim(elem),
            }),
            _ => None,
        };

        match node {
            Some(node) => {
                self.advance();
                Ok(self.ast.alloc(token, NodeKind::Type(node)))
            }
            None => Err(self.error_unexpected()),
        }
    }

    fn parse_type_fun(&mut self, token: Token) -> PResult<NodeId> {
        self.advance();

        let callconv = if self.check(TokenKind::LitStr) {
            self.parse_callconv()?
        } else {
            CallConv::Tau
        };

        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(TokenKind::RParen) {
            loop {
                if self.consume(TokenKind::DotDotDot) {
                    is_vararg = true;
                    break;
                }
                params.push(self.parse_type()?);
                if !self.consume(TokenKind::Comma) {
                    break;
                }
            }
        }
        if !self.consume(TokenKind::RParen) {
            let current = self.current();
            return Err(self.report(
                codes::MISSING_CLOSING_PAREN,
                "missing closing parenthesis",
                current,
            ));
        }

        self.expect(TokenKind::Arrow)?;
        let ret = self.parse_type()?;

        Ok(self.ast.alloc(
            token,
            NodeKind::Type(TypeNode::Fun {
                params,
                ret,
                is_vararg,
                callconv,
            }),
        ))
    }

    fn parse_type_named(&mut self, token: Token) -> PResult<NodeId> {
        self.advance();
        let name = self.interner.intern(self.lexeme(token));
        let mut node = self
            .ast
            .alloc(token, NodeKind::Type(TypeNode::Named { name, decl: None }));

        // Qualified member types: `Mod.Member`, left-nested.
        while self.check(TokenKind::Dot) {
            let dot = self.advance();
            let member = self.expect_ident()?;
            node = self.ast.alloc(
                dot,
                NodeKind::Type(TypeNode::Member {
                    parent: node,
                    member,
                    decl: None,
                }),
            );
        }

        Ok(node)
    }

    fn parse_callconv(&mut self) -> PResult<CallConv> {
        let token = self.expect(TokenKind::LitStr)?;
        let lexeme = self.lexeme(token);
        let name = lexeme.trim_matches('"');
        match CallConv::from_str(name) {
            Some(conv) => Ok(conv),
            None => Err(self.report(codes::UNKNOWN_CALLCONV, "unknown calling convention", token)),
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_prog(&mut self) -> NodeId {
        let first = self.current();
        let mut decls = Vec::new();

        loop {
            while self.consume(TokenKind::Semicolon) {}
            if self.check(TokenKind::Eof) {
                break;
            }
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(ParseError::ErrorLimit) => break,
                Err(_) => self.recover(),
            }
        }

        self.ast.alloc(first, NodeKind::Prog { decls })
    }

    fn parse_decl(&mut self) -> PResult<NodeId> {
        let is_pub = self.consume(TokenKind::KwPub);

        let mut is_extern = false;
        let mut callconv = CallConv::Tau;
        if self.check(TokenKind::KwExtern) {
            self.advance();
            is_extern = true;
            // Externs default to cdecl unless a convention string follows.
            callconv = if self.check(TokenKind::LitStr) {
                self.parse_callconv()?
            } else {
                CallConv::Cdecl
            };
        }

        match self.current().kind {
            TokenKind::KwVar => self.parse_decl_var(is_pub),
            TokenKind::KwFun => self.parse_decl_fun(is_pub, is_extern, callconv),
            TokenKind::KwStruct => self.parse_decl_composite(is_pub, true),
            TokenKind::KwUnion => self.parse_decl_composite(is_pub, false),
            TokenKind::KwEnum => self.parse_decl_enum(is_pub),
            TokenKind::KwMod => self.parse_decl_mod(is_pub),
            TokenKind::KwType => self.parse_decl_type_alias(is_pub),
            TokenKind::KwUse => self.parse_decl_use(),
            _ => Err(self.error_unexpected()),
        }
    }

    fn parse_decl_var(&mut self, is_pub: bool) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwVar)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;

        let init = if self.consume(TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.terminate()?;

        Ok(self.ast.alloc(
            token,
            NodeKind::Decl(DeclNode::Var {
                name,
                ty,
                init,
                is_pub,
            }),
        ))
    }

    fn parse_decl_param(&mut self) -> PResult<NodeId> {
        let token = self.current();
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let default = if self.consume(TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(self
            .ast
            .alloc(token, NodeKind::Decl(DeclNode::Param { name, ty, default })))
    }

    fn parse_decl_fun(
        &mut self,
        is_pub: bool,
        is_extern: bool,
        callconv: CallConv,
    ) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwFun)?;
        let name = self.expect_ident()?;

        // Generic parameter list: `fun id[T, U](...)`.
        let mut generic_params = Vec::new();
        if self.consume(TokenKind::LBracket) {
            loop {
                let param_token = self.current();
                let param_name = self.expect_ident()?;
                generic_params.push(self.ast.alloc(
                    param_token,
                    NodeKind::Decl(DeclNode::GenericParam { name: param_name }),
                ));
                if !self.consume(TokenKind::Comma) {
                    break;
                }
            }
            if !self.consume(TokenKind::RBracket) {
                let current = self.current();
                return Err(self.report(
                    codes::MISSING_CLOSING_BRACKET,
                    "missing closing bracket",
                    current,
                ));
            }
        }

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(TokenKind::RParen) {
            loop {
                if self.consume(TokenKind::DotDotDot) {
                    is_vararg = true;
                    break;
                }
                params.push(self.parse_decl_param()?);
                if !self.consume(TokenKind::Comma) {
                    break;
                }
            }
        }
        if !self.consume(TokenKind::RParen) {
            let current = self.current();
            return Err(self.report(
                codes::MISSING_CLOSING_PAREN,
                "missing closing parenthesis",
                current,
            ));
        }

        let ret = if self.consume(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            self.ast
                .alloc(token, NodeKind::Type(TypeNode::Prim(Prim::Unit)))
        };

        let body = if is_extern {
            self.terminate()?;
            None
        } else {
            Some(self.parse_stmt_block()?)
        };

        let fun = self.ast.alloc(
            token,
            NodeKind::Decl(DeclNode::Fun {
                name,
                params,
                ret,
                body,
                is_pub,
                is_extern,
                is_vararg,
                callconv,
                scope: None,
            }),
        );

        if generic_params.is_empty() {
            Ok(fun)
        } else {
            Ok(self.ast.alloc(
                token,
                NodeKind::Decl(DeclNode::Generic {
                    params: generic_params,
                    inner: fun,
                }),
            ))
        }
    }

    fn parse_decl_composite(&mut self, is_pub: bool, is_struct: bool) -> PResult<NodeId> {
        let token = self.advance(); // struct / union
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let field_token = self.current();
            let field_name = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            // Fields separate with commas or statement terminators.
            if !self.consume(TokenKind::Comma) {
                self.terminate()?;
            }
            fields.push(self.ast.alloc(
                field_token,
                NodeKind::Decl(DeclNode::Var {
                    name: field_name,
                    ty,
                    init: None,
                    is_pub: false,
                }),
            ));
        }
        self.expect(TokenKind::RBrace)?;

        let decl = if is_struct {
            DeclNode::Struct {
                name,
                fields,
                is_pub,
                scope: None,
            }
        } else {
            DeclNode::Union {
                name,
                fields,
                is_pub,
                scope: None,
            }
        };
        Ok(self.ast.alloc(token, NodeKind::Decl(decl)))
    }

    fn parse_decl_enum(&mut self, is_pub: bool) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwEnum)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut constants = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let constant_token = self.current();
            let constant_name = self.expect_ident()?;
            constants.push(self.ast.alloc(
                constant_token,
                NodeKind::Decl(DeclNode::EnumConstant {
                    name: constant_name,
                }),
            ));
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(self.ast.alloc(
            token,
            NodeKind::Decl(DeclNode::Enum {
                name,
                constants,
                is_pub,
                scope: None,
            }),
        ))
    }

    fn parse_decl_mod(&mut self, is_pub: bool) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwMod)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            while self.consume(TokenKind::Semicolon) {}
            if self.check(TokenKind::RBrace) {
                break;
            }
            match self.parse_decl() {
                Ok(member) => members.push(member),
                Err(ParseError::ErrorLimit) => return Err(ParseError::ErrorLimit),
                Err(_) => self.recover(),
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(self.ast.alloc(
            token,
            NodeKind::Decl(DeclNode::Mod {
                name,
                members,
                is_pub,
                scope: None,
            }),
        ))
    }

    fn parse_decl_type_alias(&mut self, is_pub: bool) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwType)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let ty = self.parse_type()?;
        self.terminate()?;

        Ok(self.ast.alloc(
            token,
            NodeKind::Decl(DeclNode::TypeAlias {
                name,
                ty,
                is_pub,
                scope: None,
            }),
        ))
    }

    fn parse_decl_use(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwUse)?;
        let mut segments = vec![self.expect_ident()?];
        while self.consume(TokenKind::Dot) {
            segments.push(self.expect_ident()?);
        }
        self.terminate()?;

        Ok(self
            .ast
            .alloc(token, NodeKind::Decl(DeclNode::Use { segments })))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub(crate) fn parse_stmt(&mut self) -> PResult<NodeId> {
        match self.current().kind {
            TokenKind::KwVar => self.parse_decl_var(false),
            TokenKind::KwIf => self.parse_stmt_if(),
            TokenKind::KwFor => self.parse_stmt_for(),
            TokenKind::KwWhile => self.parse_stmt_while(),
            TokenKind::KwLoop => self.parse_stmt_loop(),
            TokenKind::KwBreak => {
                let token = self.advance();
                self.terminate()?;
                Ok(self
                    .ast
                    .alloc(token, NodeKind::Stmt(StmtNode::Break { target: None })))
            }
            TokenKind::KwContinue => {
                let token = self.advance();
                self.terminate()?;
                Ok(self
                    .ast
                    .alloc(token, NodeKind::Stmt(StmtNode::Continue { target: None })))
            }
            TokenKind::KwReturn => self.parse_stmt_return(),
            TokenKind::KwDefer => {
                let token = self.advance();
                let body = self.parse_stmt()?;
                Ok(self
                    .ast
                    .alloc(token, NodeKind::Stmt(StmtNode::Defer { body })))
            }
            TokenKind::LBrace => self.parse_stmt_block(),
            _ => {
                let token = self.current();
                let expr = self.parse_expr()?;
                self.terminate()?;
                Ok(self.ast.alloc(token, NodeKind::Stmt(StmtNode::Expr { expr })))
            }
        }
    }

    fn parse_stmt_if(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwIf)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::KwThen)?;
        let then = self.parse_stmt()?;
        let els = if self.consume(TokenKind::KwElse) {
            Some(self.parse_stmt()?)
        } else {
            None
        };
        Ok(self
            .ast
            .alloc(token, NodeKind::Stmt(StmtNode::If { cond, then, els })))
    }

    fn parse_stmt_for(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwFor)?;
        let var_token = self.current();
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let var = self.ast.alloc(
            var_token,
            NodeKind::Decl(DeclNode::Var {
                name,
                ty,
                init: None,
                is_pub: false,
            }),
        );

        self.expect(TokenKind::KwIn)?;
        let range = self.parse_expr()?;
        self.expect(TokenKind::KwDo)?;
        let body = self.parse_stmt()?;

        Ok(self.ast.alloc(
            token,
            NodeKind::Stmt(StmtNode::For {
                var,
                range,
                body,
                scope: None,
            }),
        ))
    }

    fn parse_stmt_while(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwWhile)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::KwDo)?;
        let body = self.parse_stmt()?;
        Ok(self.ast.alloc(
            token,
            NodeKind::Stmt(StmtNode::While {
                cond,
                body,
                scope: None,
            }),
        ))
    }

    fn parse_stmt_loop(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwLoop)?;
        let body = self.parse_stmt()?;
        Ok(self
            .ast
            .alloc(token, NodeKind::Stmt(StmtNode::Loop { body, scope: None })))
    }

    fn parse_stmt_return(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::KwReturn)?;

        let was = self.set_ignore_newline(false);
        let has_value = !matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        );
        self.set_ignore_newline(was);

        let value = if has_value {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.terminate()?;

        Ok(self
            .ast
            .alloc(token, NodeKind::Stmt(StmtNode::Return { value })))
    }

    fn parse_stmt_block(&mut self) -> PResult<NodeId> {
        let token = self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        loop {
            while self.consume(TokenKind::Semicolon) || self.consume(TokenKind::Newline) {}
            if self.check(TokenKind::RBrace) || self.check(TokenKind::Eof) {
                break;
            }
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(ParseError::ErrorLimit) => return Err(ParseError::ErrorLimit),
                Err(_) => self.recover(),
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(self
            .ast
            .alloc(token, NodeKind::Stmt(StmtNode::Block { stmts, scope: None })))
    }
}

fn numeric_prim(kw: crate::token::NumericKw) -> Prim {
    use crate::token::NumericKw;
    match kw {
        NumericKw::I8 => Prim::I8,
        NumericKw::I16 => Prim::I16,
        NumericKw::I32 => Prim::I32,
        NumericKw::I64 => Prim::I64,
        NumericKw::U8 => Prim::U8,
        NumericKw::U16 => Prim::U16,
        NumericKw::U32 => Prim::U32,
        NumericKw::U64 => Prim::U64,
        NumericKw::F32 => Prim::F32,
        NumericKw::F64 => Prim::F64,
    }
}
