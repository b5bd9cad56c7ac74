//! The Tau language front-end.
//!
//! Pipeline position: source text enters here and leaves as a token stream
//! plus a registered AST with a scope tree, ready for the semantic passes
//! in `tau-compile`.
//!
//! ```text
//! source ──lexer──▶ tokens ──parser──▶ AST + symbol table
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod symtable;
pub mod token;

pub use ast::{Ast, CallConv, DeclNode, ExprNode, Node, NodeId, NodeKind, Op, Prim, StmtNode, TypeNode};
pub use symtable::{ScopeId, ScopeTree, SymbolEntry};
pub use token::{Token, TokenKind};
