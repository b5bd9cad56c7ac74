//! Token and AST dumps.
//!
//! Each dump is a standalone JSON document written next to the input file
//! with a replaced extension (`<stem>.tokens.json`, `<stem>.ast.json`).
//! Field order is fixed, so dumps are diffable in tests.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::{json, Value};

use tau_base::Interner;
use tau_language::ast::{DeclNode, ExprNode, NodeKind, StmtNode, TypeNode};
use tau_language::{Ast, NodeId, Token};

/// One entry of the token dump.
#[derive(Serialize)]
struct TokenEntry<'a> {
    kind: String,
    offset: u32,
    lexeme: &'a str,
}

/// Serializes a token stream.
pub fn tokens_json(tokens: &[Token], text: &str) -> Value {
    let entries: Vec<TokenEntry> = tokens
        .iter()
        .map(|token| TokenEntry {
            kind: format!("{:?}", token.kind),
            offset: token.offset,
            lexeme: token.lexeme(text),
        })
        .collect();
    serde_json::to_value(entries).expect("token entries serialize without custom types")
}

pub fn write_tokens(
    tokens: &[Token],
    text: &str,
    out: &mut impl Write,
) -> io::Result<()> {
    let value = tokens_json(tokens, text);
    writeln!(out, "{}", serde_json::to_string_pretty(&value)?)
}

/// Serializes the tree below `root`.
pub fn ast_json(ast: &Ast, root: NodeId, interner: &Interner) -> Value {
    node_json(ast, root, interner)
}

pub fn write_ast(
    ast: &Ast,
    root: NodeId,
    interner: &Interner,
    out: &mut impl Write,
) -> io::Result<()> {
    let value = ast_json(ast, root, interner);
    writeln!(out, "{}", serde_json::to_string_pretty(&value)?)
}

fn node_json(ast: &Ast, id: NodeId, interner: &Interner) -> Value {
    let node = ast.node(id);
    let mut object = serde_json::Map::new();
    object.insert("kind".into(), json!(node.kind.tag()));

    // Payload details worth diffing, beyond the child structure.
    match &node.kind {
        NodeKind::Ident { name } => {
            object.insert("name".into(), json!(interner.resolve(*name)));
        }
        NodeKind::Expr(ExprNode::Ident { name, decl }) => {
            object.insert("name".into(), json!(interner.resolve(*name)));
            if let Some(decl) = decl {
                object.insert("decl".into(), json!(decl.index()));
            }
        }
        NodeKind::Expr(ExprNode::LitInt { value, .. }) => {
            object.insert("value".into(), json!(value));
        }
        NodeKind::Expr(ExprNode::LitFloat { value, .. }) => {
            object.insert("value".into(), json!(value));
        }
        NodeKind::Expr(ExprNode::LitStr { value }) => {
            object.insert("value".into(), json!(interner.resolve(*value)));
        }
        NodeKind::Expr(ExprNode::LitChar { value }) => {
            object.insert("value".into(), json!(value.to_string()));
        }
        NodeKind::Expr(ExprNode::LitBool { value }) => {
            object.insert("value".into(), json!(value));
        }
        NodeKind::Expr(ExprNode::Unary { op, .. })
        | NodeKind::Expr(ExprNode::Binary { op, .. }) => {
            object.insert("op".into(), json!(op.name()));
        }
        NodeKind::Type(TypeNode::Named { name, decl }) => {
            object.insert("name".into(), json!(interner.resolve(*name)));
            if let Some(decl) = decl {
                object.insert("decl".into(), json!(decl.index()));
            }
        }
        NodeKind::Type(TypeNode::Array { size, .. }) => {
            object.insert("sized".into(), json!(size.is_some()));
        }
        NodeKind::Type(TypeNode::Fun {
            is_vararg, callconv, ..
        }) => {
            object.insert("is_vararg".into(), json!(is_vararg));
            object.insert("callconv".into(), json!(callconv.as_str()));
        }
        NodeKind::Decl(DeclNode::Fun {
            is_pub,
            is_extern,
            is_vararg,
            callconv,
            ..
        }) => {
            object.insert("is_pub".into(), json!(is_pub));
            object.insert("is_extern".into(), json!(is_extern));
            object.insert("is_vararg".into(), json!(is_vararg));
            object.insert("callconv".into(), json!(callconv.as_str()));
        }
        NodeKind::Stmt(StmtNode::Break { target }) => {
            if let Some(target) = target {
                object.insert("loop".into(), json!(target.index()));
            }
        }
        NodeKind::Stmt(StmtNode::Continue { target }) => {
            if let Some(target) = target {
                object.insert("loop".into(), json!(target.index()));
            }
        }
        _ => {}
    }

    let children: Vec<Value> = ast
        .children(id)
        .into_iter()
        .map(|child| node_json(ast, child, interner))
        .collect();
    if !children.is_empty() {
        object.insert("children".into(), Value::Array(children));
    }

    Value::Object(object)
}

/// The dump file path for an input: same directory and stem, new suffix.
pub fn dump_path(input: &std::path::Path, suffix: &str) -> std::path::PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    input.with_file_name(format!("{}.{}", stem, suffix))
}
