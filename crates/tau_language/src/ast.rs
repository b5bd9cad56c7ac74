//! The Tau abstract syntax tree.
//!
//! Every node lives in the [`Ast`] registry for the whole translation unit
//! and is addressed by [`NodeId`]. Back-references written by the semantic
//! passes (identifier → declaration, break → loop, declaration → scope) are
//! ids too: lookups, never ownership.
//!
//! Nodes are grouped into families, each a single sum type discriminated by
//! its variant: [`TypeNode`], [`ExprNode`], [`StmtNode`], [`DeclNode`],
//! plus identifiers and the program root. Visitor dispatch is a `match`
//! over the variant; there are no virtual tables.

use std::fmt;

use tau_base::{Arena, ArenaId, Symbol};

use crate::symtable::ScopeId;
use crate::token::Token;

/// Identity of an AST node within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(ArenaId);

impl NodeId {
    pub fn index(self) -> usize {
        self.0.index()
    }

    pub fn from_index(index: usize) -> Self {
        NodeId(ArenaId::from_index(index))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.index())
    }
}

/// Primitive types as they appear in type position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    C64,
    C128,
    Char,
    Bool,
    Unit,
}

/// Calling conventions recognised on `extern` functions and function types.
///
/// Only `Tau` and `Cdecl` vary return-address handling; the rest fix
/// register assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallConv {
    #[default]
    Tau,
    Cdecl,
    Stdcall,
    Win64,
    Sysv64,
    Aapcs,
    Fastcall,
    Vectorcall,
    Thiscall,
}

impl CallConv {
    pub fn from_str(name: &str) -> Option<Self> {
        Some(match name {
            "Tau" => Self::Tau,
            "cdecl" => Self::Cdecl,
            "stdcall" => Self::Stdcall,
            "win64" => Self::Win64,
            "sysv64" => Self::Sysv64,
            "aapcs" => Self::Aapcs,
            "fastcall" => Self::Fastcall,
            "vectorcall" => Self::Vectorcall,
            "thiscall" => Self::Thiscall,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tau => "Tau",
            Self::Cdecl => "cdecl",
            Self::Stdcall => "stdcall",
            Self::Win64 => "win64",
            Self::Sysv64 => "sysv64",
            Self::Aapcs => "aapcs",
            Self::Fastcall => "fastcall",
            Self::Vectorcall => "vectorcall",
            Self::Thiscall => "thiscall",
        }
    }
}

/// Every operator the expression parser produces.
///
/// Unary and binary operators share one enumeration; [`Op::is_unary`] and
/// [`Op::is_binary`] partition it, with `Call` and `Spec` standing apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Sizeof,
    Alignof,
    As,
    AritIncPre,
    AritIncPost,
    AritDecPre,
    AritDecPost,
    AritPos,
    AritNeg,
    AritAdd,
    AritSub,
    AritMul,
    AritDiv,
    AritMod,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    BitLsh,
    BitRsh,
    LogicAnd,
    LogicOr,
    LogicNot,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    Assign,
    AssignAritAdd,
    AssignAritSub,
    AssignAritMul,
    AssignAritDiv,
    AssignAritMod,
    AssignBitAnd,
    AssignBitOr,
    AssignBitXor,
    AssignBitLsh,
    AssignBitRsh,
    Subs,
    Ind,
    Addr,
    Access,
    AccessInd,
    AccessOpt,
    Range,
    UnwrapSafe,
    UnwrapUnsafe,
    Call,
    Spec,
}

impl Op {
    /// Binding strength; lower binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Op::Access
            | Op::AccessInd
            | Op::AccessOpt
            | Op::AritIncPost
            | Op::AritDecPost
            | Op::UnwrapSafe
            | Op::UnwrapUnsafe
            | Op::Subs
            | Op::Call
            | Op::Spec => 0,
            Op::Sizeof
            | Op::Alignof
            | Op::As
            | Op::AritIncPre
            | Op::AritDecPre
            | Op::AritPos
            | Op::AritNeg
            | Op::BitNot
            | Op::LogicNot
            | Op::Ind
            | Op::Addr => 1,
            Op::AritMul | Op::AritDiv | Op::AritMod => 2,
            Op::AritAdd | Op::AritSub => 3,
            Op::Range => 4,
            Op::BitLsh | Op::BitRsh => 5,
            Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => 6,
            Op::CmpEq | Op::CmpNe => 7,
            Op::BitAnd => 8,
            Op::BitXor => 9,
            Op::BitOr => 10,
            Op::LogicAnd => 11,
            Op::LogicOr => 12,
            Op::Assign
            | Op::AssignAritAdd
            | Op::AssignAritSub
            | Op::AssignAritMul
            | Op::AssignAritDiv
            | Op::AssignAritMod
            | Op::AssignBitAnd
            | Op::AssignBitOr
            | Op::AssignBitXor
            | Op::AssignBitLsh
            | Op::AssignBitRsh => 13,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Op::Sizeof
                | Op::Alignof
                | Op::AritIncPre
                | Op::AritIncPost
                | Op::AritDecPre
                | Op::AritDecPost
                | Op::AritPos
                | Op::AritNeg
                | Op::BitNot
                | Op::LogicNot
                | Op::Ind
                | Op::Addr
                | Op::UnwrapSafe
                | Op::UnwrapUnsafe
        )
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Op::As
                | Op::AritAdd
                | Op::AritSub
                | Op::AritMul
                | Op::AritDiv
                | Op::AritMod
                | Op::BitAnd
                | Op::BitOr
                | Op::BitXor
                | Op::BitLsh
                | Op::BitRsh
                | Op::LogicAnd
                | Op::LogicOr
                | Op::CmpEq
                | Op::CmpNe
                | Op::CmpLt
                | Op::CmpLe
                | Op::CmpGt
                | Op::CmpGe
                | Op::Assign
                | Op::AssignAritAdd
                | Op::AssignAritSub
                | Op::AssignAritMul
                | Op::AssignAritDiv
                | Op::AssignAritMod
                | Op::AssignBitAnd
                | Op::AssignBitOr
                | Op::AssignBitXor
                | Op::AssignBitLsh
                | Op::AssignBitRsh
                | Op::Subs
                | Op::Access
                | Op::AccessInd
                | Op::AccessOpt
                | Op::Range
        )
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Op::Assign
                | Op::AssignAritAdd
                | Op::AssignAritSub
                | Op::AssignAritMul
                | Op::AssignAritDiv
                | Op::AssignAritMod
                | Op::AssignBitAnd
                | Op::AssignBitOr
                | Op::AssignBitXor
                | Op::AssignBitLsh
                | Op::AssignBitRsh
        )
    }

    pub fn is_left_assoc(self) -> bool {
        matches!(
            self,
            Op::AritIncPost
                | Op::AritDecPost
                | Op::As
                | Op::AritAdd
                | Op::AritSub
                | Op::AritMul
                | Op::AritDiv
                | Op::AritMod
                | Op::BitAnd
                | Op::BitOr
                | Op::BitXor
                | Op::BitLsh
                | Op::BitRsh
                | Op::LogicAnd
                | Op::LogicOr
                | Op::CmpEq
                | Op::CmpNe
                | Op::CmpLt
                | Op::CmpLe
                | Op::CmpGt
                | Op::CmpGe
                | Op::Subs
                | Op::Access
                | Op::AccessInd
                | Op::AccessOpt
                | Op::Range
                | Op::UnwrapSafe
                | Op::UnwrapUnsafe
                | Op::Call
                | Op::Spec
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Sizeof => "sizeof",
            Op::Alignof => "alignof",
            Op::As => "as",
            Op::AritIncPre | Op::AritIncPost => "++",
            Op::AritDecPre | Op::AritDecPost => "--",
            Op::AritPos => "+",
            Op::AritNeg => "-",
            Op::AritAdd => "+",
            Op::AritSub => "-",
            Op::AritMul => "*",
            Op::AritDiv => "/",
            Op::AritMod => "%",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::BitNot => "~",
            Op::BitLsh => "<<",
            Op::BitRsh => ">>",
            Op::LogicAnd => "&&",
            Op::LogicOr => "||",
            Op::LogicNot => "!",
            Op::CmpEq => "==",
            Op::CmpNe => "!=",
            Op::CmpLt => "<",
            Op::CmpLe => "<=",
            Op::CmpGt => ">",
            Op::CmpGe => ">=",
            Op::Assign => "=",
            Op::AssignAritAdd => "+=",
            Op::AssignAritSub => "-=",
            Op::AssignAritMul => "*=",
            Op::AssignAritDiv => "/=",
            Op::AssignAritMod => "%=",
            Op::AssignBitAnd => "&=",
            Op::AssignBitOr => "|=",
            Op::AssignBitXor => "^=",
            Op::AssignBitLsh => "<<=",
            Op::AssignBitRsh => ">>=",
            Op::Subs => "[]",
            Op::Ind => "*",
            Op::Addr => "&",
            Op::Access => ".",
            Op::AccessInd => "*.",
            Op::AccessOpt => "?.",
            Op::Range => "..",
            Op::UnwrapSafe => "?",
            Op::UnwrapUnsafe => "!",
            Op::Call => "()",
            Op::Spec => ".<>",
        }
    }
}

/// Type-position nodes.
#[derive(Debug, Clone)]
pub enum TypeNode {
    Mut { base: NodeId },
    Ptr { base: NodeId },
    Array { size: Option<NodeId>, base: NodeId },
    Ref { base: NodeId },
    Opt { base: NodeId },
    Prim(Prim),
    Vec { lanes: u8, elem: Prim },
    Mat { rows: u8, cols: u8, elem: Prim },
    Fun {
        params: Vec<NodeId>,
        ret: NodeId,
        is_vararg: bool,
        callconv: CallConv,
    },
    /// A user-defined type reference; `decl` is written by name resolution.
    Named { name: Symbol, decl: Option<NodeId> },
    /// A qualified member type, `Mod.Member`; `decl` written by nameres.
    Member {
        parent: NodeId,
        member: NodeId,
        decl: Option<NodeId>,
    },
}

/// Expression nodes.
#[derive(Debug, Clone)]
pub enum ExprNode {
    LitInt { value: u64, suffix: Option<Prim> },
    LitFloat { value: f64, suffix: Option<Prim> },
    LitStr { value: Symbol },
    LitChar { value: char },
    LitBool { value: bool },
    LitNull,
    /// An identifier use; `decl` is written by name resolution.
    Ident { name: Symbol, decl: Option<NodeId> },
    Unary { op: Op, operand: NodeId },
    Binary { op: Op, lhs: NodeId, rhs: NodeId },
    Call { callee: NodeId, args: Vec<NodeId> },
    /// Generic specialization, `generic.<T, U>`.
    Spec { generic: NodeId, args: Vec<NodeId> },
}

/// Statement nodes.
#[derive(Debug, Clone)]
pub enum StmtNode {
    If {
        cond: NodeId,
        then: NodeId,
        els: Option<NodeId>,
    },
    For {
        var: NodeId,
        range: NodeId,
        body: NodeId,
        scope: Option<ScopeId>,
    },
    While {
        cond: NodeId,
        body: NodeId,
        scope: Option<ScopeId>,
    },
    Loop {
        body: NodeId,
        scope: Option<ScopeId>,
    },
    /// `loop` binding written by the analysis passes.
    Break { target: Option<NodeId> },
    /// `loop` binding written by the analysis passes.
    Continue { target: Option<NodeId> },
    Return { value: Option<NodeId> },
    Defer { body: NodeId },
    Block {
        stmts: Vec<NodeId>,
        scope: Option<ScopeId>,
    },
    Expr { expr: NodeId },
}

/// Declaration nodes.
#[derive(Debug, Clone)]
pub enum DeclNode {
    Var {
        name: NodeId,
        ty: NodeId,
        init: Option<NodeId>,
        is_pub: bool,
    },
    Param {
        name: NodeId,
        ty: NodeId,
        default: Option<NodeId>,
    },
    Fun {
        name: NodeId,
        params: Vec<NodeId>,
        ret: NodeId,
        body: Option<NodeId>,
        is_pub: bool,
        is_extern: bool,
        is_vararg: bool,
        callconv: CallConv,
        scope: Option<ScopeId>,
    },
    Struct {
        name: NodeId,
        fields: Vec<NodeId>,
        is_pub: bool,
        scope: Option<ScopeId>,
    },
    Union {
        name: NodeId,
        fields: Vec<NodeId>,
        is_pub: bool,
        scope: Option<ScopeId>,
    },
    Enum {
        name: NodeId,
        constants: Vec<NodeId>,
        is_pub: bool,
        scope: Option<ScopeId>,
    },
    EnumConstant { name: NodeId },
    Mod {
        name: NodeId,
        members: Vec<NodeId>,
        is_pub: bool,
        scope: Option<ScopeId>,
    },
    TypeAlias {
        name: NodeId,
        ty: NodeId,
        is_pub: bool,
        scope: Option<ScopeId>,
    },
    /// Generic wrapper around a declaration.
    Generic {
        params: Vec<NodeId>,
        inner: NodeId,
    },
    GenericParam { name: NodeId },
    Use { segments: Vec<NodeId> },
}

/// One registered AST node: its variant payload plus the token it came from.
#[derive(Debug, Clone)]
pub struct Node {
    pub token: Token,
    pub kind: NodeKind,
}

/// The node families.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A bare identifier in name position (declaration names, members).
    Ident { name: Symbol },
    Type(TypeNode),
    Expr(ExprNode),
    Stmt(StmtNode),
    Decl(DeclNode),
    Prog { decls: Vec<NodeId> },
}

impl NodeKind {
    /// Short tag used by dumps and debug output.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Ident { .. } => "id",
            NodeKind::Type(t) => match t {
                TypeNode::Mut { .. } => "type_mut",
                TypeNode::Ptr { .. } => "type_ptr",
                TypeNode::Array { .. } => "type_array",
                TypeNode::Ref { .. } => "type_ref",
                TypeNode::Opt { .. } => "type_opt",
                TypeNode::Prim(_) => "type_prim",
                TypeNode::Vec { .. } => "type_vec",
                TypeNode::Mat { .. } => "type_mat",
                TypeNode::Fun { .. } => "type_fun",
                TypeNode::Named { .. } => "type_id",
                TypeNode::Member { .. } => "type_member",
            },
            NodeKind::Expr(e) => match e {
                ExprNode::LitInt { .. } => "expr_lit_int",
                ExprNode::LitFloat { .. } => "expr_lit_flt",
                ExprNode::LitStr { .. } => "expr_lit_str",
                ExprNode::LitChar { .. } => "expr_lit_char",
                ExprNode::LitBool { .. } => "expr_lit_bool",
                ExprNode::LitNull => "expr_lit_null",
                ExprNode::Ident { .. } => "expr_id",
                ExprNode::Unary { .. } => "expr_op_un",
                ExprNode::Binary { .. } => "expr_op_bin",
                ExprNode::Call { .. } => "expr_op_call",
                ExprNode::Spec { .. } => "expr_op_spec",
            },
            NodeKind::Stmt(s) => match s {
                StmtNode::If { .. } => "stmt_if",
                StmtNode::For { .. } => "stmt_for",
                StmtNode::While { .. } => "stmt_while",
                StmtNode::Loop { .. } => "stmt_loop",
                StmtNode::Break { .. } => "stmt_break",
                StmtNode::Continue { .. } => "stmt_continue",
                StmtNode::Return { .. } => "stmt_return",
                StmtNode::Defer { .. } => "stmt_defer",
                StmtNode::Block { .. } => "stmt_block",
                StmtNode::Expr { .. } => "stmt_expr",
            },
            NodeKind::Decl(d) => match d {
                DeclNode::Var { .. } => "decl_var",
                DeclNode::Param { .. } => "decl_param",
                DeclNode::Fun { .. } => "decl_fun",
                DeclNode::Struct { .. } => "decl_struct",
                DeclNode::Union { .. } => "decl_union",
                DeclNode::Enum { .. } => "decl_enum",
                DeclNode::EnumConstant { .. } => "decl_enum_constant",
                DeclNode::Mod { .. } => "decl_mod",
                DeclNode::TypeAlias { .. } => "decl_type_alias",
                DeclNode::Generic { .. } => "decl_generic",
                DeclNode::GenericParam { .. } => "decl_generic_param",
                DeclNode::Use { .. } => "decl_use",
            },
            NodeKind::Prog { .. } => "prog",
        }
    }
}

/// The registry that owns every AST node of a translation unit.
///
/// Nodes are never freed mid-compile; the registry is dropped whole at
/// environment teardown.
pub struct Ast {
    nodes: Arena<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
        }
    }

    /// Registers a node and returns its id.
    pub fn alloc(&mut self, token: Token, kind: NodeKind) -> NodeId {
        NodeId(self.nodes.alloc(Node { token, kind }))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (NodeId(id), node))
    }

    /// The name symbol of an identifier node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not an identifier node.
    pub fn ident_name(&self, id: NodeId) -> Symbol {
        match &self.node(id).kind {
            NodeKind::Ident { name } => *name,
            other => panic!("expected identifier node, found {}", other.tag()),
        }
    }

    /// Direct children of a node, in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let push_opt = |out: &mut Vec<NodeId>, id: &Option<NodeId>| {
            if let Some(id) = id {
                out.push(*id);
            }
        };

        match &self.node(id).kind {
            NodeKind::Ident { .. } => {}
            NodeKind::Type(t) => match t {
                TypeNode::Mut { base }
                | TypeNode::Ptr { base }
                | TypeNode::Ref { base }
                | TypeNode::Opt { base } => out.push(*base),
                TypeNode::Array { size, base } => {
                    push_opt(&mut out, size);
                    out.push(*base);
                }
                TypeNode::Prim(_) | TypeNode::Vec { .. } | TypeNode::Mat { .. } => {}
                TypeNode::Fun { params, ret, .. } => {
                    out.extend(params.iter().copied());
                    out.push(*ret);
                }
                TypeNode::Named { .. } => {}
                TypeNode::Member { parent, member, .. } => {
                    out.push(*parent);
                    out.push(*member);
                }
            },
            NodeKind::Expr(e) => match e {
                ExprNode::LitInt { .. }
                | ExprNode::LitFloat { .. }
                | ExprNode::LitStr { .. }
                | ExprNode::LitChar { .. }
                | ExprNode::LitBool { .. }
                | ExprNode::LitNull
                | ExprNode::Ident { .. } => {}
                ExprNode::Unary { operand, .. } => out.push(*operand),
                ExprNode::Binary { lhs, rhs, .. } => {
                    out.push(*lhs);
                    out.push(*rhs);
                }
                ExprNode::Call { callee, args } => {
                    out.push(*callee);
                    out.extend(args.iter().copied());
                }
                ExprNode::Spec { generic, args } => {
                    out.push(*generic);
                    out.extend(args.iter().copied());
                }
            },
            NodeKind::Stmt(s) => match s {
                StmtNode::If { cond, then, els } => {
                    out.push(*cond);
                    out.push(*then);
                    push_opt(&mut out, els);
                }
                StmtNode::For {
                    var, range, body, ..
                } => {
                    out.push(*var);
                    out.push(*range);
                    out.push(*body);
                }
                StmtNode::While { cond, body, .. } => {
                    out.push(*cond);
                    out.push(*body);
                }
                StmtNode::Loop { body, .. } => out.push(*body),
                StmtNode::Break { .. } | StmtNode::Continue { .. } => {}
                StmtNode::Return { value } => push_opt(&mut out, value),
                StmtNode::Defer { body } => out.push(*body),
                StmtNode::Block { stmts, .. } => out.extend(stmts.iter().copied()),
                StmtNode::Expr { expr } => out.push(*expr),
            },
            NodeKind::Decl(d) => match d {
                DeclNode::Var { name, ty, init, .. } => {
                    out.push(*name);
                    out.push(*ty);
                    push_opt(&mut out, init);
                }
                DeclNode::Param { name, ty, default } => {
                    out.push(*name);
                    out.push(*ty);
                    push_opt(&mut out, default);
                }
                DeclNode::Fun {
                    name,
                    params,
                    ret,
                    body,
                    ..
                } => {
                    out.push(*name);
                    out.extend(params.iter().copied());
                    out.push(*ret);
                    push_opt(&mut out, body);
                }
                DeclNode::Struct { name, fields, .. }
                | DeclNode::Union { name, fields, .. } => {
                    out.push(*name);
                    out.extend(fields.iter().copied());
                }
                DeclNode::Enum {
                    name, constants, ..
                } => {
                    out.push(*name);
                    out.extend(constants.iter().copied());
                }
                DeclNode::EnumConstant { name } => out.push(*name),
                DeclNode::Mod { name, members, .. } => {
                    out.push(*name);
                    out.extend(members.iter().copied());
                }
                DeclNode::TypeAlias { name, ty, .. } => {
                    out.push(*name);
                    out.push(*ty);
                }
                DeclNode::Generic { params, inner } => {
                    out.extend(params.iter().copied());
                    out.push(*inner);
                }
                DeclNode::GenericParam { name } => out.push(*name),
                DeclNode::Use { segments } => out.extend(segments.iter().copied()),
            },
            NodeKind::Prog { decls } => out.extend(decls.iter().copied()),
        }

        out
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use tau_base::SourceRegistry;

    fn dummy_token() -> Token {
        let mut registry = SourceRegistry::new();
        let id = registry.add("test.tau", "");
        Token::new(TokenKind::Ident, id, 0)
    }

    #[test]
    fn alloc_assigns_sequential_identities() {
        let mut ast = Ast::new();
        let a = ast.alloc(dummy_token(), NodeKind::Ident { name: Symbol::EMPTY });
        let b = ast.alloc(dummy_token(), NodeKind::Ident { name: Symbol::EMPTY });
        assert_ne!(a, b);
        assert_eq!(a.index() + 1, b.index());
    }

    #[test]
    fn nodes_are_never_freed_mid_compile() {
        let mut ast = Ast::new();
        let ids: Vec<NodeId> = (0..100)
            .map(|_| ast.alloc(dummy_token(), NodeKind::Expr(ExprNode::LitNull)))
            .collect();
        for id in ids {
            assert!(matches!(
                ast.node(id).kind,
                NodeKind::Expr(ExprNode::LitNull)
            ));
        }
    }

    #[test]
    fn side_data_is_written_in_place() {
        let mut ast = Ast::new();
        let decl = ast.alloc(dummy_token(), NodeKind::Ident { name: Symbol::EMPTY });
        let expr = ast.alloc(
            dummy_token(),
            NodeKind::Expr(ExprNode::Ident {
                name: Symbol::EMPTY,
                decl: None,
            }),
        );

        if let NodeKind::Expr(ExprNode::Ident { decl: slot, .. }) = &mut ast.node_mut(expr).kind {
            *slot = Some(decl);
        }

        match &ast.node(expr).kind {
            NodeKind::Expr(ExprNode::Ident { decl: Some(d), .. }) => assert_eq!(*d, decl),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn children_follow_source_order() {
        let mut ast = Ast::new();
        let lhs = ast.alloc(
            dummy_token(),
            NodeKind::Expr(ExprNode::LitInt {
                value: 1,
                suffix: None,
            }),
        );
        let rhs = ast.alloc(
            dummy_token(),
            NodeKind::Expr(ExprNode::LitInt {
                value: 2,
                suffix: None,
            }),
        );
        let add = ast.alloc(
            dummy_token(),
            NodeKind::Expr(ExprNode::Binary {
                op: Op::AritAdd,
                lhs,
                rhs,
            }),
        );
        assert_eq!(ast.children(add), vec![lhs, rhs]);
    }

    #[test]
    fn op_precedence_orders_by_binding() {
        assert!(Op::AritMul.precedence() < Op::AritAdd.precedence());
        assert!(Op::AritAdd.precedence() < Op::CmpLt.precedence());
        assert!(Op::LogicOr.precedence() < Op::Assign.precedence());
        assert_eq!(Op::Call.precedence(), 0);
    }

    #[test]
    fn op_partitions_are_disjoint() {
        for op in [
            Op::Sizeof,
            Op::AritAdd,
            Op::Assign,
            Op::Subs,
            Op::Ind,
            Op::Call,
            Op::Spec,
        ] {
            assert!(
                !(op.is_unary() && op.is_binary()),
                "{:?} is both unary and binary",
                op
            );
        }
        assert!(!Op::Call.is_unary() && !Op::Call.is_binary());
        assert!(!Op::Spec.is_unary() && !Op::Spec.is_binary());
    }

    #[test]
    fn assignments_are_right_associative() {
        assert!(Op::Assign.is_assignment());
        assert!(!Op::Assign.is_left_assoc());
        assert!(Op::AritAdd.is_left_assoc());
    }

    #[test]
    fn callconv_round_trips_through_names() {
        for conv in [
            CallConv::Tau,
            CallConv::Cdecl,
            CallConv::Stdcall,
            CallConv::Win64,
            CallConv::Sysv64,
            CallConv::Aapcs,
            CallConv::Fastcall,
            CallConv::Vectorcall,
            CallConv::Thiscall,
        ] {
            assert_eq!(CallConv::from_str(conv.as_str()), Some(conv));
        }
        assert_eq!(CallConv::from_str("pascal"), None);
    }
}
