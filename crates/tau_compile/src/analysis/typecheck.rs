//! Type checking.
//!
//! A single bottom-up traversal. Each node's children are visited first,
//! their type-table entries read back, and the node's own type inserted, so
//! every visited node ends up with exactly one entry.
//!
//! Signatures come before bodies: the pass first types every declaration
//! head (function signatures, composite layouts, aliases), then walks the
//! bodies. Forward references therefore typecheck.
//!
//! Errors poison the offending node with the error sentinel, which
//! converts to and from anything, so one primary diagnostic does not drag
//! a trail of secondary mismatches behind it.

use std::collections::HashSet;

use tau_base::{Diagnostic, ErrorBag, SourceRegistry, Span};
use tau_language::ast::{DeclNode, ExprNode, NodeKind, Op, StmtNode, TypeNode};
use tau_language::{Ast, NodeId, ScopeTree};

use crate::types::{TypeBuilder, TypeDesc, TypeId, TypeTable};

use super::codes;

struct TypeCheck<'e> {
    ast: &'e mut Ast,
    scopes: &'e ScopeTree,
    types: &'e mut TypeBuilder,
    table: &'e mut TypeTable,
    registry: &'e SourceRegistry,
    bag: &'e mut ErrorBag,
    /// Enclosing function / loop / defer nodes, innermost last.
    stack: Vec<NodeId>,
    /// Declarations whose signature is being typed right now, to catch
    /// value cycles like `struct A { a: A }`.
    in_signature: HashSet<NodeId>,
    aborted: bool,
}

/// Runs the type check pass over a program.
pub fn run(
    ast: &mut Ast,
    prog: NodeId,
    scopes: &ScopeTree,
    types: &mut TypeBuilder,
    table: &mut TypeTable,
    registry: &SourceRegistry,
    bag: &mut ErrorBag,
) {
    let mut pass = TypeCheck {
        ast,
        scopes,
        types,
        table,
        registry,
        bag,
        stack: Vec::new(),
        in_signature: HashSet::new(),
        aborted: false,
    };
    pass.visit_prog(prog);
}

impl<'e> TypeCheck<'e> {
    fn location(&self, node: NodeId) -> (tau_base::SourceId, Span) {
        let token = self.ast.node(node).token;
        let text = self.registry.contents(token.source);
        (token.source, token.span(text))
    }

    fn error(&mut self, code: u16, title: String, node: NodeId) {
        let (source, span) = self.location(node);
        if self
            .bag
            .report(Diagnostic::error(code, title, source, span))
            .is_err()
        {
            self.aborted = true;
        }
    }

    fn warn(&mut self, code: u16, title: &str, node: NodeId) {
        let (source, span) = self.location(node);
        let _ = self
            .bag
            .report(Diagnostic::warning(code, title, source, span));
    }

    fn set(&mut self, node: NodeId, ty: TypeId) -> TypeId {
        self.table.insert(node, ty);
        ty
    }

    fn poison(&mut self, node: NodeId) -> TypeId {
        let p = self.types.poison();
        self.set(node, p)
    }

    /// The type of a place expression: a reference to `ty`. A type that
    /// already is a reference stays one; places never nest references.
    fn place_ref(&mut self, ty: TypeId) -> TypeId {
        if matches!(self.types.desc(ty), TypeDesc::Ref(_)) {
            ty
        } else {
            self.types.build_ref(ty)
        }
    }

    fn mismatch(&mut self, node: NodeId, expected: TypeId, found: TypeId) {
        let title = format!(
            "type mismatch: expected {}, found {}",
            self.types.display(expected),
            self.types.display(found)
        );
        self.error(codes::TYPE_MISMATCH, title, node);
    }

    // ------------------------------------------------------------------
    // Program: signatures first, bodies second
    // ------------------------------------------------------------------

    fn visit_prog(&mut self, prog: NodeId) {
        let NodeKind::Prog { decls } = &self.ast.node(prog).kind else {
            unreachable!("type checking starts at the program root");
        };
        let decls = decls.clone();

        for &decl in &decls {
            if self.aborted {
                return;
            }
            self.declare_signature(decl);
        }
        for &decl in &decls {
            if self.aborted {
                return;
            }
            self.check_body(decl);
        }
    }

    fn declare_signature(&mut self, decl: NodeId) {
        if self.table.lookup(decl).is_some() || self.aborted {
            return;
        }
        if !self.in_signature.insert(decl) {
            self.error(
                codes::RECURSIVE_TYPE,
                "recursive type has infinite size".into(),
                decl,
            );
            self.poison(decl);
            return;
        }

        match self.ast.node(decl).kind.clone() {
            NodeKind::Decl(DeclNode::Var { ty, .. }) => {
                let var_ty = self.visit_type(ty);
                self.set(decl, var_ty);
            }
            NodeKind::Decl(DeclNode::Param { ty, .. }) => {
                let param_ty = self.visit_type(ty);
                self.set(decl, param_ty);
            }
            NodeKind::Decl(DeclNode::Fun {
                params,
                ret,
                is_vararg,
                callconv,
                ..
            }) => {
                let mut param_types = Vec::with_capacity(params.len());
                for &param in &params {
                    self.declare_signature(param);
                    let ty = self
                        .table
                        .lookup(param)
                        .unwrap_or_else(|| self.types.poison());
                    param_types.push(ty);
                }
                let ret_ty = self.visit_type(ret);
                let fun_ty = self.types.build_fun(param_types, ret_ty, is_vararg, callconv);
                self.set(decl, fun_ty);
            }
            NodeKind::Decl(DeclNode::Generic { inner, .. }) => {
                // Generic declarations carry no monomorphic type; anything
                // that reaches for one gets the sentinel.
                self.poison(decl);
                self.declare_signature(inner);
            }
            NodeKind::Decl(DeclNode::Struct { fields, .. }) => {
                let field_types = self.field_types(&fields);
                let ty = self.types.build_struct(decl, field_types);
                self.set(decl, ty);
            }
            NodeKind::Decl(DeclNode::Union { fields, .. }) => {
                let field_types = self.field_types(&fields);
                let ty = self.types.build_union(decl, field_types);
                self.set(decl, ty);
            }
            NodeKind::Decl(DeclNode::Enum { constants, .. }) => {
                let ty = self.types.build_enum(decl);
                self.set(decl, ty);
                for &constant in &constants {
                    self.set(constant, ty);
                }
            }
            NodeKind::Decl(DeclNode::Mod { members, .. }) => {
                for &member in &members {
                    self.declare_signature(member);
                }
                let unit = self.types.unit();
                self.set(decl, unit);
            }
            NodeKind::Decl(DeclNode::TypeAlias { ty, .. }) => {
                let aliased = self.visit_type(ty);
                self.set(decl, aliased);
            }
            NodeKind::Decl(DeclNode::EnumConstant { .. }) => {
                // Typed alongside its enum.
            }
            NodeKind::Decl(DeclNode::GenericParam { .. }) => {
                let var = self.types.build_var(decl);
                self.set(decl, var);
            }
            NodeKind::Decl(DeclNode::Use { .. }) => {}
            other => unreachable!("not a declaration: {}", other.tag()),
        }

        self.in_signature.remove(&decl);
    }

    fn field_types(&mut self, fields: &[NodeId]) -> Vec<TypeId> {
        let mut out = Vec::with_capacity(fields.len());
        for &field in fields {
            self.declare_signature(field);
            let ty = self
                .table
                .lookup(field)
                .unwrap_or_else(|| self.types.poison());
            out.push(ty);
        }
        out
    }

    fn check_body(&mut self, decl: NodeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(decl).kind.clone() {
            NodeKind::Decl(DeclNode::Var { init, .. }) => {
                let var_ty = self
                    .table
                    .lookup(decl)
                    .expect("variable signature was typed");
                if let Some(init) = init {
                    let init_ty = self.visit_expr(init);
                    if !self.types.is_implicitly_convertible(init_ty, var_ty) {
                        self.mismatch(init, var_ty, init_ty);
                    }
                }
            }
            NodeKind::Decl(DeclNode::Param { default, .. }) => {
                let param_ty = self
                    .table
                    .lookup(decl)
                    .expect("parameter signature was typed");
                if let Some(default) = default {
                    let default_ty = self.visit_expr(default);
                    if !self.types.is_implicitly_convertible(default_ty, param_ty) {
                        self.mismatch(default, param_ty, default_ty);
                    }
                }
            }
            NodeKind::Decl(DeclNode::Fun { params, body, .. }) => {
                for &param in &params {
                    self.check_body(param);
                }
                if let Some(body) = body {
                    self.stack.push(decl);
                    self.visit_stmt(body);
                    self.stack.pop();
                }
            }
            NodeKind::Decl(DeclNode::Generic { inner, .. }) => {
                self.check_body(inner);
            }
            NodeKind::Decl(DeclNode::Mod { members, .. }) => {
                for &member in &members {
                    self.check_body(member);
                }
            }
            NodeKind::Decl(DeclNode::Struct { .. })
            | NodeKind::Decl(DeclNode::Union { .. })
            | NodeKind::Decl(DeclNode::Enum { .. })
            | NodeKind::Decl(DeclNode::EnumConstant { .. })
            | NodeKind::Decl(DeclNode::TypeAlias { .. })
            | NodeKind::Decl(DeclNode::GenericParam { .. })
            | NodeKind::Decl(DeclNode::Use { .. }) => {}
            other => unreachable!("not a declaration: {}", other.tag()),
        }
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn visit_type(&mut self, node: NodeId) -> TypeId {
        if let Some(existing) = self.table.lookup(node) {
            return existing;
        }
        if self.aborted {
            return self.poison(node);
        }

        match self.ast.node(node).kind.clone() {
            NodeKind::Type(TypeNode::Prim(prim)) => {
                let ty = self.types.prim(prim);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Vec { lanes, elem }) => {
                let elem_ty = self.types.prim(elem);
                let ty = self.types.build_vector(lanes, elem_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Mat { rows, cols, elem }) => {
                let elem_ty = self.types.prim(elem);
                let ty = self.types.build_matrix(rows, cols, elem_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Mut { base }) => {
                let base_ty = self.visit_type(base);
                if self.types.is_poison(base_ty) {
                    return self.poison(node);
                }
                if !self.types.can_add_mut(base_ty) {
                    self.invalid_modifier(node, "mut", base_ty);
                    return self.poison(node);
                }
                let ty = self.types.build_mut(base_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Ptr { base }) => {
                let base_ty = self.visit_type(base);
                if self.types.is_poison(base_ty) {
                    return self.poison(node);
                }
                if !self.types.can_add_ptr(base_ty) {
                    self.invalid_modifier(node, "pointer", base_ty);
                    return self.poison(node);
                }
                let ty = self.types.build_ptr(base_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Ref { base }) => {
                let base_ty = self.visit_type(base);
                if self.types.is_poison(base_ty) {
                    return self.poison(node);
                }
                if !self.types.can_add_ref(base_ty) {
                    self.invalid_modifier(node, "reference", base_ty);
                    return self.poison(node);
                }
                let ty = self.types.build_ref(base_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Opt { base }) => {
                let base_ty = self.visit_type(base);
                if self.types.is_poison(base_ty) {
                    return self.poison(node);
                }
                if !self.types.can_add_opt(base_ty) {
                    self.invalid_modifier(node, "optional", base_ty);
                    return self.poison(node);
                }
                let ty = self.types.build_opt(base_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Array { size, base }) => {
                let base_ty = self.visit_type(base);
                if self.types.is_poison(base_ty) {
                    return self.poison(node);
                }
                if !self.types.can_add_array(base_ty) {
                    self.invalid_modifier(node, "array", base_ty);
                    return self.poison(node);
                }

                let Some(size) = size else {
                    self.error(
                        codes::ARRAY_SIZE_NOT_POSITIVE,
                        "array type requires a positive constant length".into(),
                        node,
                    );
                    return self.poison(node);
                };
                self.visit_expr(size);
                let len = match self.ast.node(size).kind {
                    NodeKind::Expr(ExprNode::LitInt { value, .. }) if value > 0 => value,
                    _ => {
                        self.error(
                            codes::ARRAY_SIZE_NOT_POSITIVE,
                            "array length must be a positive integer literal".into(),
                            size,
                        );
                        return self.poison(node);
                    }
                };

                let ty = self.types.build_array(len, base_ty);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Fun {
                params,
                ret,
                is_vararg,
                callconv,
            }) => {
                let param_types: Vec<TypeId> =
                    params.iter().map(|&p| self.visit_type(p)).collect();
                let ret_ty = self.visit_type(ret);
                let ty = self.types.build_fun(param_types, ret_ty, is_vararg, callconv);
                self.set(node, ty)
            }
            NodeKind::Type(TypeNode::Named { decl, .. })
            | NodeKind::Type(TypeNode::Member { decl, .. }) => {
                let Some(decl) = decl else {
                    // Name resolution already reported this one.
                    return self.poison(node);
                };
                self.declare_signature(decl);
                let ty = self
                    .table
                    .lookup(decl)
                    .unwrap_or_else(|| self.types.poison());
                self.set(node, ty)
            }
            other => unreachable!("not a type: {}", other.tag()),
        }
    }

    fn invalid_modifier(&mut self, node: NodeId, modifier: &str, base: TypeId) {
        let title = format!(
            "a {} modifier cannot wrap {}",
            modifier,
            self.types.display(base)
        );
        self.error(codes::INVALID_TYPE_MODIFIER, title, node);
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn visit_stmt(&mut self, stmt: NodeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(stmt).kind.clone() {
            NodeKind::Decl(DeclNode::Var { .. }) => {
                self.declare_signature(stmt);
                self.check_body(stmt);
            }
            NodeKind::Stmt(StmtNode::If { cond, then, els }) => {
                self.check_condition(cond);
                self.visit_stmt(then);
                if let Some(els) = els {
                    self.visit_stmt(els);
                }
            }
            NodeKind::Stmt(StmtNode::While { cond, body, .. }) => {
                self.check_condition(cond);
                self.stack.push(stmt);
                self.visit_stmt(body);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::For {
                var, range, body, ..
            }) => {
                self.declare_signature(var);
                self.check_body(var);
                self.visit_expr(range);
                self.stack.push(stmt);
                self.visit_stmt(body);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::Loop { body, .. }) => {
                self.stack.push(stmt);
                self.visit_stmt(body);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::Break { .. }) | NodeKind::Stmt(StmtNode::Continue { .. }) => {
            }
            NodeKind::Stmt(StmtNode::Return { value }) => {
                self.visit_stmt_return(stmt, value);
            }
            NodeKind::Stmt(StmtNode::Defer { body }) => {
                self.stack.push(stmt);
                self.visit_stmt(body);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::Block { stmts, .. }) => {
                for inner in stmts {
                    self.visit_stmt(inner);
                }
            }
            NodeKind::Stmt(StmtNode::Expr { expr }) => {
                self.visit_expr(expr);
            }
            other => unreachable!("not a statement: {}", other.tag()),
        }
    }

    fn check_condition(&mut self, cond: NodeId) {
        let cond_ty = self.visit_expr(cond);
        let peeled = self.types.peel(cond_ty);
        if self.types.is_poison(peeled) {
            return;
        }
        if !matches!(self.types.desc(peeled), TypeDesc::Bool) {
            let found = self.types.display(peeled);
            self.error(
                codes::EXPECTED_BOOL,
                format!("condition must be bool, found {}", found),
                cond,
            );
        }
    }

    fn visit_stmt_return(&mut self, stmt: NodeId, value: Option<NodeId>) {
        let mut enclosing_fun = None;
        let mut crossed_defer = false;
        for &node in self.stack.iter().rev() {
            match self.ast.node(node).kind {
                NodeKind::Decl(DeclNode::Fun { .. }) => {
                    enclosing_fun = Some(node);
                    break;
                }
                NodeKind::Stmt(StmtNode::Defer { .. }) => {
                    crossed_defer = true;
                    break;
                }
                _ => {}
            }
        }

        if crossed_defer {
            self.error(
                codes::RETURN_INSIDE_DEFER,
                "cannot return from inside a deferred block".into(),
                stmt,
            );
            return;
        }
        let Some(fun) = enclosing_fun else {
            self.error(
                codes::RETURN_OUTSIDE_FUNCTION,
                "return outside of a function".into(),
                stmt,
            );
            return;
        };

        let value_ty = match value {
            Some(value) => self.visit_expr(value),
            None => self.types.unit(),
        };

        let NodeKind::Decl(DeclNode::Fun { ret, .. }) = self.ast.node(fun).kind.clone() else {
            unreachable!();
        };
        let Some(expected) = self.table.lookup(ret) else {
            return;
        };

        if !self.types.is_implicitly_convertible(value_ty, expected) {
            let title = format!(
                "incompatible return type: expected {}, found {}",
                self.types.display(expected),
                self.types.display(value_ty)
            );
            self.error(codes::INCOMPATIBLE_RETURN_TYPE, title, stmt);
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn visit_expr(&mut self, expr: NodeId) -> TypeId {
        if let Some(existing) = self.table.lookup(expr) {
            return existing;
        }
        if self.aborted {
            return self.poison(expr);
        }

        match self.ast.node(expr).kind.clone() {
            NodeKind::Expr(ExprNode::LitInt { suffix, .. }) => {
                let ty = match suffix {
                    Some(prim) => self.types.prim(prim),
                    None => self.types.i32(),
                };
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::LitFloat { suffix, .. }) => {
                let ty = match suffix {
                    Some(prim) => self.types.prim(prim),
                    None => self.types.f32(),
                };
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::LitStr { .. }) => {
                let u8t = self.types.u8();
                let ty = self.types.build_ptr(u8t);
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::LitChar { .. }) => {
                let ty = self.types.char();
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::LitBool { .. }) => {
                let ty = self.types.bool();
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::LitNull) => {
                let ty = self.types.null();
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::Ident { decl, .. }) => {
                let Some(decl) = decl else {
                    // Unresolved: name resolution reported it.
                    return self.poison(expr);
                };
                let Some(decl_ty) = self.table.lookup(decl) else {
                    return self.poison(expr);
                };
                if self.types.is_poison(decl_ty) {
                    return self.poison(expr);
                }
                // A name is a place: it denotes a reference to the
                // declaration's storage.
                let ty = self.place_ref(decl_ty);
                self.set(expr, ty)
            }
            NodeKind::Expr(ExprNode::Unary { op, operand }) => self.visit_unary(expr, op, operand),
            NodeKind::Expr(ExprNode::Binary { op, lhs, rhs }) => {
                self.visit_binary(expr, op, lhs, rhs)
            }
            NodeKind::Expr(ExprNode::Call { callee, args }) => self.visit_call(expr, callee, &args),
            NodeKind::Expr(ExprNode::Spec { generic, args }) => {
                self.visit_expr(generic);
                for arg in args {
                    self.visit_type(arg);
                }
                self.error(
                    codes::SPEC_NOT_IMPLEMENTED,
                    "generic specialization is not implemented".into(),
                    expr,
                );
                self.poison(expr)
            }
            other => unreachable!("not an expression: {}", other.tag()),
        }
    }

    fn expect_peeled(
        &mut self,
        operand: NodeId,
        pred: impl Fn(&TypeDesc) -> bool,
        code: u16,
        what: &str,
    ) -> Option<TypeId> {
        let ty = self.visit_expr(operand);
        let peeled = self.types.peel(ty);
        if self.types.is_poison(peeled) {
            return None;
        }
        if !pred(self.types.desc(peeled)) {
            let found = self.types.display(peeled);
            self.error(code, format!("expected {}, found {}", what, found), operand);
            return None;
        }
        Some(peeled)
    }

    fn visit_unary(&mut self, expr: NodeId, op: Op, operand: NodeId) -> TypeId {
        match op {
            Op::Sizeof | Op::Alignof => {
                self.visit_type(operand);
                let ty = self.types.usize();
                self.set(expr, ty)
            }
            Op::AritIncPre | Op::AritDecPre | Op::AritIncPost | Op::AritDecPost => {
                let ty = self.visit_expr(operand);
                if self.types.is_poison(ty) {
                    return self.poison(expr);
                }
                let Some(place) = self.check_mutable_place(operand, ty) else {
                    return self.poison(expr);
                };
                if !self.types.desc(place).is_arithmetic() {
                    let found = self.types.display(place);
                    self.error(
                        codes::EXPECTED_ARITHMETIC,
                        format!("expected an arithmetic type, found {}", found),
                        operand,
                    );
                    return self.poison(expr);
                }
                // Pre forms yield the place itself, post forms the value.
                let result = match op {
                    Op::AritIncPre | Op::AritDecPre => ty,
                    _ => place,
                };
                self.set(expr, result)
            }
            Op::AritPos | Op::AritNeg => {
                match self.expect_peeled(
                    operand,
                    TypeDesc::is_arithmetic,
                    codes::EXPECTED_ARITHMETIC,
                    "an arithmetic type",
                ) {
                    Some(peeled) => self.set(expr, peeled),
                    None => self.poison(expr),
                }
            }
            Op::BitNot => {
                match self.expect_peeled(
                    operand,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                ) {
                    Some(peeled) => self.set(expr, peeled),
                    None => self.poison(expr),
                }
            }
            Op::LogicNot => {
                match self.expect_peeled(
                    operand,
                    |d| matches!(d, TypeDesc::Bool),
                    codes::EXPECTED_BOOL,
                    "bool",
                ) {
                    Some(_) => {
                        let ty = self.types.bool();
                        self.set(expr, ty)
                    }
                    None => self.poison(expr),
                }
            }
            Op::Ind => {
                match self.expect_peeled(
                    operand,
                    |d| matches!(d, TypeDesc::Ptr(_)),
                    codes::EXPECTED_POINTER,
                    "a pointer type",
                ) {
                    Some(peeled) => {
                        let pointee = self.types.remove_ptr(peeled);
                        let ty = self.types.build_ref(pointee);
                        self.set(expr, ty)
                    }
                    None => self.poison(expr),
                }
            }
            Op::Addr => {
                let ty = self.visit_expr(operand);
                if self.types.is_poison(ty) {
                    return self.poison(expr);
                }
                if !matches!(self.types.desc(ty), TypeDesc::Ref(_)) {
                    let found = self.types.display(ty);
                    self.error(
                        codes::EXPECTED_REFERENCE,
                        format!("cannot take the address of a value of type {}", found),
                        operand,
                    );
                    return self.poison(expr);
                }
                let target = self.types.remove_ref(ty);
                let result = self.types.build_ptr(target);
                self.set(expr, result)
            }
            Op::UnwrapSafe | Op::UnwrapUnsafe => {
                match self.expect_peeled(
                    operand,
                    |d| matches!(d, TypeDesc::Opt(_)),
                    codes::EXPECTED_OPTIONAL,
                    "an optional type",
                ) {
                    Some(peeled) => {
                        let inner = self.types.remove_opt(peeled);
                        self.set(expr, inner)
                    }
                    None => self.poison(expr),
                }
            }
            _ => unreachable!("{:?} is not a unary operator", op),
        }
    }

    /// A mutable place is a `ref mut T`; returns `T`.
    fn check_mutable_place(&mut self, node: NodeId, ty: TypeId) -> Option<TypeId> {
        if !matches!(self.types.desc(ty), TypeDesc::Ref(_)) {
            let found = self.types.display(ty);
            self.error(
                codes::EXPECTED_REFERENCE,
                format!("expected an assignable place, found a value of type {}", found),
                node,
            );
            return None;
        }
        let inner = self.types.remove_ref(ty);
        if !matches!(self.types.desc(inner), TypeDesc::Mut(_)) {
            let found = self.types.display(ty);
            self.error(
                codes::EXPECTED_MUTABLE,
                format!("cannot mutate through {}", found),
                node,
            );
            return None;
        }
        Some(self.types.remove_mut(inner))
    }

    fn visit_binary(&mut self, expr: NodeId, op: Op, lhs: NodeId, rhs: NodeId) -> TypeId {
        match op {
            Op::AritAdd | Op::AritSub | Op::AritMul | Op::AritDiv | Op::AritMod => {
                self.visit_arithmetic(expr, op, lhs, rhs)
            }
            Op::BitAnd | Op::BitOr | Op::BitXor => {
                let l = self.expect_peeled(
                    lhs,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                );
                let r = self.expect_peeled(
                    rhs,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                );
                let (Some(l), Some(r)) = (l, r) else {
                    return self.poison(expr);
                };
                self.warn_mixed_signedness(expr, l, r);
                let ty = self.types.arithmetic_promote(l, r);
                self.set(expr, ty)
            }
            Op::BitLsh | Op::BitRsh => {
                let l = self.expect_peeled(
                    lhs,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                );
                let r = self.expect_peeled(
                    rhs,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                );
                let (Some(l), Some(_)) = (l, r) else {
                    return self.poison(expr);
                };
                // Shifts keep the left-hand type.
                self.set(expr, l)
            }
            Op::LogicAnd | Op::LogicOr => {
                let l = self.expect_peeled(
                    lhs,
                    |d| matches!(d, TypeDesc::Bool),
                    codes::EXPECTED_BOOL,
                    "bool",
                );
                let r = self.expect_peeled(
                    rhs,
                    |d| matches!(d, TypeDesc::Bool),
                    codes::EXPECTED_BOOL,
                    "bool",
                );
                if l.is_none() || r.is_none() {
                    return self.poison(expr);
                }
                let ty = self.types.bool();
                self.set(expr, ty)
            }
            Op::CmpEq | Op::CmpNe | Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => {
                let l = self.expect_peeled(
                    lhs,
                    TypeDesc::is_arithmetic,
                    codes::EXPECTED_ARITHMETIC,
                    "an arithmetic type",
                );
                let r = self.expect_peeled(
                    rhs,
                    TypeDesc::is_arithmetic,
                    codes::EXPECTED_ARITHMETIC,
                    "an arithmetic type",
                );
                if l.is_none() || r.is_none() {
                    return self.poison(expr);
                }
                let ty = self.types.bool();
                self.set(expr, ty)
            }
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
            | Op::AssignBitRsh => self.visit_assign(expr, op, lhs, rhs),
            Op::Subs => self.visit_subscript(expr, lhs, rhs),
            Op::Access | Op::AccessInd | Op::AccessOpt => self.visit_member(expr, op, lhs, rhs),
            Op::As => {
                let value_ty = self.visit_expr(lhs);
                let target = self.visit_type(rhs);
                if self.types.is_poison(value_ty) || self.types.is_poison(target) {
                    return self.poison(expr);
                }
                if !self.types.is_explicitly_convertible(value_ty, target) {
                    let title = format!(
                        "{} is not convertible to {}",
                        self.types.display(value_ty),
                        self.types.display(target)
                    );
                    self.error(codes::TYPE_MISMATCH, title, expr);
                    return self.poison(expr);
                }
                self.set(expr, target)
            }
            Op::Range => {
                let l = self.expect_peeled(
                    lhs,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                );
                let r = self.expect_peeled(
                    rhs,
                    TypeDesc::is_integer,
                    codes::EXPECTED_INTEGER,
                    "an integer type",
                );
                let (Some(l), Some(r)) = (l, r) else {
                    return self.poison(expr);
                };
                let ty = self.types.arithmetic_promote(l, r);
                self.set(expr, ty)
            }
            _ => unreachable!("{:?} is not a binary operator", op),
        }
    }

    fn warn_mixed_signedness(&mut self, at: NodeId, l: TypeId, r: TypeId) {
        let l_desc = self.types.desc(l);
        let r_desc = self.types.desc(r);
        if l_desc.is_signed() != r_desc.is_signed() {
            self.warn(codes::WARN_MIXED_SIGNEDNESS, "mixed signedness", at);
        }
    }

    /// Element type and shape of a vector/matrix operand, if it is one.
    fn shaped(&self, ty: TypeId) -> Option<(Option<(u8, u8)>, u8, TypeId)> {
        match *self.types.desc(ty) {
            TypeDesc::Vector { lanes, elem } => Some((None, lanes, elem)),
            TypeDesc::Matrix { rows, cols, elem } => Some((Some((rows, cols)), 0, elem)),
            _ => None,
        }
    }

    fn visit_arithmetic(&mut self, expr: NodeId, op: Op, lhs: NodeId, rhs: NodeId) -> TypeId {
        let l_ty = self.visit_expr(lhs);
        let r_ty = self.visit_expr(rhs);
        let l = self.types.peel(l_ty);
        let r = self.types.peel(r_ty);
        if self.types.is_poison(l) || self.types.is_poison(r) {
            return self.poison(expr);
        }

        // Shaped operands first: vector/matrix broadcast and products.
        match (self.shaped(l), self.shaped(r)) {
            (Some((None, l_lanes, l_elem)), Some((None, r_lanes, r_elem))) => {
                if l_lanes != r_lanes {
                    self.error(
                        codes::SHAPE_MISMATCH,
                        format!(
                            "vector cardinality mismatch: {} vs {}",
                            self.types.display(l),
                            self.types.display(r)
                        ),
                        expr,
                    );
                    return self.poison(expr);
                }
                self.warn_mixed_signedness(expr, l_elem, r_elem);
                let elem = self.types.arithmetic_promote(l_elem, r_elem);
                let ty = self.types.build_vector(l_lanes, elem);
                return self.set(expr, ty);
            }
            (Some((Some((l_rows, l_cols)), _, l_elem)), Some((Some((r_rows, r_cols)), _, r_elem))) => {
                if op == Op::AritMul {
                    // (R×C) × (C×K) → (R×K)
                    if l_cols != r_rows {
                        self.error(
                            codes::SHAPE_MISMATCH,
                            format!(
                                "matrix product dimensions do not agree: {} vs {}",
                                self.types.display(l),
                                self.types.display(r)
                            ),
                            expr,
                        );
                        return self.poison(expr);
                    }
                    let elem = self.types.arithmetic_promote(l_elem, r_elem);
                    let ty = self.types.build_matrix(l_rows, r_cols, elem);
                    return self.set(expr, ty);
                }
                if (l_rows, l_cols) != (r_rows, r_cols) {
                    self.error(
                        codes::SHAPE_MISMATCH,
                        format!(
                            "matrix shape mismatch: {} vs {}",
                            self.types.display(l),
                            self.types.display(r)
                        ),
                        expr,
                    );
                    return self.poison(expr);
                }
                let elem = self.types.arithmetic_promote(l_elem, r_elem);
                let ty = self.types.build_matrix(l_rows, l_cols, elem);
                return self.set(expr, ty);
            }
            (Some(_), Some(_)) => {
                self.error(
                    codes::SHAPE_MISMATCH,
                    format!(
                        "cannot mix vector and matrix operands: {} vs {}",
                        self.types.display(l),
                        self.types.display(r)
                    ),
                    expr,
                );
                return self.poison(expr);
            }
            (Some(shape), None) | (None, Some(shape)) => {
                let scalar = if self.shaped(l).is_some() { r } else { l };
                if !self.types.desc(scalar).is_arithmetic() {
                    let found = self.types.display(scalar);
                    self.error(
                        codes::EXPECTED_ARITHMETIC,
                        format!("expected an arithmetic type, found {}", found),
                        if self.shaped(l).is_some() { rhs } else { lhs },
                    );
                    return self.poison(expr);
                }
                let (matrix_dims, lanes, elem) = shape;
                self.warn_mixed_signedness(expr, elem, scalar);
                let promoted = self.types.arithmetic_promote(elem, scalar);
                let ty = match matrix_dims {
                    Some((rows, cols)) => self.types.build_matrix(rows, cols, promoted),
                    None => self.types.build_vector(lanes, promoted),
                };
                return self.set(expr, ty);
            }
            (None, None) => {}
        }

        let mut failed = false;
        if !self.types.desc(l).is_arithmetic() {
            let found = self.types.display(l);
            self.error(
                codes::EXPECTED_ARITHMETIC,
                format!("expected an arithmetic type, found {}", found),
                lhs,
            );
            failed = true;
        }
        if !self.types.desc(r).is_arithmetic() {
            let found = self.types.display(r);
            self.error(
                codes::EXPECTED_ARITHMETIC,
                format!("expected an arithmetic type, found {}", found),
                rhs,
            );
            failed = true;
        }
        if failed {
            return self.poison(expr);
        }

        self.warn_mixed_signedness(expr, l, r);
        let ty = self.types.arithmetic_promote(l, r);
        self.set(expr, ty)
    }

    fn visit_assign(&mut self, expr: NodeId, op: Op, lhs: NodeId, rhs: NodeId) -> TypeId {
        let l_ty = self.visit_expr(lhs);
        let r_ty = self.visit_expr(rhs);
        if self.types.is_poison(l_ty) || self.types.is_poison(r_ty) {
            return self.poison(expr);
        }

        let Some(target) = self.check_mutable_place(lhs, l_ty) else {
            return self.poison(expr);
        };

        if op != Op::Assign {
            // Compound forms need arithmetic on both sides.
            let r_peeled = self.types.peel(r_ty);
            if !self.types.desc(target).is_arithmetic()
                || !self.types.desc(r_peeled).is_arithmetic()
            {
                let title = format!(
                    "compound assignment needs arithmetic operands, found {} and {}",
                    self.types.display(target),
                    self.types.display(r_peeled)
                );
                self.error(codes::EXPECTED_ARITHMETIC, title, expr);
                return self.poison(expr);
            }
            self.warn_mixed_signedness(expr, target, r_peeled);
        } else if !self.types.is_implicitly_convertible(r_ty, target) {
            self.mismatch(rhs, target, self.types.peel(r_ty));
            return self.poison(expr);
        }

        self.set(expr, l_ty)
    }

    fn visit_subscript(&mut self, expr: NodeId, lhs: NodeId, rhs: NodeId) -> TypeId {
        let l_ty = self.visit_expr(lhs);
        if self.types.is_poison(l_ty) {
            return self.poison(expr);
        }

        // Peel by hand to remember whether the owner was mutable.
        let after_ref = self.types.remove_ref(self.types.remove_mut(l_ty));
        let owner_mut = matches!(self.types.desc(after_ref), TypeDesc::Mut(_));
        let owner = self.types.remove_mut(after_ref);

        let TypeDesc::Array { base, .. } = *self.types.desc(owner) else {
            let found = self.types.display(owner);
            self.error(
                codes::EXPECTED_ARRAY,
                format!("expected an array, found {}", found),
                lhs,
            );
            return self.poison(expr);
        };

        if self
            .expect_peeled(
                rhs,
                TypeDesc::is_integer,
                codes::EXPECTED_INTEGER,
                "an integer index",
            )
            .is_none()
        {
            return self.poison(expr);
        }

        let mut elem = base;
        if owner_mut && self.types.can_add_mut(elem) {
            elem = self.types.build_mut(elem);
        }
        let ty = self.place_ref(elem);
        self.set(expr, ty)
    }

    fn visit_member(&mut self, expr: NodeId, op: Op, lhs: NodeId, rhs: NodeId) -> TypeId {
        let NodeKind::Expr(ExprNode::Ident { name, .. }) = self.ast.node(rhs).kind else {
            self.error(
                codes::EXPECTED_MEMBER,
                "member access needs a member name".into(),
                rhs,
            );
            return self.poison(expr);
        };

        let l_ty = self.visit_expr(lhs);
        if self.types.is_poison(l_ty) {
            return self.poison(expr);
        }
        let peeled = self.types.peel(l_ty);

        // Resolve the owning composite and whether the access is mutable.
        let (owner, owner_mut) = match op {
            Op::Access => {
                let after_ref = self.types.remove_ref(self.types.remove_mut(l_ty));
                let is_mut = matches!(self.types.desc(after_ref), TypeDesc::Mut(_));
                (self.types.remove_mut(after_ref), is_mut)
            }
            Op::AccessInd => {
                let TypeDesc::Ptr(pointee) = *self.types.desc(peeled) else {
                    let found = self.types.display(peeled);
                    self.error(
                        codes::EXPECTED_POINTER,
                        format!("expected a pointer type, found {}", found),
                        lhs,
                    );
                    return self.poison(expr);
                };
                let is_mut = matches!(self.types.desc(pointee), TypeDesc::Mut(_));
                (self.types.remove_mut(pointee), is_mut)
            }
            Op::AccessOpt => {
                let TypeDesc::Opt(inner) = *self.types.desc(peeled) else {
                    let found = self.types.display(peeled);
                    self.error(
                        codes::EXPECTED_OPTIONAL,
                        format!("expected an optional type, found {}", found),
                        lhs,
                    );
                    return self.poison(expr);
                };
                let is_mut = matches!(self.types.desc(inner), TypeDesc::Mut(_));
                (self.types.remove_mut(inner), is_mut)
            }
            _ => unreachable!(),
        };

        let owner_decl = match *self.types.desc(owner) {
            TypeDesc::Struct { decl, .. } | TypeDesc::Union { decl, .. } | TypeDesc::Enum { decl } => {
                decl
            }
            _ => {
                let found = self.types.display(owner);
                self.error(
                    codes::EXPECTED_OWNER,
                    format!("expected a struct, union, or enum, found {}", found),
                    lhs,
                );
                return self.poison(expr);
            }
        };

        let owner_scope = match &self.ast.node(owner_decl).kind {
            NodeKind::Decl(DeclNode::Struct { scope, .. })
            | NodeKind::Decl(DeclNode::Union { scope, .. })
            | NodeKind::Decl(DeclNode::Enum { scope, .. }) => {
                scope.expect("composite scopes exist after name resolution")
            }
            _ => unreachable!("composite descriptors point at composite declarations"),
        };

        let Some(member) = self.scopes.get(owner_scope, name) else {
            self.error(
                codes::NO_MEMBER_WITH_NAME,
                "no member with this name".into(),
                rhs,
            );
            return self.poison(expr);
        };

        // Bind the member identifier like any other resolved use.
        let member_node = member.node;
        if let NodeKind::Expr(ExprNode::Ident { decl, .. }) = &mut self.ast.node_mut(rhs).kind {
            *decl = Some(member_node);
        }

        let Some(member_ty) = self.table.lookup(member_node) else {
            return self.poison(expr);
        };
        self.set(rhs, member_ty);

        // Enum constants are plain values of the enum type.
        if matches!(
            self.ast.node(member_node).kind,
            NodeKind::Decl(DeclNode::EnumConstant { .. })
        ) {
            return self.set(expr, member_ty);
        }

        let mut result = member_ty;
        if owner_mut && self.types.can_add_mut(result) {
            result = self.types.build_mut(result);
        }
        let ty = self.place_ref(result);
        self.set(expr, ty)
    }

    fn visit_call(&mut self, expr: NodeId, callee: NodeId, args: &[NodeId]) -> TypeId {
        let callee_ty = self.visit_expr(callee);
        let arg_types: Vec<TypeId> = args.iter().map(|&a| self.visit_expr(a)).collect();

        if self.types.is_poison(callee_ty) {
            return self.poison(expr);
        }

        let Some(fun) = self.types.underlying_callable(callee_ty) else {
            let found = self.types.display(callee_ty);
            self.error(
                codes::EXPECTED_CALLABLE,
                format!("expected a callable expression, found {}", found),
                callee,
            );
            return self.poison(expr);
        };
        let TypeDesc::Fun {
            params,
            ret,
            is_vararg,
            callconv,
        } = self.types.desc(fun).clone()
        else {
            unreachable!("underlying_callable yields function types");
        };

        if args.len() < params.len() {
            self.error(codes::TOO_FEW_ARGUMENTS, "too few arguments".into(), expr);
        } else if args.len() > params.len()
            && !(is_vararg && callconv == tau_language::ast::CallConv::Cdecl)
        {
            self.error(codes::TOO_MANY_ARGUMENTS, "too many arguments".into(), expr);
        }

        for (index, &param) in params.iter().enumerate() {
            let Some(&arg) = args.get(index) else {
                break;
            };
            let arg_ty = arg_types[index];
            if !self.types.is_implicitly_convertible(arg_ty, param) {
                let found = self.types.peel(arg_ty);
                self.mismatch(arg, param, found);
            }
        }

        self.set(expr, ret)
    }
}
