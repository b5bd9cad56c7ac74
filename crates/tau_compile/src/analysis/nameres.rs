//! Name resolution.
//!
//! A scope-stack visitor over the AST. Every scope-creating construct
//! (functions, composites, modules, type aliases, blocks, loops) gets a
//! child scope; the construct's own symbol is registered in the *parent*
//! scope while its body resolves in the child.
//!
//! Top-level and module-level declarations are registered before any body
//! is resolved, so forward references between functions work. Local
//! variables are registered at their statement, C-style.
//!
//! The pass is idempotent: scopes already attached to nodes are reused and
//! an insert that collides with the very same node is not a redeclaration.

use tau_base::{Diagnostic, ErrorBag, SourceRegistry, Span};
use tau_language::ast::{DeclNode, ExprNode, NodeKind, Op, StmtNode, TypeNode};
use tau_language::symtable::SymbolEntry;
use tau_language::{Ast, NodeId, ScopeId, ScopeTree};

use super::codes;

struct NameRes<'e> {
    ast: &'e mut Ast,
    scopes: &'e mut ScopeTree,
    registry: &'e SourceRegistry,
    bag: &'e mut ErrorBag,
    /// Enclosing loop / defer / function nodes, innermost last.
    stack: Vec<NodeId>,
    aborted: bool,
}

/// Runs name resolution over a program.
pub fn run(
    ast: &mut Ast,
    prog: NodeId,
    scopes: &mut ScopeTree,
    registry: &SourceRegistry,
    bag: &mut ErrorBag,
) {
    let mut pass = NameRes {
        ast,
        scopes,
        registry,
        bag,
        stack: Vec::new(),
        aborted: false,
    };
    pass.visit_prog(prog);
}

impl<'e> NameRes<'e> {
    fn location(&self, node: NodeId) -> (tau_base::SourceId, Span) {
        let token = self.ast.node(node).token;
        let text = self.registry.contents(token.source);
        (token.source, token.span(text))
    }

    fn error(&mut self, code: u16, title: &str, node: NodeId) {
        let (source, span) = self.location(node);
        if self
            .bag
            .report(Diagnostic::error(code, title, source, span))
            .is_err()
        {
            self.aborted = true;
        }
    }

    fn error_with_previous(&mut self, code: u16, title: &str, node: NodeId, previous: NodeId) {
        let (source, span) = self.location(node);
        let (prev_source, prev_span) = self.location(previous);
        let diagnostic = Diagnostic::error(code, title, source, span).with_label(
            prev_source,
            prev_span,
            "first declared here",
        );
        if self.bag.report(diagnostic).is_err() {
            self.aborted = true;
        }
    }

    fn warn(&mut self, code: u16, title: &str, node: NodeId) {
        let (source, span) = self.location(node);
        let _ = self
            .bag
            .report(Diagnostic::warning(code, title, source, span));
    }

    // ------------------------------------------------------------------
    // Scope plumbing
    // ------------------------------------------------------------------

    fn node_scope(&self, node: NodeId) -> Option<ScopeId> {
        match &self.ast.node(node).kind {
            NodeKind::Decl(DeclNode::Fun { scope, .. })
            | NodeKind::Decl(DeclNode::Struct { scope, .. })
            | NodeKind::Decl(DeclNode::Union { scope, .. })
            | NodeKind::Decl(DeclNode::Enum { scope, .. })
            | NodeKind::Decl(DeclNode::Mod { scope, .. })
            | NodeKind::Decl(DeclNode::TypeAlias { scope, .. })
            | NodeKind::Stmt(StmtNode::Block { scope, .. })
            | NodeKind::Stmt(StmtNode::Loop { scope, .. })
            | NodeKind::Stmt(StmtNode::While { scope, .. })
            | NodeKind::Stmt(StmtNode::For { scope, .. }) => *scope,
            _ => None,
        }
    }

    fn set_node_scope(&mut self, node: NodeId, new_scope: ScopeId) {
        match &mut self.ast.node_mut(node).kind {
            NodeKind::Decl(DeclNode::Fun { scope, .. })
            | NodeKind::Decl(DeclNode::Struct { scope, .. })
            | NodeKind::Decl(DeclNode::Union { scope, .. })
            | NodeKind::Decl(DeclNode::Enum { scope, .. })
            | NodeKind::Decl(DeclNode::Mod { scope, .. })
            | NodeKind::Decl(DeclNode::TypeAlias { scope, .. })
            | NodeKind::Stmt(StmtNode::Block { scope, .. })
            | NodeKind::Stmt(StmtNode::Loop { scope, .. })
            | NodeKind::Stmt(StmtNode::While { scope, .. })
            | NodeKind::Stmt(StmtNode::For { scope, .. }) => *scope = Some(new_scope),
            other => unreachable!("node {} does not carry a scope", other.tag()),
        }
    }

    /// The child scope a construct introduces, created once and reused on
    /// re-runs.
    fn get_or_create_scope(&mut self, node: NodeId, parent: ScopeId) -> ScopeId {
        if let Some(existing) = self.node_scope(node) {
            return existing;
        }
        let created = self.scopes.push_child(parent);
        self.set_node_scope(node, created);
        created
    }

    /// The declared name of a declaration, when it has one.
    fn decl_name(&self, decl: NodeId) -> Option<(NodeId, tau_base::Symbol)> {
        let name_node = match &self.ast.node(decl).kind {
            NodeKind::Decl(DeclNode::Var { name, .. })
            | NodeKind::Decl(DeclNode::Param { name, .. })
            | NodeKind::Decl(DeclNode::Fun { name, .. })
            | NodeKind::Decl(DeclNode::Struct { name, .. })
            | NodeKind::Decl(DeclNode::Union { name, .. })
            | NodeKind::Decl(DeclNode::Enum { name, .. })
            | NodeKind::Decl(DeclNode::EnumConstant { name })
            | NodeKind::Decl(DeclNode::Mod { name, .. })
            | NodeKind::Decl(DeclNode::TypeAlias { name, .. })
            | NodeKind::Decl(DeclNode::GenericParam { name }) => *name,
            NodeKind::Decl(DeclNode::Generic { inner, .. }) => {
                return self.decl_name(*inner);
            }
            _ => return None,
        };
        Some((name_node, self.ast.ident_name(name_node)))
    }

    /// Registers a declaration's symbol in `scope`.
    ///
    /// A collision with the same node is a re-run and stays silent; a
    /// collision with a different node is a redeclaration error reporting
    /// both locations. A binding visible in an outer scope is a shadow
    /// warning.
    fn declare(&mut self, decl: NodeId, scope: ScopeId) {
        let Some((name_node, name)) = self.decl_name(decl) else {
            return;
        };

        let shadows = self.scopes.lookup_outer(scope, name).is_some()
            && self.scopes.get(scope, name).is_none();

        match self.scopes.insert(scope, SymbolEntry { name, node: decl }) {
            Some(existing) if existing.node == decl => return,
            Some(existing) => {
                self.error_with_previous(
                    codes::SYMBOL_REDECLARATION,
                    "symbol redeclaration",
                    name_node,
                    existing.node,
                );
                return;
            }
            None => {}
        }

        if shadows {
            self.warn(
                codes::WARN_SHADOWED_SYMBOL,
                "declaration shadows an outer symbol",
                name_node,
            );
        }
    }

    // ------------------------------------------------------------------
    // Program and declarations
    // ------------------------------------------------------------------

    fn visit_prog(&mut self, prog: NodeId) {
        let NodeKind::Prog { decls } = &self.ast.node(prog).kind else {
            unreachable!("name resolution starts at the program root");
        };
        let decls = decls.clone();
        let root = self.scopes.root();

        // Declarations first, bodies second: forward references resolve.
        for &decl in &decls {
            if self.aborted {
                return;
            }
            self.hoist(decl, root);
        }
        for &decl in &decls {
            if self.aborted {
                return;
            }
            self.visit_decl(decl, root);
        }
    }

    /// Phase one: registers a declaration and, for modules, its members
    /// transitively, so later declarations can reference them.
    fn hoist(&mut self, decl: NodeId, scope: ScopeId) {
        self.declare(decl, scope);

        if let NodeKind::Decl(DeclNode::Mod { members, .. }) = self.ast.node(decl).kind.clone() {
            let body_scope = self.get_or_create_scope(decl, scope);
            for member in members {
                self.hoist(member, body_scope);
            }
        }
    }

    fn visit_decl(&mut self, decl: NodeId, scope: ScopeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(decl).kind.clone() {
            NodeKind::Decl(DeclNode::Var { ty, init, .. }) => {
                self.visit_type(ty, scope);
                if let Some(init) = init {
                    self.visit_expr(init, scope);
                }
            }
            NodeKind::Decl(DeclNode::Param { ty, default, .. }) => {
                self.visit_type(ty, scope);
                if let Some(default) = default {
                    self.visit_expr(default, scope);
                }
            }
            NodeKind::Decl(DeclNode::Fun { .. }) => {
                self.visit_decl_fun(decl, scope, &[]);
            }
            NodeKind::Decl(DeclNode::Generic { params, inner }) => {
                // Only functions can be generic for now; the wrapper's
                // parameters resolve inside the function's own scope.
                self.visit_decl_fun(inner, scope, &params);
            }
            NodeKind::Decl(DeclNode::Struct { fields, .. })
            | NodeKind::Decl(DeclNode::Union { fields, .. }) => {
                let body_scope = self.get_or_create_scope(decl, scope);
                for field in fields {
                    self.declare(field, body_scope);
                    self.visit_decl(field, body_scope);
                }
            }
            NodeKind::Decl(DeclNode::Enum { constants, .. }) => {
                let body_scope = self.get_or_create_scope(decl, scope);
                for constant in constants {
                    self.declare(constant, body_scope);
                }
            }
            NodeKind::Decl(DeclNode::Mod { members, .. }) => {
                let body_scope = self.get_or_create_scope(decl, scope);
                for &member in &members {
                    self.declare(member, body_scope);
                }
                for &member in &members {
                    self.visit_decl(member, body_scope);
                }
            }
            NodeKind::Decl(DeclNode::TypeAlias { ty, .. }) => {
                let body_scope = self.get_or_create_scope(decl, scope);
                self.visit_type(ty, body_scope);
            }
            NodeKind::Decl(DeclNode::EnumConstant { .. }) => {}
            NodeKind::Decl(DeclNode::GenericParam { .. }) => {}
            NodeKind::Decl(DeclNode::Use { segments }) => {
                self.visit_decl_use(decl, &segments, scope);
            }
            other => unreachable!("not a declaration: {}", other.tag()),
        }
    }

    fn visit_decl_fun(&mut self, decl: NodeId, scope: ScopeId, generic_params: &[NodeId]) {
        let NodeKind::Decl(DeclNode::Fun {
            params, ret, body, ..
        }) = self.ast.node(decl).kind.clone()
        else {
            unreachable!("generic wrapper must wrap a function");
        };

        let fun_scope = self.get_or_create_scope(decl, scope);

        for &generic_param in generic_params {
            self.declare(generic_param, fun_scope);
        }
        for &param in &params {
            self.declare(param, fun_scope);
            self.visit_decl(param, fun_scope);
        }

        // The return type is part of the signature: it resolves in the
        // function's own scope, where the generic parameters live.
        self.visit_type(ret, fun_scope);

        if let Some(body) = body {
            self.stack.push(decl);
            self.visit_stmt(body, fun_scope);
            self.stack.pop();
        }
    }

    fn visit_decl_use(&mut self, decl: NodeId, segments: &[NodeId], scope: ScopeId) {
        let first = segments[0];
        let first_name = self.ast.ident_name(first);

        let Some(mut entry) = self.scopes.lookup(scope, first_name) else {
            self.error(codes::UNDEFINED_SYMBOL, "undefined symbol", first);
            return;
        };

        for segment in &segments[1..] {
            let NodeKind::Decl(DeclNode::Mod { .. }) = self.ast.node(entry.node).kind else {
                self.error(codes::EXPECTED_MODULE, "expected a module", *segment);
                return;
            };
            let mod_scope = self
                .node_scope(entry.node)
                .expect("module scope exists after its declaration was visited");
            let name = self.ast.ident_name(*segment);
            match self.scopes.get(mod_scope, name) {
                Some(found) => entry = found,
                None => {
                    self.error(codes::NO_MEMBER_WITH_NAME, "no member with this name", *segment);
                    return;
                }
            }
        }

        // Import the resolved symbol under its own name. Importing the
        // same target twice is a no-op.
        let last = *segments.last().expect("use path is never empty");
        let name = self.ast.ident_name(last);
        match self.scopes.insert(
            scope,
            SymbolEntry {
                name,
                node: entry.node,
            },
        ) {
            Some(existing) if existing.node == entry.node => {}
            Some(existing) => {
                self.error_with_previous(
                    codes::SYMBOL_REDECLARATION,
                    "import collides with an existing symbol",
                    decl,
                    existing.node,
                );
            }
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn visit_type(&mut self, ty: NodeId, scope: ScopeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(ty).kind.clone() {
            NodeKind::Type(TypeNode::Mut { base })
            | NodeKind::Type(TypeNode::Ptr { base })
            | NodeKind::Type(TypeNode::Ref { base })
            | NodeKind::Type(TypeNode::Opt { base }) => self.visit_type(base, scope),
            NodeKind::Type(TypeNode::Array { size, base }) => {
                if let Some(size) = size {
                    self.visit_expr(size, scope);
                }
                self.visit_type(base, scope);
            }
            NodeKind::Type(TypeNode::Fun { params, ret, .. }) => {
                for param in params {
                    self.visit_type(param, scope);
                }
                self.visit_type(ret, scope);
            }
            NodeKind::Type(TypeNode::Named { name, decl }) => {
                if decl.is_some() {
                    return;
                }
                let Some(entry) = self.scopes.lookup(scope, name) else {
                    self.error(codes::UNDEFINED_TYPENAME, "undefined typename", ty);
                    return;
                };
                match self.ast.node(entry.node).kind {
                    NodeKind::Decl(DeclNode::Struct { .. })
                    | NodeKind::Decl(DeclNode::Union { .. })
                    | NodeKind::Decl(DeclNode::Enum { .. })
                    | NodeKind::Decl(DeclNode::TypeAlias { .. })
                    | NodeKind::Decl(DeclNode::GenericParam { .. }) => {
                        let NodeKind::Type(TypeNode::Named { decl, .. }) =
                            &mut self.ast.node_mut(ty).kind
                        else {
                            unreachable!();
                        };
                        *decl = Some(entry.node);
                    }
                    _ => self.error(codes::NOT_A_TYPENAME, "symbol is not a typename", ty),
                }
            }
            NodeKind::Type(TypeNode::Member { parent, member, decl }) => {
                if decl.is_some() {
                    return;
                }
                let Some(module) = self.resolve_module(parent, scope) else {
                    return;
                };
                let mod_scope = self
                    .node_scope(module)
                    .expect("module scope exists after its declaration was visited");
                let name = self.ast.ident_name(member);
                let Some(entry) = self.scopes.get(mod_scope, name) else {
                    self.error(codes::NO_MEMBER_WITH_NAME, "no member with this name", member);
                    return;
                };
                match self.ast.node(entry.node).kind {
                    NodeKind::Decl(DeclNode::Struct { .. })
                    | NodeKind::Decl(DeclNode::Union { .. })
                    | NodeKind::Decl(DeclNode::Enum { .. })
                    | NodeKind::Decl(DeclNode::TypeAlias { .. }) => {
                        let NodeKind::Type(TypeNode::Member { decl, .. }) =
                            &mut self.ast.node_mut(ty).kind
                        else {
                            unreachable!();
                        };
                        *decl = Some(entry.node);
                    }
                    _ => self.error(codes::NOT_A_TYPENAME, "symbol is not a typename", member),
                }
            }
            NodeKind::Type(TypeNode::Prim(_))
            | NodeKind::Type(TypeNode::Vec { .. })
            | NodeKind::Type(TypeNode::Mat { .. }) => {}
            other => unreachable!("not a type: {}", other.tag()),
        }
    }

    /// Resolves the parent of a qualified member type to a module decl.
    fn resolve_module(&mut self, ty: NodeId, scope: ScopeId) -> Option<NodeId> {
        match self.ast.node(ty).kind.clone() {
            NodeKind::Type(TypeNode::Named { name, .. }) => {
                let Some(entry) = self.scopes.lookup(scope, name) else {
                    self.error(codes::UNDEFINED_SYMBOL, "undefined symbol", ty);
                    return None;
                };
                match self.ast.node(entry.node).kind {
                    NodeKind::Decl(DeclNode::Mod { .. }) => Some(entry.node),
                    _ => {
                        self.error(codes::EXPECTED_MODULE, "expected a module", ty);
                        None
                    }
                }
            }
            NodeKind::Type(TypeNode::Member { parent, member, .. }) => {
                let outer = self.resolve_module(parent, scope)?;
                let mod_scope = self
                    .node_scope(outer)
                    .expect("module scope exists after its declaration was visited");
                let name = self.ast.ident_name(member);
                let Some(entry) = self.scopes.get(mod_scope, name) else {
                    self.error(codes::NO_MEMBER_WITH_NAME, "no member with this name", member);
                    return None;
                };
                match self.ast.node(entry.node).kind {
                    NodeKind::Decl(DeclNode::Mod { .. }) => Some(entry.node),
                    _ => {
                        self.error(codes::EXPECTED_MODULE, "expected a module", member);
                        None
                    }
                }
            }
            _ => {
                self.error(codes::EXPECTED_MODULE, "expected a module", ty);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn visit_stmt(&mut self, stmt: NodeId, scope: ScopeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(stmt).kind.clone() {
            NodeKind::Decl(DeclNode::Var { .. }) => {
                // Locals become visible at their statement.
                self.declare(stmt, scope);
                self.visit_decl(stmt, scope);
            }
            NodeKind::Stmt(StmtNode::If { cond, then, els }) => {
                self.visit_expr(cond, scope);
                self.visit_stmt(then, scope);
                if let Some(els) = els {
                    self.visit_stmt(els, scope);
                }
            }
            NodeKind::Stmt(StmtNode::While { cond, body, .. }) => {
                let loop_scope = self.get_or_create_scope(stmt, scope);
                self.visit_expr(cond, loop_scope);
                self.stack.push(stmt);
                self.visit_stmt(body, loop_scope);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::For {
                var, range, body, ..
            }) => {
                let loop_scope = self.get_or_create_scope(stmt, scope);
                self.declare(var, loop_scope);
                self.visit_decl(var, loop_scope);
                self.visit_expr(range, loop_scope);
                self.stack.push(stmt);
                self.visit_stmt(body, loop_scope);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::Loop { body, .. }) => {
                let loop_scope = self.get_or_create_scope(stmt, scope);
                self.stack.push(stmt);
                self.visit_stmt(body, loop_scope);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::Break { .. }) => {
                match self.innermost_loop() {
                    Some(target) => {
                        let NodeKind::Stmt(StmtNode::Break { target: slot }) =
                            &mut self.ast.node_mut(stmt).kind
                        else {
                            unreachable!();
                        };
                        *slot = Some(target);
                    }
                    None => self.error(codes::BREAK_OUTSIDE_LOOP, "break outside loop", stmt),
                }
            }
            NodeKind::Stmt(StmtNode::Continue { .. }) => {
                match self.innermost_loop() {
                    Some(target) => {
                        let NodeKind::Stmt(StmtNode::Continue { target: slot }) =
                            &mut self.ast.node_mut(stmt).kind
                        else {
                            unreachable!();
                        };
                        *slot = Some(target);
                    }
                    None => {
                        self.error(codes::CONTINUE_OUTSIDE_LOOP, "continue outside loop", stmt)
                    }
                }
            }
            NodeKind::Stmt(StmtNode::Return { value }) => {
                if let Some(value) = value {
                    self.visit_expr(value, scope);
                }
            }
            NodeKind::Stmt(StmtNode::Defer { body }) => {
                self.stack.push(stmt);
                self.visit_stmt(body, scope);
                self.stack.pop();
            }
            NodeKind::Stmt(StmtNode::Block { stmts, .. }) => {
                let block_scope = self.get_or_create_scope(stmt, scope);
                for inner in stmts {
                    self.visit_stmt(inner, block_scope);
                }
            }
            NodeKind::Stmt(StmtNode::Expr { expr }) => self.visit_expr(expr, scope),
            other => unreachable!("not a statement: {}", other.tag()),
        }
    }

    /// The innermost enclosing loop, unless a `defer` intervenes: a jump
    /// cannot exit a deferred block.
    fn innermost_loop(&self) -> Option<NodeId> {
        for &node in self.stack.iter().rev() {
            match self.ast.node(node).kind {
                NodeKind::Stmt(StmtNode::While { .. })
                | NodeKind::Stmt(StmtNode::For { .. })
                | NodeKind::Stmt(StmtNode::Loop { .. }) => return Some(node),
                NodeKind::Stmt(StmtNode::Defer { .. }) => return None,
                _ => {}
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn visit_expr(&mut self, expr: NodeId, scope: ScopeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(expr).kind.clone() {
            NodeKind::Expr(ExprNode::Ident { name, decl }) => {
                if decl.is_some() {
                    return;
                }
                let Some(entry) = self.scopes.lookup(scope, name) else {
                    self.error(codes::UNDEFINED_SYMBOL, "undefined symbol", expr);
                    return;
                };
                match self.ast.node(entry.node).kind {
                    NodeKind::Decl(DeclNode::Var { .. })
                    | NodeKind::Decl(DeclNode::Param { .. })
                    | NodeKind::Decl(DeclNode::Fun { .. })
                    | NodeKind::Decl(DeclNode::Generic { .. })
                    | NodeKind::Decl(DeclNode::Enum { .. }) => {
                        let NodeKind::Expr(ExprNode::Ident { decl, .. }) =
                            &mut self.ast.node_mut(expr).kind
                        else {
                            unreachable!();
                        };
                        *decl = Some(entry.node);
                    }
                    _ => {
                        self.error(
                            codes::NOT_AN_EXPRESSION,
                            "symbol is not an expression",
                            expr,
                        );
                    }
                }
            }
            NodeKind::Expr(ExprNode::Unary { op, operand }) => match op {
                // sizeof/alignof consume a type, not a value.
                Op::Sizeof | Op::Alignof => self.visit_type(operand, scope),
                _ => self.visit_expr(operand, scope),
            },
            NodeKind::Expr(ExprNode::Binary { op, lhs, rhs }) => match op {
                // Member names resolve against the owner's scope during
                // type checking, not here.
                Op::Access | Op::AccessInd | Op::AccessOpt => self.visit_expr(lhs, scope),
                Op::As => {
                    self.visit_expr(lhs, scope);
                    self.visit_type(rhs, scope);
                }
                _ => {
                    self.visit_expr(lhs, scope);
                    self.visit_expr(rhs, scope);
                }
            },
            NodeKind::Expr(ExprNode::Call { callee, args }) => {
                self.visit_expr(callee, scope);
                for arg in args {
                    self.visit_expr(arg, scope);
                }
            }
            NodeKind::Expr(ExprNode::Spec { generic, args }) => {
                self.visit_expr(generic, scope);
                for arg in args {
                    self.visit_type(arg, scope);
                }
            }
            NodeKind::Expr(_) => {}
            other => unreachable!("not an expression: {}", other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tau_base::Interner;
    use tau_language::{lexer, parser};

    struct Resolved {
        ast: Ast,
        scopes: ScopeTree,
        bag: ErrorBag,
        prog: NodeId,
        registry: SourceRegistry,
    }

    fn resolve(text: &str) -> Resolved {
        let mut registry = SourceRegistry::new();
        let source = registry.add("test.tau", text);
        let mut bag = ErrorBag::new();
        let tokens = lexer::lex(source, text, &mut bag);
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let prog = parser::parse(&tokens, text, source, &mut ast, &mut interner, &mut bag);
        assert!(!bag.has_errors(), "parse errors: {:?}", bag.diagnostics());

        let mut scopes = ScopeTree::new();
        run(&mut ast, prog, &mut scopes, &registry, &mut bag);
        Resolved {
            ast,
            scopes,
            bag,
            prog,
            registry,
        }
    }

    fn find_ident_expr(resolved: &Resolved, wanted: &str) -> (NodeId, Option<NodeId>) {
        for (id, node) in resolved.ast.iter() {
            if let NodeKind::Expr(ExprNode::Ident { decl, .. }) = &node.kind {
                let text = resolved.registry.contents(node.token.source);
                if node.token.lexeme(text) == wanted {
                    return (id, *decl);
                }
            }
        }
        panic!("no identifier expression {:?}", wanted);
    }

    #[test]
    fn local_variable_use_binds_to_declaration() {
        let resolved = resolve("fun f() -> i32 { var x: i32 = 1\n return x }");
        assert!(!resolved.bag.has_errors());

        let (_, decl) = find_ident_expr(&resolved, "x");
        let decl = decl.expect("x is bound");
        assert!(matches!(
            resolved.ast.node(decl).kind,
            NodeKind::Decl(DeclNode::Var { .. })
        ));
    }

    #[test]
    fn parameter_use_binds_to_parameter() {
        let resolved = resolve("fun f(a: i32) -> i32 { return a }");
        assert!(!resolved.bag.has_errors());

        let (_, decl) = find_ident_expr(&resolved, "a");
        assert!(matches!(
            resolved.ast.node(decl.unwrap()).kind,
            NodeKind::Decl(DeclNode::Param { .. })
        ));
    }

    #[test]
    fn forward_function_reference_resolves() {
        let resolved = resolve("fun f() -> i32 { return g() }\nfun g() -> i32 { return 1 }");
        assert!(!resolved.bag.has_errors());

        let (_, decl) = find_ident_expr(&resolved, "g");
        assert!(matches!(
            resolved.ast.node(decl.unwrap()).kind,
            NodeKind::Decl(DeclNode::Fun { .. })
        ));
    }

    #[test]
    fn undefined_symbol_is_reported() {
        let resolved = resolve("fun h() { return nope }");
        assert!(resolved
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == codes::UNDEFINED_SYMBOL));
    }

    #[test]
    fn redeclaration_reports_both_locations() {
        let resolved = resolve("fun f() { var x: i32\n var x: i32 }");
        let diag = resolved
            .bag
            .diagnostics()
            .iter()
            .find(|d| d.code == codes::SYMBOL_REDECLARATION)
            .expect("redeclaration reported");
        assert_eq!(diag.labels.len(), 1);
    }

    #[test]
    fn cross_scope_shadow_is_a_warning() {
        let resolved = resolve("fun f() { var x: i32\n { var x: i32 } }");
        assert!(!resolved.bag.has_errors());
        assert!(resolved
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == codes::WARN_SHADOWED_SYMBOL
                && d.severity == tau_base::Severity::Warning));
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let resolved = resolve("fun i() { break }");
        assert!(resolved
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == codes::BREAK_OUTSIDE_LOOP));
    }

    #[test]
    fn break_inside_loop_binds_to_it() {
        let resolved = resolve("fun f() { while true do { break } }");
        assert!(!resolved.bag.has_errors());

        let bound = resolved.ast.iter().find_map(|(_, node)| match &node.kind {
            NodeKind::Stmt(StmtNode::Break { target }) => Some(*target),
            _ => None,
        });
        let target = bound.unwrap().expect("break is bound");
        assert!(matches!(
            resolved.ast.node(target).kind,
            NodeKind::Stmt(StmtNode::While { .. })
        ));
    }

    #[test]
    fn break_inside_defer_cannot_exit_loop() {
        let resolved = resolve("fun f() { while true do { defer { break } } }");
        assert!(resolved
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == codes::BREAK_OUTSIDE_LOOP));
    }

    #[test]
    fn type_reference_binds_to_struct() {
        let resolved = resolve("struct S { x: i32 }\nfun f(s: S) { }");
        assert!(!resolved.bag.has_errors());

        let bound = resolved.ast.iter().any(|(_, node)| {
            matches!(
                node.kind,
                NodeKind::Type(TypeNode::Named { decl: Some(_), .. })
            )
        });
        assert!(bound);
    }

    #[test]
    fn undefined_typename_is_reported() {
        let resolved = resolve("fun f(s: Missing) { }");
        assert!(resolved
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == codes::UNDEFINED_TYPENAME));
    }

    #[test]
    fn module_member_type_resolves() {
        let resolved = resolve("mod m { struct S { x: i32 } }\nvar s: m.S\n");
        assert!(!resolved.bag.has_errors());

        let bound = resolved.ast.iter().any(|(_, node)| {
            matches!(
                node.kind,
                NodeKind::Type(TypeNode::Member { decl: Some(_), .. })
            )
        });
        assert!(bound);
    }

    #[test]
    fn use_imports_a_module_member() {
        let resolved = resolve(
            "mod m { pub fun helper() -> i32 { return 1 } }\n\
             use m.helper\n\
             fun f() -> i32 { return helper() }",
        );
        assert!(
            !resolved.bag.has_errors(),
            "diagnostics: {:?}",
            resolved.bag.diagnostics()
        );
    }

    #[test]
    fn generic_parameter_is_visible_in_signature() {
        let resolved = resolve("fun first[T](x: T) -> i32 { return 0 }");
        assert!(
            !resolved.bag.has_errors(),
            "diagnostics: {:?}",
            resolved.bag.diagnostics()
        );
    }

    #[test]
    fn generic_parameter_is_visible_in_return_position() {
        let resolved = resolve("fun identity[T](x: T) -> T { return x }");
        assert!(
            !resolved.bag.has_errors(),
            "diagnostics: {:?}",
            resolved.bag.diagnostics()
        );
    }

    #[test]
    fn running_twice_is_a_no_op() {
        let text = "struct S { x: i32 }\nfun f(s: S) -> i32 { var y: i32 = 1\n return y }";
        let mut resolved = resolve(text);
        assert!(!resolved.bag.has_errors());

        let scope_count = resolved.scopes.len();
        let decl_bindings: Vec<Option<NodeId>> = resolved
            .ast
            .iter()
            .filter_map(|(_, node)| match &node.kind {
                NodeKind::Expr(ExprNode::Ident { decl, .. }) => Some(*decl),
                _ => None,
            })
            .collect();

        let mut bag = ErrorBag::new();
        run(
            &mut resolved.ast,
            resolved.prog,
            &mut resolved.scopes,
            &resolved.registry,
            &mut bag,
        );

        assert!(!bag.has_errors());
        assert_eq!(bag.warning_count(), 0);
        assert_eq!(resolved.scopes.len(), scope_count);

        let after: Vec<Option<NodeId>> = resolved
            .ast
            .iter()
            .filter_map(|(_, node)| match &node.kind {
                NodeKind::Expr(ExprNode::Ident { decl, .. }) => Some(*decl),
                _ => None,
            })
            .collect();
        assert_eq!(decl_bindings, after);
    }
}
