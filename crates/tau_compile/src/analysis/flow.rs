//! Control-flow analysis.
//!
//! Walks every function body with a stack of enclosing loops:
//!
//! - binds each `break`/`continue` to its innermost loop (redundant with
//!   name resolution, kept for the loop-poisoning pass)
//! - warns about statements that follow a `return`, `break`, or `continue`
//!   in the same block
//! - checks that a function with a non-`unit` return type returns on every
//!   path; an `if` needs both arms to return, a `loop` without a `break`
//!   diverges and counts.

use tau_base::{Diagnostic, ErrorBag, SourceRegistry, Span};
use tau_language::ast::{DeclNode, NodeKind, StmtNode, TypeNode};
use tau_language::{Ast, NodeId};

use crate::types::{TypeBuilder, TypeDesc, TypeTable};

use super::codes;

struct Flow<'e> {
    ast: &'e mut Ast,
    types: &'e TypeBuilder,
    table: &'e TypeTable,
    registry: &'e SourceRegistry,
    bag: &'e mut ErrorBag,
    loops: Vec<NodeId>,
    aborted: bool,
}

/// Runs control-flow analysis over a program.
pub fn run(
    ast: &mut Ast,
    prog: NodeId,
    types: &TypeBuilder,
    table: &TypeTable,
    registry: &SourceRegistry,
    bag: &mut ErrorBag,
) {
    let mut pass = Flow {
        ast,
        types,
        table,
        registry,
        bag,
        loops: Vec::new(),
        aborted: false,
    };
    pass.visit_prog(prog);
}

impl<'e> Flow<'e> {
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

    fn warn(&mut self, code: u16, title: &str, node: NodeId) {
        let (source, span) = self.location(node);
        let _ = self
            .bag
            .report(Diagnostic::warning(code, title, source, span));
    }

    fn visit_prog(&mut self, prog: NodeId) {
        let NodeKind::Prog { decls } = &self.ast.node(prog).kind else {
            unreachable!("control-flow analysis starts at the program root");
        };
        for decl in decls.clone() {
            if self.aborted {
                return;
            }
            self.visit_decl(decl);
        }
    }

    fn visit_decl(&mut self, decl: NodeId) {
        match self.ast.node(decl).kind.clone() {
            NodeKind::Decl(DeclNode::Fun { ret, body, .. }) => {
                let Some(body) = body else { return };
                self.visit_stmt(body);

                if self.returns_unit(ret) {
                    return;
                }
                if !self.definitely_returns(body) {
                    self.error(
                        codes::MISSING_RETURN,
                        "function does not return on every path",
                        decl,
                    );
                }
            }
            NodeKind::Decl(DeclNode::Generic { inner, .. }) => self.visit_decl(inner),
            NodeKind::Decl(DeclNode::Mod { members, .. }) => {
                for member in members {
                    self.visit_decl(member);
                }
            }
            _ => {}
        }
    }

    /// Whether a function's declared return type is `unit` (or unusable
    /// because an earlier pass poisoned it).
    fn returns_unit(&self, ret: NodeId) -> bool {
        match self.table.lookup(ret) {
            Some(ty) => matches!(
                self.types.desc(ty),
                TypeDesc::Unit | TypeDesc::Poison
            ),
            // Untyped return positions mean earlier passes bailed.
            None => matches!(
                self.ast.node(ret).kind,
                NodeKind::Type(TypeNode::Prim(tau_language::ast::Prim::Unit))
            ),
        }
    }

    fn visit_stmt(&mut self, stmt: NodeId) {
        if self.aborted {
            return;
        }

        match self.ast.node(stmt).kind.clone() {
            NodeKind::Stmt(StmtNode::If { then, els, .. }) => {
                self.visit_stmt(then);
                if let Some(els) = els {
                    self.visit_stmt(els);
                }
            }
            NodeKind::Stmt(StmtNode::While { body, .. })
            | NodeKind::Stmt(StmtNode::For { body, .. })
            | NodeKind::Stmt(StmtNode::Loop { body, .. }) => {
                self.loops.push(stmt);
                self.visit_stmt(body);
                self.loops.pop();
            }
            NodeKind::Stmt(StmtNode::Break { target }) => {
                if target.is_none() {
                    // Name resolution already diagnosed jumps with no loop;
                    // bind what it could not.
                    if let Some(&innermost) = self.loops.last() {
                        let NodeKind::Stmt(StmtNode::Break { target }) =
                            &mut self.ast.node_mut(stmt).kind
                        else {
                            unreachable!();
                        };
                        *target = Some(innermost);
                    }
                }
            }
            NodeKind::Stmt(StmtNode::Continue { target }) => {
                if target.is_none() {
                    if let Some(&innermost) = self.loops.last() {
                        let NodeKind::Stmt(StmtNode::Continue { target }) =
                            &mut self.ast.node_mut(stmt).kind
                        else {
                            unreachable!();
                        };
                        *target = Some(innermost);
                    }
                }
            }
            NodeKind::Stmt(StmtNode::Defer { body }) => self.visit_stmt(body),
            NodeKind::Stmt(StmtNode::Block { stmts, .. }) => {
                // One unreachable-code warning per terminator is enough.
                let mut terminated = false;
                for inner in stmts {
                    if terminated {
                        self.warn(
                            codes::WARN_UNREACHABLE_CODE,
                            "unreachable statement",
                            inner,
                        );
                        terminated = false;
                    } else if self.terminates(inner) {
                        terminated = true;
                    }
                    self.visit_stmt(inner);
                }
            }
            NodeKind::Stmt(StmtNode::Return { .. })
            | NodeKind::Stmt(StmtNode::Expr { .. })
            | NodeKind::Decl(_) => {}
            other => unreachable!("not a statement: {}", other.tag()),
        }
    }

    /// Whether control cannot flow past this statement.
    fn terminates(&self, stmt: NodeId) -> bool {
        matches!(
            self.ast.node(stmt).kind,
            NodeKind::Stmt(StmtNode::Return { .. })
                | NodeKind::Stmt(StmtNode::Break { .. })
                | NodeKind::Stmt(StmtNode::Continue { .. })
        )
    }

    /// Whether this statement definitely returns (or diverges) on every
    /// path through it.
    fn definitely_returns(&self, stmt: NodeId) -> bool {
        match &self.ast.node(stmt).kind {
            NodeKind::Stmt(StmtNode::Return { .. }) => true,
            NodeKind::Stmt(StmtNode::Block { stmts, .. }) => {
                stmts.iter().any(|&s| self.definitely_returns(s))
            }
            NodeKind::Stmt(StmtNode::If { then, els, .. }) => match els {
                Some(els) => self.definitely_returns(*then) && self.definitely_returns(*els),
                None => false,
            },
            // A bare loop with no way out never falls through.
            NodeKind::Stmt(StmtNode::Loop { body, .. }) => !self.has_break_out_of(*body, stmt),
            _ => false,
        }
    }

    /// Whether `stmt` contains a `break` bound to `target`.
    fn has_break_out_of(&self, stmt: NodeId, target: NodeId) -> bool {
        match &self.ast.node(stmt).kind {
            NodeKind::Stmt(StmtNode::Break { target: bound }) => *bound == Some(target),
            _ => self
                .ast
                .children(stmt)
                .iter()
                .any(|&child| self.has_break_out_of(child, target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{nameres, typecheck};
    use tau_base::{Interner, SourceRegistry};
    use tau_language::{lexer, parser, ScopeTree};

    struct Checked {
        bag: ErrorBag,
        ast: Ast,
    }

    fn analyze(text: &str) -> Checked {
        let mut registry = SourceRegistry::new();
        let source = registry.add("test.tau", text);
        let mut bag = ErrorBag::new();
        let tokens = lexer::lex(source, text, &mut bag);
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let prog = parser::parse(&tokens, text, source, &mut ast, &mut interner, &mut bag);
        assert!(!bag.has_errors(), "parse errors: {:?}", bag.diagnostics());

        let mut scopes = ScopeTree::new();
        nameres::run(&mut ast, prog, &mut scopes, &registry, &mut bag);

        let mut types = TypeBuilder::new();
        let mut table = TypeTable::new();
        typecheck::run(
            &mut ast, prog, &scopes, &mut types, &mut table, &registry, &mut bag,
        );
        run(&mut ast, prog, &types, &table, &registry, &mut bag);
        Checked { bag, ast }
    }

    fn has_error(checked: &Checked, code: u16) -> bool {
        checked
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == code && d.severity == tau_base::Severity::Error)
    }

    fn has_warning(checked: &Checked, code: u16) -> bool {
        checked
            .bag
            .diagnostics()
            .iter()
            .any(|d| d.code == code && d.severity == tau_base::Severity::Warning)
    }

    #[test]
    fn function_returning_on_all_paths_is_clean() {
        let checked = analyze(
            "fun f(x: i32) -> i32 {\n\
             if x > 0 then { return 1 } else { return 2 }\n\
             }",
        );
        assert!(
            !checked.bag.has_errors(),
            "diagnostics: {:?}",
            checked.bag.diagnostics()
        );
    }

    #[test]
    fn missing_return_on_one_path_is_reported() {
        let checked = analyze(
            "fun f(x: i32) -> i32 {\n\
             if x > 0 then { return 1 }\n\
             }",
        );
        assert!(has_error(&checked, codes::MISSING_RETURN));
    }

    #[test]
    fn unit_function_needs_no_return() {
        let checked = analyze("fun f() { }");
        assert!(!checked.bag.has_errors());
    }

    #[test]
    fn bare_loop_counts_as_diverging() {
        let checked = analyze("fun f() -> i32 { loop { } }");
        assert!(
            !checked.bag.has_errors(),
            "diagnostics: {:?}",
            checked.bag.diagnostics()
        );
    }

    #[test]
    fn loop_with_break_does_not_count_as_return() {
        let checked = analyze("fun f() -> i32 { loop { break } }");
        assert!(has_error(&checked, codes::MISSING_RETURN));
    }

    #[test]
    fn code_after_return_is_flagged() {
        let checked = analyze(
            "fun f() -> i32 {\n\
             return 1\n\
             return 2\n\
             }",
        );
        assert!(has_warning(&checked, codes::WARN_UNREACHABLE_CODE));
    }

    #[test]
    fn code_after_break_is_flagged() {
        let checked = analyze(
            "fun f() {\n\
             while true do {\n\
             break\n\
             var x: i32 = 1\n\
             }\n\
             }",
        );
        assert!(has_warning(&checked, codes::WARN_UNREACHABLE_CODE));
    }

    #[test]
    fn breaks_are_bound_to_their_loops() {
        let checked = analyze("fun f() { while true do { break } }");
        let bound = checked
            .ast
            .iter()
            .find_map(|(_, node)| match &node.kind {
                NodeKind::Stmt(StmtNode::Break { target }) => Some(*target),
                _ => None,
            })
            .unwrap();
        assert!(bound.is_some());
    }
}
