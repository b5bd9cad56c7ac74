//! The compilation driver.
//!
//! An [`Environment`] owns everything a translation unit needs: the
//! interner, the source registry, the AST registry, the scope tree, the
//! type builder, and the type table. It is created at the start of a unit
//! and dropped whole at the end; nothing inside is freed mid-compile.
//!
//! [`Environment::merge`] splices one unit's results into another: AST
//! nodes are appended with their ids shifted, the source scope tree is
//! re-parented under the destination root, canonical types are re-interned
//! into the destination builder, and the source environment is consumed.
//!
//! [`Compiler`] strings the pipeline together for one file:
//! read → lex → parse → nameres → typecheck → flow → dumps. After any
//! stage that recorded errors, later stages are skipped.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use tau_base::{diag, ErrorBag, Interner, SourceId, SourceRegistry, Style, Symbol};
use tau_language::ast::{DeclNode, ExprNode, NodeKind, StmtNode, TypeNode};
use tau_language::token::Token;
use tau_language::{lexer, parser, Ast, NodeId, ScopeId, ScopeTree};

use crate::analysis::{flow, nameres, typecheck};
use crate::dump;
use crate::types::{TypeBuilder, TypeDesc, TypeId, TypeTable};

/// Everything one translation unit owns.
pub struct Environment {
    pub interner: Interner,
    pub sources: SourceRegistry,
    pub ast: Ast,
    pub scopes: ScopeTree,
    pub types: TypeBuilder,
    pub table: TypeTable,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            sources: SourceRegistry::new(),
            ast: Ast::new(),
            scopes: ScopeTree::new(),
            types: TypeBuilder::new(),
            table: TypeTable::new(),
        }
    }

    /// Merges `src` into `self`, consuming it.
    ///
    /// The source scope-tree root is re-parented under the destination
    /// root, so code from the merged unit sees the destination's symbols.
    pub fn merge(&mut self, src: Environment) {
        let node_offset = self.ast.len();
        let source_offset = self.sources.len();

        // Interned strings first: everything else maps symbols through
        // this table.
        let sym_map: Vec<Symbol> = src
            .interner
            .strings()
            .map(|s| self.interner.intern(s))
            .collect();

        for index in 0..src.sources.len() {
            let id = SourceId::from_index(index);
            self.sources.add(
                src.sources.path(id).to_string(),
                src.sources.contents(id).to_string(),
            );
        }

        let scope_offset = self.scopes.len();
        for (_, node) in src.ast.iter() {
            let shifted = shift_node(
                node.clone(),
                node_offset,
                scope_offset,
                source_offset,
                &sym_map,
            );
            self.ast.alloc(shifted.token, shifted.kind);
        }

        self.scopes
            .merge(src.scopes, node_offset, |sym| sym_map[sym.index()]);

        // Re-intern canonical types in id order; components always have
        // smaller ids than the composites built from them.
        let mut type_map: Vec<TypeId> = Vec::with_capacity(src.types.len());
        let descs: Vec<TypeDesc> = src.types.iter().map(|(_, d)| d.clone()).collect();
        for desc in descs {
            let remapped = shift_desc(desc, node_offset, &type_map);
            type_map.push(self.types.readopt(remapped));
        }

        for (node, ty) in src.table.iter() {
            self.table.insert(
                NodeId::from_index(node.index() + node_offset),
                type_map[ty.index()],
            );
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn shift_desc(desc: TypeDesc, node_offset: usize, type_map: &[TypeId]) -> TypeDesc {
    let t = |id: TypeId| type_map[id.index()];
    let n = |id: NodeId| NodeId::from_index(id.index() + node_offset);

    match desc {
        TypeDesc::Mut(base) => TypeDesc::Mut(t(base)),
        TypeDesc::Ptr(base) => TypeDesc::Ptr(t(base)),
        TypeDesc::Array { len, base } => TypeDesc::Array { len, base: t(base) },
        TypeDesc::Ref(base) => TypeDesc::Ref(t(base)),
        TypeDesc::Opt(base) => TypeDesc::Opt(t(base)),
        TypeDesc::Vector { lanes, elem } => TypeDesc::Vector {
            lanes,
            elem: t(elem),
        },
        TypeDesc::Matrix { rows, cols, elem } => TypeDesc::Matrix {
            rows,
            cols,
            elem: t(elem),
        },
        TypeDesc::Fun {
            params,
            ret,
            is_vararg,
            callconv,
        } => TypeDesc::Fun {
            params: params.into_iter().map(t).collect(),
            ret: t(ret),
            is_vararg,
            callconv,
        },
        TypeDesc::Struct { decl, fields } => TypeDesc::Struct {
            decl: n(decl),
            fields: fields.into_iter().map(t).collect(),
        },
        TypeDesc::Union { decl, fields } => TypeDesc::Union {
            decl: n(decl),
            fields: fields.into_iter().map(t).collect(),
        },
        TypeDesc::Enum { decl } => TypeDesc::Enum { decl: n(decl) },
        TypeDesc::Var(decl) => TypeDesc::Var(n(decl)),
        prim => prim,
    }
}

fn shift_node(
    mut node: tau_language::ast::Node,
    node_offset: usize,
    scope_offset: usize,
    source_offset: usize,
    sym_map: &[Symbol],
) -> tau_language::ast::Node {
    let n = |id: NodeId| NodeId::from_index(id.index() + node_offset);
    let no = |id: &mut Option<NodeId>| {
        if let Some(inner) = id {
            *inner = n(*inner);
        }
    };
    let nv = |ids: &mut Vec<NodeId>| {
        for inner in ids {
            *inner = n(*inner);
        }
    };
    let sc = |id: &mut Option<ScopeId>| {
        if let Some(inner) = id {
            *inner = ScopeId::from_index(inner.index() + scope_offset);
        }
    };
    let sym = |s: &mut Symbol| *s = sym_map[s.index()];

    node.token = Token::new(
        node.token.kind,
        SourceId::from_index(node.token.source.index() + source_offset),
        node.token.offset as usize,
    );

    match &mut node.kind {
        NodeKind::Ident { name } => sym(name),
        NodeKind::Type(ty) => match ty {
            TypeNode::Mut { base }
            | TypeNode::Ptr { base }
            | TypeNode::Ref { base }
            | TypeNode::Opt { base } => *base = n(*base),
            TypeNode::Array { size, base } => {
                no(size);
                *base = n(*base);
            }
            TypeNode::Prim(_) | TypeNode::Vec { .. } | TypeNode::Mat { .. } => {}
            TypeNode::Fun { params, ret, .. } => {
                nv(params);
                *ret = n(*ret);
            }
            TypeNode::Named { name, decl } => {
                sym(name);
                no(decl);
            }
            TypeNode::Member {
                parent,
                member,
                decl,
            } => {
                *parent = n(*parent);
                *member = n(*member);
                no(decl);
            }
        },
        NodeKind::Expr(expr) => match expr {
            ExprNode::LitInt { .. }
            | ExprNode::LitFloat { .. }
            | ExprNode::LitChar { .. }
            | ExprNode::LitBool { .. }
            | ExprNode::LitNull => {}
            ExprNode::LitStr { value } => sym(value),
            ExprNode::Ident { name, decl } => {
                sym(name);
                no(decl);
            }
            ExprNode::Unary { operand, .. } => *operand = n(*operand),
            ExprNode::Binary { lhs, rhs, .. } => {
                *lhs = n(*lhs);
                *rhs = n(*rhs);
            }
            ExprNode::Call { callee, args } => {
                *callee = n(*callee);
                nv(args);
            }
            ExprNode::Spec { generic, args } => {
                *generic = n(*generic);
                nv(args);
            }
        },
        NodeKind::Stmt(stmt) => match stmt {
            StmtNode::If { cond, then, els } => {
                *cond = n(*cond);
                *then = n(*then);
                no(els);
            }
            StmtNode::For {
                var,
                range,
                body,
                scope,
            } => {
                *var = n(*var);
                *range = n(*range);
                *body = n(*body);
                sc(scope);
            }
            StmtNode::While { cond, body, scope } => {
                *cond = n(*cond);
                *body = n(*body);
                sc(scope);
            }
            StmtNode::Loop { body, scope } => {
                *body = n(*body);
                sc(scope);
            }
            StmtNode::Break { target } | StmtNode::Continue { target } => no(target),
            StmtNode::Return { value } => no(value),
            StmtNode::Defer { body } => *body = n(*body),
            StmtNode::Block { stmts, scope } => {
                nv(stmts);
                sc(scope);
            }
            StmtNode::Expr { expr } => *expr = n(*expr),
        },
        NodeKind::Decl(decl) => match decl {
            DeclNode::Var { name, ty, init, .. } => {
                *name = n(*name);
                *ty = n(*ty);
                no(init);
            }
            DeclNode::Param { name, ty, default } => {
                *name = n(*name);
                *ty = n(*ty);
                no(default);
            }
            DeclNode::Fun {
                name,
                params,
                ret,
                body,
                scope,
                ..
            } => {
                *name = n(*name);
                nv(params);
                *ret = n(*ret);
                no(body);
                sc(scope);
            }
            DeclNode::Struct {
                name,
                fields,
                scope,
                ..
            }
            | DeclNode::Union {
                name,
                fields,
                scope,
                ..
            } => {
                *name = n(*name);
                nv(fields);
                sc(scope);
            }
            DeclNode::Enum {
                name,
                constants,
                scope,
                ..
            } => {
                *name = n(*name);
                nv(constants);
                sc(scope);
            }
            DeclNode::EnumConstant { name } => *name = n(*name),
            DeclNode::Mod {
                name,
                members,
                scope,
                ..
            } => {
                *name = n(*name);
                nv(members);
                sc(scope);
            }
            DeclNode::TypeAlias {
                name, ty, scope, ..
            } => {
                *name = n(*name);
                *ty = n(*ty);
                sc(scope);
            }
            DeclNode::Generic { params, inner } => {
                nv(params);
                *inner = n(*inner);
            }
            DeclNode::GenericParam { name } => *name = n(*name),
            DeclNode::Use { segments } => nv(segments),
        },
        NodeKind::Prog { decls } => nv(decls),
    }

    node
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub emit_tokens: bool,
    pub emit_ast: bool,
    pub verbose: bool,
    pub color: bool,
    pub error_limit: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            emit_tokens: false,
            emit_ast: false,
            verbose: false,
            color: io::stderr().is_terminal(),
            error_limit: ErrorBag::DEFAULT_CAPACITY,
        }
    }
}

/// One compiled unit's results.
pub struct UnitOutcome {
    pub prog: NodeId,
    pub tokens: Vec<Token>,
    pub succeeded: bool,
}

/// Runs the analysis pipeline over one registered source.
///
/// Later passes are skipped as soon as a stage records an error.
pub fn compile_unit(env: &mut Environment, source: SourceId, bag: &mut ErrorBag) -> UnitOutcome {
    let text = env.sources.contents(source).to_string();

    let tokens = lexer::lex(source, &text, bag);
    let prog = parser::parse(
        &tokens,
        &text,
        source,
        &mut env.ast,
        &mut env.interner,
        bag,
    );
    if bag.has_errors() {
        return UnitOutcome {
            prog,
            tokens,
            succeeded: false,
        };
    }

    nameres::run(&mut env.ast, prog, &mut env.scopes, &env.sources, bag);
    if bag.has_errors() {
        return UnitOutcome {
            prog,
            tokens,
            succeeded: false,
        };
    }

    typecheck::run(
        &mut env.ast,
        prog,
        &env.scopes,
        &mut env.types,
        &mut env.table,
        &env.sources,
        bag,
    );
    if bag.has_errors() {
        return UnitOutcome {
            prog,
            tokens,
            succeeded: false,
        };
    }

    flow::run(&mut env.ast, prog, &env.types, &env.table, &env.sources, bag);

    UnitOutcome {
        succeeded: !bag.has_errors(),
        prog,
        tokens,
    }
}

/// The file-level driver.
pub struct Compiler {
    pub options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compiles one file into `env`: reads it, runs the pipeline, writes
    /// any requested dumps, and renders diagnostics to stderr.
    ///
    /// Returns whether the unit compiled without hard errors.
    pub fn compile_file(&self, env: &mut Environment, path: &Path) -> io::Result<bool> {
        let text = fs::read_to_string(path)?;
        if self.options.verbose {
            eprintln!("compiling {}", path.display());
        }

        let source = env.sources.add(path.display().to_string(), text);
        let mut bag = ErrorBag::with_capacity(self.options.error_limit);
        let outcome = compile_unit(env, source, &mut bag);

        if self.options.emit_tokens {
            let contents = env.sources.contents(source);
            let mut file = fs::File::create(dump::dump_path(path, "tokens.json"))?;
            dump::write_tokens(&outcome.tokens, contents, &mut file)?;
        }
        if self.options.emit_ast {
            let mut file = fs::File::create(dump::dump_path(path, "ast.json"))?;
            dump::write_ast(&env.ast, outcome.prog, &env.interner, &mut file)?;
        }

        let mut stderr = io::stderr().lock();
        diag::render(&bag, &env.sources, &mut stderr, Style::new(self.options.color))?;
        stderr.flush()?;

        Ok(outcome.succeeded)
    }
}
